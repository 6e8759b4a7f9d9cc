use mechswitch_engine::{
    link_to_switches, reconcile, Classification, DuplicatePolicy, ReconcileError,
    ReconcileOptions, Report,
};
use mechswitch_model::{
    Cell, CellAddress, CellRef, CellStyle, LinkStyle, ModelError, Workbook, Worksheet,
};
use pretty_assertions::assert_eq;

fn switches(rows: &[(&str, &str)]) -> Worksheet {
    let mut ws = Worksheet::new("Switches");
    for (col, header) in ["Owned", "Brand", "Type", "Name"].iter().enumerate() {
        ws.insert_cell(CellRef::new(0, col as u32), Cell::new(*header));
    }
    for (idx, (owned, name)) in rows.iter().enumerate() {
        let row = idx as u32 + 1;
        if !owned.is_empty() {
            ws.insert_cell(CellRef::new(row, 0), Cell::new(*owned));
        }
        ws.insert_cell(CellRef::new(row, 1), Cell::new("Gateron"));
        ws.insert_cell(CellRef::new(row, 2), Cell::new("Linear"));
        ws.insert_cell(CellRef::new(row, 3), Cell::new(*name));
    }
    ws
}

fn boards(refs: &[(&str, &str)]) -> Worksheet {
    let mut ws = Worksheet::new("Boards");
    ws.insert_cell(CellRef::new(0, 0), Cell::new("Keyboard"));
    ws.insert_cell(CellRef::new(0, 1), Cell::new("Switch"));
    for (a1, name) in refs {
        ws.insert_cell(
            CellRef::from_a1(a1).unwrap(),
            Cell::formula("VLOOKUP(A2,Switches!A:D,4,FALSE)", *name),
        );
    }
    ws
}

fn workbook(catalog: Worksheet, board: Worksheet) -> Workbook {
    let mut wb = Workbook::new();
    wb.push_sheet(board);
    wb.push_sheet(catalog);
    wb
}

#[test]
fn referenced_missing_switch_is_promoted_with_mutual_links() {
    let mut wb = workbook(
        switches(&[("x", "SW1"), ("", "SW2")]),
        boards(&[("B7", "SW2")]),
    );

    let outcome = reconcile(&mut wb, &ReconcileOptions::default()).unwrap();
    let registry = &outcome.registry;

    assert_eq!(registry.classification("SW2"), Some(Classification::Owned));
    assert_eq!(registry.classification("SW1"), Some(Classification::Owned));
    assert_eq!(registry.missing_count(), 0);
    assert_eq!(
        registry
            .newly_discovered()
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>(),
        vec!["SW2"]
    );
    assert_eq!(outcome.back_links, 1);
    assert_eq!(outcome.board_links, 1);

    let board = wb.sheet("Boards").unwrap();
    let b7 = CellRef::from_a1("B7").unwrap();
    assert_eq!(
        board.hyperlink(b7).unwrap().target,
        CellAddress::new("Switches", CellRef::from_a1("D3").unwrap())
    );

    let catalog = wb.sheet("Switches").unwrap();
    let a3 = CellRef::from_a1("A3").unwrap();
    assert_eq!(
        catalog.hyperlink(a3).unwrap().target,
        CellAddress::new("Boards", b7)
    );
    assert_eq!(catalog.display_string(a3), "Board Link");
    // SW1 was owned from the start and gets no back-link.
    assert!(catalog.hyperlink(CellRef::from_a1("A2").unwrap()).is_none());
}

#[test]
fn board_without_references_changes_nothing() {
    let mut wb = workbook(switches(&[("x", "SW1"), ("", "SW2")]), boards(&[]));

    let outcome = reconcile(&mut wb, &ReconcileOptions::default()).unwrap();

    assert_eq!(
        outcome.registry.missing().map(|s| s.name()).collect::<Vec<_>>(),
        vec!["SW2"]
    );
    assert!(outcome.registry.newly_discovered().is_empty());
    assert_eq!((outcome.back_links, outcome.board_links), (0, 0));
    assert!(wb.sheets().iter().all(|sheet| !sheet.is_dirty()));
}

#[test]
fn undefined_switch_on_board_is_unresolved() {
    let mut wb = workbook(switches(&[("x", "SW1")]), boards(&[("C4", "SW3")]));

    let err = reconcile(&mut wb, &ReconcileOptions::default()).unwrap_err();

    assert_eq!(
        err,
        ReconcileError::UnresolvedSwitch {
            name: "SW3".to_string(),
            address: CellAddress::new("Boards", CellRef::from_a1("C4").unwrap()),
        }
    );
}

#[test]
fn missing_catalog_table_fails_before_processing() {
    let mut wb = Workbook::new();
    wb.push_sheet(boards(&[("B2", "SW1")]));

    let err = reconcile(&mut wb, &ReconcileOptions::default()).unwrap_err();

    assert_eq!(
        err,
        ReconcileError::Model(ModelError::TableNotFound("Switches".to_string()))
    );
    assert!(!wb.sheets()[0].is_dirty());
}

#[test]
fn empty_name_before_sentinel_aborts() {
    let mut wb = workbook(switches(&[("x", "SW1"), ("x", "")]), boards(&[("B2", "SW1")]));

    let err = reconcile(&mut wb, &ReconcileOptions::default()).unwrap_err();

    assert_eq!(
        err,
        ReconcileError::MalformedRow {
            sheet: "Switches".to_string(),
            row: 2
        }
    );
}

#[test]
fn forward_reference_is_promoted_before_annotation() {
    // The first reference to SW3 appears after another cell naming it would have
    // needed its final row; the two-pass split makes order irrelevant.
    let mut wb = workbook(
        switches(&[("", "SW1"), ("x", "SW2"), ("", "SW3")]),
        boards(&[("B2", "SW1"), ("C2", "SW3"), ("B3", "SW3"), ("C3", "SW2")]),
    );

    let outcome = reconcile(&mut wb, &ReconcileOptions::default()).unwrap();

    assert_eq!(
        outcome
            .registry
            .newly_discovered()
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>(),
        vec!["SW1", "SW3"]
    );
    assert_eq!(
        outcome.registry.origin("SW3").map(ToString::to_string).as_deref(),
        Some("'Boards'!C2")
    );
    assert_eq!(outcome.board_links, 4);

    let board = wb.sheet("Boards").unwrap();
    for a1 in ["B2", "C2", "B3", "C3"] {
        let cell = board.cell(CellRef::from_a1(a1).unwrap()).unwrap();
        assert_eq!(cell.style, CellStyle::Link(LinkStyle::Bordered), "{a1}");
    }
}

#[test]
fn annotation_is_idempotent() {
    let mut wb = workbook(
        switches(&[("x", "SW1"), ("", "SW2")]),
        boards(&[("B2", "SW2"), ("B3", "SW1")]),
    );
    let options = ReconcileOptions::default();
    let outcome = reconcile(&mut wb, &options).unwrap();

    let snapshot = |wb: &Workbook| -> Vec<(CellRef, CellAddress)> {
        wb.sheet("Boards")
            .unwrap()
            .hyperlinks()
            .map(|l| (l.anchor, l.target.clone()))
            .collect()
    };
    let first = snapshot(&wb);

    let (catalog, board) = wb.sheet_pair_mut("Switches", "Boards").unwrap();
    link_to_switches(&outcome.registry, board, catalog, &options.layout).unwrap();

    assert_eq!(snapshot(&wb), first);
}

#[test]
fn reject_policy_surfaces_duplicates() {
    let mut wb = workbook(
        switches(&[("x", "SW1"), ("", "SW1")]),
        boards(&[("B2", "SW1")]),
    );
    let options = ReconcileOptions {
        duplicates: DuplicatePolicy::Reject,
        ..ReconcileOptions::default()
    };

    let err = reconcile(&mut wb, &options).unwrap_err();
    assert!(matches!(err, ReconcileError::DuplicateSwitch { ref name, .. } if name == "SW1"));
}

#[test]
fn report_reflects_final_state() {
    let mut wb = workbook(
        switches(&[("x", "SW1"), ("", "SW2"), ("", "SW3")]),
        boards(&[("B2", "SW3")]),
    );
    let outcome = reconcile(&mut wb, &ReconcileOptions::default()).unwrap();
    let report = Report::from_registry(&outcome.registry);

    assert_eq!(report.owned, vec!["SW1", "SW3"]);
    assert_eq!(report.missing, vec!["SW2"]);
    assert_eq!(report.new.len(), 1);
    assert_eq!(report.new[0].origin.as_deref(), Some("'Boards'!B2"));
    assert_eq!((report.owned_count, report.missing_count), (2, 1));
}
