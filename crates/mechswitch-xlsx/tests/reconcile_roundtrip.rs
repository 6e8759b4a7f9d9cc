use mechswitch_engine::{reconcile, ReconcileOptions, Report};
use mechswitch_model::{CellRef, CellStyle};
use mechswitch_xlsx::minimal::{write_minimal_xlsx, FixtureSheet};
use mechswitch_xlsx::{output_path_for, InventoryDocument, XlsxPackage};
use pretty_assertions::assert_eq;
use rust_xlsxwriter::{Formula, Workbook as XlsxWriterBook};

fn at(a1: &str) -> CellRef {
    CellRef::from_a1(a1).unwrap()
}

fn catalog(rows: &[(&str, &str)]) -> FixtureSheet {
    let mut sheet = FixtureSheet::new("Switches")
        .text(at("A1"), "Owned")
        .text(at("B1"), "Brand")
        .text(at("C1"), "Type")
        .text(at("D1"), "Name");
    for (idx, (owned, name)) in rows.iter().enumerate() {
        let row = idx as u32 + 1;
        if !owned.is_empty() {
            sheet = sheet.text(CellRef::new(row, 0), *owned);
        }
        sheet = sheet
            .text(CellRef::new(row, 1), "Gateron")
            .text(CellRef::new(row, 2), "Linear")
            .text(CellRef::new(row, 3), *name);
    }
    sheet
}

fn part_xml(package: &XlsxPackage, name: &str) -> String {
    String::from_utf8(package.part(name).unwrap().to_vec()).unwrap()
}

#[test]
fn promoted_switch_round_trips_with_links_and_styles() {
    let bytes = write_minimal_xlsx(&[
        FixtureSheet::new("Boards")
            .text(at("A1"), "Keyboard")
            .formula(at("B7"), "VLOOKUP(A7,Switches!A:D,4,FALSE)", "SW2"),
        catalog(&[("x", "SW1"), ("", "SW2")]),
    ])
    .unwrap();

    let mut doc = InventoryDocument::from_bytes(&bytes).unwrap();
    let outcome = reconcile(doc.workbook_mut(), &ReconcileOptions::default()).unwrap();
    assert_eq!(Report::from_registry(&outcome.registry).missing_count, 0);

    let out_bytes = doc.to_bytes().unwrap();
    let out = XlsxPackage::from_bytes(&out_bytes).unwrap();

    let boards_xml = part_xml(&out, "xl/worksheets/sheet1.xml");
    assert!(boards_xml.contains(r#"<hyperlink ref="B7" location="&apos;Switches&apos;!D3"/>"#));
    // The link block sits before pageMargins.
    let links_at = boards_xml.find("<hyperlinks>").unwrap();
    assert!(links_at < boards_xml.find("<pageMargins").unwrap());

    let switches_xml = part_xml(&out, "xl/worksheets/sheet2.xml");
    assert!(switches_xml.contains(r#"<hyperlink ref="A3" location="&apos;Boards&apos;!B7"/>"#));

    let styles_xml = part_xml(&out, "xl/styles.xml");
    assert!(styles_xml.contains(r#"<cellXfs count="3">"#));

    // Untouched parts are carried over byte-for-byte.
    let original = XlsxPackage::from_bytes(&bytes).unwrap();
    for name in [
        "xl/workbook.xml",
        "xl/sharedStrings.xml",
        "xl/_rels/workbook.xml.rels",
        "[Content_Types].xml",
    ] {
        assert_eq!(out.part(name), original.part(name), "{name}");
    }

    let reread = InventoryDocument::from_bytes(&out_bytes).unwrap();
    let switches = reread.workbook().sheet("Switches").unwrap();
    assert_eq!(switches.display_string(at("A3")), "Board Link");
    assert_eq!(switches.cell(at("A3")).unwrap().style, CellStyle::Preserved(Some(2)));
    assert_eq!(switches.display_string(at("D3")), "SW2");

    let boards = reread.workbook().sheet("Boards").unwrap();
    let b7 = boards.cell(at("B7")).unwrap();
    assert_eq!(b7.formula.as_deref(), Some("VLOOKUP(A7,Switches!A:D,4,FALSE)"));
    assert_eq!(b7.style, CellStyle::Preserved(Some(1)));
}

#[test]
fn second_run_sees_the_promotion_as_owned() {
    let bytes = write_minimal_xlsx(&[
        FixtureSheet::new("Boards").formula(at("C4"), "Switches!D2", "SW1"),
        catalog(&[("", "SW1"), ("", "SW2")]),
    ])
    .unwrap();

    let mut first = InventoryDocument::from_bytes(&bytes).unwrap();
    let outcome = reconcile(first.workbook_mut(), &ReconcileOptions::default()).unwrap();
    assert_eq!(outcome.back_links, 1);

    let mut second = InventoryDocument::from_bytes(&first.to_bytes().unwrap()).unwrap();
    let outcome = reconcile(second.workbook_mut(), &ReconcileOptions::default()).unwrap();
    let report = Report::from_registry(&outcome.registry);

    assert_eq!(report.owned, vec!["SW1"]);
    assert_eq!(report.missing, vec!["SW2"]);
    assert!(report.new.is_empty());
    assert_eq!((outcome.back_links, outcome.board_links), (0, 1));

    // Re-running replaces the board link rather than duplicating it.
    let out = XlsxPackage::from_bytes(&second.to_bytes().unwrap()).unwrap();
    let boards_xml = part_xml(&out, "xl/worksheets/sheet1.xml");
    assert_eq!(boards_xml.matches(r#"<hyperlink ref="C4""#).count(), 1);
}

#[test]
fn existing_board_hyperlinks_are_kept() {
    let bytes = write_minimal_xlsx(&[
        FixtureSheet::new("Boards")
            .text(at("A1"), "Notes")
            .hyperlink(at("A1"), "'Boards'!Z99")
            .formula(at("B2"), "Switches!D2", "SW1"),
        catalog(&[("x", "SW1")]),
    ])
    .unwrap();

    let mut doc = InventoryDocument::from_bytes(&bytes).unwrap();
    reconcile(doc.workbook_mut(), &ReconcileOptions::default()).unwrap();

    let out = XlsxPackage::from_bytes(&doc.to_bytes().unwrap()).unwrap();
    let boards_xml = part_xml(&out, "xl/worksheets/sheet1.xml");
    assert!(boards_xml.contains(r#"<hyperlink ref="A1" location="&apos;Boards&apos;!Z99"/>"#));
    assert!(boards_xml.contains(r#"<hyperlink ref="B2" location="&apos;Switches&apos;!D2"/>"#));
    assert_eq!(boards_xml.matches("<hyperlinks>").count(), 1);

    // Nothing on the catalog changed, so its part is untouched.
    let original = XlsxPackage::from_bytes(&bytes).unwrap();
    assert_eq!(
        out.part("xl/worksheets/sheet2.xml"),
        original.part("xl/worksheets/sheet2.xml")
    );
}

#[test]
fn workbook_written_by_another_producer_is_annotated_and_saved() {
    let mut book = XlsxWriterBook::new();
    let switches = book.add_worksheet();
    switches.set_name("Switches").unwrap();
    for (col, header) in ["Owned", "Brand", "Type", "Name"].iter().enumerate() {
        switches.write_string(0, col as u16, *header).unwrap();
    }
    switches.write_string(1, 0, "x").unwrap();
    switches.write_string(1, 1, "Cherry").unwrap();
    switches.write_string(1, 3, "MX Black").unwrap();
    switches.write_string(2, 1, "Zeal").unwrap();
    switches.write_string(2, 3, "Zilent").unwrap();

    let boards = book.add_worksheet();
    boards.set_name("Boards").unwrap();
    boards.write_string(0, 0, "Board").unwrap();
    boards
        .write_formula(1, 1, Formula::new("=Switches!D3").set_result("Zilent"))
        .unwrap();
    boards
        .write_formula(2, 1, Formula::new("=Switches!D2").set_result("MX Black"))
        .unwrap();
    let bytes = book.save_to_buffer().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("inventory.xlsx");
    std::fs::write(&input, &bytes).unwrap();

    let mut doc = InventoryDocument::open(&input).unwrap();
    doc.require_tables(&["Switches", "Boards"]).unwrap();
    let outcome = reconcile(doc.workbook_mut(), &ReconcileOptions::default()).unwrap();
    assert_eq!(
        outcome
            .registry
            .newly_discovered()
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>(),
        vec!["Zilent"]
    );

    let output = output_path_for(&input);
    assert_eq!(output, dir.path().join("inventory_new.xlsx"));
    doc.save_to(&output).unwrap();

    // The input is left alone.
    assert_eq!(std::fs::read(&input).unwrap(), bytes);

    let reread = InventoryDocument::open(&output).unwrap();
    let catalog = reread.workbook().sheet("Switches").unwrap();
    assert_eq!(catalog.display_string(at("A3")), "Board Link");
    assert_eq!(catalog.display_string(at("B3")), "Zeal");
    let board = reread.workbook().sheet("Boards").unwrap();
    assert_eq!(board.display_string(at("B2")), "Zilent");
    assert!(board.cell(at("B3")).unwrap().is_formula());
}
