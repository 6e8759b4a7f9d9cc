use mechswitch_model::{CellAddress, CellRef, CellStyle, LinkStyle, Worksheet};

use crate::{CatalogLayout, ReconcileError, Registry};

/// A board cell whose computed value names a switch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardReference {
    pub cell: CellRef,
    pub name: String,
}

/// Every reference cell on the board, in reading order.
///
/// A reference cell is a formula cell whose cached value reads as a non-empty
/// string. Literal cells and formulas that evaluate to `""` are not references.
pub fn reference_cells(board: &Worksheet) -> Vec<BoardReference> {
    board
        .formula_cells()
        .filter_map(|(cell, value)| {
            let name = value.display_string();
            (!name.is_empty()).then_some(BoardReference { cell, name })
        })
        .collect()
}

/// Discovery pass.
///
/// Every board reference to a switch that is still missing promotes it to owned.
/// The switch's catalog row gets the back-link label in the owned column, linked
/// to the board cell that triggered the promotion. References to owned switches
/// and to names the catalog does not define are left for [`link_to_switches`].
///
/// Returns the number of switches promoted.
pub fn link_to_board(
    registry: &mut Registry,
    board: &Worksheet,
    catalog: &mut Worksheet,
    layout: &CatalogLayout,
) -> usize {
    let mut promoted = 0;

    for reference in reference_cells(board) {
        if !registry.is_missing(&reference.name) {
            continue;
        }

        let origin = board.address(reference.cell);
        let Some(switch) = registry.promote(&reference.name, origin.clone()) else {
            continue;
        };
        let link_cell = CellRef::new(switch.catalog_row(), layout.owned_col);

        catalog.set_value(link_cell, layout.back_link_label.as_str());
        catalog.set_hyperlink(link_cell, origin.clone());
        catalog.set_style(link_cell, CellStyle::Link(LinkStyle::Plain));

        log::debug!("promoted {} via {origin}", reference.name);
        promoted += 1;
    }

    log::info!("discovery promoted {promoted} switches from '{}'", board.name());
    promoted
}

/// Annotation pass.
///
/// Links every board reference cell to the name cell of its catalog row,
/// overwriting any link attached earlier. Fails on the first reference whose
/// name is not in the registry; in that case no board cell is touched.
///
/// Returns the number of board cells linked.
pub fn link_to_switches(
    registry: &Registry,
    board: &mut Worksheet,
    catalog: &Worksheet,
    layout: &CatalogLayout,
) -> Result<usize, ReconcileError> {
    let targets = reference_cells(board)
        .into_iter()
        .map(|reference| {
            let switch = registry.get(&reference.name).ok_or_else(|| {
                ReconcileError::UnresolvedSwitch {
                    address: board.address(reference.cell),
                    name: reference.name.clone(),
                }
            })?;
            let target = catalog.address(CellRef::new(switch.catalog_row(), layout.name_col));
            Ok((reference.cell, target))
        })
        .collect::<Result<Vec<(CellRef, CellAddress)>, ReconcileError>>()?;

    for (cell, target) in &targets {
        log::debug!("linking {} -> {target}", board.address(*cell));
        board.set_hyperlink(*cell, target.clone());
        board.set_style(*cell, CellStyle::Link(LinkStyle::Bordered));
    }

    log::info!("annotated {} board cells on '{}'", targets.len(), board.name());
    Ok(targets.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{collect, Classification, Switch};
    use mechswitch_model::{Cell, CellValue};
    use pretty_assertions::assert_eq;

    fn catalog() -> Worksheet {
        let mut ws = Worksheet::new("Switches");
        ws.insert_cell(CellRef::new(0, 3), Cell::new("Name"));
        for (row, owned, name) in [(1, "x", "SW1"), (2, "", "SW2"), (3, "", "SW3")] {
            if !owned.is_empty() {
                ws.insert_cell(CellRef::new(row, 0), Cell::new(owned));
            }
            ws.insert_cell(CellRef::new(row, 1), Cell::new("Brand"));
            ws.insert_cell(CellRef::new(row, 3), Cell::new(name));
        }
        ws
    }

    fn board(refs: &[(&str, &str)]) -> Worksheet {
        let mut ws = Worksheet::new("Boards");
        ws.insert_cell(CellRef::new(0, 0), Cell::new("Board"));
        for (a1, name) in refs {
            let cell = CellRef::from_a1(a1).unwrap();
            ws.insert_cell(cell, Cell::formula(format!("Switches!D1&\"{name}\""), *name));
        }
        ws
    }

    #[test]
    fn reference_cells_skip_literals_and_blank_results() {
        let mut ws = board(&[("C2", "SW2"), ("B2", "SW1")]);
        ws.insert_cell(CellRef::new(3, 0), Cell::new("SW3"));
        ws.insert_cell(CellRef::new(4, 0), Cell::formula("IF(A1,\"\",\"\")", ""));
        ws.insert_cell(CellRef::new(5, 0), Cell::formula("NA()", CellValue::Error("#N/A".into())));

        let refs = reference_cells(&ws);
        let got: Vec<(String, &str)> = refs
            .iter()
            .map(|r| (r.cell.to_a1(), r.name.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("B2".to_string(), "SW1"),
                ("C2".to_string(), "SW2"),
                ("A6".to_string(), "#N/A"),
            ]
        );
    }

    #[test]
    fn discovery_writes_back_link_once_per_switch() {
        let mut catalog = catalog();
        let mut registry = collect(&catalog).unwrap();
        let board = board(&[("B2", "SW2"), ("B5", "SW2"), ("C3", "SW1")]);
        let layout = CatalogLayout::default();

        let promoted = link_to_board(&mut registry, &board, &mut catalog, &layout);

        assert_eq!(promoted, 1);
        assert_eq!(registry.classification("SW2"), Some(Classification::Owned));
        assert_eq!(registry.classification("SW3"), Some(Classification::Missing));
        assert_eq!(
            registry.newly_discovered(),
            &[Switch::new("SW2", 2)]
        );

        let a3 = CellRef::new(2, 0);
        assert_eq!(catalog.display_string(a3), "Board Link");
        assert_eq!(catalog.hyperlink(a3).unwrap().target.to_string(), "'Boards'!B2");
        assert_eq!(catalog.cell(a3).unwrap().style, CellStyle::Link(LinkStyle::Plain));
        assert_eq!(catalog.hyperlinks().count(), 1);
    }

    #[test]
    fn discovery_defers_unknown_names() {
        let mut catalog = catalog();
        let mut registry = collect(&catalog).unwrap();
        let board = board(&[("B2", "SW9"), ("B3", "SW3")]);

        let promoted = link_to_board(&mut registry, &board, &mut catalog, &CatalogLayout::default());
        assert_eq!(promoted, 1);
        assert!(registry.is_owned("SW3"));
    }

    #[test]
    fn annotation_links_board_cells_to_name_column() {
        let mut catalog = catalog();
        let mut registry = collect(&catalog).unwrap();
        let mut board = board(&[("B2", "SW2"), ("D4", "SW1")]);
        let layout = CatalogLayout::default();

        link_to_board(&mut registry, &board, &mut catalog, &layout);
        let linked = link_to_switches(&registry, &mut board, &catalog, &layout).unwrap();

        assert_eq!(linked, 2);
        let targets: Vec<(String, String)> = board
            .hyperlinks()
            .map(|l| (l.anchor.to_a1(), l.target.to_string()))
            .collect();
        assert_eq!(
            targets,
            vec![
                ("B2".to_string(), "'Switches'!D3".to_string()),
                ("D4".to_string(), "'Switches'!D2".to_string()),
            ]
        );
        let b2 = board.cell(CellRef::new(1, 1)).unwrap();
        assert_eq!(b2.style, CellStyle::Link(LinkStyle::Bordered));
        assert_eq!(b2.formula.as_deref(), Some("Switches!D1&\"SW2\""));
    }

    #[test]
    fn annotation_fails_on_undefined_switch_without_touching_board() {
        let catalog = catalog();
        let registry = collect(&catalog).unwrap();
        let mut board = board(&[("B2", "SW1"), ("E7", "SW9")]);

        let err = link_to_switches(&registry, &mut board, &catalog, &CatalogLayout::default())
            .unwrap_err();

        assert_eq!(
            err,
            ReconcileError::UnresolvedSwitch {
                name: "SW9".to_string(),
                address: CellAddress::new("Boards", CellRef::new(6, 4)),
            }
        );
        assert_eq!(err.to_string(), "unknown switch on board: SW9 (referenced from 'Boards'!E7)");
        assert!(!board.is_dirty());
    }

    #[test]
    fn annotation_still_links_unpromoted_missing_switches() {
        // Annotation resolves across owned and missing; a missing switch can only
        // be referenced here if discovery was skipped.
        let catalog = catalog();
        let registry = collect(&catalog).unwrap();
        let mut board = board(&[("B2", "SW3")]);

        link_to_switches(&registry, &mut board, &catalog, &CatalogLayout::default()).unwrap();
        assert_eq!(
            board.hyperlink(CellRef::new(1, 1)).unwrap().target.to_string(),
            "'Switches'!D4"
        );
    }
}
