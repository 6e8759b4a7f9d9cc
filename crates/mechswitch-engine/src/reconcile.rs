use mechswitch_model::Workbook;

use crate::{
    collect_with, link_to_board, link_to_switches, CatalogLayout, DuplicatePolicy,
    ReconcileError, Registry,
};

#[derive(Clone, Debug, Default)]
pub struct ReconcileOptions {
    pub layout: CatalogLayout,
    pub duplicates: DuplicatePolicy,
}

/// Outcome of a full run.
#[derive(Clone, Debug)]
pub struct Reconciliation {
    pub registry: Registry,
    /// Catalog rows that received a back-link during discovery.
    pub back_links: usize,
    /// Board cells linked to their catalog row during annotation.
    pub board_links: usize,
}

/// Collect, discover and annotate in that order, mutating `workbook` in place.
///
/// Both tables are resolved before any row is read. On error the workbook may
/// hold partial edits and must not be exported.
pub fn reconcile(
    workbook: &mut Workbook,
    options: &ReconcileOptions,
) -> Result<Reconciliation, ReconcileError> {
    let layout = &options.layout;
    workbook.require_sheet(&layout.catalog_sheet)?;
    workbook.require_sheet(&layout.board_sheet)?;

    let (catalog, board) = workbook.sheet_pair_mut(&layout.catalog_sheet, &layout.board_sheet)?;

    let mut registry = collect_with(catalog, layout, options.duplicates)?;
    let back_links = link_to_board(&mut registry, board, catalog, layout);
    let board_links = link_to_switches(&registry, board, catalog, layout)?;

    Ok(Reconciliation {
        registry,
        back_links,
        board_links,
    })
}
