use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Cell, CellAddress, CellRef, CellStyle, CellValue};

/// An internal document hyperlink anchored on a single cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperlink {
    pub anchor: CellRef,
    pub target: CellAddress,
}

/// Which aspects of a cell were changed since the sheet was loaded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CellEdits {
    pub value: bool,
    pub style: bool,
}

/// A sparse worksheet.
///
/// Cells are stored in a `BTreeMap` keyed by [`CellRef`], so iteration is in
/// reading order. Hyperlinks held here are the ones attached during this run;
/// links already present in the source file are left to the exporter to
/// preserve.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Worksheet {
    name: String,
    cells: BTreeMap<CellRef, Cell>,
    hyperlinks: BTreeMap<CellRef, Hyperlink>,
    edits: BTreeMap<CellRef, CellEdits>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a cell as loaded from the source. Not recorded as an edit.
    pub fn insert_cell(&mut self, cell_ref: CellRef, cell: Cell) {
        self.cells.insert(cell_ref, cell);
    }

    pub fn cell(&self, cell_ref: CellRef) -> Option<&Cell> {
        self.cells.get(&cell_ref)
    }

    /// The cell's value read as a string; absent cells read as `""`.
    pub fn display_string(&self, cell_ref: CellRef) -> String {
        self.cells
            .get(&cell_ref)
            .map(Cell::display_string)
            .unwrap_or_default()
    }

    /// All populated cells in reading order (rows top-to-bottom, then columns left-to-right).
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells.iter().map(|(cell_ref, cell)| (*cell_ref, cell))
    }

    pub fn formula_cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells().filter(|(_, cell)| cell.is_formula())
    }

    /// Index of the last row holding any cell.
    pub fn last_row(&self) -> Option<u32> {
        self.cells.keys().next_back().map(|cell_ref| cell_ref.row)
    }

    pub fn address(&self, cell_ref: CellRef) -> CellAddress {
        CellAddress::new(self.name.clone(), cell_ref)
    }

    /// Replace a cell's value with a literal, dropping any formula.
    pub fn set_value(&mut self, cell_ref: CellRef, value: impl Into<CellValue>) {
        let cell = self.cells.entry(cell_ref).or_default();
        cell.value = value.into();
        cell.formula = None;
        self.edits.entry(cell_ref).or_default().value = true;
    }

    pub fn set_style(&mut self, cell_ref: CellRef, style: CellStyle) {
        self.cells.entry(cell_ref).or_default().style = style;
        self.edits.entry(cell_ref).or_default().style = true;
    }

    /// Attach a hyperlink to `anchor`, replacing any link attached earlier.
    /// Returns the replaced link.
    pub fn set_hyperlink(&mut self, anchor: CellRef, target: CellAddress) -> Option<Hyperlink> {
        self.hyperlinks.insert(anchor, Hyperlink { anchor, target })
    }

    pub fn hyperlink(&self, anchor: CellRef) -> Option<&Hyperlink> {
        self.hyperlinks.get(&anchor)
    }

    pub fn hyperlinks(&self) -> impl Iterator<Item = &Hyperlink> {
        self.hyperlinks.values()
    }

    pub fn edits(&self) -> impl Iterator<Item = (CellRef, CellEdits)> + '_ {
        self.edits.iter().map(|(cell_ref, edits)| (*cell_ref, *edits))
    }

    /// True when the sheet needs to be rewritten on export.
    pub fn is_dirty(&self) -> bool {
        !self.edits.is_empty() || !self.hyperlinks.is_empty()
    }
}
