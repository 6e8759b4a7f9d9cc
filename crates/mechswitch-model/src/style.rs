use serde::{Deserialize, Serialize};

/// Presentational style of a cell.
///
/// Styles never influence reconciliation; they only decide which `cellXfs`
/// index a rewritten cell receives on export.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellStyle {
    /// Keep whatever `s` index the source workbook had (if any).
    Preserved(Option<u32>),
    /// One of the cross-reference link styles appended on export.
    Link(LinkStyle),
}

impl Default for CellStyle {
    fn default() -> Self {
        CellStyle::Preserved(None)
    }
}

/// The two link styles applied by the cross-linker.
///
/// Both use Arial 10pt with a single underline, centred horizontally and
/// vertically, with text wrapping. `Bordered` additionally draws a thin border
/// on all four sides.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LinkStyle {
    /// Board cells pointing at their catalog row.
    Bordered,
    /// Catalog back-links pointing at the board cell that promoted them.
    Plain,
}

impl LinkStyle {
    pub const FONT_NAME: &'static str = "Arial";
    pub const FONT_SIZE_PT: u32 = 10;

    pub fn has_border(self) -> bool {
        matches!(self, LinkStyle::Bordered)
    }
}
