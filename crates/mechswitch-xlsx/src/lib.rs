//! XLSX/XLSM I/O for the switch inventory workbook.
//!
//! - [`XlsxPackage`]: the Open Packaging Convention ZIP inflated into memory
//!   (part name -> bytes). Parts we do not touch are written back unchanged.
//! - [`InventoryDocument`]: a package paired with the [`mechswitch_model::Workbook`]
//!   read from it. Edits made to the model (values, link styles, hyperlinks) are
//!   applied as targeted rewrites of the affected worksheet parts on export.
//! - [`output_path_for`]/[`write_atomic`]: the `<stem>_new.<ext>` export convention.
//! - [`minimal`]: a small two-sheet workbook writer used by tests and fixtures.

mod document;
mod export;
mod hyperlinks;
pub mod minimal;
mod package;
mod patch;
mod read;
mod shared_strings;
mod styles;

pub use document::{load_workbook, InventoryDocument};
pub use export::{output_path_for, write_atomic};
pub use hyperlinks::merge_worksheet_hyperlinks;
pub use package::{
    parse_relationships, Relationship, WorksheetPartInfo, XlsxError, XlsxPackage,
    MAX_XLSX_PACKAGE_PART_BYTES,
};
pub use patch::{patch_worksheet_cells, CellWrite};
pub use read::read_worksheet;
pub use shared_strings::parse_shared_strings_xml;
pub use styles::{append_link_styles, LinkStyleIds};
