//! `mechswitch-model` defines the in-memory worksheet structures shared by the
//! reconciliation engine and the `.xlsx` import/export layer.
//!
//! The model is deliberately small: sparse cells keyed by [`CellRef`], the
//! hyperlinks and presentational styles attached during a run, and enough
//! bookkeeping ([`Worksheet::edits`]) for the exporter to rewrite only the
//! cells that actually changed.

mod address;
mod cell;
mod error;
mod style;
mod workbook;
mod worksheet;

pub use address::{A1ParseError, CellAddress, CellRef};
pub use cell::{Cell, CellKind, CellValue};
pub use error::ModelError;
pub use style::{CellStyle, LinkStyle};
pub use workbook::Workbook;
pub use worksheet::{CellEdits, Hyperlink, Worksheet};
