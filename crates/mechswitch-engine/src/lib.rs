//! Classification and cross-link engine.
//!
//! The pipeline is strictly sequential:
//!
//! 1. [`collect`] classifies every catalog row as owned or missing into a [`Registry`].
//! 2. [`link_to_board`] (discovery) promotes missing switches that the board references,
//!    writing a back-link on the catalog row.
//! 3. [`link_to_switches`] (annotation) links every board reference cell to its catalog row.
//!
//! Discovery must finish before annotation starts; [`reconcile`] runs all three steps
//! against a [`mechswitch_model::Workbook`].

mod error;
mod layout;
mod linker;
mod reconcile;
mod registry;
pub mod report;
mod switch;

pub use error::ReconcileError;
pub use layout::CatalogLayout;
pub use linker::{link_to_board, link_to_switches, reference_cells, BoardReference};
pub use reconcile::{reconcile, Reconciliation, ReconcileOptions};
pub use registry::{
    collect, collect_with, Classification, DuplicatePolicy, DuplicateSwitch, Registry,
};
pub use report::Report;
pub use switch::Switch;
