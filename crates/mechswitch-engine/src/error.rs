use mechswitch_model::{CellAddress, ModelError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// A catalog row before the end-of-table sentinel has no switch name.
    #[error("malformed catalog row {} in '{sheet}': switch name column is empty", .row + 1)]
    MalformedRow { sheet: String, row: u32 },
    /// A board reference names a switch the catalog does not define.
    #[error("unknown switch on board: {name} (referenced from {address})")]
    UnresolvedSwitch { name: String, address: CellAddress },
    #[error(
        "duplicate switch '{name}' in catalog rows {} and {}",
        .first_row + 1,
        .second_row + 1
    )]
    DuplicateSwitch {
        name: String,
        first_row: u32,
        second_row: u32,
    },
    #[error(transparent)]
    Model(#[from] ModelError),
}
