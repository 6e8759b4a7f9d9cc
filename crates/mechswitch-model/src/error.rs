use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("workbook has no sheet named '{0}'")]
    TableNotFound(String),
    #[error("sheet '{0}' requested twice; expected two distinct sheets")]
    SameSheet(String),
}
