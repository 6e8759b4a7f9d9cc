use core::fmt;

use serde::Serialize;

/// A catalog item and the catalog row that defines it.
///
/// Identity is the name; `catalog_row` is only used for addressing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Switch {
    name: String,
    catalog_row: u32,
}

impl Switch {
    pub fn new(name: impl Into<String>, catalog_row: u32) -> Self {
        Self {
            name: name.into(),
            catalog_row,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zero-based row index in the catalog table.
    pub fn catalog_row(&self) -> u32 {
        self.catalog_row
    }
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
