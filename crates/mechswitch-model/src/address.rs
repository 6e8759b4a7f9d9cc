use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Excel-compatible maximum rows per worksheet (1,048,576).
pub const EXCEL_MAX_ROWS: u32 = 1_048_576;

/// Excel-compatible maximum columns per worksheet (16,384).
pub const EXCEL_MAX_COLS: u32 = 16_384;

/// A single cell position within a worksheet.
///
/// Rows and columns are **0-indexed** (`row = 0, col = 0` is `A1`). The derived
/// ordering compares `row` first, so sorted collections of `CellRef` iterate in
/// reading order: top-to-bottom, then left-to-right.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Render in A1 notation (`D7`, `AB12`).
    pub fn to_a1(self) -> String {
        let mut out = column_label(self.col);
        out.push_str(&(self.row + 1).to_string());
        out
    }

    /// Parse an A1 reference. `$` absolute markers are accepted and ignored.
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        let unanchored: String = s.chars().filter(|c| *c != '$').collect();
        let split = unanchored
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(unanchored.len());
        let (letters, digits) = unanchored.split_at(split);

        if letters.is_empty() {
            return Err(A1ParseError::MissingColumn);
        }
        if digits.is_empty() {
            return Err(A1ParseError::MissingRow);
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(A1ParseError::TrailingCharacters);
        }

        let col = column_index(letters)?;
        let row: u32 = digits.parse().map_err(|_| A1ParseError::InvalidRow)?;
        if row == 0 || row > EXCEL_MAX_ROWS {
            return Err(A1ParseError::InvalidRow);
        }

        Ok(Self::new(row - 1, col))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum A1ParseError {
    #[error("empty A1 reference")]
    Empty,
    #[error("missing column in A1 reference")]
    MissingColumn,
    #[error("missing row in A1 reference")]
    MissingRow,
    #[error("invalid column in A1 reference")]
    InvalidColumn,
    #[error("invalid row in A1 reference")]
    InvalidRow,
    #[error("trailing characters in A1 reference")]
    TrailingCharacters,
}

/// A cell qualified by the sheet it lives on, e.g. `'Boards'!B7`.
///
/// This is the textual form used as an internal hyperlink `location`. The sheet
/// name is always quoted; embedded single quotes are doubled.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellAddress {
    pub sheet: String,
    pub cell: CellRef,
}

impl CellAddress {
    pub fn new(sheet: impl Into<String>, cell: CellRef) -> Self {
        Self {
            sheet: sheet.into(),
            cell,
        }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'!{}", self.sheet.replace('\'', "''"), self.cell)
    }
}

fn column_label(col: u32) -> String {
    // Bijective base-26: A..Z, AA..AZ, ...
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(char::from(b'A' + rem));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn column_index(letters: &str) -> Result<u32, A1ParseError> {
    let mut col: u32 = 0;
    for b in letters.bytes() {
        let digit = u32::from(b.to_ascii_uppercase() - b'A') + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(digit))
            .ok_or(A1ParseError::InvalidColumn)?;
    }
    if col == 0 || col > EXCEL_MAX_COLS {
        return Err(A1ParseError::InvalidColumn);
    }
    Ok(col - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_and_parses_a1() {
        assert_eq!(CellRef::new(0, 0).to_a1(), "A1");
        assert_eq!(CellRef::new(6, 1).to_a1(), "B7");
        assert_eq!(CellRef::new(11, 27).to_a1(), "AB12");

        assert_eq!(CellRef::from_a1("D3").unwrap(), CellRef::new(2, 3));
        assert_eq!(CellRef::from_a1("$ab$12").unwrap(), CellRef::new(11, 27));
    }

    #[test]
    fn rejects_malformed_a1() {
        assert_eq!(CellRef::from_a1(""), Err(A1ParseError::Empty));
        assert_eq!(CellRef::from_a1("12"), Err(A1ParseError::MissingColumn));
        assert_eq!(CellRef::from_a1("B"), Err(A1ParseError::MissingRow));
        assert_eq!(CellRef::from_a1("B0"), Err(A1ParseError::InvalidRow));
        assert_eq!(CellRef::from_a1("B7x"), Err(A1ParseError::TrailingCharacters));
        assert_eq!(CellRef::from_a1("XFE1"), Err(A1ParseError::InvalidColumn));
        assert!(CellRef::from_a1("XFD1048576").is_ok());
    }

    #[test]
    fn ordering_is_row_major() {
        let mut cells = vec![
            CellRef::new(1, 0),
            CellRef::new(0, 5),
            CellRef::new(0, 1),
            CellRef::new(1, 2),
        ];
        cells.sort();
        assert_eq!(
            cells,
            vec![
                CellRef::new(0, 1),
                CellRef::new(0, 5),
                CellRef::new(1, 0),
                CellRef::new(1, 2),
            ]
        );
    }

    #[test]
    fn qualified_address_quotes_sheet() {
        let addr = CellAddress::new("Boards", CellRef::new(6, 1));
        assert_eq!(addr.to_string(), "'Boards'!B7");

        let addr = CellAddress::new("Tim's Boards", CellRef::new(0, 0));
        assert_eq!(addr.to_string(), "'Tim''s Boards'!A1");
    }
}
