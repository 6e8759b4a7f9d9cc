use serde::{Deserialize, Serialize};

use crate::CellStyle;

/// Scalar cell value as stored in the worksheet (for formula cells, the cached result).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    String(String),
    Number(f64),
    Boolean(bool),
    /// Excel error literal such as `#N/A` or `#REF!`.
    Error(String),
}

impl CellValue {
    /// The value read as a string, the way a spreadsheet would display it without
    /// number formatting: integral numbers drop the trailing `.0`, booleans are
    /// `TRUE`/`FALSE`, and empty cells read as `""`.
    pub fn to_display_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Boolean(true) => "TRUE".to_string(),
            CellValue::Boolean(false) => "FALSE".to_string(),
            CellValue::Error(e) => e.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Whether a cell holds a literal value or a computed one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Static,
    Formula,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    /// Formula text without the leading `=`. Shared-formula followers carry an
    /// empty string: they are still computed cells.
    pub formula: Option<String>,
    pub style: CellStyle,
}

impl Cell {
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// A computed cell with its cached result.
    pub fn formula(formula: impl Into<String>, cached: impl Into<CellValue>) -> Self {
        Self {
            value: cached.into(),
            formula: Some(formula.into()),
            style: CellStyle::default(),
        }
    }

    pub fn with_style(mut self, style: CellStyle) -> Self {
        self.style = style;
        self
    }

    pub fn kind(&self) -> CellKind {
        if self.formula.is_some() {
            CellKind::Formula
        } else {
            CellKind::Static
        }
    }

    pub fn is_formula(&self) -> bool {
        self.kind() == CellKind::Formula
    }

    pub fn display_string(&self) -> String {
        self.value.to_display_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings() {
        assert_eq!(CellValue::Empty.to_display_string(), "");
        assert_eq!(CellValue::from("SW1").to_display_string(), "SW1");
        assert_eq!(CellValue::Number(42.0).to_display_string(), "42");
        assert_eq!(CellValue::Number(-3.5).to_display_string(), "-3.5");
        assert_eq!(CellValue::Boolean(true).to_display_string(), "TRUE");
        assert_eq!(CellValue::Error("#N/A".into()).to_display_string(), "#N/A");
    }

    #[test]
    fn kind_follows_formula_presence() {
        assert_eq!(Cell::new("x").kind(), CellKind::Static);
        assert_eq!(Cell::formula("Switches!D2", "SW1").kind(), CellKind::Formula);
        assert!(Cell::formula("", CellValue::Empty).is_formula());
    }

    #[test]
    fn values_serialize_tagged() {
        let json = serde_json::to_string(&CellValue::from("SW1")).unwrap();
        assert_eq!(json, r#"{"type":"string","value":"SW1"}"#);
    }
}
