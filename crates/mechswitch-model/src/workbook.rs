use crate::{ModelError, Worksheet};

/// An ordered collection of worksheets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sheet(&mut self, sheet: Worksheet) {
        self.sheets.push(sheet);
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    pub fn sheets_mut(&mut self) -> impl Iterator<Item = &mut Worksheet> {
        self.sheets.iter_mut()
    }

    /// Look up a sheet by name. Excel treats sheet names case-insensitively.
    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.position(name).map(|idx| &self.sheets[idx])
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.position(name).map(move |idx| &mut self.sheets[idx])
    }

    pub fn require_sheet(&self, name: &str) -> Result<&Worksheet, ModelError> {
        self.sheet(name)
            .ok_or_else(|| ModelError::TableNotFound(name.to_string()))
    }

    /// Borrow two distinct sheets mutably at the same time.
    pub fn sheet_pair_mut(
        &mut self,
        first: &str,
        second: &str,
    ) -> Result<(&mut Worksheet, &mut Worksheet), ModelError> {
        let a = self
            .position(first)
            .ok_or_else(|| ModelError::TableNotFound(first.to_string()))?;
        let b = self
            .position(second)
            .ok_or_else(|| ModelError::TableNotFound(second.to_string()))?;

        if a == b {
            return Err(ModelError::SameSheet(first.to_string()));
        }
        if a < b {
            let (head, tail) = self.sheets.split_at_mut(b);
            Ok((&mut head[a], &mut tail[0]))
        } else {
            let (head, tail) = self.sheets.split_at_mut(a);
            Ok((&mut tail[0], &mut head[b]))
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|sheet| sheet.name().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cell, CellRef};

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        wb.push_sheet(Worksheet::new("Switches"));
        wb.push_sheet(Worksheet::new("Notes"));
        wb.push_sheet(Worksheet::new("Boards"));
        wb
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let wb = workbook();
        assert_eq!(wb.sheet("boards").unwrap().name(), "Boards");
        assert_eq!(
            wb.require_sheet("Layouts"),
            Err(ModelError::TableNotFound("Layouts".to_string()))
        );
    }

    #[test]
    fn lookup_folds_ascii_case_only() {
        let mut wb = workbook();
        wb.push_sheet(Worksheet::new("Ärger"));
        assert_eq!(wb.sheet("SWITCHES").unwrap().name(), "Switches");
        assert!(wb.sheet("Ärger").is_some());
        assert!(wb.sheet("ärger").is_none());
    }

    #[test]
    fn pair_borrow_in_either_order() {
        let mut wb = workbook();
        {
            let (boards, switches) = wb.sheet_pair_mut("Boards", "Switches").unwrap();
            assert_eq!(boards.name(), "Boards");
            assert_eq!(switches.name(), "Switches");
            switches.insert_cell(CellRef::new(1, 3), Cell::new("SW1"));
            boards.insert_cell(CellRef::new(0, 0), Cell::formula("Switches!D2", "SW1"));
        }
        let (switches, boards) = wb.sheet_pair_mut("Switches", "Boards").unwrap();
        assert_eq!(switches.display_string(CellRef::new(1, 3)), "SW1");
        assert!(boards.cell(CellRef::new(0, 0)).unwrap().is_formula());
    }

    #[test]
    fn pair_borrow_rejects_missing_and_same_sheet() {
        let mut wb = workbook();
        assert_eq!(
            wb.sheet_pair_mut("Boards", "Layouts").unwrap_err(),
            ModelError::TableNotFound("Layouts".to_string())
        );
        assert_eq!(
            wb.sheet_pair_mut("Boards", "BOARDS").unwrap_err(),
            ModelError::SameSheet("Boards".to_string())
        );
    }
}
