/// Where things live in the inventory workbook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogLayout {
    pub catalog_sheet: String,
    pub board_sheet: String,
    /// Header rows skipped at the top of the catalog.
    pub header_rows: u32,
    /// Non-empty means the switch is owned. Also receives the back-link on promotion.
    pub owned_col: u32,
    /// The catalog ends at the first row where this column is empty.
    pub sentinel_col: u32,
    /// Switch name; board links point at this column.
    pub name_col: u32,
    /// Text written into the owned column when a switch is promoted.
    pub back_link_label: String,
}

impl Default for CatalogLayout {
    fn default() -> Self {
        Self {
            catalog_sheet: "Switches".to_string(),
            board_sheet: "Boards".to_string(),
            header_rows: 1,
            owned_col: 0,
            sentinel_col: 1,
            name_col: 3,
            back_link_label: "Board Link".to_string(),
        }
    }
}
