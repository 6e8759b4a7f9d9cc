use std::collections::BTreeMap;
use std::path::Path;

use mechswitch_model::{CellRef, CellStyle, ModelError, Workbook, Worksheet};

use crate::export::write_atomic;
use crate::patch::{patch_worksheet_cells, CellWrite};
use crate::read::read_workbook;
use crate::styles::{append_link_styles_to_package, LinkStyleIds};
use crate::{merge_worksheet_hyperlinks, XlsxError, XlsxPackage};

/// A workbook package together with the cell model read from it.
///
/// The model is edited in place (see [`InventoryDocument::workbook_mut`]); on
/// export only the worksheets with edits are rewritten, and only in the cells
/// and `<hyperlinks>` block that changed. Everything else in the package is
/// written back as it was read.
#[derive(Debug, Clone)]
pub struct InventoryDocument {
    package: XlsxPackage,
    workbook: Workbook,
    /// Sheet name -> worksheet part name.
    sheet_parts: BTreeMap<String, String>,
}

impl InventoryDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, XlsxError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let doc = Self::from_bytes(&bytes)?;
        log::info!(
            "opened {} ({} sheets)",
            path.display(),
            doc.workbook.sheets().len()
        );
        Ok(doc)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XlsxError> {
        let package = XlsxPackage::from_bytes(bytes)?;
        let (workbook, sheet_parts) = read_workbook(&package)?;
        Ok(Self {
            package,
            workbook,
            sheet_parts,
        })
    }

    pub fn package(&self) -> &XlsxPackage {
        &self.package
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn workbook_mut(&mut self) -> &mut Workbook {
        &mut self.workbook
    }

    /// Fail with [`ModelError::TableNotFound`] for the first name with no sheet.
    pub fn require_tables(&self, names: &[&str]) -> Result<(), XlsxError> {
        for name in names {
            self.workbook.require_sheet(name)?;
        }
        Ok(())
    }

    /// Serialize the package with all model edits applied.
    pub fn to_bytes(&self) -> Result<Vec<u8>, XlsxError> {
        let dirty: Vec<&Worksheet> = self
            .workbook
            .sheets()
            .iter()
            .filter(|sheet| sheet.is_dirty())
            .collect();
        if dirty.is_empty() {
            return self.package.write_to_bytes();
        }

        let mut package = self.package.clone();
        let needs_link_styles = dirty.iter().any(|sheet| {
            sheet.edits().any(|(cell_ref, edits)| {
                edits.style
                    && matches!(
                        sheet.cell(cell_ref).map(|c| c.style),
                        Some(CellStyle::Link(_))
                    )
            })
        });
        let link_styles = if needs_link_styles {
            Some(append_link_styles_to_package(&mut package)?)
        } else {
            None
        };

        for sheet in dirty {
            let part = self
                .sheet_parts
                .get(sheet.name())
                .ok_or_else(|| ModelError::TableNotFound(sheet.name().to_string()))?;
            let xml = package
                .part(part)
                .ok_or_else(|| XlsxError::MissingPart(part.clone()))?;
            let xml = String::from_utf8(xml.to_vec())?;

            let writes = cell_writes(sheet, link_styles)?;
            let patched = patch_worksheet_cells(&xml, &writes)?;
            let links: Vec<_> = sheet.hyperlinks().cloned().collect();
            let patched = merge_worksheet_hyperlinks(&patched, &links)?;

            log::debug!(
                "rewrote {part}: {} cells, {} hyperlinks",
                writes.len(),
                links.len()
            );
            package.set_part(part.clone(), patched.into_bytes());
        }

        package.write_to_bytes()
    }

    /// Write the edited package to `path`, atomically.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), XlsxError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        write_atomic(path, &bytes)?;
        log::info!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

fn cell_writes(
    sheet: &Worksheet,
    link_styles: Option<LinkStyleIds>,
) -> Result<BTreeMap<CellRef, CellWrite>, XlsxError> {
    let mut writes = BTreeMap::new();
    for (cell_ref, edits) in sheet.edits() {
        let Some(cell) = sheet.cell(cell_ref) else {
            continue;
        };
        let style = if edits.style {
            match cell.style {
                CellStyle::Link(style) => {
                    let ids = link_styles.ok_or_else(|| {
                        XlsxError::Invalid("link styles were not registered".to_string())
                    })?;
                    Some(ids.index_of(style))
                }
                CellStyle::Preserved(index) => index,
            }
        } else {
            None
        };
        let write = CellWrite {
            value: edits.value.then(|| cell.value.clone()),
            style,
        };
        if write != CellWrite::default() {
            writes.insert(cell_ref, write);
        }
    }
    Ok(writes)
}

/// Read the cell model of the workbook at `path`.
pub fn load_workbook(path: impl AsRef<Path>) -> Result<Workbook, XlsxError> {
    Ok(InventoryDocument::open(path)?.workbook)
}
