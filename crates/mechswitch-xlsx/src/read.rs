use std::collections::BTreeMap;

use mechswitch_model::{Cell, CellRef, CellStyle, CellValue, Workbook, Worksheet};

use crate::package::REL_TYPE_SHARED_STRINGS;
use crate::shared_strings::{parse_shared_strings_xml, text_of};
use crate::{XlsxError, XlsxPackage};

/// Parse a worksheet part into a [`Worksheet`] named `name`.
///
/// Only cell contents and `s` style indices are read. Rows or cells without an
/// `r` attribute continue from the previous one, as Excel does.
pub fn read_worksheet(
    name: &str,
    xml: &str,
    shared_strings: &[String],
) -> Result<Worksheet, XlsxError> {
    let doc = roxmltree::Document::parse(xml)?;
    let mut sheet = Worksheet::new(name);

    let Some(sheet_data) = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "sheetData")
    else {
        return Ok(sheet);
    };

    let mut next_row = 0u32;
    for row in sheet_data
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "row")
    {
        let row_idx = match row.attribute("r") {
            Some(r) => r
                .trim()
                .parse::<u32>()
                .ok()
                .and_then(|r| r.checked_sub(1))
                .ok_or_else(|| XlsxError::Invalid(format!("invalid row number {r:?}")))?,
            None => next_row,
        };
        next_row = row_idx + 1;

        let mut next_col = 0u32;
        for c in row
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "c")
        {
            let cell_ref = match c.attribute("r") {
                Some(a1) => CellRef::from_a1(a1)?,
                None => CellRef::new(row_idx, next_col),
            };
            next_col = cell_ref.col + 1;

            let cell = read_cell(c, shared_strings)?;
            sheet.insert_cell(cell_ref, cell);
        }
    }

    Ok(sheet)
}

fn read_cell(c: roxmltree::Node<'_, '_>, shared_strings: &[String]) -> Result<Cell, XlsxError> {
    let child = |local: &str| {
        c.children()
            .find(|n| n.is_element() && n.tag_name().name() == local)
    };
    let raw = child("v").and_then(|v| v.text());
    let formula = child("f");

    let value = match c.attribute("t").unwrap_or("n") {
        "s" => {
            let idx = raw
                .and_then(|v| v.trim().parse::<usize>().ok())
                .ok_or_else(|| XlsxError::Invalid("shared string cell without index".into()))?;
            let text = shared_strings.get(idx).ok_or_else(|| {
                XlsxError::Invalid(format!("shared string index {idx} out of range"))
            })?;
            CellValue::String(text.clone())
        }
        "inlineStr" => CellValue::String(child("is").map(text_of).unwrap_or_default()),
        "str" | "d" => CellValue::String(raw.unwrap_or("").to_string()),
        "b" => CellValue::Boolean(raw.map(str::trim) == Some("1")),
        "e" => CellValue::Error(raw.unwrap_or("").to_string()),
        _ => match raw.map(str::trim) {
            None | Some("") => CellValue::Empty,
            Some(v) => match v.parse::<f64>() {
                Ok(n) => CellValue::Number(n),
                // Some writers leave `t` off formulas with a text result.
                Err(_) if formula.is_some() => CellValue::String(v.to_string()),
                Err(_) => {
                    return Err(XlsxError::Invalid(format!(
                        "invalid numeric cell value {v:?}"
                    )))
                }
            },
        },
    };

    let style = match c.attribute("s") {
        Some(s) => CellStyle::Preserved(Some(
            s.trim()
                .parse::<u32>()
                .map_err(|_| XlsxError::Invalid(format!("invalid style index {s:?}")))?,
        )),
        None => CellStyle::Preserved(None),
    };

    let mut cell = match formula {
        // Shared-formula followers have an empty `<f>`; they are still formulas.
        Some(f) => Cell::formula(f.text().unwrap_or(""), value),
        None => Cell::new(value),
    };
    cell.style = style;
    Ok(cell)
}

/// Read every worksheet in workbook order.
///
/// Returns the model plus a map from sheet name to worksheet part name.
pub(crate) fn read_workbook(
    package: &XlsxPackage,
) -> Result<(Workbook, BTreeMap<String, String>), XlsxError> {
    let workbook_part = package.workbook_part()?;
    let shared_part = package.workbook_related_part(&workbook_part, REL_TYPE_SHARED_STRINGS)?;
    let shared_strings = match shared_part {
        Some(part) => match package.part(&part) {
            Some(bytes) => parse_shared_strings_xml(&String::from_utf8(bytes.to_vec())?)?,
            None => {
                log::warn!("shared strings part {part} is referenced but missing");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let mut workbook = Workbook::new();
    let mut sheet_parts = BTreeMap::new();
    for info in package.worksheet_parts()? {
        // Chartsheets and other non-worksheet targets carry no cell grid.
        let Some(bytes) = package.part(&info.worksheet_part) else {
            log::warn!(
                "sheet {:?} points at missing part {}",
                info.name,
                info.worksheet_part
            );
            continue;
        };
        let xml = String::from_utf8(bytes.to_vec())?;
        let sheet = read_worksheet(&info.name, &xml, &shared_strings)?;
        log::debug!(
            "read sheet {:?} from {} ({} cells)",
            info.name,
            info.worksheet_part,
            sheet.cells().count()
        );
        sheet_parts.insert(info.name, info.worksheet_part);
        workbook.push_sheet(sheet);
    }

    Ok((workbook, sheet_parts))
}
