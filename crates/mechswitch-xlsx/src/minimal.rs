//! Tiny workbook writer for fixtures.
//!
//! Produces a complete package (content types, relationships, workbook, styles,
//! shared strings, one part per sheet) containing only the cells asked for.
//! Text cells go through the shared strings table; formula cells carry a
//! cached string result so readers see what Excel would have computed.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use mechswitch_model::CellRef;
use quick_xml::escape::escape;
use thiserror::Error;
use zip::write::FileOptions;

#[derive(Debug, Error)]
pub enum MinimalXlsxError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub enum FixtureValue {
    Text(String),
    Number(f64),
    Formula { formula: String, cached: String },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FixtureSheet {
    pub name: String,
    pub cells: Vec<(CellRef, FixtureValue)>,
    /// Pre-existing internal hyperlinks as `(anchor, location)`.
    pub hyperlinks: Vec<(CellRef, String)>,
}

impl FixtureSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn text(mut self, at: CellRef, text: impl Into<String>) -> Self {
        self.cells.push((at, FixtureValue::Text(text.into())));
        self
    }

    pub fn number(mut self, at: CellRef, value: f64) -> Self {
        self.cells.push((at, FixtureValue::Number(value)));
        self
    }

    pub fn formula(
        mut self,
        at: CellRef,
        formula: impl Into<String>,
        cached: impl Into<String>,
    ) -> Self {
        self.cells.push((
            at,
            FixtureValue::Formula {
                formula: formula.into(),
                cached: cached.into(),
            },
        ));
        self
    }

    pub fn hyperlink(mut self, anchor: CellRef, location: impl Into<String>) -> Self {
        self.hyperlinks.push((anchor, location.into()));
        self
    }
}

pub fn write_minimal_xlsx(sheets: &[FixtureSheet]) -> Result<Vec<u8>, MinimalXlsxError> {
    let mut shared = SharedStrings::default();
    let worksheets: Vec<String> = sheets
        .iter()
        .map(|sheet| worksheet_xml(sheet, &mut shared))
        .collect();

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options =
            FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(content_types_xml(sheets.len()).as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(ROOT_RELS_XML.as_bytes())?;

        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(workbook_xml(sheets).as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(workbook_rels_xml(sheets.len()).as_bytes())?;

        zip.start_file("xl/styles.xml", options)?;
        zip.write_all(STYLES_XML.as_bytes())?;

        zip.start_file("xl/sharedStrings.xml", options)?;
        zip.write_all(shared.to_xml().as_bytes())?;

        for (idx, xml) in worksheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", idx + 1), options)?;
            zip.write_all(xml.as_bytes())?;
        }

        zip.finish()?;
    }
    Ok(buffer.into_inner())
}

#[derive(Default)]
struct SharedStrings {
    items: Vec<String>,
    index: BTreeMap<String, usize>,
}

impl SharedStrings {
    fn intern(&mut self, text: &str) -> usize {
        if let Some(idx) = self.index.get(text) {
            return *idx;
        }
        let idx = self.items.len();
        self.items.push(text.to_string());
        self.index.insert(text.to_string(), idx);
        idx
    }

    fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push('\n');
        out.push_str(&format!(
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
            self.items.len()
        ));
        for item in &self.items {
            out.push_str(&format!("<si><t>{}</t></si>", escape(item.as_str())));
        }
        out.push_str("</sst>\n");
        out
    }
}

fn worksheet_xml(sheet: &FixtureSheet, shared: &mut SharedStrings) -> String {
    let mut rows: BTreeMap<u32, BTreeMap<u32, &FixtureValue>> = BTreeMap::new();
    for (at, value) in &sheet.cells {
        rows.entry(at.row).or_default().insert(at.col, value);
    }

    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
    out.push('\n');
    out.push_str("  <sheetData>\n");
    for (row, cells) in &rows {
        out.push_str(&format!(r#"    <row r="{}">"#, row + 1));
        for (col, value) in cells {
            let a1 = CellRef::new(*row, *col).to_a1();
            match value {
                FixtureValue::Text(text) => {
                    let idx = shared.intern(text);
                    out.push_str(&format!(r#"<c r="{a1}" t="s"><v>{idx}</v></c>"#));
                }
                FixtureValue::Number(n) => {
                    out.push_str(&format!(r#"<c r="{a1}"><v>{n}</v></c>"#));
                }
                FixtureValue::Formula { formula, cached } => {
                    out.push_str(&format!(
                        r#"<c r="{a1}" t="str"><f>{}</f><v>{}</v></c>"#,
                        escape(formula.as_str()),
                        escape(cached.as_str())
                    ));
                }
            }
        }
        out.push_str("</row>\n");
    }
    out.push_str("  </sheetData>\n");

    if !sheet.hyperlinks.is_empty() {
        out.push_str("  <hyperlinks>");
        for (anchor, location) in &sheet.hyperlinks {
            out.push_str(&format!(
                r#"<hyperlink ref="{}" location="{}"/>"#,
                anchor.to_a1(),
                escape(location.as_str())
            ));
        }
        out.push_str("</hyperlinks>\n");
    }

    out.push_str(r#"  <pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#);
    out.push('\n');
    out.push_str("</worksheet>\n");
    out
}

fn content_types_xml(sheet_count: usize) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
  <Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
"#,
    );
    for idx in 1..=sheet_count {
        out.push_str(&format!(
            "  <Override PartName=\"/xl/worksheets/sheet{idx}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\n"
        ));
    }
    out.push_str("</Types>\n");
    out
}

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>
"#;

fn workbook_xml(sheets: &[FixtureSheet]) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
          xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
"#,
    );
    for (idx, sheet) in sheets.iter().enumerate() {
        out.push_str(&format!(
            "    <sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>\n",
            escape(sheet.name.as_str()),
            idx + 1,
            idx + 1
        ));
    }
    out.push_str("  </sheets>\n</workbook>\n");
    out
}

/// Sheets take `rId1..=rIdN`; styles and shared strings follow.
fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
"#,
    );
    for idx in 1..=sheet_count {
        out.push_str(&format!(
            "  <Relationship Id=\"rId{idx}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{idx}.xml\"/>\n"
        ));
    }
    out.push_str(&format!(
        "  <Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>\n",
        sheet_count + 1
    ));
    out.push_str(&format!(
        "  <Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings\" Target=\"sharedStrings.xml\"/>\n",
        sheet_count + 2
    ));
    out.push_str("</Relationships>\n");
    out
}

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
  <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
  <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>
"#;
