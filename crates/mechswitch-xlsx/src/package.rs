use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Write};

use mechswitch_model::{A1ParseError, ModelError};
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use thiserror::Error;

pub(crate) const REL_TYPE_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub(crate) const REL_TYPE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub(crate) const REL_TYPE_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
pub(crate) const NS_OFFICE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Maximum allowed *inflated* bytes for a single ZIP entry.
///
/// The whole package is materialized in memory so untouched parts can be
/// written back verbatim; this guards against ZIP bombs.
pub const MAX_XLSX_PACKAGE_PART_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

#[derive(Debug, Error)]
pub enum XlsxError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml error: {0}")]
    RoXml(#[from] roxmltree::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("missing required attribute: {0}")]
    MissingAttr(&'static str),
    #[error("missing xlsx part: {0}")]
    MissingPart(String),
    #[error("invalid xlsx: {0}")]
    Invalid(String),
    #[error("invalid cell reference: {0}")]
    InvalidA1(#[from] A1ParseError),
    #[error(
        "xlsx package part is too large to load safely: {part} is {size} bytes (max {max} bytes)"
    )]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_uri: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl Relationship {
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("External"))
    }
}

/// A `<sheet>` entry of the workbook part with its worksheet resolved to a part name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetPartInfo {
    pub name: String,
    pub rel_id: String,
    pub worksheet_part: String,
}

/// In-memory OPC package: part name -> raw bytes.
#[derive(Debug, Clone, Default)]
pub struct XlsxPackage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl XlsxPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XlsxError> {
        Self::from_bytes_limited(bytes, MAX_XLSX_PACKAGE_PART_BYTES)
    }

    pub fn from_bytes_limited(bytes: &[u8], max_part_bytes: u64) -> Result<Self, XlsxError> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))?;

        let mut parts = BTreeMap::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if !file.is_file() {
                continue;
            }

            let name = file.name().to_string();
            if file.size() > max_part_bytes {
                return Err(XlsxError::PartTooLarge {
                    part: name,
                    size: file.size(),
                    max: max_part_bytes,
                });
            }

            // The declared size can lie; cap the actual read as well.
            let mut buf = Vec::with_capacity(file.size() as usize);
            (&mut file)
                .take(max_part_bytes.saturating_add(1))
                .read_to_end(&mut buf)?;
            if buf.len() as u64 > max_part_bytes {
                return Err(XlsxError::PartTooLarge {
                    part: name,
                    size: buf.len() as u64,
                    max: max_part_bytes,
                });
            }
            parts.insert(name, buf);
        }

        Ok(Self { parts })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        let name = name.strip_prefix('/').unwrap_or(name);
        if let Some(bytes) = self.parts.get(name) {
            return Some(bytes.as_slice());
        }

        // Producers are not always consistent about case or separators between
        // relationship targets and ZIP entry names.
        self.parts
            .iter()
            .find(|(key, _)| part_names_equivalent(key, name))
            .map(|(_, bytes)| bytes.as_slice())
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Replace a part, reusing the stored entry name when an equivalent one exists.
    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        let name = name.strip_prefix('/').map(str::to_string).unwrap_or(name);
        let key = self
            .parts
            .keys()
            .find(|key| part_names_equivalent(key, &name))
            .cloned()
            .unwrap_or(name);
        self.parts.insert(key, bytes);
    }

    pub fn write_to_bytes(&self) -> Result<Vec<u8>, XlsxError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), XlsxError> {
        let cursor = Cursor::new(Vec::new());
        let mut zip = zip::ZipWriter::new(cursor);
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (name, bytes) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }

        let cursor = zip.finish()?;
        w.write_all(&cursor.into_inner())?;
        Ok(())
    }

    /// The main workbook part, as named by the root `officeDocument` relationship.
    pub fn workbook_part(&self) -> Result<String, XlsxError> {
        if let Some(rels) = self.part("_rels/.rels") {
            let found = parse_relationships(rels)?
                .into_iter()
                .find(|rel| rel.type_uri == REL_TYPE_OFFICE_DOCUMENT && !rel.is_external());
            if let Some(rel) = found {
                let part = resolve_target("", &rel.target);
                if self.part(&part).is_some() {
                    return Ok(part);
                }
            }
        }

        let fallback = "xl/workbook.xml";
        if self.part(fallback).is_some() {
            Ok(fallback.to_string())
        } else {
            Err(XlsxError::MissingPart(fallback.to_string()))
        }
    }

    /// Relationships declared by `part`, or an empty list when it has no `.rels` part.
    pub fn relationships_of(&self, part: &str) -> Result<Vec<Relationship>, XlsxError> {
        match self.part(&rels_for_part(part)) {
            Some(bytes) => parse_relationships(bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Target part of the first workbook relationship of `type_uri`.
    pub(crate) fn workbook_related_part(
        &self,
        workbook_part: &str,
        type_uri: &str,
    ) -> Result<Option<String>, XlsxError> {
        Ok(self
            .relationships_of(workbook_part)?
            .into_iter()
            .find(|rel| rel.type_uri == type_uri && !rel.is_external())
            .map(|rel| resolve_target(workbook_part, &rel.target)))
    }

    /// Ordered workbook sheets with their resolved worksheet part names.
    pub fn worksheet_parts(&self) -> Result<Vec<WorksheetPartInfo>, XlsxError> {
        let workbook_part = self.workbook_part()?;
        let workbook_xml = self
            .part(&workbook_part)
            .ok_or_else(|| XlsxError::MissingPart(workbook_part.clone()))?;
        let workbook_xml = String::from_utf8(workbook_xml.to_vec())?;
        let doc = roxmltree::Document::parse(&workbook_xml)?;

        let rel_by_id: HashMap<String, Relationship> = self
            .relationships_of(&workbook_part)?
            .into_iter()
            .map(|rel| (rel.id.clone(), rel))
            .collect();

        let mut out = Vec::new();
        for sheet in doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "sheet")
        {
            let name = sheet
                .attribute("name")
                .ok_or(XlsxError::MissingAttr("name"))?;
            let rel_id = sheet
                .attribute((NS_OFFICE_RELATIONSHIPS, "id"))
                .or_else(|| {
                    sheet
                        .attributes()
                        .find(|attr| attr.name() == "id")
                        .map(|attr| attr.value())
                })
                .ok_or(XlsxError::MissingAttr("r:id"))?;
            let rel = rel_by_id.get(rel_id).ok_or_else(|| {
                XlsxError::Invalid(format!("missing relationship for {rel_id}"))
            })?;
            out.push(WorksheetPartInfo {
                name: name.to_string(),
                rel_id: rel_id.to_string(),
                worksheet_part: resolve_target(&workbook_part, &rel.target),
            });
        }
        Ok(out)
    }
}

fn part_names_equivalent(a: &str, b: &str) -> bool {
    let a = a.strip_prefix('/').unwrap_or(a);
    let b = b.strip_prefix('/').unwrap_or(b);
    a.len() == b.len()
        && a.bytes().zip(b.bytes()).all(|(x, y)| {
            let x = if x == b'\\' { b'/' } else { x };
            let y = if y == b'\\' { b'/' } else { y };
            x.eq_ignore_ascii_case(&y)
        })
}

pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, XlsxError> {
    let mut reader = XmlReader::from_reader(Cursor::new(xml));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) | Event::Empty(start)
                if local_name(start.name().as_ref()).eq_ignore_ascii_case(b"Relationship") =>
            {
                let mut id = None;
                let mut target = None;
                let mut type_uri = None;
                let mut target_mode = None;
                for attr in start.attributes() {
                    let attr = attr?;
                    let key = local_name(attr.key.as_ref());
                    let value = attr.unescape_value()?.into_owned();
                    if key.eq_ignore_ascii_case(b"Id") {
                        id = Some(value);
                    } else if key.eq_ignore_ascii_case(b"Target") {
                        target = Some(value);
                    } else if key.eq_ignore_ascii_case(b"Type") {
                        type_uri = Some(value);
                    } else if key.eq_ignore_ascii_case(b"TargetMode") {
                        target_mode = Some(value);
                    }
                }
                if let (Some(id), Some(target), Some(type_uri)) = (id, target, type_uri) {
                    relationships.push(Relationship {
                        id,
                        type_uri,
                        target,
                        target_mode,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Namespace prefix of a qualified name including the colon (`x:` for `x:c`), or empty.
pub(crate) fn name_prefix(name: &[u8]) -> String {
    match name.iter().rposition(|b| *b == b':') {
        Some(idx) => String::from_utf8_lossy(&name[..=idx]).into_owned(),
        None => String::new(),
    }
}

/// `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`
pub(crate) fn rels_for_part(part: &str) -> String {
    let part = part.strip_prefix('/').unwrap_or(part);
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or(target);
    if target.is_empty() {
        return normalize(source_part);
    }
    if let Some(target) = target.strip_prefix('/') {
        return normalize(target);
    }

    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}
