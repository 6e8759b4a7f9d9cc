//! Appending the two link cell formats to `styles.xml`.
//!
//! Existing `fonts`/`borders`/`cellXfs` entries are never touched, so every `s`
//! index already used by the workbook keeps its meaning. The new entries go at
//! the end of each list and the `count` attributes are updated.

use mechswitch_model::LinkStyle;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::package::{local_name, name_prefix, rels_for_part, REL_TYPE_STYLES};
use crate::{XlsxError, XlsxPackage};

const CONTENT_TYPE_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";

/// Used when a package has no styles part at all.
const DEFAULT_STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="1">
    <font>
      <sz val="11"/>
      <color theme="1"/>
      <name val="Calibri"/>
      <family val="2"/>
      <scheme val="minor"/>
    </font>
  </fonts>
  <fills count="2">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
  </fills>
  <borders count="1">
    <border><left/><right/><top/><bottom/><diagonal/></border>
  </borders>
  <cellStyleXfs count="1">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
  </cellStyleXfs>
  <cellXfs count="1">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
  </cellXfs>
  <cellStyles count="1">
    <cellStyle name="Normal" xfId="0" builtinId="0"/>
  </cellStyles>
</styleSheet>
"#;

/// `cellXfs` indices of the appended link formats.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinkStyleIds {
    pub bordered: u32,
    pub plain: u32,
}

impl LinkStyleIds {
    pub fn index_of(self, style: LinkStyle) -> u32 {
        match style {
            LinkStyle::Bordered => self.bordered,
            LinkStyle::Plain => self.plain,
        }
    }
}

struct Counts {
    fonts: Option<u32>,
    borders: Option<u32>,
    cell_xfs: Option<u32>,
}

fn count_entries(styles_xml: &str) -> Result<Counts, XlsxError> {
    let doc = roxmltree::Document::parse(styles_xml)?;
    let root = doc.root_element();
    let count = |list: &str, item: &str| {
        root.children()
            .find(|n| n.is_element() && n.tag_name().name() == list)
            .map(|list| {
                list.children()
                    .filter(|n| n.is_element() && n.tag_name().name() == item)
                    .count() as u32
            })
    };
    Ok(Counts {
        fonts: count("fonts", "font"),
        borders: count("borders", "border"),
        cell_xfs: count("cellXfs", "xf"),
    })
}

/// Append one underlined Arial 10 font, one thin all-sides border and the two
/// centred, wrapping link formats. Returns the rewritten XML and the new indices.
pub fn append_link_styles(styles_xml: &str) -> Result<(String, LinkStyleIds), XlsxError> {
    let counts = count_entries(styles_xml)?;
    let missing = |what: &str| XlsxError::Invalid(format!("styles.xml has no <{what}>"));
    let font_id = counts.fonts.ok_or_else(|| missing("fonts"))?;
    let border_id = counts.borders.ok_or_else(|| missing("borders"))?;
    let xf_base = counts.cell_xfs.ok_or_else(|| missing("cellXfs"))?;
    let ids = LinkStyleIds {
        bordered: xf_base,
        plain: xf_base + 1,
    };

    let mut reader = Reader::from_str(styles_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut prefix = String::new();
    let mut depth = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) if depth == 0 => {
                prefix = name_prefix(e.name().as_ref());
                depth += 1;
                writer.write_event(event.borrow())?;
            }
            Event::Start(ref e) | Event::Empty(ref e) if depth == 1 => {
                let new_count = match local_name(e.name().as_ref()) {
                    b"fonts" => Some(font_id + 1),
                    b"borders" => Some(border_id + 1),
                    b"cellXfs" => Some(xf_base + 2),
                    _ => None,
                };
                let is_start = matches!(event, Event::Start(_));
                match new_count {
                    Some(count) => {
                        let start = with_count(e, count)?;
                        writer.write_event(Event::Start(start))?;
                        if !is_start {
                            let list = String::from_utf8(e.name().as_ref().to_vec())?;
                            let local = local_name(list.as_bytes());
                            write_appended(&mut writer, &prefix, local, font_id, border_id)?;
                            writer.write_event(Event::End(BytesEnd::new(list.as_str())))?;
                        }
                    }
                    None => writer.write_event(event.borrow())?,
                }
                if is_start {
                    depth += 1;
                }
            }
            Event::End(ref e) if depth == 2 => {
                let list = local_name(e.name().as_ref()).to_vec();
                write_appended(&mut writer, &prefix, &list, font_id, border_id)?;
                depth -= 1;
                writer.write_event(event.borrow())?;
            }
            Event::Start(_) => {
                depth += 1;
                writer.write_event(event.borrow())?;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                writer.write_event(event.borrow())?;
            }
            _ => writer.write_event(event.borrow())?,
        }
        buf.clear();
    }

    Ok((String::from_utf8(writer.into_inner())?, ids))
}

fn with_count(e: &BytesStart<'_>, count: u32) -> Result<BytesStart<'static>, XlsxError> {
    let name = String::from_utf8(e.name().as_ref().to_vec())?;
    let mut out = BytesStart::new(name);
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() != b"count" {
            out.push_attribute(attr);
        }
    }
    out.push_attribute(("count", count.to_string().as_str()));
    Ok(out)
}

/// Write the entries appended to `list` (a no-op for lists we do not extend).
fn write_appended<W: std::io::Write>(
    writer: &mut Writer<W>,
    prefix: &str,
    list: &[u8],
    font_id: u32,
    border_id: u32,
) -> Result<(), XlsxError> {
    let mut w = Elements { writer, prefix };
    match list {
        b"fonts" => {
            w.start("font", &[])?;
            w.empty("u", &[])?;
            let size = LinkStyle::FONT_SIZE_PT.to_string();
            w.empty("sz", &[("val", size.as_str())])?;
            w.empty("name", &[("val", LinkStyle::FONT_NAME)])?;
            w.empty("family", &[("val", "2")])?;
            w.end("font")?;
        }
        b"borders" => {
            w.start("border", &[])?;
            for side in ["left", "right", "top", "bottom"] {
                w.start(side, &[("style", "thin")])?;
                w.empty("color", &[("auto", "1")])?;
                w.end(side)?;
            }
            w.empty("diagonal", &[])?;
            w.end("border")?;
        }
        b"cellXfs" => {
            for style in [LinkStyle::Bordered, LinkStyle::Plain] {
                let font = font_id.to_string();
                let border = if style.has_border() { border_id } else { 0 }.to_string();
                let mut attrs = vec![
                    ("numFmtId", "0"),
                    ("fontId", font.as_str()),
                    ("fillId", "0"),
                    ("borderId", border.as_str()),
                    ("xfId", "0"),
                    ("applyFont", "1"),
                ];
                if style.has_border() {
                    attrs.push(("applyBorder", "1"));
                }
                attrs.push(("applyAlignment", "1"));
                w.start("xf", &attrs)?;
                w.empty(
                    "alignment",
                    &[
                        ("horizontal", "center"),
                        ("vertical", "center"),
                        ("wrapText", "1"),
                    ],
                )?;
                w.end("xf")?;
            }
        }
        _ => {}
    }
    Ok(())
}

struct Elements<'a, W: std::io::Write> {
    writer: &'a mut Writer<W>,
    prefix: &'a str,
}

impl<W: std::io::Write> Elements<'_, W> {
    fn element(&self, name: &str, attrs: &[(&str, &str)]) -> BytesStart<'static> {
        let mut e = BytesStart::new(format!("{}{name}", self.prefix));
        for attr in attrs {
            e.push_attribute(*attr);
        }
        e
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), XlsxError> {
        let e = self.element(name, attrs);
        self.writer.write_event(Event::Start(e))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), XlsxError> {
        let e = self.element(name, attrs);
        self.writer.write_event(Event::Empty(e))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), XlsxError> {
        let name = format!("{}{name}", self.prefix);
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }
}

/// Append the link formats to the workbook's styles part, creating a default
/// one (with its relationship and content type) when the package has none.
pub(crate) fn append_link_styles_to_package(
    package: &mut XlsxPackage,
) -> Result<LinkStyleIds, XlsxError> {
    let workbook_part = package.workbook_part()?;
    let styles_part = match package.workbook_related_part(&workbook_part, REL_TYPE_STYLES)? {
        Some(part) => part,
        None => {
            let part = "xl/styles.xml".to_string();
            add_workbook_relationship(package, &workbook_part, REL_TYPE_STYLES, "styles.xml")?;
            part
        }
    };

    let styles_xml = match package.part(&styles_part) {
        Some(bytes) => String::from_utf8(bytes.to_vec())?,
        None => {
            log::info!("no styles part in workbook; creating {styles_part}");
            ensure_content_type_override(package, &styles_part, CONTENT_TYPE_STYLES)?;
            DEFAULT_STYLES_XML.to_string()
        }
    };

    let (updated, ids) = append_link_styles(&styles_xml)?;
    package.set_part(styles_part, updated.into_bytes());
    log::debug!(
        "link styles appended: bordered xf {}, plain xf {}",
        ids.bordered,
        ids.plain
    );
    Ok(ids)
}

fn add_workbook_relationship(
    package: &mut XlsxPackage,
    workbook_part: &str,
    type_uri: &str,
    target: &str,
) -> Result<(), XlsxError> {
    let rels_part = rels_for_part(workbook_part);
    let rels_xml = package
        .part(&rels_part)
        .map(|bytes| String::from_utf8(bytes.to_vec()))
        .transpose()?
        .ok_or_else(|| XlsxError::MissingPart(rels_part.clone()))?;

    let taken: Vec<String> = package
        .relationships_of(workbook_part)?
        .into_iter()
        .map(|rel| rel.id)
        .collect();
    let id = (1..)
        .map(|n| format!("rId{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| "rIdStyles".to_string());

    let updated = insert_before_root_end(
        &rels_xml,
        "Relationship",
        &[("Id", id.as_str()), ("Type", type_uri), ("Target", target)],
    )?;
    package.set_part(rels_part, updated.into_bytes());
    Ok(())
}

fn ensure_content_type_override(
    package: &mut XlsxPackage,
    part: &str,
    content_type: &str,
) -> Result<(), XlsxError> {
    let ct_part = "[Content_Types].xml";
    let Some(bytes) = package.part(ct_part) else {
        return Err(XlsxError::MissingPart(ct_part.to_string()));
    };
    let xml = String::from_utf8(bytes.to_vec())?;
    let part_name = format!("/{}", part.trim_start_matches('/'));
    if xml.contains(&format!("PartName=\"{part_name}\"")) {
        return Ok(());
    }
    let updated = insert_before_root_end(
        &xml,
        "Override",
        &[("PartName", part_name.as_str()), ("ContentType", content_type)],
    )?;
    package.set_part(ct_part, updated.into_bytes());
    Ok(())
}

/// Copy `xml`, adding an empty `<name attrs/>` as the last child of the root element.
fn insert_before_root_end(
    xml: &str,
    name: &str,
    attrs: &[(&str, &str)],
) -> Result<String, XlsxError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut prefix = String::new();
    let mut depth = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) => {
                if depth == 0 {
                    prefix = name_prefix(e.name().as_ref());
                }
                depth += 1;
                writer.write_event(event.borrow())?;
            }
            Event::End(_) if depth == 1 => {
                Elements { writer: &mut writer, prefix: &prefix }.empty(name, attrs)?;
                depth -= 1;
                writer.write_event(event.borrow())?;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                writer.write_event(event.borrow())?;
            }
            Event::Empty(ref e) if depth == 0 => {
                let root = String::from_utf8(e.name().as_ref().to_vec())?;
                prefix = name_prefix(root.as_bytes());
                writer.write_event(Event::Start(e.to_owned()))?;
                Elements { writer: &mut writer, prefix: &prefix }.empty(name, attrs)?;
                writer.write_event(Event::End(BytesEnd::new(root)))?;
            }
            _ => writer.write_event(event.borrow())?,
        }
        buf.clear();
    }

    Ok(String::from_utf8(writer.into_inner())?)
}
