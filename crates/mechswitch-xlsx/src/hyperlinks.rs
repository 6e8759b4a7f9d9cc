//! Worksheet `<hyperlinks>` rewriting.
//!
//! New internal links are merged into an existing `<hyperlinks>` block; an existing
//! entry survives unless one of the new links is anchored on the same `ref`. Sheets
//! without a block get one at its schema position (CT_Worksheet sequence), i.e.
//! before the first of [`HYPERLINKS_SUCCESSORS`] present, or before `</worksheet>`.

use std::collections::HashSet;

use mechswitch_model::Hyperlink;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::package::{local_name, name_prefix, NS_OFFICE_RELATIONSHIPS};
use crate::XlsxError;

const HYPERLINKS_SUCCESSORS: &[&[u8]] = &[
    b"printOptions",
    b"pageMargins",
    b"pageSetup",
    b"headerFooter",
    b"rowBreaks",
    b"colBreaks",
    b"customProperties",
    b"cellWatches",
    b"ignoredErrors",
    b"smartTags",
    b"drawing",
    b"legacyDrawing",
    b"legacyDrawingHF",
    b"drawingHF",
    b"picture",
    b"oleObjects",
    b"controls",
    b"webPublishItems",
    b"tableParts",
    b"extLst",
];

/// Return `sheet_xml` with `links` written as `<hyperlink ref=".." location=".."/>` entries.
pub fn merge_worksheet_hyperlinks(
    sheet_xml: &str,
    links: &[Hyperlink],
) -> Result<String, XlsxError> {
    if links.is_empty() {
        return Ok(sheet_xml.to_string());
    }

    let anchors: HashSet<String> = links.iter().map(|l| l.anchor.to_a1()).collect();

    let mut reader = Reader::from_str(sheet_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();

    let mut prefix = String::new();
    let mut depth = 0usize;
    let mut written = false;
    // `Some` while inside an existing `<hyperlinks>` block.
    let mut existing: Option<Vec<BytesStart<'static>>> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        if let Some(kept) = existing.as_mut() {
            match event {
                Event::End(ref e) if local_name(e.name().as_ref()) == b"hyperlinks" => {
                    let kept = std::mem::take(kept);
                    existing = None;
                    depth -= 1;
                    write_block(&mut writer, &prefix, kept, links)?;
                    written = true;
                }
                Event::Empty(ref e) | Event::Start(ref e)
                    if local_name(e.name().as_ref()) == b"hyperlink" =>
                {
                    if !anchored_on(e, &anchors)? {
                        kept.push(e.to_owned().into_owned());
                    }
                    if matches!(event, Event::Start(_)) {
                        depth += 1;
                    }
                }
                Event::Start(_) => depth += 1,
                Event::End(_) => depth -= 1,
                Event::Eof => {
                    return Err(XlsxError::Invalid("unterminated <hyperlinks>".to_string()))
                }
                _ => {}
            }
            buf.clear();
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(ref e) if depth == 0 => {
                prefix = name_prefix(e.name().as_ref());
                depth += 1;
                writer.write_event(Event::Start(e.to_owned()))?;
            }
            Event::Start(ref e) if depth == 1 && local_name(e.name().as_ref()) == b"hyperlinks" => {
                depth += 1;
                existing = Some(Vec::new());
            }
            Event::Empty(ref e) if depth == 1 && local_name(e.name().as_ref()) == b"hyperlinks" => {
                write_block(&mut writer, &prefix, Vec::new(), links)?;
                written = true;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if depth == 1
                    && !written
                    && HYPERLINKS_SUCCESSORS.contains(&local_name(e.name().as_ref())) =>
            {
                write_block(&mut writer, &prefix, Vec::new(), links)?;
                written = true;
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
                writer.write_event(event.borrow())?;
            }
            Event::End(ref e) if depth == 1 => {
                if !written {
                    write_block(&mut writer, &prefix, Vec::new(), links)?;
                    written = true;
                }
                depth -= 1;
                writer.write_event(Event::End(e.to_owned()))?;
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

    if !written {
        return Err(XlsxError::Invalid(
            "worksheet has no root element to hold hyperlinks".to_string(),
        ));
    }
    Ok(String::from_utf8(writer.into_inner())?)
}

fn anchored_on(e: &BytesStart<'_>, anchors: &HashSet<String>) -> Result<bool, XlsxError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"ref" {
            let value = attr.unescape_value()?;
            return Ok(anchors.contains(&value.trim().to_ascii_uppercase()));
        }
    }
    Ok(false)
}

fn write_block<W: std::io::Write>(
    writer: &mut Writer<W>,
    prefix: &str,
    kept: Vec<BytesStart<'static>>,
    links: &[Hyperlink],
) -> Result<(), XlsxError> {
    let block = format!("{prefix}hyperlinks");
    let mut start = BytesStart::new(block.as_str());
    // Kept external links carry `r:id`; make sure the prefix is bound.
    if kept.iter().any(|e| {
        e.attributes()
            .flatten()
            .any(|a| a.key.as_ref() == b"r:id")
    }) {
        start.push_attribute(("xmlns:r", NS_OFFICE_RELATIONSHIPS));
    }
    writer.write_event(Event::Start(start))?;

    for e in kept {
        writer.write_event(Event::Empty(e))?;
    }

    let tag = format!("{prefix}hyperlink");
    for link in links {
        let mut elem = BytesStart::new(tag.as_str());
        let anchor = link.anchor.to_a1();
        let location = link.target.to_string();
        elem.push_attribute(("ref", anchor.as_str()));
        elem.push_attribute(("location", location.as_str()));
        writer.write_event(Event::Empty(elem))?;
    }

    writer.write_event(Event::End(BytesEnd::new(block.as_str())))?;
    Ok(())
}
