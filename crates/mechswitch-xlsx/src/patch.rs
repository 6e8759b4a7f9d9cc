//! Streaming rewrite of `<sheetData>` cells.
//!
//! Only the targeted `<c>` elements change; every other event is copied through
//! unchanged. Cells and rows that do not exist yet are inserted in order.

use std::collections::BTreeMap;

use mechswitch_model::{CellRef, CellValue};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::package::{local_name, name_prefix};
use crate::XlsxError;

/// A pending change to one cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellWrite {
    /// Replace the cell content (and drop any formula) with this literal.
    pub value: Option<CellValue>,
    /// Set the `s` attribute to this `cellXfs` index.
    pub style: Option<u32>,
}

struct OpenRow<'w> {
    row: u32,
    pending: BTreeMap<u32, &'w CellWrite>,
    next_col: u32,
}

pub fn patch_worksheet_cells(
    sheet_xml: &str,
    writes: &BTreeMap<CellRef, CellWrite>,
) -> Result<String, XlsxError> {
    if writes.is_empty() {
        return Ok(sheet_xml.to_string());
    }

    let mut by_row: BTreeMap<u32, BTreeMap<u32, &CellWrite>> = BTreeMap::new();
    for (cell_ref, write) in writes {
        by_row
            .entry(cell_ref.row)
            .or_default()
            .insert(cell_ref.col, write);
    }

    let mut reader = Reader::from_str(sheet_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();

    let mut prefix = String::new();
    let mut saw_root = false;
    let mut in_sheet_data = false;
    let mut saw_sheet_data = false;
    let mut next_row = 0u32;
    let mut open_row: Option<OpenRow<'_>> = None;
    let mut skip_depth = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf)?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => return Err(XlsxError::Invalid("unterminated <c>".to_string())),
                _ => {}
            }
            buf.clear();
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(ref e) if !saw_root => {
                saw_root = true;
                prefix = name_prefix(e.name().as_ref());
                writer.write_event(event.borrow())?;
            }
            Event::Start(ref e) if local_name(e.name().as_ref()) == b"sheetData" => {
                in_sheet_data = true;
                saw_sheet_data = true;
                writer.write_event(event.borrow())?;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"sheetData" => {
                saw_sheet_data = true;
                writer.write_event(Event::Start(e.to_owned()))?;
                for (row, cells) in std::mem::take(&mut by_row) {
                    write_new_row(&mut writer, &prefix, row, &cells)?;
                }
                let end = format!("{prefix}sheetData");
                writer.write_event(Event::End(BytesEnd::new(end.as_str())))?;
            }
            Event::End(ref e) if in_sheet_data && local_name(e.name().as_ref()) == b"sheetData" => {
                in_sheet_data = false;
                for (row, cells) in std::mem::take(&mut by_row) {
                    write_new_row(&mut writer, &prefix, row, &cells)?;
                }
                writer.write_event(event.borrow())?;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if in_sheet_data
                    && open_row.is_none()
                    && local_name(e.name().as_ref()) == b"row" =>
            {
                let row = row_index(e, next_row)?;
                next_row = row + 1;

                let earlier: Vec<u32> = by_row.range(..row).map(|(r, _)| *r).collect();
                for r in earlier {
                    if let Some(cells) = by_row.remove(&r) {
                        write_new_row(&mut writer, &prefix, r, &cells)?;
                    }
                }

                let pending = by_row.remove(&row).unwrap_or_default();
                let is_empty = matches!(event, Event::Empty(_));
                if pending.is_empty() {
                    writer.write_event(event.borrow())?;
                    if !is_empty {
                        open_row = Some(OpenRow {
                            row,
                            pending,
                            next_col: 0,
                        });
                    }
                    buf.clear();
                    continue;
                }

                // `spans` is an optimization hint that would go stale.
                let start = without_attribute(e, b"spans")?;
                writer.write_event(Event::Start(start))?;
                if is_empty {
                    for (col, write) in &pending {
                        write_cell(&mut writer, &prefix, CellRef::new(row, *col), write, None)?;
                    }
                    let end = String::from_utf8(e.name().as_ref().to_vec())?;
                    writer.write_event(Event::End(BytesEnd::new(end.as_str())))?;
                } else {
                    open_row = Some(OpenRow {
                        row,
                        pending,
                        next_col: 0,
                    });
                }
            }
            Event::End(ref e) if open_row.is_some() && local_name(e.name().as_ref()) == b"row" => {
                if let Some(state) = open_row.take() {
                    for (col, write) in &state.pending {
                        write_cell(&mut writer, &prefix, CellRef::new(state.row, *col), write, None)?;
                    }
                }
                writer.write_event(event.borrow())?;
            }
            Event::Start(ref e) | Event::Empty(ref e) if local_name(e.name().as_ref()) == b"c" => {
                let Some(state) = open_row.as_mut() else {
                    writer.write_event(event.borrow())?;
                    buf.clear();
                    continue;
                };
                let col = match attribute(e, b"r")? {
                    Some(a1) => CellRef::from_a1(&a1)?.col,
                    None => state.next_col,
                };
                state.next_col = col + 1;

                let earlier: Vec<u32> = state.pending.range(..col).map(|(c, _)| *c).collect();
                for c in earlier {
                    if let Some(write) = state.pending.remove(&c) {
                        write_cell(&mut writer, &prefix, CellRef::new(state.row, c), write, None)?;
                    }
                }

                match state.pending.remove(&col) {
                    Some(write) if write.value.is_some() => {
                        let original_style = attribute(e, b"s")?;
                        write_cell(
                            &mut writer,
                            &prefix,
                            CellRef::new(state.row, col),
                            write,
                            original_style.as_deref(),
                        )?;
                        if matches!(event, Event::Start(_)) {
                            skip_depth = 1;
                        }
                    }
                    Some(write) => {
                        let mut start = without_attribute(e, b"s")?;
                        if let Some(style) = write.style {
                            start.push_attribute(("s", style.to_string().as_str()));
                        }
                        match event {
                            Event::Start(_) => writer.write_event(Event::Start(start))?,
                            _ => writer.write_event(Event::Empty(start))?,
                        }
                    }
                    None => writer.write_event(event.borrow())?,
                }
            }
            _ => writer.write_event(event.borrow())?,
        }
        buf.clear();
    }

    if !saw_sheet_data {
        return Err(XlsxError::Invalid("worksheet has no <sheetData>".to_string()));
    }
    Ok(String::from_utf8(writer.into_inner())?)
}

fn row_index(e: &BytesStart<'_>, implicit: u32) -> Result<u32, XlsxError> {
    match attribute(e, b"r")? {
        Some(r) => r
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|r| r.checked_sub(1))
            .ok_or_else(|| XlsxError::Invalid(format!("invalid row number {r:?}"))),
        None => Ok(implicit),
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, XlsxError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn without_attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<BytesStart<'static>, XlsxError> {
    let name = String::from_utf8(e.name().as_ref().to_vec())?;
    let mut out = BytesStart::new(name);
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() != key {
            out.push_attribute(attr);
        }
    }
    Ok(out.into_owned())
}

fn write_new_row<W: std::io::Write>(
    writer: &mut Writer<W>,
    prefix: &str,
    row: u32,
    cells: &BTreeMap<u32, &CellWrite>,
) -> Result<(), XlsxError> {
    let tag = format!("{prefix}row");
    let mut start = BytesStart::new(tag.as_str());
    let r = (row + 1).to_string();
    start.push_attribute(("r", r.as_str()));
    writer.write_event(Event::Start(start))?;
    for (col, write) in cells {
        write_cell(writer, prefix, CellRef::new(row, *col), write, None)?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
    Ok(())
}

/// Write a complete `<c>` for `write`, keeping `original_style` when no new style is set.
fn write_cell<W: std::io::Write>(
    writer: &mut Writer<W>,
    prefix: &str,
    cell_ref: CellRef,
    write: &CellWrite,
    original_style: Option<&str>,
) -> Result<(), XlsxError> {
    let tag = format!("{prefix}c");
    let mut start = BytesStart::new(tag.as_str());
    let a1 = cell_ref.to_a1();
    start.push_attribute(("r", a1.as_str()));
    let style = write
        .style
        .map(|s| s.to_string())
        .or_else(|| original_style.map(str::to_string));
    if let Some(style) = &style {
        start.push_attribute(("s", style.as_str()));
    }

    let (cell_type, text) = match &write.value {
        None | Some(CellValue::Empty) => (None, None),
        Some(CellValue::String(s)) => (Some("inlineStr"), Some(s.clone())),
        Some(CellValue::Number(n)) => (None, Some(n.to_string())),
        Some(CellValue::Boolean(b)) => (Some("b"), Some(if *b { "1" } else { "0" }.to_string())),
        Some(CellValue::Error(e)) => (Some("e"), Some(e.clone())),
    };
    if let Some(cell_type) = cell_type {
        start.push_attribute(("t", cell_type));
    }

    let Some(text) = text else {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    };

    writer.write_event(Event::Start(start))?;
    if cell_type == Some("inlineStr") {
        let is = format!("{prefix}is");
        let t = format!("{prefix}t");
        writer.write_event(Event::Start(BytesStart::new(is.as_str())))?;
        let mut t_start = BytesStart::new(t.as_str());
        if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
            t_start.push_attribute(("xml:space", "preserve"));
        }
        writer.write_event(Event::Start(t_start))?;
        writer.write_event(Event::Text(BytesText::new(&text)))?;
        writer.write_event(Event::End(BytesEnd::new(t.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new(is.as_str())))?;
    } else {
        let v = format!("{prefix}v");
        writer.write_event(Event::Start(BytesStart::new(v.as_str())))?;
        writer.write_event(Event::Text(BytesText::new(&text)))?;
        writer.write_event(Event::End(BytesEnd::new(v.as_str())))?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
    Ok(())
}
