//! `xl/sharedStrings.xml` reader.
//!
//! Rich text runs are flattened to their plain text; phonetic hints (`<rPh>`) are dropped.

use crate::XlsxError;

pub fn parse_shared_strings_xml(xml: &str) -> Result<Vec<String>, XlsxError> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "sst" {
        return Err(XlsxError::Invalid(format!(
            "expected <sst> root in shared strings, found <{}>",
            root.tag_name().name()
        )));
    }

    Ok(root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "si")
        .map(text_of)
        .collect())
}

/// Concatenated `<t>` text under `node`, skipping phonetic runs.
pub(crate) fn text_of(node: roxmltree::Node<'_, '_>) -> String {
    let mut out = String::new();
    for t in node
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "t")
    {
        if t.ancestors().any(|a| a.tag_name().name() == "rPh") {
            continue;
        }
        out.push_str(t.text().unwrap_or(""));
    }
    out
}
