// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::error::Error;

use super::{Attribute, Element, QName};

/// Parses an XML byte stream into an element tree.
///
/// Character data between elements is folded into `text`/`tail` slots,
/// comments and processing instructions are dropped and namespace
/// declarations are resolved into qualified names.
pub fn parse_document(text: &str) -> Result<Element, Error> {
    let doc = roxmltree::Document::parse(text).map_err(|e| {
        let pos = e.pos();
        Error::Xml {
            message: e.to_string(),
            line: Some(pos.row),
            column: Some(pos.col),
        }
    })?;

    Ok(convert_element(doc.root_element()))
}

fn convert_element(node: roxmltree::Node) -> Element {
    let tag = QName {
        ns: node.tag_name().namespace().map(|s| s.to_string()),
        local: node.tag_name().name().to_string(),
    };

    let mut element = Element::new(tag);
    for attr in node.attributes() {
        element.attributes.push(Attribute {
            name: QName {
                ns: attr.namespace().map(|s| s.to_string()),
                local: attr.name().to_string(),
            },
            value: attr.value().to_string(),
        });
    }

    for child in node.children() {
        if child.is_element() {
            element.children.push(convert_element(child));
        } else if child.is_text() {
            let chunk = child.text().unwrap_or_default();
            if chunk.is_empty() {
                continue;
            }
            match element.children.last_mut() {
                Some(prev) => match prev.tail {
                    Some(ref mut tail) => tail.push_str(chunk),
                    None => prev.tail = Some(chunk.to_string()),
                },
                None => match element.text {
                    Some(ref mut text) => text.push_str(chunk),
                    None => element.text = Some(chunk.to_string()),
                },
            }
        }
        // Comments and processing instructions are dropped.
    }

    element
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_tail_placement() {
        let root = parse_document("<a>one<b/>two<b/>three</a>").unwrap();
        assert_eq!(root.text.as_deref(), Some("one"));
        assert_eq!(root.children[0].tail.as_deref(), Some("two"));
        assert_eq!(root.children[1].tail.as_deref(), Some("three"));
    }

    #[test]
    fn namespaces_are_resolved() {
        let root = parse_document(
            r#"<d:diagram xmlns:d="urn:d"><d:flex gap="2" d:wrap="true"/></d:diagram>"#,
        )
        .unwrap();
        assert!(root.is("urn:d", "diagram"));
        let flex = &root.children[0];
        assert!(flex.is("urn:d", "flex"));
        assert_eq!(flex.attribute("gap"), Some("2"));
        assert_eq!(flex.attribute_ns("urn:d", "wrap"), Some("true"));
    }

    #[test]
    fn parse_error_carries_position() {
        match parse_document("<a><b></a>") {
            Err(Error::Xml { line, .. }) => assert!(line.is_some()),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn comments_are_skipped() {
        let root = parse_document("<a>x<!-- hi -->y<b/></a>").unwrap();
        assert_eq!(root.text.as_deref(), Some("xy"));
        assert_eq!(root.children.len(), 1);
    }
}
