// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use xmlwriter::{Indent, Options, XmlWriter};

use super::{Element, SVG_NS};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Serializes an element tree into an XML string.
///
/// The SVG namespace becomes the default namespace, declared on the root;
/// any other namespace still present gets a generated `ns{N}` prefix.
/// Elements carrying character data are written in preserve-whitespace mode
/// so indentation never leaks into rendered text.
pub fn serialize(root: &Element) -> String {
    let mut xml = XmlWriter::new(Options {
        use_single_quote: false,
        indent: Indent::Spaces(2),
        attributes_indent: Indent::None,
    });

    let prefixes = collect_foreign_namespaces(root);
    write_element(root, &prefixes, true, false, &mut xml);
    xml.end_document()
}

fn collect_foreign_namespaces(root: &Element) -> BTreeMap<String, String> {
    let mut uris = std::collections::BTreeSet::new();
    root.walk(&mut |el| {
        if let Some(ref ns) = el.tag.ns {
            if ns != SVG_NS {
                uris.insert(ns.clone());
            }
        }
        for attr in &el.attributes {
            if let Some(ref ns) = attr.name.ns {
                if ns != SVG_NS && ns != XML_NS {
                    uris.insert(ns.clone());
                }
            }
        }
    });

    uris.into_iter()
        .enumerate()
        .map(|(i, uri)| (uri, format!("ns{}", i + 1)))
        .collect()
}

fn tag_name(el: &Element, prefixes: &BTreeMap<String, String>) -> String {
    match el.tag.ns.as_deref() {
        None => el.tag.local.clone(),
        Some(SVG_NS) => el.tag.local.clone(),
        Some(ns) => match prefixes.get(ns) {
            Some(prefix) => format!("{}:{}", prefix, el.tag.local),
            None => el.tag.local.clone(),
        },
    }
}

fn write_element(
    el: &Element,
    prefixes: &BTreeMap<String, String>,
    is_root: bool,
    preserving: bool,
    xml: &mut XmlWriter,
) {
    let has_character_data =
        el.text.is_some() || el.children.iter().any(|c| c.tail.is_some());
    let enable_preserve = has_character_data && !preserving;
    if enable_preserve {
        xml.set_preserve_whitespaces(true);
    }

    xml.start_element(&tag_name(el, prefixes));

    if is_root {
        xml.write_attribute("xmlns", SVG_NS);
        for (uri, prefix) in prefixes {
            xml.write_attribute(&format!("xmlns:{}", prefix), uri);
        }
    }

    for attr in &el.attributes {
        let name = match attr.name.ns.as_deref() {
            None | Some(SVG_NS) => attr.name.local.clone(),
            Some(XML_NS) => format!("xml:{}", attr.name.local),
            Some(ns) => match prefixes.get(ns) {
                Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                None => attr.name.local.clone(),
            },
        };
        xml.write_attribute(&name, &attr.value);
    }

    if let Some(ref text) = el.text {
        xml.write_text(&text.replace('&', "&amp;"));
    }

    for child in &el.children {
        write_element(child, prefixes, false, preserving || enable_preserve, xml);
        if let Some(ref tail) = child.tail {
            xml.write_text(&tail.replace('&', "&amp;"));
        }
    }

    xml.end_element();

    if enable_preserve {
        xml.set_preserve_whitespaces(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_document;

    #[test]
    fn svg_is_the_default_namespace() {
        let mut root = Element::svg("svg");
        root.children.push(Element::svg("rect"));
        let out = serialize(&root);
        assert!(out.contains(r#"<svg xmlns="http://www.w3.org/2000/svg">"#));
        assert!(out.contains("<rect/>"));
    }

    #[test]
    fn text_round_trips() {
        let root =
            parse_document(r#"<svg xmlns="http://www.w3.org/2000/svg"><text>a&amp;b</text></svg>"#)
                .unwrap();
        let out = serialize(&root);
        assert!(out.contains("a&amp;b"), "{}", out);
        let again = parse_document(&out).unwrap();
        assert_eq!(again.children[0].text.as_deref(), Some("a&b"));
    }

    #[test]
    fn foreign_namespaces_get_prefixes() {
        let root = parse_document(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:x="urn:x"><x:meta/></svg>"#,
        )
        .unwrap();
        let out = serialize(&root);
        assert!(out.contains(r#"xmlns:ns1="urn:x""#), "{}", out);
        assert!(out.contains("<ns1:meta/>"), "{}", out);
    }
}
