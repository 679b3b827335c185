// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A mutable XML element tree.
//!
//! Unlike a generic DOM, this tree keeps the model the compiler needs and
//! nothing else: qualified tags, ordered attributes, the leading character
//! data of an element (`text`), the character data following it (`tail`) and
//! the ordered children. `Clone` performs the deep copy that template and
//! include expansion rely on, so a blueprint can never observe mutations
//! made by one of its instantiations.

mod parse;
mod write;

pub use parse::parse_document;
pub use write::serialize;

/// The standard SVG namespace.
pub const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// A qualified name: an optional namespace URI plus a local name.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct QName {
    /// Namespace URI, if any.
    pub ns: Option<String>,
    /// Local name.
    pub local: String,
}

impl QName {
    /// A name in the SVG namespace.
    pub fn svg(local: &str) -> Self {
        QName {
            ns: Some(SVG_NS.to_string()),
            local: local.to_string(),
        }
    }

    /// A name without a namespace. Used for ordinary attributes.
    pub fn plain(local: &str) -> Self {
        QName {
            ns: None,
            local: local.to_string(),
        }
    }

    /// A name in an explicit namespace.
    pub fn with_ns(ns: &str, local: &str) -> Self {
        QName {
            ns: Some(ns.to_string()),
            local: local.to_string(),
        }
    }

    /// Checks namespace URI and local name at once.
    pub fn is(&self, ns: &str, local: &str) -> bool {
        self.local == local && self.ns.as_deref() == Some(ns)
    }
}

/// A single attribute. Attributes keep document order.
#[derive(Clone, Debug)]
pub struct Attribute {
    /// Attribute name.
    pub name: QName,
    /// Attribute value.
    pub value: String,
}

/// An XML element.
#[derive(Clone, Debug)]
pub struct Element {
    /// Qualified tag name.
    pub tag: QName,
    /// Attributes in document order.
    pub attributes: Vec<Attribute>,
    /// Character data before the first child.
    pub text: Option<String>,
    /// Character data following this element, owned by it the way
    /// ElementTree does it.
    pub tail: Option<String>,
    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    /// Creates an empty element.
    pub fn new(tag: QName) -> Self {
        Element {
            tag,
            attributes: Vec::new(),
            text: None,
            tail: None,
            children: Vec::new(),
        }
    }

    /// Creates an empty element in the SVG namespace.
    pub fn svg(local: &str) -> Self {
        Element::new(QName::svg(local))
    }

    /// Checks the element tag against a namespace + local name pair.
    pub fn is(&self, ns: &str, local: &str) -> bool {
        self.tag.is(ns, local)
    }

    /// Returns the value of an unqualified attribute.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.ns.is_none() && a.name.local == local)
            .map(|a| a.value.as_str())
    }

    /// Returns the value of a namespaced attribute.
    pub fn attribute_ns(&self, ns: &str, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is(ns, local))
            .map(|a| a.value.as_str())
    }

    /// Sets an unqualified attribute, replacing an existing value.
    pub fn set_attribute(&mut self, local: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name.ns.is_none() && a.name.local == local)
        {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute {
                name: QName::plain(local),
                value,
            }),
        }
    }

    /// Sets a namespaced attribute, replacing an existing value.
    pub fn set_attribute_qname(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    /// Removes an unqualified attribute if present.
    pub fn remove_attribute(&mut self, local: &str) {
        self.attributes
            .retain(|a| !(a.name.ns.is_none() && a.name.local == local));
    }

    /// Drops every attribute in the given namespace.
    pub fn strip_namespace_attributes(&mut self, ns: &str) {
        self.attributes.retain(|a| a.name.ns.as_deref() != Some(ns));
    }

    /// Concatenated character data of this element and all descendants,
    /// in document order.
    pub fn gather_text(&self) -> String {
        fn rec(el: &Element, out: &mut String) {
            if let Some(ref t) = el.text {
                out.push_str(t);
            }
            for child in &el.children {
                rec(child, out);
                if let Some(ref t) = child.tail {
                    out.push_str(t);
                }
            }
        }

        let mut out = String::new();
        rec(self, &mut out);
        out
    }

    /// Calls `f` for this element and every descendant, in document order.
    pub fn walk(&self, f: &mut impl FnMut(&Element)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    /// Calls `f` for this element and every descendant, in document order,
    /// allowing mutation.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for child in &mut self.children {
            child.walk_mut(f);
        }
    }

    /// Returns a deep copy with every attribute in `ns` removed, here and in
    /// all descendants.
    pub fn clone_without_namespace(&self, ns: &str) -> Element {
        let mut clone = self.clone();
        clone.walk_mut(&mut |el| el.strip_namespace_attributes(ns));
        clone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_replace_in_place() {
        let mut el = Element::svg("rect");
        el.set_attribute("width", "10");
        el.set_attribute("height", "20");
        el.set_attribute("width", "30");
        assert_eq!(el.attribute("width"), Some("30"));
        assert_eq!(el.attributes.len(), 2);
        assert_eq!(el.attributes[0].name.local, "width");
    }

    #[test]
    fn gather_text_walks_tails() {
        let mut root = Element::svg("text");
        root.text = Some("a".to_string());
        let mut span = Element::svg("tspan");
        span.text = Some("b".to_string());
        span.tail = Some("c".to_string());
        root.children.push(span);
        assert_eq!(root.gather_text(), "abc");
    }

    #[test]
    fn clone_is_deep() {
        let mut root = Element::svg("g");
        root.children.push(Element::svg("rect"));
        let mut copy = root.clone();
        copy.children[0].set_attribute("x", "1");
        assert_eq!(root.children[0].attribute("x"), None);
    }
}
