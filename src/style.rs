// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::tree::{Element, SVG_NS};

/// A single class rule: `.name { declarations }`.
#[derive(Clone, Debug)]
pub struct ClassRule {
    /// Class name, without the leading dot.
    pub class: String,
    /// Property/value pairs in source order.
    pub declarations: Vec<(String, String)>,
}

/// The ordered class-style rules of a document.
///
/// svg++ deliberately has no CSS engine; inline `<style>` bodies only
/// contribute bare class selectors, and resolution for an element and a
/// property returns the last matching declaration. Selectors that test
/// anything but a single class are dropped.
#[derive(Default, Debug)]
pub struct StyleRules {
    rules: Vec<ClassRule>,
}

impl StyleRules {
    /// Harvests class rules from every inline `<style>` in the tree.
    /// svg++ sources rarely declare a default namespace, so both plain and
    /// SVG-namespaced `<style>` elements count.
    pub fn collect(root: &Element) -> StyleRules {
        let mut css = String::new();
        root.walk(&mut |el| {
            let is_style = el.tag.local == "style"
                && matches!(el.tag.ns.as_deref(), None | Some(SVG_NS));
            if !is_style {
                return;
            }
            match el.attribute("type") {
                None | Some("text/css") => {}
                Some(_) => return,
            }
            css.push_str(&el.gather_text());
            css.push('\n');
        });

        let mut sheet = simplecss::StyleSheet::new();
        sheet.parse_more(&css);

        let mut rules = Vec::new();
        for rule in &sheet.rules {
            if let Some(class) = extract_class(&rule.selector) {
                rules.push(ClassRule {
                    class,
                    declarations: rule
                        .declarations
                        .iter()
                        .map(|d| (d.name.to_string(), d.value.to_string()))
                        .collect(),
                });
            }
        }

        StyleRules { rules }
    }

    /// Resolves `property` for `element`: the last matching declaration over
    /// the rules whose class appears in the element's `class` attribute.
    pub fn resolve<'a>(&'a self, element: &Element, property: &str) -> Option<&'a str> {
        let class_attr = element.attribute("class")?;
        let classes: Vec<&str> = class_attr.split_whitespace().collect();

        let mut found = None;
        for rule in &self.rules {
            if !classes.iter().any(|c| *c == rule.class) {
                continue;
            }
            for (name, value) in &rule.declarations {
                if name == property {
                    found = Some(value.as_str());
                }
            }
        }
        found
    }

    /// Whether any rules were collected.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Matches a selector against a probe element that records which class the
/// selector tests. A selector that asks about tags, ids, other attributes or
/// pseudo-classes marks the probe as rejected.
fn extract_class(selector: &simplecss::Selector) -> Option<String> {
    #[derive(Clone)]
    struct ClassProbe {
        captured: Rc<RefCell<Vec<String>>>,
        rejected: Rc<Cell<bool>>,
    }

    impl simplecss::Element for ClassProbe {
        fn parent_element(&self) -> Option<Self> {
            None
        }

        fn prev_sibling_element(&self) -> Option<Self> {
            None
        }

        fn has_local_name(&self, _: &str) -> bool {
            self.rejected.set(true);
            false
        }

        fn attribute_matches(
            &self,
            local_name: &str,
            operator: simplecss::AttributeOperator,
        ) -> bool {
            if local_name == "class" {
                if let simplecss::AttributeOperator::Contains(name) = operator {
                    self.captured.borrow_mut().push(name.to_string());
                    return true;
                }
            }
            self.rejected.set(true);
            false
        }

        fn pseudo_class_matches(&self, _: simplecss::PseudoClass) -> bool {
            self.rejected.set(true);
            false
        }
    }

    let probe = ClassProbe {
        captured: Rc::new(RefCell::new(Vec::new())),
        rejected: Rc::new(Cell::new(false)),
    };

    let matched = selector.matches(&probe);
    let captured = probe.captured.borrow();
    if matched && !probe.rejected.get() && captured.len() == 1 {
        Some(captured[0].clone())
    } else {
        None
    }
}

/// Splits an inline `style` attribute into property/value pairs.
pub fn parse_inline_declarations(style: &str) -> Vec<(String, String)> {
    simplecss::DeclarationTokenizer::from(style)
        .map(|d| (d.name.to_string(), d.value.to_string()))
        .collect()
}

/// Looks a property up in an inline `style` attribute.
pub fn inline_declaration(style: &str, property: &str) -> Option<String> {
    let mut found = None;
    for (name, value) in parse_inline_declarations(style) {
        if name == property {
            found = Some(value);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_document;

    fn rules_for(css: &str) -> StyleRules {
        let doc = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><style>{}</style></svg>"#,
            css
        );
        StyleRules::collect(&parse_document(&doc).unwrap())
    }

    fn probe_element(class: &str) -> Element {
        let mut el = Element::svg("text");
        el.set_attribute("class", class);
        el
    }

    #[test]
    fn last_match_wins() {
        let rules = rules_for(".a { font-size: 10px; } .a { font-size: 14px; }");
        let el = probe_element("a");
        assert_eq!(rules.resolve(&el, "font-size"), Some("14px"));
    }

    #[test]
    fn later_class_rule_wins_over_earlier() {
        let rules = rules_for(".a { fill: red; } .b { fill: blue; }");
        let el = probe_element("a b");
        assert_eq!(rules.resolve(&el, "fill"), Some("blue"));
    }

    #[test]
    fn non_class_selectors_are_dropped() {
        let rules = rules_for("text { font-size: 99px; } #id { fill: red; }");
        assert!(rules.is_empty());
    }

    #[test]
    fn unrelated_class_does_not_match() {
        let rules = rules_for(".a { fill: red; }");
        let el = probe_element("b");
        assert_eq!(rules.resolve(&el, "fill"), None);
    }

    #[test]
    fn inline_declarations_parse() {
        assert_eq!(
            inline_declaration("font-size: 12px; fill: red", "font-size"),
            Some("12px".to_string())
        );
        assert_eq!(inline_declaration("fill: red", "font-size"), None);
    }
}
