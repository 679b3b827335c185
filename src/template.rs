// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The template/instance/slot/param macro system.
//!
//! Templates are hoisted off the diagram root into a name→blueprint table;
//! each `diag:instance` is replaced by deep clones of its template's
//! children with the instance's textual `diag:param` payloads substituted
//! into matching `diag:slot` descendants. Blueprints are cloned on every
//! instantiation, so no expansion can observe another's mutations.

use std::collections::HashMap;

use crate::error::Error;
use crate::tree::Element;

/// Blueprint table: template name → deep-copied template children.
pub type TemplateTable = HashMap<String, Vec<Element>>;

// Guards against a template instantiating itself, directly or via another
// template. The original recursed without bound here.
const MAX_EXPANSION_DEPTH: usize = 64;

/// Removes every direct `diag:template` child of `root` and returns the
/// blueprint table. Nameless templates are dropped; a repeated name keeps
/// the last definition.
pub fn collect_templates(root: &mut Element, diag_ns: &str) -> TemplateTable {
    let mut templates = TemplateTable::new();
    let mut kept = Vec::with_capacity(root.children.len());

    for child in root.children.drain(..) {
        if child.is(diag_ns, "template") {
            if let Some(name) = child.attribute("name") {
                templates.insert(name.to_string(), child.children.clone());
            }
        } else {
            kept.push(child);
        }
    }

    root.children = kept;
    templates
}

/// Recursively replaces every `diag:instance` under `node` with its
/// expansion. Unknown template names expand to nothing.
pub fn expand_instances(
    node: &mut Element,
    diag_ns: &str,
    templates: &TemplateTable,
) -> Result<(), Error> {
    expand_at_depth(node, diag_ns, templates, 0)
}

fn expand_at_depth(
    node: &mut Element,
    diag_ns: &str,
    templates: &TemplateTable,
    depth: usize,
) -> Result<(), Error> {
    if depth > MAX_EXPANSION_DEPTH {
        return Err(Error::Semantic(
            "template expansion exceeded the maximum depth; \
             a template probably instantiates itself"
                .to_string(),
        ));
    }

    let mut expanded_children = Vec::with_capacity(node.children.len());
    for mut child in node.children.drain(..) {
        if child.is(diag_ns, "instance") {
            for mut clone in instantiate(&child, diag_ns, templates) {
                expand_at_depth(&mut clone, diag_ns, templates, depth + 1)?;
                expanded_children.push(clone);
            }
        } else {
            expand_at_depth(&mut child, diag_ns, templates, depth)?;
            expanded_children.push(child);
        }
    }
    node.children = expanded_children;
    Ok(())
}

fn instantiate(
    instance: &Element,
    diag_ns: &str,
    templates: &TemplateTable,
) -> Vec<Element> {
    let blueprint = match instance
        .attribute("template")
        .and_then(|name| templates.get(name))
    {
        Some(blueprint) => blueprint,
        None => return Vec::new(),
    };

    let params = gather_params(instance, diag_ns);

    let mut clones = Vec::with_capacity(blueprint.len());
    for elem in blueprint {
        let mut clone = elem.clone();
        // The instance's own attributes override the clone's, which is how
        // callers re-position or re-id an expansion.
        for attr in &instance.attributes {
            if attr.name.ns.is_none() && attr.name.local == "template" {
                continue;
            }
            clone.set_attribute_qname(attr.name.clone(), attr.value.clone());
        }
        apply_params(&mut clone, &params, diag_ns);
        clones.push(clone);
    }
    clones
}

fn gather_params(instance: &Element, diag_ns: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for child in &instance.children {
        if child.is(diag_ns, "param") {
            if let Some(name) = child.attribute("name") {
                params.insert(name.to_string(), child.gather_text().trim().to_string());
            }
        }
    }
    params
}

/// Replaces every `diag:slot` descendant with its parameter text. The text
/// is concatenated into the preceding sibling's tail, or into the parent's
/// leading text when the slot comes first.
fn apply_params(node: &mut Element, params: &HashMap<String, String>, diag_ns: &str) {
    let mut kept: Vec<Element> = Vec::with_capacity(node.children.len());
    for mut child in node.children.drain(..) {
        if child.is(diag_ns, "slot") {
            let value = child
                .attribute("name")
                .and_then(|name| params.get(name))
                .cloned()
                .unwrap_or_default();
            match kept.last_mut() {
                Some(prev) => match prev.tail {
                    Some(ref mut tail) => tail.push_str(&value),
                    None => prev.tail = Some(value),
                },
                None => match node.text {
                    Some(ref mut text) => text.push_str(&value),
                    None => node.text = Some(value),
                },
            }
            continue;
        }
        apply_params(&mut child, params, diag_ns);
        kept.push(child);
    }
    node.children = kept;
}
