// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::error::Error;
use crate::flex;
use crate::oracle;
use crate::style::StyleRules;
use crate::text;
use crate::tree::{serialize, Element};

/// Document-wide state threaded through node rendering.
pub struct RenderCtx<'a> {
    /// The private namespace URI discovered from the root.
    pub diag_ns: &'a str,
    /// Class-style rules extracted from inline `<style>` bodies.
    pub styles: &'a StyleRules,
}

/// Renders one source node into an output SVG node.
///
/// `diag:flex` goes through the flex engine, other diag-namespace elements
/// vanish, `text` goes through the text engine and everything else is
/// cloned with diag attributes stripped. Returns `None` for nodes with no
/// output.
pub fn render_node(
    node: &Element,
    ctx: &RenderCtx,
    wrap_width_hint: Option<f64>,
    inherited_family: Option<&str>,
    inherited_path: Option<&str>,
) -> Result<Option<Element>, Error> {
    if node.is(ctx.diag_ns, "flex") {
        let (el, _, _) =
            flex::render_flex(node, ctx, wrap_width_hint, inherited_family, inherited_path)?;
        return Ok(Some(el));
    }
    if node.tag.ns.as_deref() == Some(ctx.diag_ns) {
        return Ok(None);
    }
    if node.tag.local == "text" {
        let (el, _, _) =
            text::render_text(node, ctx, wrap_width_hint, inherited_family, inherited_path);
        return Ok(Some(el));
    }

    Ok(Some(render_generic(
        node,
        ctx,
        wrap_width_hint,
        inherited_family,
        inherited_path,
    )?))
}

/// Like [`render_node`], but also reports the rendered node's size.
/// Flex and text measure themselves; any other element is rendered into a
/// scratch SVG and measured by the geometry oracle.
pub fn render_node_sized(
    node: &Element,
    ctx: &RenderCtx,
    wrap_width_hint: Option<f64>,
    inherited_family: Option<&str>,
    inherited_path: Option<&str>,
) -> Result<Option<(Element, f64, f64)>, Error> {
    if node.is(ctx.diag_ns, "flex") {
        return flex::render_flex(node, ctx, wrap_width_hint, inherited_family, inherited_path)
            .map(Some);
    }
    if node.tag.ns.as_deref() == Some(ctx.diag_ns) {
        return Ok(None);
    }
    if node.tag.local == "text" {
        return Ok(Some(text::render_text(
            node,
            ctx,
            wrap_width_hint,
            inherited_family,
            inherited_path,
        )));
    }

    let rendered = render_generic(node, ctx, wrap_width_hint, inherited_family, inherited_path)?;
    let (width, height) = measure_rendered(&rendered)?;
    Ok(Some((rendered, width, height)))
}

fn render_generic(
    node: &Element,
    ctx: &RenderCtx,
    wrap_width_hint: Option<f64>,
    inherited_family: Option<&str>,
    inherited_path: Option<&str>,
) -> Result<Element, Error> {
    let mut clone = Element::new(node.tag.clone());
    clone.attributes = node
        .attributes
        .iter()
        .filter(|a| a.name.ns.as_deref() != Some(ctx.diag_ns))
        .cloned()
        .collect();
    clone.text = node.text.clone();

    for child in &node.children {
        if let Some(mut rendered) =
            render_node(child, ctx, wrap_width_hint, inherited_family, inherited_path)?
        {
            rendered.tail = child.tail.clone();
            clone.children.push(rendered);
        }
    }

    Ok(clone)
}

/// Measures a rendered subtree by wrapping it in a scratch `<svg>` and
/// asking the oracle for the overall content box.
pub fn measure_rendered(rendered: &Element) -> Result<(f64, f64), Error> {
    let mut scratch = Element::svg("svg");
    scratch.children.push(rendered.clone());
    let measurement = oracle::measure(&serialize(&scratch), &[])?;
    Ok(match measurement.overall {
        Some(bbox) => (bbox.width(), bbox.height()),
        None => (0.0, 0.0),
    })
}
