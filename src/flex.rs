// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The flex layout engine.
//!
//! A `diag:flex` measures its children (recursively, through the text
//! engine or the geometry oracle) and stacks them in a column or flows them
//! in a row, with `gap` between consecutive children and `padding` on all
//! sides. An explicit `width` (or an inherited width hint) acts as a lower
//! bound on the container and propagates inward, shrunk by the padding, as
//! the wrap hint for children.

use crate::error::Error;
use crate::render::{render_node_sized, RenderCtx};
use crate::text::font_family_info;
use crate::tree::Element;
use crate::units::{fmt_num, parse_length};

const CONTROL_ATTRS: &[&str] = &[
    "x",
    "y",
    "width",
    "direction",
    "gap",
    "padding",
    "background-class",
    "background-style",
];

/// Renders a `diag:flex` container into a translated `<g>`, returning the
/// group plus its total width and height.
pub fn render_flex(
    node: &Element,
    ctx: &RenderCtx,
    wrap_width_hint: Option<f64>,
    inherited_family: Option<&str>,
    inherited_path: Option<&str>,
) -> Result<(Element, f64, f64), Error> {
    let direction = node.attribute("direction").unwrap_or("column").trim().to_lowercase();
    let gap = node.attribute("gap").and_then(parse_length).unwrap_or(0.0);
    let padding = node.attribute("padding").and_then(parse_length).unwrap_or(0.0);
    let width_attr = node.attribute("width").and_then(parse_length);
    let target_total_width = width_attr.or(wrap_width_hint);
    let x = node.attribute("x").and_then(parse_length).unwrap_or(0.0);
    let y = node.attribute("y").and_then(parse_length).unwrap_or(0.0);
    let bg_class = node.attribute("background-class").map(|s| s.to_string());
    let bg_style = node.attribute("background-style").map(|s| s.to_string());

    let (local_family, local_path) = font_family_info(node, ctx.diag_ns, ctx.styles);
    let family = local_family
        .as_deref()
        .or(inherited_family);
    let path = local_path.as_deref().or(inherited_path);

    let child_wrap_hint = target_total_width.map(|w| (w - 2.0 * padding).max(0.0));
    let mut children = Vec::new();
    for child in &node.children {
        if let Some(entry) = render_node_sized(child, ctx, child_wrap_hint, family, path)? {
            children.push(entry);
        }
    }

    let mut g = Element::svg("g");
    g.set_attribute(
        "transform",
        format!("translate({}, {})", fmt_num(x), fmt_num(y)),
    );
    for attr in &node.attributes {
        if attr.name.ns.as_deref() == Some(ctx.diag_ns) {
            continue;
        }
        if attr.name.ns.is_none() && CONTROL_ATTRS.contains(&attr.name.local.as_str()) {
            continue;
        }
        g.set_attribute_qname(attr.name.clone(), attr.value.clone());
    }

    let (width, height) = if direction == "row" {
        layout_row(&mut g, children, target_total_width, padding, gap)
    } else {
        layout_column(&mut g, children, target_total_width, padding, gap)
    };

    if bg_class.is_some() || bg_style.is_some() {
        let mut rect = Element::svg("rect");
        rect.set_attribute("x", "0");
        rect.set_attribute("y", "0");
        rect.set_attribute("width", fmt_num(width));
        rect.set_attribute("height", fmt_num(height));
        if let Some(class) = bg_class {
            rect.set_attribute("class", class);
        }
        if let Some(style) = bg_style {
            rect.set_attribute("style", style);
        }
        g.children.insert(0, rect);
    }

    Ok((g, width, height))
}

fn wrap_child(child: Element, tx: f64, ty: f64) -> Element {
    let mut wrapper = Element::svg("g");
    wrapper.set_attribute(
        "transform",
        format!("translate({}, {})", fmt_num(tx), fmt_num(ty)),
    );
    wrapper.children.push(child);
    wrapper
}

fn layout_column(
    container: &mut Element,
    children: Vec<(Element, f64, f64)>,
    target_total_width: Option<f64>,
    padding: f64,
    gap: f64,
) -> (f64, f64) {
    let count = children.len();
    let max_child_width = children
        .iter()
        .map(|(_, w, _)| *w)
        .fold(0.0, f64::max);
    let interior_width = match target_total_width {
        Some(target) => (target - 2.0 * padding).max(0.0).max(max_child_width),
        None => max_child_width,
    };

    let mut y_cursor = padding;
    for (child, _, child_height) in children {
        container.children.push(wrap_child(child, padding, y_cursor));
        y_cursor += child_height + gap;
    }
    if count > 0 {
        y_cursor -= gap;
    }

    let interior_height = (y_cursor - padding).max(0.0);
    let total_height = interior_height + 2.0 * padding;
    let mut total_width = interior_width + 2.0 * padding;
    if let Some(target) = target_total_width {
        total_width = total_width.max(target);
    }
    (total_width, total_height)
}

fn layout_row(
    container: &mut Element,
    children: Vec<(Element, f64, f64)>,
    target_total_width: Option<f64>,
    padding: f64,
    gap: f64,
) -> (f64, f64) {
    let count = children.len();
    let mut natural_width: f64 = children.iter().map(|(_, w, _)| *w).sum();
    if count > 0 {
        natural_width += gap * (count - 1) as f64;
    }
    let interior_width = match target_total_width {
        Some(target) => (target - 2.0 * padding).max(0.0).max(natural_width),
        None => natural_width,
    };
    let max_height = children
        .iter()
        .map(|(_, _, h)| *h)
        .fold(0.0, f64::max);

    let mut x_cursor = padding;
    for (child, child_width, _) in children {
        container.children.push(wrap_child(child, x_cursor, padding));
        x_cursor += child_width + gap;
    }

    let mut total_width = interior_width + 2.0 * padding;
    if let Some(target) = target_total_width {
        total_width = total_width.max(target);
    }
    (total_width, max_height + 2.0 * padding)
}
