// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Document bounds fitting and the background rect.

use crate::oracle::Measurement;
use crate::tree::Element;
use crate::units::{fmt_num, parse_length};

/// Fits `viewBox`, `width` and `height` to the measured content, inflated
/// by the diagram padding. A user-supplied width/height literal is kept
/// when it is already large enough.
pub fn apply_bounds(
    svg_root: &mut Element,
    measurement: &Measurement,
    original_width: Option<&str>,
    original_height: Option<&str>,
    diagram_padding: f64,
) {
    let overall = match measurement.overall {
        Some(overall) => overall,
        None => return,
    };

    let mut min_x = overall.left;
    let mut min_y = overall.top;
    let mut width = overall.width().max(0.0);
    let mut height = overall.height().max(0.0);
    if diagram_padding > 0.0 {
        min_x -= diagram_padding;
        min_y -= diagram_padding;
        width += 2.0 * diagram_padding;
        height += 2.0 * diagram_padding;
    }
    if width == 0.0 && height == 0.0 {
        return;
    }

    svg_root.set_attribute(
        "viewBox",
        format!(
            "{} {} {} {}",
            fmt_num(min_x),
            fmt_num(min_y),
            fmt_num(width),
            fmt_num(height)
        ),
    );
    ensure_dimension(svg_root, "width", width, original_width);
    ensure_dimension(svg_root, "height", height, original_height);
}

fn ensure_dimension(
    svg_root: &mut Element,
    attr: &str,
    needed: f64,
    original_value: Option<&str>,
) {
    if needed <= 0.0 {
        if let Some(original) = original_value {
            svg_root.set_attribute(attr, original);
            return;
        }
    }
    let numeric = original_value.and_then(parse_length);
    match (original_value, numeric) {
        (Some(original), Some(numeric)) if numeric >= needed => {
            svg_root.set_attribute(attr, original);
        }
        _ => {
            svg_root.set_attribute(attr, fmt_num(needed.max(0.0)));
        }
    }
}

/// Inserts a full-viewBox background rect as the first child unless the
/// diagram background is "none"/"transparent". Defaults to white.
pub fn apply_background(svg_root: &mut Element, background: Option<&str>) {
    let color = match background.map(str::trim) {
        Some("") | None => "#fff",
        Some(value) => value,
    };
    if color.eq_ignore_ascii_case("none") || color.eq_ignore_ascii_case("transparent") {
        return;
    }

    let mut min_x = 0.0;
    let mut min_y = 0.0;
    let mut size: Option<(f64, f64)> = None;

    if let Some(view_box) = svg_root.attribute("viewBox") {
        let parts: Vec<f64> = view_box
            .split(|c: char| c == ' ' || c == ',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() >= 4 {
            min_x = parts[0];
            min_y = parts[1];
            size = Some((parts[2], parts[3]));
        }
    }

    if size.is_none() {
        let width = svg_root.attribute("width").and_then(parse_length);
        let height = svg_root.attribute("height").and_then(parse_length);
        if let (Some(width), Some(height)) = (width, height) {
            min_x = 0.0;
            min_y = 0.0;
            size = Some((width, height));
        }
    }

    let (width, height) = match size {
        Some(size) => size,
        None => return,
    };

    let mut rect = Element::svg("rect");
    rect.set_attribute("x", fmt_num(min_x));
    rect.set_attribute("y", fmt_num(min_y));
    rect.set_attribute("width", fmt_num(width));
    rect.set_attribute("height", fmt_num(height));
    rect.set_attribute("fill", color);
    svg_root.children.insert(0, rect);
}
