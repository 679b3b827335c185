// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! PNG rendering, with optional focus cropping.

use crate::error::Error;
use crate::oracle;
use crate::tree::{parse_document, serialize};
use crate::units::fmt_num;

/// Rasterizes SVG text to PNG bytes.
///
/// With a `focus_id`, the viewport is cropped to that element's measured
/// bounding box inflated by `padding`. The focus id must exist; a focus
/// that exists but has no measurable box (off-canvas, display:none)
/// renders the document unchanged.
pub fn render_png(
    svg_text: &str,
    scale: f64,
    focus_id: Option<&str>,
    padding: f64,
    font_paths: &[String],
) -> Result<Vec<u8>, Error> {
    let input = match focus_id {
        Some(focus) => apply_focus_crop(svg_text, focus, padding)?,
        None => svg_text.to_string(),
    };
    oracle::render(&input, scale, font_paths)
}

fn apply_focus_crop(svg_text: &str, focus_id: &str, padding: f64) -> Result<String, Error> {
    let mut root = parse_document(svg_text)?;

    let mut element_exists = false;
    root.walk(&mut |el| {
        if el.attribute("id") == Some(focus_id) {
            element_exists = true;
        }
    });
    if !element_exists {
        return Err(Error::FocusNotFound(focus_id.to_string()));
    }

    let measurement = oracle::measure(svg_text, &[])?;
    let bbox = measurement
        .nodes
        .iter()
        .find(|node| node.id == focus_id)
        .map(|node| node.bbox);
    let bbox = match bbox {
        Some(bbox) => bbox,
        // Exists but has no measurable bbox. Rendering still succeeds.
        None => return Ok(svg_text.to_string()),
    };

    let pad = padding.max(0.0);
    let view_x = bbox.left - pad;
    let view_y = bbox.top - pad;
    let view_w = (bbox.width() + 2.0 * pad).max(1.0);
    let view_h = (bbox.height() + 2.0 * pad).max(1.0);

    root.set_attribute(
        "viewBox",
        format!(
            "{} {} {} {}",
            fmt_num(view_x),
            fmt_num(view_y),
            fmt_num(view_w),
            fmt_num(view_h)
        ),
    );
    root.set_attribute("width", fmt_num(view_w));
    root.set_attribute("height", fmt_num(view_h));
    Ok(serialize(&root))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="300" height="100">
        <rect id="r1" x="10" y="20" width="100" height="50" fill="#ccc"/>
    </svg>"##;

    #[test]
    fn missing_focus_id_is_an_error() {
        match render_png(SVG, 1.0, Some("nope"), 20.0, &[]) {
            Err(Error::FocusNotFound(id)) => assert_eq!(id, "nope"),
            other => panic!("expected FocusNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn focus_crops_the_viewport() {
        let cropped = apply_focus_crop(SVG, "r1", 20.0).unwrap();
        assert!(cropped.contains(r#"viewBox="-10 0 140 90""#), "{}", cropped);
    }

    #[test]
    fn plain_render_produces_png() {
        let png = render_png(SVG, 1.0, None, 20.0, &[]).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
}
