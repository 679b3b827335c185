// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The geometry oracle.
//!
//! Layout decisions that depend on real rendered geometry (flex child
//! sizes, document bounds, arrow endpoints) are answered here by parsing
//! the candidate SVG with usvg and reading absolute bounding boxes off the
//! resulting tree. The same machinery rasterizes final documents to PNG.
//! Bounding boxes are reported in the SVG user coordinate space, after all
//! ancestor transforms.

use std::sync::Arc;

use once_cell::sync::Lazy;
use resvg::tiny_skia;
use usvg::fontdb;

use crate::error::Error;
use crate::geom::Rect;

/// One measured element with a non-empty `id`.
#[derive(Clone, Debug)]
pub struct MeasuredNode {
    /// The element's `id` attribute.
    pub id: String,
    /// Absolute bounding box.
    pub bbox: Rect,
}

/// The result of measuring an SVG document.
#[derive(Clone, Debug, Default)]
pub struct Measurement {
    /// Bounding box of all rendered content, if any.
    pub overall: Option<Rect>,
    /// Bounding boxes of every element carrying an `id`, in document order.
    pub nodes: Vec<MeasuredNode>,
}

static SYSTEM_FONTDB: Lazy<Arc<fontdb::Database>> = Lazy::new(|| {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

fn database_for(font_paths: &[String]) -> Arc<fontdb::Database> {
    if font_paths.is_empty() {
        return SYSTEM_FONTDB.clone();
    }

    let mut db = (**SYSTEM_FONTDB).clone();
    for path in font_paths {
        if let Err(e) = db.load_font_file(path) {
            log::warn!("failed to load font file '{}': {}", path, e);
        }
    }
    Arc::new(db)
}

fn parse_tree(svg_text: &str, font_paths: &[String]) -> Result<usvg::Tree, Error> {
    let mut options = usvg::Options::default();
    options.fontdb = database_for(font_paths);
    usvg::Tree::from_str(svg_text, &options)
        .map_err(|e| Error::Internal(format!("SVG measurement failed: {}", e)))
}

/// Measures an SVG document: the overall content box plus a bounding box
/// per `id`-carrying element.
pub fn measure(svg_text: &str, font_paths: &[String]) -> Result<Measurement, Error> {
    let tree = parse_tree(svg_text, font_paths)?;

    let mut measurement = Measurement::default();
    collect_boxes(tree.root(), &mut measurement);
    Ok(measurement)
}

fn collect_boxes(parent: &usvg::Group, out: &mut Measurement) {
    for node in parent.children() {
        let bbox = node
            .abs_layer_bounding_box()
            .map(|r| r.to_rect())
            .unwrap_or(node.abs_bounding_box());
        let rect = Rect::new(
            bbox.x() as f64,
            bbox.y() as f64,
            bbox.right() as f64,
            bbox.bottom() as f64,
        );

        if rect.width() > 0.0 || rect.height() > 0.0 {
            out.overall = Some(match out.overall {
                Some(current) => current.union(&rect),
                None => rect,
            });
        }

        if !node.id().is_empty() {
            out.nodes.push(MeasuredNode {
                id: node.id().to_string(),
                bbox: rect,
            });
        }

        if let usvg::Node::Group(ref group) = node {
            collect_boxes(group, out);
        }
    }
}

/// Rasterizes an SVG document to PNG bytes at the given scale.
pub fn render(svg_text: &str, scale: f64, font_paths: &[String]) -> Result<Vec<u8>, Error> {
    let tree = parse_tree(svg_text, font_paths)?;

    let size = tree.size();
    let width = (size.width() as f64 * scale).ceil().max(1.0) as u32;
    let height = (size.height() as f64 * scale).ceil().max(1.0) as u32;

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| Error::Internal(format!("pixmap allocation {}x{} failed", width, height)))?;

    let ts = tiny_skia::Transform::from_scale(scale as f32, scale as f32);
    resvg::render(&tree, ts, &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| Error::Internal(format!("PNG encoding failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="300" height="100">
        <rect id="r1" x="10" y="20" width="100" height="50" fill="#ccc"/>
    </svg>"##;

    #[test]
    fn measures_rect_by_id() {
        let m = measure(SVG, &[]).unwrap();
        let node = m.nodes.iter().find(|n| n.id == "r1").unwrap();
        assert!((node.bbox.left - 10.0).abs() < 0.01);
        assert!((node.bbox.top - 20.0).abs() < 0.01);
        assert!((node.bbox.right - 110.0).abs() < 0.01);
        assert!((node.bbox.bottom - 70.0).abs() < 0.01);
        let overall = m.overall.unwrap();
        assert!((overall.left - 10.0).abs() < 0.01);
    }

    #[test]
    fn renders_png_bytes() {
        let png = render(SVG, 2.0, &[]).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
}
