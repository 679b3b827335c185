// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Anchors and auto-routed arrows.
//!
//! Arrows are collected before rendering: each `diag:arrow` is replaced in
//! place by an empty sentinel group that remembers where the arrow lived.
//! Once the document is rendered and measured, endpoints are computed from
//! anchor points and bounding boxes, mapped into the sentinel's local
//! coordinate frame by inverting the ancestor transform chain, and emitted
//! as a `<line>` plus an optional label.

use std::collections::HashMap;

use crate::error::Error;
use crate::geom::{parse_transform_list, Rect, Transform};
use crate::oracle::Measurement;
use crate::tree::Element;
use crate::units::{fmt_num, parse_length};

const SLOT_ATTR: &str = "data-diag-arrow-slot";
const DEFAULT_STROKE: &str = "#555";

/// A collected arrow, resolved after layout.
#[derive(Debug)]
pub struct ArrowSpec {
    from_id: String,
    to_id: String,
    slot_id: String,
    label: Option<String>,
    label_size: f64,
    label_fill: String,
    passthrough: Vec<(String, String)>,
}

/// Which point of a bounding box an anchor refers to.
#[derive(Clone, Copy, PartialEq, Debug)]
enum Side {
    Top,
    Bottom,
    Left,
    Right,
    Center,
}

impl Side {
    fn parse(value: &str) -> Option<Side> {
        match value {
            "top" => Some(Side::Top),
            "bottom" => Some(Side::Bottom),
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            "center" => Some(Side::Center),
            _ => None,
        }
    }
}

/// A named point, absolute or relative to an element side.
#[derive(Debug)]
pub struct AnchorSpec {
    id: String,
    x: Option<f64>,
    y: Option<f64>,
    relative_to: Option<String>,
    side: Side,
    offset_x: f64,
    offset_y: f64,
}

/// Validates and gathers every `diag:anchor` in the tree.
pub fn collect_anchors(root: &Element, diag_ns: &str) -> Result<Vec<AnchorSpec>, Error> {
    let mut anchors = Vec::new();
    let mut error = None;

    root.walk(&mut |node| {
        if error.is_some() || !node.is(diag_ns, "anchor") {
            return;
        }

        let id = node.attribute("id").map(str::trim).unwrap_or("");
        if id.is_empty() {
            error = Some(Error::Semantic(
                "diag:anchor requires non-empty 'id' attribute".to_string(),
            ));
            return;
        }

        let x = node.attribute("x").and_then(parse_length);
        let y = node.attribute("y").and_then(parse_length);
        let relative_to = node
            .attribute("relative-to")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        let side_attr = node.attribute("side").unwrap_or("center").trim().to_lowercase();
        let offset_x = node.attribute("offset-x").and_then(parse_length).unwrap_or(0.0);
        let offset_y = node.attribute("offset-y").and_then(parse_length).unwrap_or(0.0);

        let has_abs = x.is_some() || y.is_some();
        let has_rel = relative_to.is_some();
        if has_abs && has_rel {
            error = Some(Error::Semantic(format!(
                "diag:anchor id=\"{}\" cannot combine absolute (x/y) and relative-to modes",
                id
            )));
            return;
        }
        if !has_abs && !has_rel {
            error = Some(Error::Semantic(format!(
                "diag:anchor id=\"{}\" requires either x/y or relative-to",
                id
            )));
            return;
        }
        if has_abs && (x.is_none() || y.is_none()) {
            error = Some(Error::Semantic(format!(
                "diag:anchor id=\"{}\" absolute mode requires both x and y",
                id
            )));
            return;
        }
        let side = match Side::parse(&side_attr) {
            Some(side) => side,
            None => {
                error = Some(Error::Semantic(format!(
                    "diag:anchor id=\"{}\" side must be one of top|bottom|left|right|center",
                    id
                )));
                return;
            }
        };

        anchors.push(AnchorSpec {
            id: id.to_string(),
            x,
            y,
            relative_to,
            side,
            offset_x,
            offset_y,
        });
    });

    match error {
        Some(e) => Err(e),
        None => Ok(anchors),
    }
}

/// Gathers every `diag:arrow` in document order, replacing each one in
/// place by a sentinel group so render order is preserved.
pub fn collect_arrows(root: &mut Element, diag_ns: &str) -> Result<Vec<ArrowSpec>, Error> {
    let mut arrows = Vec::new();
    collect_arrows_in(root, diag_ns, &mut arrows)?;
    Ok(arrows)
}

fn collect_arrows_in(
    node: &mut Element,
    diag_ns: &str,
    arrows: &mut Vec<ArrowSpec>,
) -> Result<(), Error> {
    for i in 0..node.children.len() {
        if node.children[i].is(diag_ns, "arrow") {
            let spec = arrow_spec(&node.children[i], arrows.len())?;
            let mut sentinel = Element::svg("g");
            sentinel.set_attribute(SLOT_ATTR, spec.slot_id.clone());
            node.children[i] = sentinel;
            arrows.push(spec);
        } else {
            collect_arrows_in(&mut node.children[i], diag_ns, arrows)?;
        }
    }
    Ok(())
}

fn arrow_spec(node: &Element, index: usize) -> Result<ArrowSpec, Error> {
    let from_id = node.attribute("from").map(str::trim).unwrap_or("");
    if from_id.is_empty() {
        return Err(Error::Semantic(
            "diag:arrow requires non-empty 'from' attribute".to_string(),
        ));
    }
    let to_id = node.attribute("to").map(str::trim).unwrap_or("");
    if to_id.is_empty() {
        return Err(Error::Semantic(
            "diag:arrow requires non-empty 'to' attribute".to_string(),
        ));
    }

    if node.attribute("from-edge").is_some() || node.attribute("to-edge").is_some() {
        return Err(Error::Semantic(
            "diag:arrow no longer supports from-edge/to-edge; \
             use automatic center-line routing"
                .to_string(),
        ));
    }

    let passthrough = node
        .attributes
        .iter()
        .filter(|a| a.name.ns.is_none())
        .filter(|a| {
            !matches!(
                a.name.local.as_str(),
                "from" | "to" | "label" | "label-size" | "label-fill"
            )
        })
        .map(|a| (a.name.local.clone(), a.value.clone()))
        .collect();

    Ok(ArrowSpec {
        from_id: from_id.to_string(),
        to_id: to_id.to_string(),
        slot_id: format!("diag-arrow-slot-{}", index),
        label: node.attribute("label").map(|s| s.to_string()),
        label_size: node
            .attribute("label-size")
            .and_then(parse_length)
            .unwrap_or(10.0),
        label_fill: node.attribute("label-fill").unwrap_or(DEFAULT_STROKE).to_string(),
        passthrough,
    })
}

/// Emits every collected arrow into the rendered document.
pub fn emit_arrows(
    svg_root: &mut Element,
    arrows: &[ArrowSpec],
    anchors: &[AnchorSpec],
    measurement: &Measurement,
) -> Result<(), Error> {
    let mut bbox_by_id: HashMap<&str, Rect> = HashMap::new();
    for node in &measurement.nodes {
        if bbox_by_id.insert(node.id.as_str(), node.bbox).is_some() {
            return Err(Error::Semantic(format!(
                "duplicate id \"{}\" found while resolving diag:arrow endpoints",
                node.id
            )));
        }
    }

    let mut seen_ids: HashMap<String, usize> = HashMap::new();
    svg_root.walk(&mut |el| {
        if let Some(id) = el.attribute("id") {
            *seen_ids.entry(id.to_string()).or_insert(0) += 1;
        }
    });

    let anchor_points = resolve_anchor_points(anchors, &seen_ids, &bbox_by_id)?;

    // The marker has to exist before slot paths are computed: creating it
    // may insert a <defs> as the first child, which would shift the child
    // indices the paths are made of.
    let needs_marker = arrows.iter().any(|arrow| {
        !arrow
            .passthrough
            .iter()
            .any(|(name, _)| name == "marker-start" || name == "marker-end")
    });
    let default_marker = if needs_marker {
        Some(ensure_default_marker(svg_root))
    } else {
        None
    };

    let slot_paths = find_slot_paths(svg_root);

    for arrow in arrows {
        let from = resolve_endpoint(&arrow.from_id, "from", &anchor_points, &seen_ids, &bbox_by_id)?;
        let to = resolve_endpoint(&arrow.to_id, "to", &anchor_points, &seen_ids, &bbox_by_id)?;

        let (p_from, p_to) = match (from, to) {
            (Endpoint::Anchor(from), Endpoint::Anchor(to)) => (from, to),
            (Endpoint::Anchor(from), Endpoint::Boxed(to_bbox)) => {
                (from, point_on_bbox_toward(&to_bbox, from))
            }
            (Endpoint::Boxed(from_bbox), Endpoint::Anchor(to)) => {
                (point_on_bbox_toward(&from_bbox, to), to)
            }
            (Endpoint::Boxed(from_bbox), Endpoint::Boxed(to_bbox)) => {
                resolve_arrow_points(&from_bbox, &to_bbox)
            }
        };

        // Map the endpoints into the sentinel group's frame; a singular
        // ancestor transform falls back to the document root.
        let mut container_path: &[usize] = &[];
        let mut local_from = p_from;
        let mut local_to = p_to;
        if let Some(path) = slot_paths.get(arrow.slot_id.as_str()) {
            let ctm = ctm_for_path(svg_root, path);
            if let Some(inverse) = ctm.invert() {
                local_from = inverse.apply(p_from.0, p_from.1);
                local_to = inverse.apply(p_to.0, p_to.1);
                container_path = path.as_slice();
            }
        }

        let mut line = Element::svg("line");
        line.set_attribute("x1", fmt_num(local_from.0));
        line.set_attribute("y1", fmt_num(local_from.1));
        line.set_attribute("x2", fmt_num(local_to.0));
        line.set_attribute("y2", fmt_num(local_to.1));
        for (name, value) in &arrow.passthrough {
            line.set_attribute(name, value.clone());
        }
        if line.attribute("stroke").is_none() {
            line.set_attribute("stroke", DEFAULT_STROKE);
        }
        if line.attribute("stroke-width").is_none() {
            line.set_attribute("stroke-width", "1");
        }

        let wants_marker = line.attribute("marker-end").is_none()
            && line.attribute("marker-start").is_none();
        if wants_marker {
            if let Some(ref marker_id) = default_marker {
                line.set_attribute("marker-end", format!("url(#{})", marker_id));
            }
        }

        let container = element_at_path_mut(svg_root, container_path);
        container.children.push(line);

        if let Some(ref label) = arrow.label {
            let label_el = arrow_label(label, arrow, local_from, local_to);
            let container = element_at_path_mut(svg_root, container_path);
            container.children.push(label_el);
        }
    }

    svg_root.walk_mut(&mut |el| el.remove_attribute(SLOT_ATTR));
    Ok(())
}

/// One resolved arrow end: either an anchor point or a measured box.
enum Endpoint {
    Anchor((f64, f64)),
    Boxed(Rect),
}

fn resolve_endpoint(
    id: &str,
    role: &str,
    anchor_points: &HashMap<&str, (f64, f64)>,
    seen_ids: &HashMap<String, usize>,
    bbox_by_id: &HashMap<&str, Rect>,
) -> Result<Endpoint, Error> {
    match anchor_points.get(id) {
        Some(point) => Ok(Endpoint::Anchor(*point)),
        None => endpoint_bbox(id, role, seen_ids, bbox_by_id).map(Endpoint::Boxed),
    }
}

fn endpoint_bbox(
    id: &str,
    role: &str,
    seen_ids: &HashMap<String, usize>,
    bbox_by_id: &HashMap<&str, Rect>,
) -> Result<Rect, Error> {
    match seen_ids.get(id).copied().unwrap_or(0) {
        0 => Err(Error::Semantic(format!(
            "diag:arrow {}=\"{}\" id not found",
            role, id
        ))),
        1 => bbox_by_id.get(id).copied().ok_or_else(|| {
            Error::Semantic(format!(
                "diag:arrow {}=\"{}\" has no measurable bbox",
                role, id
            ))
        }),
        _ => Err(Error::Semantic(format!(
            "diag:arrow {}=\"{}\" is duplicated",
            role, id
        ))),
    }
}

fn resolve_anchor_points<'a>(
    anchors: &'a [AnchorSpec],
    seen_ids: &HashMap<String, usize>,
    bbox_by_id: &HashMap<&str, Rect>,
) -> Result<HashMap<&'a str, (f64, f64)>, Error> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for anchor in anchors {
        *counts.entry(anchor.id.as_str()).or_insert(0) += 1;
    }
    for (id, count) in &counts {
        if *count > 1 {
            return Err(Error::Semantic(format!(
                "diag:anchor id=\"{}\" is duplicated",
                id
            )));
        }
        if seen_ids.get(*id).copied().unwrap_or(0) > 0 {
            return Err(Error::Semantic(format!(
                "diag:anchor id=\"{}\" collides with an existing element id",
                id
            )));
        }
    }

    let mut points = HashMap::new();
    for anchor in anchors {
        let (px, py) = match anchor.relative_to {
            Some(ref target) => {
                match seen_ids.get(target).copied().unwrap_or(0) {
                    0 => {
                        return Err(Error::Semantic(format!(
                            "diag:anchor id=\"{}\" relative-to=\"{}\" id not found",
                            anchor.id, target
                        )))
                    }
                    1 => {}
                    _ => {
                        return Err(Error::Semantic(format!(
                            "diag:anchor id=\"{}\" relative-to=\"{}\" is duplicated",
                            anchor.id, target
                        )))
                    }
                }
                let bbox = bbox_by_id.get(target.as_str()).ok_or_else(|| {
                    Error::Semantic(format!(
                        "diag:anchor id=\"{}\" relative-to=\"{}\" has no measurable bbox",
                        anchor.id, target
                    ))
                })?;
                anchor_point_from_bbox(bbox, anchor.side)
            }
            None => (
                anchor.x.unwrap_or_default(),
                anchor.y.unwrap_or_default(),
            ),
        };
        points.insert(
            anchor.id.as_str(),
            (px + anchor.offset_x, py + anchor.offset_y),
        );
    }
    Ok(points)
}

fn find_slot_paths(root: &Element) -> HashMap<String, Vec<usize>> {
    fn rec(el: &Element, path: &mut Vec<usize>, out: &mut HashMap<String, Vec<usize>>) {
        if let Some(slot) = el.attribute(SLOT_ATTR) {
            out.insert(slot.to_string(), path.clone());
        }
        for (i, child) in el.children.iter().enumerate() {
            path.push(i);
            rec(child, path, out);
            path.pop();
        }
    }

    let mut out = HashMap::new();
    rec(root, &mut Vec::new(), &mut out);
    out
}

fn element_transform(el: &Element) -> Transform {
    match el.attribute("transform") {
        Some(value) => parse_transform_list(value),
        None => Transform::default(),
    }
}

fn ctm_for_path(root: &Element, path: &[usize]) -> Transform {
    let mut ctm = element_transform(root);
    let mut current = root;
    for &index in path {
        current = &current.children[index];
        ctm.append(&element_transform(current));
    }
    ctm
}

fn element_at_path_mut<'a>(root: &'a mut Element, path: &[usize]) -> &'a mut Element {
    let mut current = root;
    for &index in path {
        current = &mut current.children[index];
    }
    current
}

fn ensure_default_marker(svg_root: &mut Element) -> String {
    let mut existing = std::collections::HashSet::new();
    svg_root.walk(&mut |el| {
        if let Some(id) = el.attribute("id") {
            existing.insert(id.to_string());
        }
    });

    let mut marker_id = "diag-arrow-default".to_string();
    let mut index = 0;
    while existing.contains(&marker_id) {
        index += 1;
        marker_id = format!("diag-arrow-default-{}", index);
    }

    let mut marker = Element::svg("marker");
    marker.set_attribute("id", marker_id.clone());
    marker.set_attribute("viewBox", "0 0 10 10");
    marker.set_attribute("refX", "9");
    marker.set_attribute("refY", "5");
    marker.set_attribute("markerWidth", "6");
    marker.set_attribute("markerHeight", "6");
    marker.set_attribute("orient", "auto");
    let mut head = Element::svg("path");
    head.set_attribute("d", "M 0 0 L 10 5 L 0 10 z");
    head.set_attribute("fill", DEFAULT_STROKE);
    marker.children.push(head);

    let defs = match svg_root
        .children
        .iter()
        .position(|c| c.tag.local == "defs")
    {
        Some(i) => &mut svg_root.children[i],
        None => {
            svg_root.children.insert(0, Element::svg("defs"));
            &mut svg_root.children[0]
        }
    };
    defs.children.push(marker);

    marker_id
}

fn arrow_label(
    label: &str,
    arrow: &ArrowSpec,
    p_from: (f64, f64),
    p_to: (f64, f64),
) -> Element {
    let dx = p_to.0 - p_from.0;
    let dy = p_to.1 - p_from.1;
    let seg_len = (dx * dx + dy * dy).sqrt().max(1e-9);
    let mid_x = (p_from.0 + p_to.0) / 2.0;
    let mid_y = (p_from.1 + p_to.1) / 2.0;

    // Pick the normal that points more upward in screen coordinates to keep
    // labels off the line.
    let n1 = (dy / seg_len, -dx / seg_len);
    let n2 = (-dy / seg_len, dx / seg_len);
    let (nx, ny) = if n1.1 <= n2.1 { n1 } else { n2 };
    let label_offset = (arrow.label_size * 0.25).max(2.0);
    let lx = mid_x + nx * label_offset;
    let ly = mid_y + ny * label_offset;

    let mut angle = dy.atan2(dx).to_degrees();
    // Keep text orientation readable (never upside-down).
    if angle > 90.0 {
        angle -= 180.0;
    } else if angle < -90.0 {
        angle += 180.0;
    }

    let mut text = Element::svg("text");
    text.set_attribute("x", fmt_num(lx));
    text.set_attribute("y", fmt_num(ly));
    text.set_attribute("text-anchor", "middle");
    text.set_attribute("font-size", fmt_num(arrow.label_size));
    text.set_attribute("fill", arrow.label_fill.clone());
    text.set_attribute("dominant-baseline", "alphabetic");
    if angle.abs() >= 15.0 {
        text.set_attribute(
            "transform",
            format!("rotate({} {} {})", fmt_num(angle), fmt_num(lx), fmt_num(ly)),
        );
    }
    text.text = Some(label.to_string());
    text
}

fn anchor_point_from_bbox(bbox: &Rect, side: Side) -> (f64, f64) {
    let (mid_x, mid_y) = bbox.center();
    match side {
        Side::Top => (mid_x, bbox.top),
        Side::Bottom => (mid_x, bbox.bottom),
        Side::Left => (bbox.left, mid_y),
        Side::Right => (bbox.right, mid_y),
        Side::Center => (mid_x, mid_y),
    }
}

/// Shoots a ray from `origin` toward `toward` and returns its first
/// intersection with the rect boundary, if any.
pub(crate) fn ray_rect_intersection(
    origin: (f64, f64),
    toward: (f64, f64),
    bbox: &Rect,
) -> Option<(f64, f64)> {
    let (ox, oy) = origin;
    let dx = toward.0 - ox;
    let dy = toward.1 - oy;
    if dx.abs() < 1e-12 && dy.abs() < 1e-12 {
        return None;
    }

    let mut best: Option<(f64, f64, f64)> = None;
    let mut consider = |t: f64, x: f64, y: f64| {
        if t <= 1e-12 {
            return;
        }
        if best.map_or(true, |(bt, _, _)| t < bt) {
            best = Some((t, x, y));
        }
    };

    if dx.abs() > 1e-12 {
        for x in [bbox.left, bbox.right] {
            let t = (x - ox) / dx;
            if t > 1e-12 {
                let y = oy + t * dy;
                if bbox.top - 1e-9 <= y && y <= bbox.bottom + 1e-9 {
                    consider(t, x, y);
                }
            }
        }
    }
    if dy.abs() > 1e-12 {
        for y in [bbox.top, bbox.bottom] {
            let t = (y - oy) / dy;
            if t > 1e-12 {
                let x = ox + t * dx;
                if bbox.left - 1e-9 <= x && x <= bbox.right + 1e-9 {
                    consider(t, x, y);
                }
            }
        }
    }

    best.map(|(_, x, y)| (x, y))
}

fn point_on_bbox_toward(bbox: &Rect, toward: (f64, f64)) -> (f64, f64) {
    let center = bbox.center();
    ray_rect_intersection(center, toward, bbox).unwrap_or(center)
}

/// Endpoint policy for two plain boxes: prefer the center-line solution and
/// fall back to the closest pair over edge/center combinations.
fn resolve_arrow_points(from_bbox: &Rect, to_bbox: &Rect) -> ((f64, f64), (f64, f64)) {
    if let Some(points) = resolve_centerline(from_bbox, to_bbox) {
        return points;
    }

    const CANDIDATES: [&str; 5] = ["right", "left", "bottom", "top", "center"];

    let mut best: Option<(f64, usize, (f64, f64), (f64, f64))> = None;
    for (fi, from_edge) in CANDIDATES.iter().enumerate() {
        for (ti, to_edge) in CANDIDATES.iter().enumerate() {
            let (p1, p2) = points_for_edges(from_bbox, to_bbox, from_edge, to_edge);
            let dist = ((p2.0 - p1.0).powi(2) + (p2.1 - p1.1).powi(2)).sqrt();
            let tie = fi * 10 + ti;
            let better = match best {
                None => true,
                Some((best_dist, best_tie, _, _)) => {
                    dist < best_dist - 1e-9
                        || ((dist - best_dist).abs() <= 1e-9 && tie < best_tie)
                }
            };
            if better {
                best = Some((dist, tie, p1, p2));
            }
        }
    }

    let (_, _, p1, p2) = best.expect("candidate set is never empty");
    (p1, p2)
}

fn resolve_centerline(
    from_bbox: &Rect,
    to_bbox: &Rect,
) -> Option<((f64, f64), (f64, f64))> {
    let c1 = from_bbox.center();
    let c2 = to_bbox.center();
    if (c1.0 - c2.0).abs() <= 1e-9 && (c1.1 - c2.1).abs() <= 1e-9 {
        return None;
    }
    let p1 = ray_rect_intersection(c1, c2, from_bbox)?;
    let p2 = ray_rect_intersection(c2, c1, to_bbox)?;
    Some((p1, p2))
}

fn points_for_edges(
    from_bbox: &Rect,
    to_bbox: &Rect,
    from_edge: &str,
    to_edge: &str,
) -> ((f64, f64), (f64, f64)) {
    match (from_edge, to_edge) {
        ("center", "center") => (from_bbox.center(), to_bbox.center()),
        ("center", _) => {
            let p1 = from_bbox.center();
            (p1, nearest_point_on_edge(to_bbox, to_edge, p1))
        }
        (_, "center") => {
            let p2 = to_bbox.center();
            (nearest_point_on_edge(from_bbox, from_edge, p2), p2)
        }
        _ => {
            let seg1 = edge_segment(from_bbox, from_edge);
            let seg2 = edge_segment(to_bbox, to_edge);
            closest_points_on_segments(seg1.0, seg1.1, seg2.0, seg2.1)
        }
    }
}

fn edge_segment(bbox: &Rect, edge: &str) -> ((f64, f64), (f64, f64)) {
    match edge {
        "left" => ((bbox.left, bbox.top), (bbox.left, bbox.bottom)),
        "right" => ((bbox.right, bbox.top), (bbox.right, bbox.bottom)),
        "top" => ((bbox.left, bbox.top), (bbox.right, bbox.top)),
        _ => ((bbox.left, bbox.bottom), (bbox.right, bbox.bottom)),
    }
}

fn nearest_point_on_edge(bbox: &Rect, edge: &str, point: (f64, f64)) -> (f64, f64) {
    let ((x1, y1), (x2, y2)) = edge_segment(bbox, edge);
    let vx = x2 - x1;
    let vy = y2 - y1;
    let len_sq = vx * vx + vy * vy;
    if len_sq <= 1e-12 {
        return (x1, y1);
    }
    let t = (((point.0 - x1) * vx + (point.1 - y1) * vy) / len_sq).clamp(0.0, 1.0);
    (x1 + t * vx, y1 + t * vy)
}

/// Standard closest-points algorithm for two 2D segments.
fn closest_points_on_segments(
    p1: (f64, f64),
    q1: (f64, f64),
    p2: (f64, f64),
    q2: (f64, f64),
) -> ((f64, f64), (f64, f64)) {
    let (x1, y1) = p1;
    let (x2, y2) = q1;
    let (x3, y3) = p2;
    let (x4, y4) = q2;

    let (ux, uy) = (x2 - x1, y2 - y1);
    let (vx, vy) = (x4 - x3, y4 - y3);
    let (wx, wy) = (x1 - x3, y1 - y3);

    let a = ux * ux + uy * uy;
    let b = ux * vx + uy * vy;
    let c = vx * vx + vy * vy;
    let d = ux * wx + uy * wy;
    let e = vx * wx + vy * wy;

    let denom = a * c - b * b;
    let mut s_n;
    let mut s_d = denom;
    let mut t_n;
    let mut t_d = denom;

    if denom < 1e-12 {
        s_n = 0.0;
        s_d = 1.0;
        t_n = e;
        t_d = c;
    } else {
        s_n = b * e - c * d;
        t_n = a * e - b * d;
        if s_n < 0.0 {
            s_n = 0.0;
            t_n = e;
            t_d = c;
        } else if s_n > s_d {
            s_n = s_d;
            t_n = e + b;
            t_d = c;
        }
    }

    if t_n < 0.0 {
        t_n = 0.0;
        if -d < 0.0 {
            s_n = 0.0;
        } else if -d > a {
            s_n = s_d;
        } else {
            s_n = -d;
            s_d = a;
        }
    } else if t_n > t_d {
        t_n = t_d;
        if (-d + b) < 0.0 {
            s_n = 0.0;
        } else if (-d + b) > a {
            s_n = s_d;
        } else {
            s_n = -d + b;
            s_d = a;
        }
    }

    let sc = if s_n.abs() < 1e-12 { 0.0 } else { s_n / s_d };
    let tc = if t_n.abs() < 1e-12 { 0.0 } else { t_n / t_d };

    (
        (x1 + sc * ux, y1 + sc * uy),
        (x3 + tc * vx, y3 + tc * vy),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(l: f64, t: f64, w: f64, h: f64) -> Rect {
        Rect::new(l, t, l + w, t + h)
    }

    fn assert_close(a: (f64, f64), b: (f64, f64)) {
        assert!(
            (a.0 - b.0).abs() < 1e-6 && (a.1 - b.1).abs() < 1e-6,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn centerline_hits_facing_edges() {
        let r1 = rect(0.0, 0.0, 100.0, 100.0);
        let r2 = rect(200.0, 0.0, 100.0, 100.0);
        let (p1, p2) = resolve_arrow_points(&r1, &r2);
        assert_close(p1, (100.0, 50.0));
        assert_close(p2, (200.0, 50.0));
    }

    #[test]
    fn centerline_diagonal_stays_on_boundary() {
        let r1 = rect(0.0, 0.0, 100.0, 100.0);
        let r2 = rect(200.0, 200.0, 100.0, 100.0);
        let (p1, p2) = resolve_arrow_points(&r1, &r2);
        assert_close(p1, (100.0, 100.0));
        assert_close(p2, (200.0, 200.0));
    }

    #[test]
    fn coincident_centers_fall_back() {
        let r1 = rect(0.0, 0.0, 100.0, 100.0);
        let r2 = rect(25.0, 25.0, 50.0, 50.0);
        // Same center, so the ray is degenerate; the fallback still yields
        // a deterministic pair of points.
        let (p1, p2) = resolve_arrow_points(&r1, &r2);
        assert!(p1.0.is_finite() && p2.0.is_finite());
        let (q1, q2) = resolve_arrow_points(&r1, &r2);
        assert_close(p1, q1);
        assert_close(p2, q2);
    }

    #[test]
    fn ray_intersection_points_outward() {
        let r = rect(0.0, 0.0, 100.0, 100.0);
        let hit = ray_rect_intersection((50.0, 50.0), (250.0, 50.0), &r).unwrap();
        assert_close(hit, (100.0, 50.0));
        let hit = ray_rect_intersection((50.0, 50.0), (50.0, -10.0), &r).unwrap();
        assert_close(hit, (50.0, 0.0));
    }

    #[test]
    fn anchor_sides() {
        let r = rect(10.0, 20.0, 100.0, 60.0);
        assert_close(anchor_point_from_bbox(&r, Side::Top), (60.0, 20.0));
        assert_close(anchor_point_from_bbox(&r, Side::Bottom), (60.0, 80.0));
        assert_close(anchor_point_from_bbox(&r, Side::Left), (10.0, 50.0));
        assert_close(anchor_point_from_bbox(&r, Side::Right), (110.0, 50.0));
        assert_close(anchor_point_from_bbox(&r, Side::Center), (60.0, 50.0));
    }

    #[test]
    fn closest_points_parallel_segments() {
        let (c1, c2) = closest_points_on_segments(
            (0.0, 0.0),
            (10.0, 0.0),
            (20.0, 5.0),
            (30.0, 5.0),
        );
        assert_close(c1, (10.0, 0.0));
        assert_close(c2, (20.0, 5.0));
    }

    #[test]
    fn label_angle_is_readable() {
        let arrow = ArrowSpec {
            from_id: "a".into(),
            to_id: "b".into(),
            slot_id: "s".into(),
            label: Some("x".into()),
            label_size: 10.0,
            label_fill: "#555".into(),
            passthrough: Vec::new(),
        };
        // Right-to-left arrow: the raw angle is 180, which must normalize
        // to 0 and carry no rotation.
        let label = arrow_label("x", &arrow, (100.0, 0.0), (0.0, 0.0));
        assert!(label.attribute("transform").is_none());

        // A steep downward arrow rotates, within (-90, 90].
        let label = arrow_label("x", &arrow, (0.0, 0.0), (10.0, 100.0));
        let transform = label.attribute("transform").unwrap();
        assert!(transform.starts_with("rotate("));
    }
}
