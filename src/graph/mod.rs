// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The graph expander.
//!
//! Every `diag:graph` renders its nodes through the flex engine, computes
//! positions (Graphviz when the `dot` binary is available, the internal
//! layered algorithm otherwise) and is replaced in the tree by a plain SVG
//! group with the positioned nodes, auto-routed edge paths and labels.

mod graphviz;
mod layered;

use std::collections::HashSet;

use crate::error::{Error, GraphError};
use crate::flex;
use crate::geom::Rect;
use crate::render::RenderCtx;
use crate::style::StyleRules;
use crate::tree::{Element, QName};
use crate::units::{fmt_num, parse_length};

const MAX_NODES: usize = 2000;
const MAX_EDGES: usize = 8000;

const DEFAULT_NODE_GAP: f64 = 24.0;
const DEFAULT_RANK_GAP: f64 = 48.0;
const DEFAULT_NODE_PADDING: &str = "8";
const DEFAULT_LABEL_SIZE: f64 = 10.0;
const DEFAULT_LABEL_FILL: &str = "#555";

/// Main-axis direction of a layered graph.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Direction {
    /// Top to bottom.
    Tb,
    /// Bottom to top.
    Bt,
    /// Left to right.
    Lr,
    /// Right to left.
    Rl,
}

impl Direction {
    fn parse(value: &str) -> Option<Direction> {
        match value.to_uppercase().as_str() {
            "TB" => Some(Direction::Tb),
            "BT" => Some(Direction::Bt),
            "LR" => Some(Direction::Lr),
            "RL" => Some(Direction::Rl),
            _ => None,
        }
    }

    fn rankdir(self) -> &'static str {
        match self {
            Direction::Tb => "TB",
            Direction::Bt => "BT",
            Direction::Lr => "LR",
            Direction::Rl => "RL",
        }
    }
}

struct GraphAttrs {
    direction: Direction,
    layout: String,
    routing: String,
    quality: String,
    node_gap: f64,
    rank_gap: f64,
    x: f64,
    y: f64,
    id: Option<String>,
}

struct NodeSpec {
    id: String,
    rendered: Element,
    width: f64,
    height: f64,
}

struct EdgeSpec {
    from: usize,
    to: usize,
    label: Option<String>,
    label_size: f64,
    label_fill: String,
    passthrough: Vec<(String, String)>,
}

/// Per-document bookkeeping shared by all graphs: ids declared outside any
/// graph, ids claimed by graph nodes so far, and the monotonic index used
/// for unique marker ids.
struct GraphExpansionState {
    outside_ids: HashSet<String>,
    node_ids: HashSet<String>,
    graph_index: usize,
}

/// Replaces every `diag:graph` in the tree by its rendered SVG group.
pub fn expand_graphs(
    root: &mut Element,
    diag_ns: &str,
    styles: &StyleRules,
    family: Option<&str>,
    path: Option<&str>,
) -> Result<(), Error> {
    let mut outside_ids = HashSet::new();
    collect_outside_ids(root, diag_ns, false, &mut outside_ids);

    let mut state = GraphExpansionState {
        outside_ids,
        node_ids: HashSet::new(),
        graph_index: 0,
    };
    let ctx = RenderCtx { diag_ns, styles };
    expand_in(root, diag_ns, &ctx, family, path, &mut state)
}

fn collect_outside_ids(el: &Element, diag_ns: &str, in_graph: bool, out: &mut HashSet<String>) {
    let in_graph = in_graph || el.is(diag_ns, "graph");
    if !in_graph {
        if let Some(id) = el.attribute("id") {
            out.insert(id.to_string());
        }
    }
    for child in &el.children {
        collect_outside_ids(child, diag_ns, in_graph, out);
    }
}

fn expand_in(
    node: &mut Element,
    diag_ns: &str,
    ctx: &RenderCtx,
    family: Option<&str>,
    path: Option<&str>,
    state: &mut GraphExpansionState,
) -> Result<(), Error> {
    for i in 0..node.children.len() {
        if node.children[i].is(diag_ns, "graph") {
            let tail = node.children[i].tail.take();
            let mut expanded = expand_one(&node.children[i], diag_ns, ctx, family, path, state)?;
            expanded.tail = tail;
            node.children[i] = expanded;
        } else {
            expand_in(&mut node.children[i], diag_ns, ctx, family, path, state)?;
        }
    }
    Ok(())
}

fn parse_attrs(graph: &Element) -> Result<GraphAttrs, GraphError> {
    let direction_attr = graph.attribute("direction").unwrap_or("TB");
    let direction = Direction::parse(direction_attr).ok_or_else(|| {
        GraphError::Args(format!(
            "diag:graph direction must be one of TB|BT|LR|RL, got \"{}\"",
            direction_attr
        ))
    })?;

    let layout = graph.attribute("layout").unwrap_or("layered").to_lowercase();
    if !matches!(layout.as_str(), "layered" | "circular" | "radial") {
        return Err(GraphError::Args(format!(
            "diag:graph layout must be one of layered|circular|radial, got \"{}\"",
            layout
        )));
    }

    let routing = graph.attribute("routing").unwrap_or("auto").to_lowercase();
    if !matches!(
        routing.as_str(),
        "auto" | "spline" | "polyline" | "ortho" | "curved" | "line"
    ) {
        return Err(GraphError::Args(format!(
            "diag:graph routing must be one of auto|spline|polyline|ortho|curved|line, got \"{}\"",
            routing
        )));
    }

    let quality = graph.attribute("quality").unwrap_or("balanced").to_lowercase();
    if !matches!(quality.as_str(), "fast" | "balanced" | "high") {
        return Err(GraphError::Args(format!(
            "diag:graph quality must be one of fast|balanced|high, got \"{}\"",
            quality
        )));
    }

    let node_gap = parse_gap(graph, "node-gap", DEFAULT_NODE_GAP)?;
    let rank_gap = parse_gap(graph, "rank-gap", DEFAULT_RANK_GAP)?;
    let x = parse_coord(graph, "x")?;
    let y = parse_coord(graph, "y")?;

    Ok(GraphAttrs {
        direction,
        layout,
        routing,
        quality,
        node_gap,
        rank_gap,
        x,
        y,
        id: graph.attribute("id").map(|s| s.to_string()),
    })
}

fn parse_gap(graph: &Element, name: &str, default: f64) -> Result<f64, GraphError> {
    match graph.attribute(name) {
        None => Ok(default),
        Some(value) => match parse_length(value) {
            Some(v) if v >= 0.0 => Ok(v),
            _ => Err(GraphError::Args(format!(
                "diag:graph {} must be a nonnegative number, got \"{}\"",
                name, value
            ))),
        },
    }
}

fn parse_coord(graph: &Element, name: &str) -> Result<f64, GraphError> {
    match graph.attribute(name) {
        None => Ok(0.0),
        Some(value) => parse_length(value).ok_or_else(|| {
            GraphError::Args(format!(
                "diag:graph {} must be a number, got \"{}\"",
                name, value
            ))
        }),
    }
}

fn expand_one(
    graph: &Element,
    diag_ns: &str,
    ctx: &RenderCtx,
    family: Option<&str>,
    path: Option<&str>,
    state: &mut GraphExpansionState,
) -> Result<Element, Error> {
    let attrs = parse_attrs(graph)?;
    let graph_index = state.graph_index;
    state.graph_index += 1;

    // Split children into node and edge declarations, document order.
    let mut node_elements: Vec<&Element> = Vec::new();
    let mut edge_elements: Vec<&Element> = Vec::new();
    for child in &graph.children {
        if child.is(diag_ns, "node") {
            node_elements.push(child);
        } else if child.is(diag_ns, "edge") {
            edge_elements.push(child);
        } else if child.is(diag_ns, "graph") {
            return Err(GraphError::NestedUnsupported(
                "diag:graph cannot contain another diag:graph".to_string(),
            )
            .into());
        } else {
            return Err(GraphError::ChildUnsupported(format!(
                "diag:graph only allows diag:node and diag:edge children, got <{}>",
                child.tag.local
            ))
            .into());
        }
    }

    if node_elements.len() > MAX_NODES {
        return Err(GraphError::TooLarge(format!(
            "diag:graph has {} nodes, the limit is {}",
            node_elements.len(),
            MAX_NODES
        ))
        .into());
    }
    if edge_elements.len() > MAX_EDGES {
        return Err(GraphError::TooLarge(format!(
            "diag:graph has {} edges, the limit is {}",
            edge_elements.len(),
            MAX_EDGES
        ))
        .into());
    }

    // Validate node ids before any rendering.
    let mut local_ids: Vec<String> = Vec::with_capacity(node_elements.len());
    let mut local_set: HashSet<String> = HashSet::new();
    for node in &node_elements {
        let id = node
            .attribute("id")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                GraphError::NodeMissingId("diag:node requires a non-empty 'id' attribute".into())
            })?;

        for descendant_check in &node.children {
            let mut nested = false;
            descendant_check.walk(&mut |el| {
                if el.is(diag_ns, "graph") {
                    nested = true;
                }
            });
            if nested {
                return Err(GraphError::NestedUnsupported(
                    "diag:graph cannot be nested inside a diag:node".to_string(),
                )
                .into());
            }
        }

        if local_set.contains(id) || state.node_ids.contains(id) {
            return Err(GraphError::DuplicateNode(format!(
                "diag:node id \"{}\" is declared more than once",
                id
            ))
            .into());
        }
        if state.outside_ids.contains(id) {
            return Err(GraphError::IdCollision(format!(
                "diag:node id \"{}\" collides with an element id outside the graph",
                id
            ))
            .into());
        }
        local_set.insert(id.to_string());
        local_ids.push(id.to_string());
    }
    state.node_ids.extend(local_set.iter().cloned());

    // Validate edges.
    let mut edges: Vec<EdgeSpec> = Vec::with_capacity(edge_elements.len());
    for edge in &edge_elements {
        let from = edge
            .attribute("from")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                GraphError::Args("diag:edge requires a non-empty 'from' attribute".into())
            })?;
        let to = edge
            .attribute("to")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                GraphError::Args("diag:edge requires a non-empty 'to' attribute".into())
            })?;
        if from == to {
            return Err(GraphError::SelfEdge(format!(
                "diag:edge from \"{}\" to itself is not allowed",
                from
            ))
            .into());
        }
        let from_idx = local_ids
            .iter()
            .position(|id| id.as_str() == from)
            .ok_or_else(|| {
                GraphError::UnknownNode(format!(
                    "diag:edge from=\"{}\" is not a declared node",
                    from
                ))
            })?;
        let to_idx = local_ids
            .iter()
            .position(|id| id.as_str() == to)
            .ok_or_else(|| {
                GraphError::UnknownNode(format!("diag:edge to=\"{}\" is not a declared node", to))
            })?;

        let label_size = edge
            .attribute("label-size")
            .and_then(parse_length)
            .unwrap_or(DEFAULT_LABEL_SIZE);
        let passthrough = edge
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

        edges.push(EdgeSpec {
            from: from_idx,
            to: to_idx,
            label: edge.attribute("label").map(|s| s.to_string()),
            label_size,
            label_fill: edge
                .attribute("label-fill")
                .unwrap_or(DEFAULT_LABEL_FILL)
                .to_string(),
            passthrough,
        });
    }

    // Render node bodies through the flex engine.
    let mut nodes: Vec<NodeSpec> = Vec::with_capacity(node_elements.len());
    for (element, id) in node_elements.iter().zip(&local_ids) {
        nodes.push(render_graph_node(element, id, diag_ns, ctx, family, path)?);
    }

    // Positions: Graphviz when it is worth it and available, otherwise the
    // internal layerer.
    let skip_dot = attrs.quality == "fast" && attrs.layout == "layered";
    let dot_path = if skip_dot { None } else { graphviz::find_dot() };
    let (centers, dot_edges) = match dot_path {
        Some(dot) => {
            let layout = graphviz::layout(&dot, &attrs, &nodes_for_dot(&nodes), &edges)?;
            (layout.positions, Some(layout.edges))
        }
        None => {
            if attrs.layout != "layered" {
                return Err(GraphError::GraphvizUnavailable(format!(
                    "graph layout \"{}\" requires the Graphviz 'dot' executable",
                    attrs.layout
                ))
                .into());
            }
            let sizes: Vec<(f64, f64)> = nodes.iter().map(|n| (n.width, n.height)).collect();
            let dag: Vec<(usize, usize)> = edges.iter().map(|e| (e.from, e.to)).collect();
            let centers = layered::layout(
                &sizes,
                &dag,
                attrs.direction,
                attrs.node_gap,
                attrs.rank_gap,
            );
            (centers, None)
        }
    };

    Ok(emit(graph_index, &attrs, nodes, edges, centers, dot_edges))
}

fn nodes_for_dot(nodes: &[NodeSpec]) -> Vec<(String, f64, f64)> {
    nodes
        .iter()
        .map(|n| (n.id.clone(), n.width, n.height))
        .collect()
}

fn render_graph_node(
    node: &Element,
    id: &str,
    diag_ns: &str,
    ctx: &RenderCtx,
    family: Option<&str>,
    path: Option<&str>,
) -> Result<NodeSpec, Error> {
    let mut flex = Element::new(QName::with_ns(diag_ns, "flex"));
    flex.set_attribute("id", id);
    flex.set_attribute(
        "padding",
        node.attribute("padding").unwrap_or(DEFAULT_NODE_PADDING),
    );
    if let Some(gap) = node.attribute("gap") {
        flex.set_attribute("gap", gap);
    }
    if let Some(width) = node.attribute("width") {
        flex.set_attribute("width", width);
    }
    if let Some(class) = node.attribute("background-class") {
        flex.set_attribute("background-class", class);
    }
    if let Some(style) = node.attribute("background-style") {
        flex.set_attribute("background-style", style);
    }
    flex.children = node.children.clone();

    let (mut rendered, mut width, height) = flex::render_flex(&flex, ctx, None, family, path)?;

    if let Some(min_width) = node.attribute("min-width").and_then(parse_length) {
        if min_width > width {
            width = min_width;
            // Keep the painted box in sync with the layout box.
            if let Some(rect) = rendered
                .children
                .iter_mut()
                .find(|c| c.tag.local == "rect")
            {
                rect.set_attribute("width", fmt_num(width));
            }
        }
    }

    Ok(NodeSpec {
        id: id.to_string(),
        rendered,
        width,
        height,
    })
}

fn emit(
    graph_index: usize,
    attrs: &GraphAttrs,
    nodes: Vec<NodeSpec>,
    edges: Vec<EdgeSpec>,
    centers: Vec<(f64, f64)>,
    dot_edges: Option<Vec<graphviz::DotEdge>>,
) -> Element {
    let mut g = Element::svg("g");
    g.set_attribute(
        "transform",
        format!("translate({}, {})", fmt_num(attrs.x), fmt_num(attrs.y)),
    );
    if let Some(ref id) = attrs.id {
        g.set_attribute("id", id);
    }

    let needs_marker = edges.iter().any(|e| {
        !e.passthrough
            .iter()
            .any(|(name, _)| name == "marker-start" || name == "marker-end")
    });
    let marker_id = format!("diag-graph-arrow-default-{}", graph_index);
    if needs_marker {
        let mut defs = Element::svg("defs");
        defs.children.push(arrow_marker(&marker_id));
        g.children.push(defs);
    }

    let boxes: Vec<Rect> = nodes
        .iter()
        .zip(&centers)
        .map(|(node, &(cx, cy))| {
            Rect::new(
                cx - node.width / 2.0,
                cy - node.height / 2.0,
                cx + node.width / 2.0,
                cy + node.height / 2.0,
            )
        })
        .collect();

    for (node, bbox) in nodes.into_iter().zip(&boxes) {
        let mut wrapper = Element::svg("g");
        wrapper.set_attribute(
            "transform",
            format!("translate({}, {})", fmt_num(bbox.left), fmt_num(bbox.top)),
        );
        wrapper.children.push(node.rendered);
        g.children.push(wrapper);
    }

    let use_curves = match attrs.routing.as_str() {
        "spline" | "curved" => true,
        "auto" => attrs.layout == "layered",
        _ => false,
    };

    for (i, edge) in edges.iter().enumerate() {
        let (mut points, label_pos) = match dot_edges {
            Some(ref layouts) => (layouts[i].points.clone(), layouts[i].label_pos),
            None => (
                vec![boxes[edge.from].center(), boxes[edge.to].center()],
                None,
            ),
        };
        clip_endpoints(&mut points, &boxes[edge.from], &boxes[edge.to]);

        let mut path_el = Element::svg("path");
        path_el.set_attribute("d", path_data(&points, use_curves));
        for (name, value) in &edge.passthrough {
            path_el.set_attribute(name, value.clone());
        }
        if path_el.attribute("stroke").is_none() {
            path_el.set_attribute("stroke", "#555");
        }
        if path_el.attribute("fill").is_none() {
            path_el.set_attribute("fill", "none");
        }
        if path_el.attribute("stroke-width").is_none() {
            path_el.set_attribute("stroke-width", "1");
        }
        let has_marker = edge
            .passthrough
            .iter()
            .any(|(name, _)| name == "marker-start" || name == "marker-end");
        if !has_marker {
            path_el.set_attribute("marker-end", format!("url(#{})", marker_id));
        }
        g.children.push(path_el);

        if let Some(ref label) = edge.label {
            g.children
                .push(edge_label(label, edge, &points, label_pos));
        }
    }

    g
}

fn arrow_marker(id: &str) -> Element {
    let mut marker = Element::svg("marker");
    marker.set_attribute("id", id);
    marker.set_attribute("viewBox", "0 0 10 10");
    marker.set_attribute("refX", "9");
    marker.set_attribute("refY", "5");
    marker.set_attribute("markerWidth", "6");
    marker.set_attribute("markerHeight", "6");
    marker.set_attribute("orient", "auto");
    let mut path = Element::svg("path");
    path.set_attribute("d", "M 0 0 L 10 5 L 0 10 z");
    path.set_attribute("fill", "#555");
    marker.children.push(path);
    marker
}

/// Pulls the first and last points of an edge back onto the node box
/// boundaries, shooting a ray from each box center toward the adjacent
/// route point.
fn clip_endpoints(points: &mut [(f64, f64)], from_box: &Rect, to_box: &Rect) {
    if points.len() < 2 {
        return;
    }
    let toward_first = points[1];
    if let Some(p) = crate::arrow::ray_rect_intersection(from_box.center(), toward_first, from_box)
    {
        points[0] = p;
    }
    let toward_last = points[points.len() - 2];
    if let Some(p) = crate::arrow::ray_rect_intersection(to_box.center(), toward_last, to_box) {
        let last = points.len() - 1;
        points[last] = p;
    }
}

fn path_data(points: &[(f64, f64)], use_curves: bool) -> String {
    let mut d = format!("M {} {}", fmt_num(points[0].0), fmt_num(points[0].1));
    if use_curves && points.len() >= 4 && (points.len() - 1) % 3 == 0 {
        for triple in points[1..].chunks(3) {
            d.push_str(&format!(
                " C {} {} {} {} {} {}",
                fmt_num(triple[0].0),
                fmt_num(triple[0].1),
                fmt_num(triple[1].0),
                fmt_num(triple[1].1),
                fmt_num(triple[2].0),
                fmt_num(triple[2].1),
            ));
        }
    } else {
        for point in &points[1..] {
            d.push_str(&format!(" L {} {}", fmt_num(point.0), fmt_num(point.1)));
        }
    }
    d
}

fn edge_label(
    label: &str,
    edge: &EdgeSpec,
    points: &[(f64, f64)],
    label_pos: Option<(f64, f64)>,
) -> Element {
    let (lx, ly) = label_pos.unwrap_or_else(|| {
        let first = points[0];
        let last = points[points.len() - 1];
        let dx = last.0 - first.0;
        let dy = last.1 - first.1;
        let len = (dx * dx + dy * dy).sqrt().max(1e-9);
        let mid = ((first.0 + last.0) / 2.0, (first.1 + last.1) / 2.0);
        // Prefer the normal pointing up in screen coordinates.
        let n1 = (dy / len, -dx / len);
        let n2 = (-dy / len, dx / len);
        let (nx, ny) = if n1.1 <= n2.1 { n1 } else { n2 };
        let offset = (edge.label_size * 0.25).max(2.0);
        (mid.0 + nx * offset, mid.1 + ny * offset)
    });

    let mut text = Element::svg("text");
    text.set_attribute("x", fmt_num(lx));
    text.set_attribute("y", fmt_num(ly));
    text.set_attribute("text-anchor", "middle");
    text.set_attribute("font-size", fmt_num(edge.label_size));
    text.set_attribute("fill", edge.label_fill.clone());
    text.text = Some(label.to_string());
    text
}
