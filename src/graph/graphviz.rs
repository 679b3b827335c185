// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Graphviz delegation.
//!
//! When the `dot` binary is on PATH, graph positions come from Graphviz:
//! we emit a DOT document with fixed-size boxes (inches, px/96), run
//! `dot -K<engine> -Tplain` with a bounded deadline and translate the
//! plain output back into pixel coordinates with a top-left origin.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use super::{EdgeSpec, GraphAttrs};
use crate::error::GraphError;

const DOT_TIMEOUT: Duration = Duration::from_secs(5);
const PX_PER_INCH: f64 = 96.0;

/// An edge route reported by Graphviz, in graph-local pixels.
pub struct DotEdge {
    /// Route points; control points of a B-spline for spline routings.
    pub points: Vec<(f64, f64)>,
    /// Label anchor, when a label was given.
    pub label_pos: Option<(f64, f64)>,
}

/// A parsed `-Tplain` layout.
pub struct DotLayout {
    /// Node centers, indexed like the input nodes.
    pub positions: Vec<(f64, f64)>,
    /// Edge routes, indexed like the input edges.
    pub edges: Vec<DotEdge>,
}

/// Looks for the `dot` executable on PATH.
pub fn find_dot() -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(if cfg!(windows) { "dot.exe" } else { "dot" });
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}

fn engine(layout: &str) -> &'static str {
    match layout {
        "circular" => "circo",
        "radial" => "twopi",
        _ => "dot",
    }
}

fn splines(routing: &str, layout: &str) -> &'static str {
    match routing {
        "polyline" => "polyline",
        "ortho" => "ortho",
        "curved" => "curved",
        "line" => "line",
        "spline" => "spline",
        // auto: splines for the layered engine, light curves elsewhere.
        _ => {
            if layout == "layered" {
                "spline"
            } else {
                "curved"
            }
        }
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn generate_dot(attrs: &GraphAttrs, nodes: &[(String, f64, f64)], edges: &[EdgeSpec]) -> String {
    let mut dot = String::new();
    dot.push_str("digraph svgpp {\n");
    dot.push_str(&format!(
        "  graph [rankdir={}, nodesep={:.4}, ranksep={:.4}, splines={}];\n",
        attrs.direction.rankdir(),
        attrs.node_gap / PX_PER_INCH,
        attrs.rank_gap / PX_PER_INCH,
        splines(&attrs.routing, &attrs.layout),
    ));
    dot.push_str("  node [shape=box, fixedsize=true, label=\"\"];\n");

    for (id, width, height) in nodes {
        dot.push_str(&format!(
            "  {} [width={:.4}, height={:.4}];\n",
            quote(id),
            width / PX_PER_INCH,
            height / PX_PER_INCH,
        ));
    }
    for edge in edges {
        let from = quote(&nodes[edge.from].0);
        let to = quote(&nodes[edge.to].0);
        match edge.label {
            Some(ref label) => dot.push_str(&format!(
                "  {} -> {} [label={}];\n",
                from,
                to,
                quote(label)
            )),
            None => dot.push_str(&format!("  {} -> {};\n", from, to)),
        }
    }

    dot.push_str("}\n");
    dot
}

/// Runs `dot` over the graph and parses its plain output.
pub fn layout(
    dot_path: &std::path::Path,
    attrs: &GraphAttrs,
    nodes: &[(String, f64, f64)],
    edges: &[EdgeSpec],
) -> Result<DotLayout, GraphError> {
    let dot_source = generate_dot(attrs, nodes, edges);
    let output = run_dot(dot_path, engine(&attrs.layout), &dot_source)?;
    parse_plain(&output, nodes, edges)
}

fn run_dot(dot_path: &std::path::Path, engine: &str, input: &str) -> Result<String, GraphError> {
    let mut child = Command::new(dot_path)
        .arg(format!("-K{}", engine))
        .arg("-Tplain")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| GraphError::LayoutFailed(format!("failed to spawn dot: {}", e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        // dot may exit before consuming everything; a broken pipe here is
        // reported through the exit status below.
        let _ = stdin.write_all(input.as_bytes());
    }

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let stdout_thread = std::thread::spawn(move || read_all(&mut stdout));
    let stderr_thread = std::thread::spawn(move || read_all(&mut stderr));

    let deadline = Instant::now() + DOT_TIMEOUT;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(GraphError::LayoutFailed(format!(
                        "dot did not finish within {} seconds",
                        DOT_TIMEOUT.as_secs()
                    )));
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                return Err(GraphError::LayoutFailed(format!(
                    "failed to wait for dot: {}",
                    e
                )))
            }
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    if !status.success() {
        return Err(GraphError::LayoutFailed(format!(
            "dot exited with {}: {}",
            status,
            stderr.trim()
        )));
    }

    Ok(stdout)
}

fn read_all(pipe: &mut Option<impl std::io::Read>) -> String {
    let mut buf = String::new();
    if let Some(pipe) = pipe {
        let _ = pipe.read_to_string(&mut buf);
    }
    buf
}

/// Splits one plain-format line into tokens, honoring double quotes and
/// backslash escapes.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut in_token = false;

    for c in line.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

fn parse_number(token: &str) -> Result<f64, GraphError> {
    token.parse().map_err(|_| {
        GraphError::LayoutParse(format!("unexpected number in dot output: \"{}\"", token))
    })
}

fn parse_plain(
    output: &str,
    nodes: &[(String, f64, f64)],
    edges: &[EdgeSpec],
) -> Result<DotLayout, GraphError> {
    let mut graph_height = 0.0;
    let mut scale = 1.0;
    let mut positions: Vec<Option<(f64, f64)>> = vec![None; nodes.len()];
    let mut routed: Vec<Option<DotEdge>> = (0..edges.len()).map(|_| None).collect();

    let to_px = |v: f64, scale: f64| v * scale * PX_PER_INCH;

    for line in output.lines() {
        let tokens = tokenize(line);
        match tokens.first().map(String::as_str) {
            Some("graph") => {
                if tokens.len() < 4 {
                    return Err(GraphError::LayoutParse(
                        "malformed 'graph' line in dot output".to_string(),
                    ));
                }
                scale = parse_number(&tokens[1])?;
                graph_height = parse_number(&tokens[3])?;
            }
            Some("node") => {
                if tokens.len() < 6 {
                    return Err(GraphError::LayoutParse(
                        "malformed 'node' line in dot output".to_string(),
                    ));
                }
                let name = &tokens[1];
                let x = parse_number(&tokens[2])?;
                let y = parse_number(&tokens[3])?;
                if let Some(index) = nodes.iter().position(|(id, _, _)| id == name) {
                    positions[index] = Some((
                        to_px(x, scale),
                        to_px(graph_height - y, scale),
                    ));
                }
            }
            Some("edge") => {
                if tokens.len() < 4 {
                    return Err(GraphError::LayoutParse(
                        "malformed 'edge' line in dot output".to_string(),
                    ));
                }
                let tail = &tokens[1];
                let head = &tokens[2];
                let count: usize = tokens[3].parse().map_err(|_| {
                    GraphError::LayoutParse(format!(
                        "bad edge point count in dot output: \"{}\"",
                        tokens[3]
                    ))
                })?;
                if tokens.len() < 4 + count * 2 {
                    return Err(GraphError::LayoutParse(
                        "truncated 'edge' line in dot output".to_string(),
                    ));
                }

                let mut points = Vec::with_capacity(count);
                for i in 0..count {
                    let x = parse_number(&tokens[4 + i * 2])?;
                    let y = parse_number(&tokens[5 + i * 2])?;
                    points.push((to_px(x, scale), to_px(graph_height - y, scale)));
                }

                let rest = &tokens[4 + count * 2..];
                let label_pos = if rest.len() >= 3 {
                    let lx = parse_number(&rest[1])?;
                    let ly = parse_number(&rest[2])?;
                    Some((to_px(lx, scale), to_px(graph_height - ly, scale)))
                } else {
                    None
                };

                let slot = edges.iter().enumerate().position(|(i, e)| {
                    routed[i].is_none()
                        && &nodes[e.from].0 == tail
                        && &nodes[e.to].0 == head
                });
                if let Some(i) = slot {
                    routed[i] = Some(DotEdge { points, label_pos });
                }
            }
            Some("stop") => break,
            _ => {}
        }
    }

    let positions = positions
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            p.ok_or_else(|| {
                GraphError::LayoutParse(format!(
                    "dot output is missing node \"{}\"",
                    nodes[i].0
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let edges = routed
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            e.ok_or_else(|| {
                GraphError::LayoutParse(format!(
                    "dot output is missing the edge {} -> {}",
                    nodes[edges[i].from].0, nodes[edges[i].to].0
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DotLayout { positions, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Direction;

    fn attrs() -> GraphAttrs {
        GraphAttrs {
            direction: Direction::Tb,
            layout: "layered".to_string(),
            routing: "auto".to_string(),
            quality: "balanced".to_string(),
            node_gap: 24.0,
            rank_gap: 48.0,
            x: 0.0,
            y: 0.0,
            id: None,
        }
    }

    fn edge(from: usize, to: usize, label: Option<&str>) -> EdgeSpec {
        EdgeSpec {
            from,
            to,
            label: label.map(|s| s.to_string()),
            label_size: 10.0,
            label_fill: "#555".to_string(),
            passthrough: Vec::new(),
        }
    }

    #[test]
    fn dot_document_shape() {
        let nodes = vec![
            ("a".to_string(), 96.0, 48.0),
            ("b \"x\"".to_string(), 96.0, 48.0),
        ];
        let edges = vec![edge(0, 1, Some("go"))];
        let dot = generate_dot(&attrs(), &nodes, &edges);
        assert!(dot.contains("rankdir=TB"));
        assert!(dot.contains("\"a\" [width=1.0000, height=0.5000];"));
        assert!(dot.contains(r#""b \"x\"""#));
        assert!(dot.contains("label=\"go\""));
    }

    #[test]
    fn plain_output_round_trips() {
        let nodes = vec![
            ("a".to_string(), 96.0, 48.0),
            ("b".to_string(), 96.0, 48.0),
        ];
        let edges = vec![edge(0, 1, Some("go"))];
        let plain = "graph 1 1.5 2.5\n\
                     node a 0.75 2.25 1 0.5 \"\" solid box black lightgrey\n\
                     node b 0.75 0.25 1 0.5 \"\" solid box black lightgrey\n\
                     edge a b 4 0.75 2.0 0.75 1.5 0.75 1.0 0.75 0.5 go 0.8 1.25 solid black\n\
                     stop\n";
        let layout = parse_plain(plain, &nodes, &edges).unwrap();
        // Y is flipped: 2.25in from the bottom of a 2.5in graph is 0.25in
        // from the top, i.e. 24px.
        assert!((layout.positions[0].0 - 72.0).abs() < 1e-6);
        assert!((layout.positions[0].1 - 24.0).abs() < 1e-6);
        assert!((layout.positions[1].1 - 216.0).abs() < 1e-6);
        assert_eq!(layout.edges[0].points.len(), 4);
        let label = layout.edges[0].label_pos.unwrap();
        assert!((label.0 - 76.8).abs() < 1e-6);
    }

    #[test]
    fn missing_node_is_a_parse_error() {
        let nodes = vec![("a".to_string(), 96.0, 48.0)];
        let result = parse_plain("graph 1 1 1\nstop\n", &nodes, &[]);
        assert!(matches!(result, Err(GraphError::LayoutParse(_))));
    }

    #[test]
    fn tokenizer_honors_quotes() {
        assert_eq!(
            tokenize(r#"node "a b" 1 2"#),
            vec!["node", "a b", "1", "2"]
        );
        assert_eq!(tokenize(r#""x \" y""#), vec![r#"x " y"#]);
    }
}
