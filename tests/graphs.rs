// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use svgpp::{compile, Options};

const NS: &str = "https://svgpp.dev/ns";
const SVG_NS: &str = "http://www.w3.org/2000/svg";

fn diagram(body: &str) -> String {
    format!(
        r#"<diag:diagram xmlns:diag="{}">{}</diag:diagram>"#,
        NS, body
    )
}

fn compile_ok(body: &str) -> String {
    compile(&diagram(body), &Options::default()).unwrap()
}

fn compile_err(body: &str) -> svgpp::Error {
    compile(&diagram(body), &Options::default()).unwrap_err()
}

/// The x of a node wrapper's `translate(x, y)`.
fn node_translation(svg: &str, id: &str) -> (f64, f64) {
    let doc = roxmltree::Document::parse(svg).unwrap();
    let node = doc
        .descendants()
        .find(|n| n.attribute("id") == Some(id))
        .unwrap_or_else(|| panic!("node {} not in output", id));
    let wrapper = node.parent_element().unwrap();
    let transform = wrapper.attribute("transform").unwrap();
    let args = transform
        .strip_prefix("translate(")
        .unwrap()
        .trim_end_matches(')');
    let mut parts = args.split(',').map(|v| v.trim().parse::<f64>().unwrap());
    (parts.next().unwrap(), parts.next().unwrap())
}

// quality="fast" keeps every test on the internal layerer, independent of
// whether Graphviz happens to be installed.
const FAST: &str = r#"quality="fast" layout="layered""#;

#[test]
fn rl_direction_places_targets_further_left() {
    let svg = compile_ok(&format!(
        r#"<diag:graph direction="RL" {}>
             <diag:node id="a"><text>a</text></diag:node>
             <diag:node id="b"><text>b</text></diag:node>
             <diag:edge from="a" to="b"/>
           </diag:graph>"#,
        FAST
    ));
    let (ax, _) = node_translation(&svg, "a");
    let (bx, _) = node_translation(&svg, "b");
    assert!(bx < ax, "bx={} ax={}", bx, ax);
}

#[test]
fn tb_direction_places_targets_below() {
    let svg = compile_ok(&format!(
        r#"<diag:graph direction="TB" {}>
             <diag:node id="a"><text>a</text></diag:node>
             <diag:node id="b"><text>b</text></diag:node>
             <diag:edge from="a" to="b"/>
           </diag:graph>"#,
        FAST
    ));
    let (_, ay) = node_translation(&svg, "a");
    let (_, by) = node_translation(&svg, "b");
    assert!(by > ay, "by={} ay={}", by, ay);
}

#[test]
fn node_gap_grows_the_background_rect() {
    let graph = |gap: u32| {
        compile_ok(&format!(
            r#"<diag:graph {}>
                 <diag:node id="n1" gap="{}" background-style="fill:#eef">
                   <text>first</text><text>second</text>
                 </diag:node>
               </diag:graph>"#,
            FAST, gap
        ))
    };

    let rect_height = |svg: &str| {
        let doc = roxmltree::Document::parse(svg).unwrap();
        let node = doc
            .descendants()
            .find(|n| n.attribute("id") == Some("n1"))
            .unwrap();
        let rect = node
            .children()
            .find(|n| n.has_tag_name((SVG_NS, "rect")))
            .unwrap();
        rect.attribute("height").unwrap().parse::<f64>().unwrap()
    };

    let tight = graph(0);
    let loose = graph(12);
    assert!(
        rect_height(&loose) > rect_height(&tight),
        "{} vs {}",
        rect_height(&loose),
        rect_height(&tight)
    );
}

#[test]
fn edges_get_the_shared_auto_marker() {
    let svg = compile_ok(&format!(
        r#"<diag:graph {}>
             <diag:node id="a"><text>a</text></diag:node>
             <diag:node id="b"><text>b</text></diag:node>
             <diag:edge from="a" to="b"/>
           </diag:graph>"#,
        FAST
    ));
    assert!(svg.contains(r#"<marker id="diag-graph-arrow-default-0""#), "{}", svg);
    assert!(
        svg.contains(r#"marker-end="url(#diag-graph-arrow-default-0)""#),
        "{}",
        svg
    );
    // Edge path defaults.
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let path = doc
        .descendants()
        .filter(|n| n.has_tag_name((SVG_NS, "path")))
        .find(|n| n.attribute("marker-end").is_some())
        .unwrap();
    assert_eq!(path.attribute("stroke"), Some("#555"));
    assert_eq!(path.attribute("fill"), Some("none"));
    assert!(path.attribute("d").unwrap().starts_with('M'));
}

#[test]
fn edge_labels_are_emitted() {
    let svg = compile_ok(&format!(
        r##"<diag:graph {}>
             <diag:node id="a"><text>a</text></diag:node>
             <diag:node id="b"><text>b</text></diag:node>
             <diag:edge from="a" to="b" label="flows" label-size="12" label-fill="#a00"/>
           </diag:graph>"##,
        FAST
    ));
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let label = doc
        .descendants()
        .filter(|n| n.has_tag_name((SVG_NS, "text")))
        .find(|n| n.text() == Some("flows"))
        .unwrap();
    assert_eq!(label.attribute("font-size"), Some("12"));
    assert_eq!(label.attribute("fill"), Some("#a00"));
    assert_eq!(label.attribute("text-anchor"), Some("middle"));
}

#[test]
fn graphs_participate_in_arrow_routing() {
    // An arrow can target a graph node id.
    let svg = compile_ok(&format!(
        r##"<diag:graph {}>
             <diag:node id="a" background-style="fill:#eee"><text>a</text></diag:node>
           </diag:graph>
           <rect id="solo" x="400" y="0" width="50" height="50" fill="#ddd"/>
           <diag:arrow from="a" to="solo"/>"##,
        FAST
    ));
    assert!(svg.contains("<line"), "{}", svg);
}

#[test]
fn self_edges_are_rejected() {
    let err = compile_err(&format!(
        r#"<diag:graph {}>
             <diag:node id="a"><text>a</text></diag:node>
             <diag:edge from="a" to="a"/>
           </diag:graph>"#,
        FAST
    ));
    assert_eq!(err.code(), "E_GRAPH_SELF_EDGE");
}

#[test]
fn unknown_edge_endpoints_are_rejected() {
    let err = compile_err(&format!(
        r#"<diag:graph {}>
             <diag:node id="a"><text>a</text></diag:node>
             <diag:edge from="a" to="nope"/>
           </diag:graph>"#,
        FAST
    ));
    assert_eq!(err.code(), "E_GRAPH_UNKNOWN_NODE");
}

#[test]
fn duplicate_node_ids_are_rejected() {
    let err = compile_err(&format!(
        r#"<diag:graph {}>
             <diag:node id="a"><text>a</text></diag:node>
             <diag:node id="a"><text>again</text></diag:node>
           </diag:graph>"#,
        FAST
    ));
    assert_eq!(err.code(), "E_GRAPH_DUPLICATE_NODE");
}

#[test]
fn node_id_colliding_with_outside_id_is_rejected() {
    let err = compile_err(&format!(
        r#"<rect id="a" width="10" height="10"/>
           <diag:graph {}>
             <diag:node id="a"><text>a</text></diag:node>
           </diag:graph>"#,
        FAST
    ));
    assert_eq!(err.code(), "E_GRAPH_ID_COLLISION");
}

#[test]
fn missing_node_id_is_rejected() {
    let err = compile_err(&format!(
        r#"<diag:graph {}><diag:node><text>a</text></diag:node></diag:graph>"#,
        FAST
    ));
    assert_eq!(err.code(), "E_GRAPH_NODE_MISSING_ID");
}

#[test]
fn nested_graphs_are_rejected() {
    let err = compile_err(&format!(
        r#"<diag:graph {}>
             <diag:graph><diag:node id="x"/></diag:graph>
           </diag:graph>"#,
        FAST
    ));
    assert_eq!(err.code(), "E_GRAPH_NESTED_UNSUPPORTED");
}

#[test]
fn foreign_graph_children_are_rejected() {
    let err = compile_err(&format!(
        r#"<diag:graph {}><rect width="5" height="5"/></diag:graph>"#,
        FAST
    ));
    assert_eq!(err.code(), "E_GRAPH_CHILD_UNSUPPORTED");
}

#[test]
fn invalid_graph_attributes_are_rejected() {
    let err = compile_err(r#"<diag:graph direction="NE"/>"#);
    assert_eq!(err.code(), "E_GRAPH_ARGS");

    let err = compile_err(r#"<diag:graph node-gap="-4"/>"#);
    assert_eq!(err.code(), "E_GRAPH_ARGS");

    let err = compile_err(r#"<diag:graph routing="zigzag"/>"#);
    assert_eq!(err.code(), "E_GRAPH_ARGS");
}

#[test]
fn oversized_graphs_are_rejected() {
    let mut nodes = String::new();
    for i in 0..2001 {
        nodes.push_str(&format!(r#"<diag:node id="n{}"/>"#, i));
    }
    let err = compile_err(&format!(r#"<diag:graph {}>{}</diag:graph>"#, FAST, nodes));
    assert_eq!(err.code(), "E_GRAPH_TOO_LARGE");
}
