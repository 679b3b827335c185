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

fn line_coords(svg: &str) -> (f64, f64, f64, f64) {
    let doc = roxmltree::Document::parse(svg).unwrap();
    let line = doc
        .descendants()
        .find(|n| n.has_tag_name((SVG_NS, "line")))
        .expect("no <line> in output");
    let get = |name: &str| line.attribute(name).unwrap().parse::<f64>().unwrap();
    (get("x1"), get("y1"), get("x2"), get("y2"))
}

#[test]
fn absolute_anchors_are_used_verbatim() {
    let svg = compile_ok(
        r#"<diag:anchor id="p" x="40" y="80"/>
           <diag:anchor id="q" x="220" y="80"/>
           <diag:arrow from="p" to="q"/>"#,
    );
    let (x1, y1, x2, y2) = line_coords(&svg);
    assert!((x1 - 40.0).abs() < 0.01);
    assert!((y1 - 80.0).abs() < 0.01);
    assert!((x2 - 220.0).abs() < 0.01);
    assert!((y2 - 80.0).abs() < 0.01);
    assert!(svg.contains(r#"marker-end="url(#diag-arrow-default)""#), "{}", svg);
    assert!(svg.contains(r#"<marker id="diag-arrow-default""#), "{}", svg);
}

#[test]
fn centerline_intersection_wins_for_boxes() {
    let svg = compile_ok(
        r##"<rect id="r1" x="0" y="0" width="100" height="100" fill="#ccc"/>
           <rect id="r2" x="200" y="0" width="100" height="100" fill="#ccc"/>
           <diag:arrow from="r1" to="r2"/>"##,
    );
    let (x1, y1, x2, y2) = line_coords(&svg);
    assert!((x1 - 100.0).abs() < 0.01, "x1={}", x1);
    assert!((y1 - 50.0).abs() < 0.01, "y1={}", y1);
    assert!((x2 - 200.0).abs() < 0.01, "x2={}", x2);
    assert!((y2 - 50.0).abs() < 0.01, "y2={}", y2);
}

#[test]
fn explicit_marker_suppresses_the_default() {
    let svg = compile_ok(
        r#"<diag:anchor id="p" x="0" y="0"/>
           <diag:anchor id="q" x="50" y="0"/>
           <diag:arrow from="p" to="q" marker-end="url(#own)"/>"#,
    );
    assert!(svg.contains(r#"marker-end="url(#own)""#), "{}", svg);
    assert!(!svg.contains("diag-arrow-default"), "{}", svg);
}

#[test]
fn arrow_defaults_and_passthrough_attributes() {
    let svg = compile_ok(
        r##"<diag:anchor id="p" x="0" y="0"/>
           <diag:anchor id="q" x="50" y="0"/>
           <diag:arrow from="p" to="q" stroke="#f00" stroke-dasharray="2 2"/>"##,
    );
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let line = doc
        .descendants()
        .find(|n| n.has_tag_name((SVG_NS, "line")))
        .unwrap();
    assert_eq!(line.attribute("stroke"), Some("#f00"));
    assert_eq!(line.attribute("stroke-dasharray"), Some("2 2"));
    assert_eq!(line.attribute("stroke-width"), Some("1"));
}

#[test]
fn horizontal_label_is_not_rotated() {
    let svg = compile_ok(
        r#"<diag:anchor id="p" x="100" y="0"/>
           <diag:anchor id="q" x="0" y="0"/>
           <diag:arrow from="p" to="q" label="back"/>"#,
    );
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let label = doc
        .descendants()
        .find(|n| n.has_tag_name((SVG_NS, "text")))
        .unwrap();
    assert_eq!(label.text(), Some("back"));
    assert_eq!(label.attribute("text-anchor"), Some("middle"));
    assert!(label.attribute("transform").is_none());
}

#[test]
fn steep_label_rotation_is_readable() {
    let svg = compile_ok(
        r#"<diag:anchor id="p" x="0" y="0"/>
           <diag:anchor id="q" x="10" y="100"/>
           <diag:arrow from="p" to="q" label="down"/>"#,
    );
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let label = doc
        .descendants()
        .find(|n| n.has_tag_name((SVG_NS, "text")))
        .unwrap();
    let transform = label.attribute("transform").unwrap();
    let angle: f64 = transform
        .strip_prefix("rotate(")
        .unwrap()
        .split(' ')
        .next()
        .unwrap()
        .parse()
        .unwrap();
    assert!(angle > -90.0 && angle <= 90.0, "angle={}", angle);
    assert!(angle.abs() >= 15.0, "angle={}", angle);
}

#[test]
fn arrow_in_transformed_group_uses_local_coordinates() {
    let svg = compile_ok(
        r#"<diag:anchor id="p" x="150" y="10"/>
           <diag:anchor id="q" x="250" y="10"/>
           <g transform="translate(100, 0)"><diag:arrow from="p" to="q"/></g>"#,
    );
    let (x1, y1, x2, _) = line_coords(&svg);
    assert!((x1 - 50.0).abs() < 0.01, "x1={}", x1);
    assert!((y1 - 10.0).abs() < 0.01, "y1={}", y1);
    assert!((x2 - 150.0).abs() < 0.01, "x2={}", x2);
}

#[test]
fn unknown_endpoint_is_a_semantic_error() {
    let err = compile_err(
        r#"<rect id="r1" width="10" height="10"/>
           <diag:arrow from="r1" to="ghost"/>"#,
    );
    assert_eq!(err.code(), "E_SVGPP_SEMANTIC");
}

#[test]
fn deprecated_edge_attributes_are_rejected() {
    let err = compile_err(
        r#"<rect id="r1" width="10" height="10"/>
           <rect id="r2" x="40" width="10" height="10"/>
           <diag:arrow from="r1" to="r2" from-edge="right"/>"#,
    );
    assert_eq!(err.code(), "E_SVGPP_SEMANTIC");
    assert!(err.to_string().contains("from-edge"), "{}", err);
}

#[test]
fn duplicate_anchor_ids_are_rejected() {
    let err = compile_err(
        r#"<diag:anchor id="p" x="0" y="0"/>
           <diag:anchor id="p" x="10" y="10"/>
           <diag:anchor id="q" x="50" y="0"/>
           <diag:arrow from="p" to="q"/>"#,
    );
    assert_eq!(err.code(), "E_SVGPP_SEMANTIC");
    assert!(err.to_string().contains("duplicated"), "{}", err);
}

#[test]
fn anchor_colliding_with_element_id_is_rejected() {
    let err = compile_err(
        r#"<rect id="r1" width="10" height="10"/>
           <diag:anchor id="r1" x="0" y="0"/>
           <diag:anchor id="q" x="50" y="0"/>
           <diag:arrow from="r1" to="q"/>"#,
    );
    assert_eq!(err.code(), "E_SVGPP_SEMANTIC");
    assert!(err.to_string().contains("collides"), "{}", err);
}

#[test]
fn anchor_mode_validation() {
    // Absolute and relative at once.
    let err = compile_err(r#"<diag:anchor id="p" x="0" y="0" relative-to="r"/>"#);
    assert!(err.to_string().contains("cannot combine"), "{}", err);

    // Neither mode.
    let err = compile_err(r#"<diag:anchor id="p"/>"#);
    assert!(err.to_string().contains("requires either"), "{}", err);

    // Half an absolute position.
    let err = compile_err(r#"<diag:anchor id="p" x="0"/>"#);
    assert!(err.to_string().contains("both x and y"), "{}", err);

    // A made-up side.
    let err = compile_err(
        r#"<rect id="r" width="10" height="10"/>
           <diag:anchor id="p" relative-to="r" side="diagonal"/>"#,
    );
    assert!(err.to_string().contains("side must be"), "{}", err);
}

#[test]
fn relative_anchor_sits_on_the_box_side() {
    let svg = compile_ok(
        r##"<rect id="r1" x="0" y="0" width="100" height="100" fill="#ccc"/>
           <diag:anchor id="tap" relative-to="r1" side="right" offset-x="5"/>
           <diag:anchor id="q" x="300" y="50"/>
           <diag:arrow from="tap" to="q"/>"##,
    );
    let (x1, y1, _, _) = line_coords(&svg);
    assert!((x1 - 105.0).abs() < 0.01, "x1={}", x1);
    assert!((y1 - 50.0).abs() < 0.01, "y1={}", y1);
}
