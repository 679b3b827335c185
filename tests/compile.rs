// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use svgpp::{compile, Error, Options};

const NS: &str = "https://svgpp.dev/ns";

fn diagram(body: &str) -> String {
    format!(
        r#"<diag:diagram xmlns:diag="{}">{}</diag:diagram>"#,
        NS, body
    )
}

fn compile_ok(body: &str) -> String {
    compile(&diagram(body), &Options::default()).unwrap()
}

fn viewbox(svg: &str) -> Vec<f64> {
    let doc = roxmltree::Document::parse(svg).unwrap();
    doc.root_element()
        .attribute("viewBox")
        .unwrap()
        .split(' ')
        .map(|v| v.parse().unwrap())
        .collect()
}

#[test]
fn flex_emits_translated_group() {
    let svg = compile_ok(
        r#"<diag:flex width="120" padding="8" background-style="fill:#eee">
             <text style="font-size:12px">Ping</text>
           </diag:flex>"#,
    );
    assert!(svg.contains(r#"<g transform="translate(0, 0)""#), "{}", svg);
    assert!(svg.contains("<text"), "{}", svg);
    // The background rect takes the declared width.
    assert!(svg.contains(r#"width="120""#), "{}", svg);
    let vb = viewbox(&svg);
    assert!(vb[2] >= 120.0, "viewBox too narrow: {:?}", vb);
}

#[test]
fn output_is_namespace_clean() {
    let svg = compile_ok(
        r#"<diag:flex padding="4" diag:font-family="serif">
             <text diag:wrap="true" diag:max-width="60">wrapping content here</text>
           </diag:flex>
           <diag:anchor id="p" x="0" y="0"/>
           <diag:anchor id="q" x="50" y="0"/>
           <diag:arrow from="p" to="q"/>"#,
    );
    let doc = roxmltree::Document::parse(&svg).unwrap();
    for node in doc.descendants().filter(|n| n.is_element()) {
        assert_eq!(
            node.tag_name().namespace(),
            Some("http://www.w3.org/2000/svg"),
            "foreign element {:?}",
            node.tag_name()
        );
        for attr in node.attributes() {
            assert!(attr.namespace().is_none(), "foreign attribute {:?}", attr);
            assert_ne!(attr.name(), "data-diag-arrow-slot");
        }
    }
}

#[test]
fn identical_input_compiles_byte_identical() {
    let source = diagram(
        r#"<diag:flex padding="6" gap="4" background-style="fill:#dde">
             <text>alpha</text><text>beta</text>
           </diag:flex>"#,
    );
    let first = compile(&source, &Options::default()).unwrap();
    let second = compile(&source, &Options::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn local_template_beats_shared_sources() {
    let shared_a = diagram(
        r#"<diag:template name="card"><rect id="from-a" width="10" height="10"/></diag:template>"#,
    );
    let shared_b = diagram(
        r#"<diag:template name="card"><rect id="from-b" width="10" height="10"/></diag:template>"#,
    );

    let options = Options {
        shared_template_sources: vec![shared_a.clone(), shared_b.clone()],
        ..Options::default()
    };

    // Among shared sources, the last one wins.
    let svg = compile(
        &diagram(r#"<diag:instance template="card"/>"#),
        &options,
    )
    .unwrap();
    assert!(svg.contains("from-b"), "{}", svg);
    assert!(!svg.contains("from-a"), "{}", svg);

    // The diagram's own definition wins over both.
    let svg = compile(
        &diagram(
            r#"<diag:template name="card"><rect id="local" width="10" height="10"/></diag:template>
               <diag:instance template="card"/>"#,
        ),
        &options,
    )
    .unwrap();
    assert!(svg.contains("local"), "{}", svg);
    assert!(!svg.contains("from-b"), "{}", svg);
}

#[test]
fn background_defaults_to_white() {
    let svg = compile_ok(r##"<rect width="40" height="20" fill="#123"/>"##);
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let first = doc
        .root_element()
        .children()
        .find(|n| n.is_element())
        .unwrap();
    assert_eq!(first.tag_name().name(), "rect");
    assert_eq!(first.attribute("fill"), Some("#fff"));
}

#[test]
fn background_none_is_skipped() {
    let source = format!(
        r##"<diag:diagram xmlns:diag="{}" diag:background="none"><rect width="40" height="20" fill="#123"/></diag:diagram>"##,
        NS
    );
    let svg = compile(&source, &Options::default()).unwrap();
    assert!(!svg.contains("#fff"), "{}", svg);
}

#[test]
fn root_padding_inflates_viewbox() {
    let plain = compile_ok(r##"<rect width="40" height="20" fill="#123"/>"##);
    let padded = compile(
        &format!(
            r##"<diag:diagram xmlns:diag="{}" diag:padding="10"><rect width="40" height="20" fill="#123"/></diag:diagram>"##,
            NS
        ),
        &Options::default(),
    )
    .unwrap();
    let plain_vb = viewbox(&plain);
    let padded_vb = viewbox(&padded);
    assert!((padded_vb[2] - plain_vb[2] - 20.0).abs() < 0.01);
    assert!((padded_vb[0] - (plain_vb[0] - 10.0)).abs() < 0.01);
}

#[test]
fn large_user_width_literal_is_preserved() {
    let source = format!(
        r##"<diag:diagram xmlns:diag="{}" width="640"><rect width="40" height="20" fill="#123"/></diag:diagram>"##,
        NS
    );
    let svg = compile(&source, &Options::default()).unwrap();
    let doc = roxmltree::Document::parse(&svg).unwrap();
    assert_eq!(doc.root_element().attribute("width"), Some("640"));
}

#[test]
fn wrap_produces_tspans() {
    let svg = compile_ok(
        r#"<diag:flex width="120" padding="8">
             <text diag:wrap="true">one two three four five six seven eight nine ten</text>
           </diag:flex>"#,
    );
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let tspans: Vec<_> = doc
        .descendants()
        .filter(|n| n.has_tag_name(("http://www.w3.org/2000/svg", "tspan")))
        .collect();
    assert!(tspans.len() >= 2, "{}", svg);
    assert_eq!(tspans[0].attribute("dy"), Some("0"));
    assert_eq!(tspans[1].attribute("dy"), Some("1.2em"));
    // The text element received a synthesized baseline.
    let text = doc
        .descendants()
        .find(|n| n.has_tag_name(("http://www.w3.org/2000/svg", "text")))
        .unwrap();
    assert!(text.attribute("y").is_some());
}

#[test]
fn unknown_diag_elements_vanish() {
    let svg = compile_ok(r#"<diag:mystery attr="1"><rect width="9" height="9"/></diag:mystery>"#);
    assert!(!svg.contains("mystery"), "{}", svg);
    assert!(!svg.contains(r#"width="9""#), "{}", svg);
}

#[test]
fn malformed_xml_is_a_parse_error() {
    let err = compile("<diag:diagram", &Options::default()).unwrap_err();
    assert_eq!(err.code(), "E_PARSE_XML");
}

#[test]
fn non_diagram_root_is_rejected() {
    let err = compile(
        r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#,
        &Options::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), "E_SVGPP_SEMANTIC");

    let err = compile(
        &format!(r#"<diag:thing xmlns:diag="{}"/>"#, NS),
        &Options::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Semantic(_)));
}

#[test]
fn class_styles_feed_text_measurement() {
    // A 30px class-driven font yields a taller flex than the 16px default.
    let small = compile_ok(r#"<diag:flex padding="0" background-style="fill:#eee"><text>word</text></diag:flex>"#);
    let large = compile_ok(
        r#"<style>.big { font-size: 30px; }</style>
           <diag:flex padding="0" background-style="fill:#eee"><text class="big">word</text></diag:flex>"#,
    );
    let small_vb = viewbox(&small);
    let large_vb = viewbox(&large);
    assert!(
        large_vb[3] > small_vb[3],
        "expected taller text: {:?} vs {:?}",
        large_vb,
        small_vb
    );
}
