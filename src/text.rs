// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::fonts;
use crate::render::RenderCtx;
use crate::style;
use crate::tree::{Element, QName};
use crate::units::{fmt_num, parse_length};

const DEFAULT_FONT_SIZE: f64 = 16.0;
const DEFAULT_FONT_FAMILY: &str = "sans-serif";

/// Font family and explicit font file resolved from one element.
///
/// Family resolution order: `font-family` attribute, `diag:font-family`,
/// inline `style`, class rules. The explicit path comes only from
/// `diag:font-path`.
pub fn font_family_info(
    node: &Element,
    diag_ns: &str,
    styles: &style::StyleRules,
) -> (Option<String>, Option<String>) {
    let path = node
        .attribute_ns(diag_ns, "font-path")
        .map(|p| fonts::expand_user(p).to_string_lossy().into_owned());

    let mut family = node
        .attribute("font-family")
        .or_else(|| node.attribute_ns(diag_ns, "font-family"))
        .map(|s| s.to_string());

    if family.is_none() {
        if let Some(style_attr) = node.attribute("style") {
            family = style::inline_declaration(style_attr, "font-family");
        }
    }
    if family.is_none() {
        family = styles.resolve(node, "font-family").map(|s| s.to_string());
    }

    let family = family.map(|f| strip_quotes(f.trim()).to_string());
    (family, path)
}

/// Resolves a text element's font size: attribute, inline style, class
/// rules, default 16.
pub fn infer_font_size(node: &Element, styles: &style::StyleRules) -> f64 {
    if let Some(value) = node.attribute("font-size") {
        return parse_length(value).unwrap_or(DEFAULT_FONT_SIZE);
    }
    if let Some(style_attr) = node.attribute("style") {
        if let Some(value) = style::inline_declaration(style_attr, "font-size") {
            if let Some(size) = parse_length(&value) {
                return size;
            }
        }
    }
    if let Some(value) = styles.resolve(node, "font-size") {
        if let Some(size) = parse_length(value) {
            return size;
        }
    }
    DEFAULT_FONT_SIZE
}

/// Renders a `<text>` element, returning the element plus its measured
/// width and height.
///
/// With `diag:wrap="true"` and a width hint the content is re-flowed into
/// one `<tspan>` per line; otherwise the element is cloned as-is (children
/// included) with diag attributes stripped. Either way the resolved family
/// is recorded and a missing `y` is set to the ascent so the glyphs sit at
/// the container's top edge.
pub fn render_text(
    node: &Element,
    ctx: &RenderCtx,
    mut wrap_width_hint: Option<f64>,
    inherited_family: Option<&str>,
    inherited_path: Option<&str>,
) -> (Element, f64, f64) {
    let wrap = node
        .attribute_ns(ctx.diag_ns, "wrap")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if let Some(max_width) = node.attribute_ns(ctx.diag_ns, "max-width") {
        wrap_width_hint = parse_length(max_width).or(wrap_width_hint);
    }

    let font_size = infer_font_size(node, ctx.styles);
    let (local_family, local_path) = font_family_info(node, ctx.diag_ns, ctx.styles);
    let family = local_family
        .or_else(|| inherited_family.map(|s| s.to_string()))
        .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string());
    let path = local_path.or_else(|| inherited_path.map(|s| s.to_string()));

    let metrics = fonts::metrics(font_size, Some(&family), path.as_deref());

    if wrap {
        if let Some(limit) = wrap_width_hint {
            let content = node.gather_text().trim().to_string();
            let lines = wrap_lines(&content, limit, |s| {
                fonts::measure_text(s, font_size, Some(&family), path.as_deref())
            });

            let mut text = Element::new(node.tag.clone());
            text.attributes = node
                .attributes
                .iter()
                .filter(|a| a.name.ns.as_deref() != Some(ctx.diag_ns))
                .cloned()
                .collect();
            apply_font_attribute(&mut text, &family);
            ensure_text_baseline(&mut text, metrics.ascent);

            let base_x = node.attribute("x").unwrap_or("0").to_string();
            let tag = QName {
                ns: node.tag.ns.clone(),
                local: "tspan".to_string(),
            };
            for (i, line) in lines.iter().enumerate() {
                let mut tspan = Element::new(tag.clone());
                tspan.set_attribute("x", base_x.clone());
                tspan.set_attribute("dy", if i == 0 { "0" } else { "1.2em" });
                tspan.text = Some(line.clone());
                text.children.push(tspan);
            }

            let line_count = lines.len().max(1);
            let height = metrics.ascent
                + metrics.descent
                + (line_count - 1) as f64 * metrics.line_height;
            return (text, limit, height);
        }
    }

    let mut text = node.clone_without_namespace(ctx.diag_ns);
    apply_font_attribute(&mut text, &family);
    ensure_text_baseline(&mut text, metrics.ascent);
    let content = node.gather_text().trim().to_string();
    let width = fonts::measure_text(&content, font_size, Some(&family), path.as_deref());
    let height = metrics.ascent + metrics.descent;
    (text, width, height)
}

/// Greedy word wrap. Splits on whitespace (retaining the whitespace chunks
/// so inter-word spacing survives packing) and fills lines up to
/// `width_limit` as measured by `measure`.
pub fn wrap_lines(text: &str, width_limit: f64, measure: impl Fn(&str) -> f64) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for chunk in split_retaining_whitespace(text.trim()) {
        let candidate = if current.is_empty() {
            chunk.to_string()
        } else {
            format!("{}{}", current, chunk)
        };
        if measure(candidate.trim()) <= width_limit {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(current.trim().to_string());
        }
        current = chunk.trim().to_string();
    }
    if !current.is_empty() {
        lines.push(current.trim().to_string());
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn split_retaining_whitespace(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut in_space = None;

    for (i, c) in text.char_indices() {
        let is_space = c.is_whitespace();
        match in_space {
            None => in_space = Some(is_space),
            Some(prev) if prev != is_space => {
                chunks.push(&text[start..i]);
                start = i;
                in_space = Some(is_space);
            }
            _ => {}
        }
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

fn apply_font_attribute(el: &mut Element, family: &str) {
    if el.attribute("font-family").is_none() {
        el.set_attribute("font-family", family);
    }
}

fn ensure_text_baseline(el: &mut Element, ascent: f64) {
    if el.attribute("y").is_none() {
        el.set_attribute("y", fmt_num(ascent));
    }
}

fn strip_quotes(value: &str) -> &str {
    let v = value.as_bytes();
    if v.len() >= 2
        && ((v[0] == b'"' && v[v.len() - 1] == b'"')
            || (v[0] == b'\'' && v[v.len() - 1] == b'\''))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
