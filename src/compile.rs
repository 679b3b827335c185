// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The compile pipeline.
//!
//! One `compile()` call takes svg++ source through the rewriting passes
//! (templates, includes, styles, graphs, arrow collection), renders the
//! result, fits the bounds and finally emits arrows against the measured
//! geometry. The private namespace is whatever URI the `diagram` root
//! carries; nothing from it survives into the output.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::arrow;
use crate::bounds;
use crate::error::Error;
use crate::fonts;
use crate::graph;
use crate::include;
use crate::oracle;
use crate::render::{self, RenderCtx};
use crate::style::StyleRules;
use crate::template;
use crate::text;
use crate::tree::{parse_document, serialize, Element, QName};
use crate::units::parse_length;

/// Compile configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// Shared template sources, merged before the diagram's own templates
    /// in the given order (later sources win).
    pub shared_template_sources: Vec<String>,
    /// Directory include paths are resolved against; normally the input
    /// file's directory.
    pub base_dir: Option<PathBuf>,
    /// The input file itself, used for include cycle detection.
    pub source_path: Option<PathBuf>,
    /// Maximum include nesting depth.
    pub max_include_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            shared_template_sources: Vec::new(),
            base_dir: None,
            source_path: None,
            max_include_depth: 10,
        }
    }
}

/// Per-invocation compile state carried through include recursion.
pub struct CompileContext<'a> {
    pub(crate) shared_template_sources: &'a [String],
    pub(crate) base_dir: Option<PathBuf>,
    pub(crate) include_stack: Vec<PathBuf>,
    pub(crate) depth: usize,
    pub(crate) max_depth: usize,
}

impl<'a> CompileContext<'a> {
    fn from_options(options: &'a Options) -> Self {
        let mut include_stack = Vec::new();
        if let Some(ref path) = options.source_path {
            include_stack.push(std::fs::canonicalize(path).unwrap_or_else(|_| path.clone()));
        }
        CompileContext {
            shared_template_sources: &options.shared_template_sources,
            base_dir: options.base_dir.clone(),
            include_stack,
            depth: 0,
            max_depth: options.max_include_depth,
        }
    }

    pub(crate) fn child(&self, canonical: PathBuf, base_dir: Option<PathBuf>) -> CompileContext<'a> {
        let mut include_stack = self.include_stack.clone();
        include_stack.push(canonical);
        CompileContext {
            shared_template_sources: self.shared_template_sources,
            base_dir,
            include_stack,
            depth: self.depth + 1,
            max_depth: self.max_depth,
        }
    }
}

/// Converts svg++ markup to plain SVG.
pub fn compile(source: &str, options: &Options) -> Result<String, Error> {
    let ctx = CompileContext::from_options(options);
    let root = parse_document(source)?;
    let svg_root = compile_tree(root, &ctx)?;
    Ok(serialize(&svg_root))
}

/// Compiles an already-parsed diagram tree. Includes re-enter here.
pub(crate) fn compile_tree(mut root: Element, ctx: &CompileContext) -> Result<Element, Error> {
    let diag_ns = match root.tag.ns {
        Some(ref ns) if root.tag.local == "diagram" => ns.clone(),
        _ => {
            return Err(Error::Semantic(
                "input root element must be a namespaced <diag:diagram>".to_string(),
            ))
        }
    };

    let font_paths = collect_font_paths(&root, &diag_ns);
    let original_width = root.attribute("width").map(|s| s.to_string());
    let original_height = root.attribute("height").map(|s| s.to_string());
    let diagram_padding = root
        .attribute_ns(&diag_ns, "padding")
        .and_then(parse_length)
        .filter(|p| *p >= 0.0)
        .unwrap_or(0.0);
    let background = root
        .attribute_ns(&diag_ns, "background")
        .map(|s| s.to_string());

    // Templates: shared sources first, the diagram's own last, so local
    // definitions win.
    let mut templates = template::TemplateTable::new();
    for source in ctx.shared_template_sources {
        let mut parsed = parse_document(source)
            .map_err(|e| Error::Template(format!("failed to parse template source: {}", e)))?;
        if !parsed.is(&diag_ns, "diagram") {
            return Err(Error::Template(
                "template source must use the same diag namespace and a <diag:diagram> root"
                    .to_string(),
            ));
        }
        templates.extend(template::collect_templates(&mut parsed, &diag_ns));
    }
    templates.extend(template::collect_templates(&mut root, &diag_ns));
    template::expand_instances(&mut root, &diag_ns, &templates)?;

    let mut any_included = false;
    include::expand_includes(&mut root, &diag_ns, ctx, &mut any_included)?;
    if any_included {
        include::assert_unique_ids(&root)?;
    }

    let styles = StyleRules::collect(&root);
    let (root_family, root_path) = text::font_family_info(&root, &diag_ns, &styles);

    graph::expand_graphs(
        &mut root,
        &diag_ns,
        &styles,
        root_family.as_deref(),
        root_path.as_deref(),
    )?;

    let anchors = arrow::collect_anchors(&root, &diag_ns)?;
    let arrows = arrow::collect_arrows(&mut root, &diag_ns)?;

    let mut svg_root = Element::svg("svg");
    copy_root_attributes(&root, &mut svg_root, &diag_ns);

    let render_ctx = RenderCtx {
        diag_ns: &diag_ns,
        styles: &styles,
    };
    for child in &root.children {
        if let Some(rendered) = render::render_node(
            child,
            &render_ctx,
            None,
            root_family.as_deref(),
            root_path.as_deref(),
        )? {
            svg_root.children.push(rendered);
        }
    }

    // One measurement serves both bounds fitting and arrow resolution: the
    // background rect inserted between the two carries no id and cannot
    // change either answer.
    let measurement = oracle::measure(&serialize(&svg_root), &font_paths)?;
    bounds::apply_bounds(
        &mut svg_root,
        &measurement,
        original_width.as_deref(),
        original_height.as_deref(),
        diagram_padding,
    );
    bounds::apply_background(&mut svg_root, background.as_deref());

    if !arrows.is_empty() || !anchors.is_empty() {
        arrow::emit_arrows(&mut svg_root, &arrows, &anchors, &measurement)?;
    }

    Ok(svg_root)
}

/// Every `diag:font-path` in the document, expanded and deduplicated, for
/// the geometry oracle.
fn collect_font_paths(root: &Element, diag_ns: &str) -> Vec<String> {
    let mut paths = BTreeSet::new();
    root.walk(&mut |el| {
        if let Some(path) = el.attribute_ns(diag_ns, "font-path") {
            paths.insert(fonts::expand_user(path).to_string_lossy().into_owned());
        }
    });
    paths.into_iter().collect()
}

fn copy_root_attributes(src: &Element, dest: &mut Element, diag_ns: &str) {
    for attr in &src.attributes {
        if attr.name.ns.as_deref() == Some(diag_ns) {
            continue;
        }
        dest.set_attribute_qname(QName::plain(&attr.name.local), attr.value.clone());
    }
}
