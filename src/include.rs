// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Filesystem-level composition.
//!
//! `diag:include src x y scale id?` compiles the referenced file with the
//! same shared-template context and splices the compiled children into
//! place under a translate/scale group. Cycles are detected on the
//! canonicalized include stack and depth is capped.

use std::path::PathBuf;

use crate::compile::{compile_tree, CompileContext};
use crate::error::{Error, IncludeError};
use crate::tree::{parse_document, Element};
use crate::units::{fmt_num, parse_length};

/// Recursively expands every `diag:include` under `root`. Sets
/// `any_expanded` when at least one include was replaced, which is what
/// triggers the post-expansion id uniqueness assertion.
pub fn expand_includes(
    root: &mut Element,
    diag_ns: &str,
    ctx: &CompileContext,
    any_expanded: &mut bool,
) -> Result<(), Error> {
    for i in 0..root.children.len() {
        if root.children[i].is(diag_ns, "include") {
            let tail = root.children[i].tail.take();
            let mut wrapper = expand_one(&root.children[i], ctx)?;
            wrapper.tail = tail;
            root.children[i] = wrapper;
            *any_expanded = true;
        } else {
            expand_includes(&mut root.children[i], diag_ns, ctx, any_expanded)?;
        }
    }
    Ok(())
}

fn expand_one(include: &Element, ctx: &CompileContext) -> Result<Element, Error> {
    let src = include
        .attribute("src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            IncludeError::Args("diag:include requires a non-empty 'src' attribute".to_string())
        })?;

    let x = include.attribute("x").and_then(parse_length).unwrap_or(0.0);
    let y = include.attribute("y").and_then(parse_length).unwrap_or(0.0);
    let scale = include
        .attribute("scale")
        .and_then(parse_length)
        .unwrap_or(1.0);
    if scale <= 0.0 {
        return Err(IncludeError::Args(format!(
            "diag:include scale must be > 0, got {}",
            fmt_num(scale)
        ))
        .into());
    }

    if ctx.depth + 1 > ctx.max_depth {
        return Err(IncludeError::Depth(format!(
            "include depth limit ({}) exceeded at \"{}\"",
            ctx.max_depth, src
        ))
        .into());
    }

    let resolved = match ctx.base_dir {
        Some(ref dir) => dir.join(src),
        None => PathBuf::from(src),
    };

    let source = std::fs::read_to_string(&resolved).map_err(|e| {
        IncludeError::NotFound(format!(
            "failed to read include \"{}\": {}",
            resolved.display(),
            e
        ))
    })?;

    let canonical = std::fs::canonicalize(&resolved).unwrap_or_else(|_| resolved.clone());
    if ctx.include_stack.contains(&canonical) {
        return Err(IncludeError::Cycle(format!(
            "include cycle detected at \"{}\"",
            resolved.display()
        ))
        .into());
    }

    let parsed = parse_document(&source).map_err(|e| {
        IncludeError::Parse(format!(
            "failed to parse include \"{}\": {}",
            resolved.display(),
            e
        ))
    })?;
    if parsed.tag.ns.is_none() || parsed.tag.local != "diagram" {
        return Err(IncludeError::Root(format!(
            "include \"{}\" must have a diag:diagram root",
            resolved.display()
        ))
        .into());
    }

    let child_ctx = ctx.child(canonical, resolved.parent().map(|p| p.to_path_buf()));
    let compiled = compile_tree(parsed, &child_ctx)?;

    let mut wrapper = Element::svg("g");
    if let Some(id) = include.attribute("id") {
        wrapper.set_attribute("id", id);
    }
    wrapper.set_attribute(
        "transform",
        format!(
            "translate({} {}) scale({})",
            fmt_num(x),
            fmt_num(y),
            fmt_num(scale)
        ),
    );
    wrapper.children = compiled.children;
    Ok(wrapper)
}

/// Asserts that every `id` attribute in the tree is unique.
pub fn assert_unique_ids(root: &Element) -> Result<(), Error> {
    let mut seen = std::collections::HashSet::new();
    let mut duplicate = None;
    root.walk(&mut |el| {
        if duplicate.is_some() {
            return;
        }
        if let Some(id) = el.attribute("id") {
            if !seen.insert(id.to_string()) {
                duplicate = Some(id.to_string());
            }
        }
    });

    match duplicate {
        Some(id) => Err(IncludeError::IdCollision(format!(
            "duplicate id \"{}\" after include expansion",
            id
        ))
        .into()),
        None => Ok(()),
    }
}
