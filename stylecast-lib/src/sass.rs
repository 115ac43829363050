//! Renders a [`StyleNode`] tree as nested SCSS.

use crate::style::values;
use crate::tree_builder::{StyleMap, StyleNode};
use serde::{Deserialize, Serialize};

const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SassOptions {
    /// Emit `@include <breakpoint> { ... }` blocks.
    pub emit_media_query_mixins: bool,
    /// Emit an `@include hover() { ... }` block.
    pub emit_hover_mixin: bool,
    /// Rewrite `font-size` as `@include font-size(<px>)`.
    pub emit_font_size_mixin: bool,
}

impl Default for SassOptions {
    fn default() -> Self {
        SassOptions {
            emit_media_query_mixins: true,
            emit_hover_mixin: true,
            emit_font_size_mixin: true,
        }
    }
}

pub fn serialize(tree: &StyleNode, options: &SassOptions) -> String {
    let mut out = String::new();
    write_node(&mut out, tree, 0, true, options);
    out
}

fn write_node(out: &mut String, node: &StyleNode, level: usize, is_root: bool, options: &SassOptions) {
    let pad = INDENT.repeat(level);
    let inner = INDENT.repeat(level + 1);

    out.push_str(&format!("{pad}{} {{\n", node.selector));
    write_declarations(out, &node.styles, level + 1, options);

    for (pseudo, styles) in &node.pseudo_elements {
        if styles.is_empty() {
            continue;
        }
        separate(out);
        out.push_str(&format!("{inner}&{pseudo} {{\n"));
        write_declarations(out, styles, level + 2, options);
        out.push_str(&format!("{inner}}}\n"));
    }

    if options.emit_media_query_mixins {
        for (mixin, styles) in &node.media_queries {
            if styles.is_empty() {
                continue;
            }
            separate(out);
            out.push_str(&format!("{inner}@include {mixin} {{\n"));
            write_declarations(out, styles, level + 2, options);
            out.push_str(&format!("{inner}}}\n"));
        }
    }

    if options.emit_hover_mixin && !node.hover_styles.is_empty() {
        separate(out);
        out.push_str(&format!("{inner}@include hover() {{\n"));
        write_declarations(out, &node.hover_styles, level + 2, options);
        out.push_str(&format!("{inner}}}\n"));
    }

    for child in &node.children {
        separate(out);
        write_node(out, child, level + 1, false, options);
    }

    out.push_str(&format!("{pad}}}\n"));
    if !is_root {
        out.push('\n');
    }
}

/// Blank line before a nested block, unless one is already there or the
/// block opens its parent.
fn separate(out: &mut String) {
    if !out.ends_with("\n\n") && !out.ends_with("{\n") {
        out.push('\n');
    }
}

fn write_declarations(out: &mut String, styles: &StyleMap, level: usize, options: &SassOptions) {
    let pad = INDENT.repeat(level);
    for (property, value) in styles {
        let mixin = (options.emit_font_size_mixin && property == "font-size")
            .then(|| font_size_argument(value))
            .flatten();
        match mixin {
            Some(size) => out.push_str(&format!("{pad}@include font-size({size});\n")),
            None => out.push_str(&format!("{pad}{property}: {value};\n")),
        }
    }
}

/// Pixel size for the font-size mixin: `px` directly, `rem` at 1rem = 10px.
pub fn font_size_argument(value: &str) -> Option<String> {
    let value = value.trim();
    if let Some(px) = values::parse_px(value) {
        return Some(values::format_ratio(px));
    }
    let rem: f64 = value.strip_suffix("rem")?.trim().parse().ok()?;
    Some(values::format_ratio(rem * 10.0))
}
