//! Builds the per-element [`StyleNode`] tree for an inspected element.

use crate::parser::css_rules::{PlainRule, RuleSet};
use crate::properties;
use crate::source_map::SourceMapIndex;
use crate::style::selector_match::{self, StyleSource};
use crate::style::values;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_MAX_DEPTH: usize = 5;

pub type StyleMap = BTreeMap<String, String>;

/// One element of the reconstructed style tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleNode {
    /// Short selector used when nesting (`#id`, `.class`, `tag.class`, `tag`).
    pub selector: String,
    /// Absolute path that re-selects this element.
    pub xpath: String,
    pub tag_name: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub styles: StyleMap,
    /// Keyed by `::before` / `::after`.
    pub pseudo_elements: BTreeMap<String, StyleMap>,
    /// Keyed by breakpoint mixin name.
    pub media_queries: BTreeMap<String, StyleMap>,
    pub hover_styles: StyleMap,
    pub children: Vec<StyleNode>,
    pub depth: usize,
}

impl StyleNode {
    /// Every node in the tree, depth first.
    pub fn iter(&self) -> Vec<&StyleNode> {
        let mut nodes = vec![self];
        for child in &self.children {
            nodes.extend(child.iter());
        }
        nodes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildOptions {
    pub max_depth: usize,
    pub use_source_map: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            max_depth: DEFAULT_MAX_DEPTH,
            use_source_map: true,
        }
    }
}

/// Shorthand selector for nesting: id, else first class (qualified with the
/// tag unless it is a `div`), else the tag.
pub fn node_selector(tag_name: &str, id: Option<&str>, classes: &[String]) -> String {
    match (id, classes.first()) {
        (Some(id), _) if !id.is_empty() => format!("#{id}"),
        (_, Some(class)) if tag_name == "div" => format!(".{class}"),
        (_, Some(class)) => format!("{tag_name}.{class}"),
        _ => tag_name.to_string(),
    }
}

/// Drop computed values that carry no authored intent. `display: none` is
/// always kept.
pub fn meaningful_value<'v>(property: &str, value: &'v str) -> Option<&'v str> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if property == "display" && value == "none" {
        return Some(value);
    }
    if properties::default_values(property).contains(&value)
        || matches!(value, "none" | "normal" | "auto")
    {
        return None;
    }
    Some(value)
}

pub struct StyleTreeBuilder<'a, S: StyleSource> {
    source: &'a S,
    rules: &'a RuleSet,
    index: &'a SourceMapIndex,
    options: BuildOptions,
}

impl<'a, S: StyleSource> StyleTreeBuilder<'a, S> {
    pub fn new(
        source: &'a S,
        rules: &'a RuleSet,
        index: &'a SourceMapIndex,
        options: BuildOptions,
    ) -> Self {
        StyleTreeBuilder {
            source,
            rules,
            index,
            options,
        }
    }

    pub fn build(&self, root: &S::Handle) -> StyleNode {
        self.build_node(root, selector_match::xpath_of(self.source, root), 0)
    }

    fn build_node(&self, element: &S::Handle, xpath: String, depth: usize) -> StyleNode {
        let source = self.source;
        let tag_name = source.tag_name(element);
        let id = source.id(element).filter(|id| !id.is_empty());
        let classes = source.classes(element);
        let font_size = values::parse_px(&source.computed_value(element, "font-size"));

        let matched: Vec<&PlainRule> = if self.options.use_source_map {
            self.rules
                .rules
                .iter()
                .filter(|rule| selector_match::matches(source, element, &rule.selector))
                .collect()
        } else {
            Vec::new()
        };

        let mut styles = StyleMap::new();
        for property in self.candidate_properties(&matched) {
            let computed = source.computed_value(element, property);
            if let Some(value) = meaningful_value(property, &computed) {
                styles.insert(
                    property.to_string(),
                    values::normalize_value(property, value, font_size),
                );
            }
        }

        let mut node = StyleNode {
            selector: node_selector(&tag_name, id.as_deref(), &classes),
            xpath,
            tag_name,
            id,
            classes,
            styles,
            depth,
            ..Default::default()
        };

        if self.options.use_source_map {
            self.remove_redundant_longhands(&mut node.styles, &matched);
            self.attach_rule_styles(&mut node, element, font_size);
        }

        if depth < self.options.max_depth {
            let mut ordinals: BTreeMap<String, usize> = BTreeMap::new();
            for child in source.children(element) {
                let tag = source.tag_name(&child);
                let ordinal = ordinals.entry(tag.clone()).or_insert(0);
                *ordinal += 1;
                let child_xpath = format!("{}/{}[{}]", node.xpath, tag, ordinal);
                node.children
                    .push(self.build_node(&child, child_xpath, depth + 1));
            }
        }
        node
    }

    /// Properties to read for an element, in allow-list order.
    fn candidate_properties(&self, matched: &[&PlainRule]) -> Vec<&'static str> {
        if !self.options.use_source_map {
            return properties::IMPORTANT_PROPERTIES.to_vec();
        }
        let declared: BTreeSet<&str> = matched
            .iter()
            .flat_map(|rule| rule.properties.iter().map(String::as_str))
            .collect();
        let candidates: Vec<&'static str> = properties::IMPORTANT_PROPERTIES
            .iter()
            .copied()
            .filter(|p| declared.contains(p))
            .collect();
        if !candidates.is_empty() {
            return candidates;
        }
        // Selector matching under-matches; fall back to everything authored.
        properties::IMPORTANT_PROPERTIES
            .iter()
            .copied()
            .filter(|p| self.index.all.contains(*p))
            .collect()
    }

    /// Remove longhands of a present shorthand when the source file behind the
    /// matched rules authored only the shorthand.
    fn remove_redundant_longhands(&self, styles: &mut StyleMap, matched: &[&PlainRule]) {
        let files: BTreeSet<&str> = matched.iter().map(|r| r.source_file.as_str()).collect();
        let authored: Vec<&BTreeSet<String>> = if files.is_empty() {
            self.index.by_file.values().collect()
        } else {
            files.iter().filter_map(|f| self.index.file(f)).collect()
        };

        for shorthand in properties::shorthands() {
            if !styles.contains_key(shorthand) {
                continue;
            }
            let longhands = properties::longhands(shorthand);
            let shorthand_only = authored.iter().any(|set| {
                set.contains(shorthand) && !longhands.iter().any(|l| set.contains(*l))
            });
            if shorthand_only {
                for longhand in longhands {
                    if styles.remove(*longhand).is_some() {
                        debug!("dropping {longhand}, only {shorthand} was authored");
                    }
                }
            }
        }
    }

    fn attach_rule_styles(&self, node: &mut StyleNode, element: &S::Handle, font_size: Option<f64>) {
        let source = self.source;
        let normalized = |props: &StyleMap| -> StyleMap {
            props
                .iter()
                .map(|(p, v)| (p.clone(), values::normalize_value(p, v, font_size)))
                .collect()
        };

        for rule in &self.rules.pseudo_rules {
            if selector_match::matches(source, element, &rule.parent_selector) {
                node.pseudo_elements
                    .entry(rule.pseudo_element.as_str().to_string())
                    .or_default()
                    .extend(normalized(&rule.properties));
            }
        }
        for rule in &self.rules.media_rules {
            if selector_match::matches(source, element, &rule.selector) {
                node.media_queries
                    .entry(rule.mixin_name.clone())
                    .or_default()
                    .extend(normalized(&rule.properties));
            }
        }
        for rule in &self.rules.hover_rules {
            if selector_match::matches(source, element, &rule.parent_selector) {
                node.hover_styles.extend(normalized(&rule.properties));
            }
        }
    }
}
