//! Classifies stylesheet text into plain, pseudo-element, media-query and
//! hover rule collections.
//!
//! This is a block scanner, not a CSS parser: it tracks brace depth, quotes
//! and parentheses, and nothing else. Malformed segments are skipped rather
//! than reported. Only declarations whose property is in
//! [`IMPORTANT_PROPERTIES`](crate::properties::IMPORTANT_PROPERTIES) are kept.

use crate::properties;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// At-rules removed wholesale before anything else is looked at.
const SKIPPED_AT_RULES: &[&str] = &["@keyframes", "@-webkit-keyframes", "@font-face"];

/// A non-pseudo, non-hover, non-media rule with at least one class or id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlainRule {
    pub selector: String,
    pub properties: BTreeSet<String>,
    /// CSS file the rule was read from; empty when parsed from bare text.
    pub source_file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PseudoElement {
    #[serde(rename = "::before")]
    Before,
    #[serde(rename = "::after")]
    After,
}

impl PseudoElement {
    pub fn as_str(&self) -> &'static str {
        match self {
            PseudoElement::Before => "::before",
            PseudoElement::After => "::after",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "::before" | ":before" => Some(PseudoElement::Before),
            "::after" | ":after" => Some(PseudoElement::After),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PseudoElementRule {
    pub parent_selector: String,
    pub pseudo_element: PseudoElement,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaQueryRule {
    pub selector: String,
    pub mixin_name: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoverRule {
    pub parent_selector: String,
    pub properties: BTreeMap<String, String>,
}

/// The four rule buckets produced from one or more stylesheets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub rules: Vec<PlainRule>,
    pub pseudo_rules: Vec<PseudoElementRule>,
    pub media_rules: Vec<MediaQueryRule>,
    pub hover_rules: Vec<HoverRule>,
}

impl RuleSet {
    pub fn extend(&mut self, other: RuleSet) {
        self.rules.extend(other.rules);
        self.pseudo_rules.extend(other.pseudo_rules);
        self.media_rules.extend(other.media_rules);
        self.hover_rules.extend(other.hover_rules);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
            && self.pseudo_rules.is_empty()
            && self.media_rules.is_empty()
            && self.hover_rules.is_empty()
    }
}

/// Parse stylesheet text that has no file of origin.
pub fn parse(css_text: &str) -> RuleSet {
    parse_with_source(css_text, "")
}

/// Parse stylesheet text, tagging plain rules with `source_file`.
pub fn parse_with_source(css_text: &str, source_file: &str) -> RuleSet {
    let mut text = strip_comments(css_text);
    let mut set = RuleSet::default();

    // Collect spans of blocks to splice out, then remove them back to front
    // so earlier offsets stay valid.
    let mut removed: Vec<(usize, usize)> = Vec::new();
    for item in scan_items(&text) {
        let Item::Block {
            prelude,
            body,
            start,
            end,
        } = item
        else {
            continue;
        };
        let lower = prelude.to_ascii_lowercase();
        if SKIPPED_AT_RULES.iter().any(|at| lower.starts_with(at)) {
            removed.push((start, end));
        } else if let Some(condition) = lower.strip_prefix("@media") {
            removed.push((start, end));
            match properties::breakpoint_mixin(condition) {
                Some(mixin) => parse_media_body(body, mixin, &mut set),
                None => debug!("dropping @media block with unknown condition {condition:?}"),
            }
        }
    }
    for (start, end) in removed.into_iter().rev() {
        text.replace_range(start..end, "");
    }

    parse_rule_list(&text, source_file, &mut set);
    set
}

/// Style rules of a rule list, looking through grouping at-rules such as
/// `@supports`, `@layer` and `@container`. Media blocks nested in them are
/// not mapped to breakpoints.
fn parse_rule_list(text: &str, source_file: &str, set: &mut RuleSet) {
    for item in scan_items(text) {
        let Item::Block { prelude, body, .. } = item else {
            continue;
        };
        if !prelude.starts_with('@') {
            parse_style_block(prelude, body, &[], source_file, set);
            continue;
        }
        let lower = prelude.to_ascii_lowercase();
        if lower.starts_with("@media")
            || lower.starts_with("@include")
            || SKIPPED_AT_RULES.iter().any(|at| lower.starts_with(at))
        {
            debug!("skipping nested {prelude:?} block");
            continue;
        }
        parse_rule_list(body, source_file, set);
    }
}

fn parse_media_body(body: &str, mixin: &str, set: &mut RuleSet) {
    for item in scan_items(body) {
        let Item::Block { prelude, body, .. } = item else {
            continue;
        };
        if prelude.starts_with('@') {
            continue;
        }
        let declarations = parse_declarations(&statements(body));
        if declarations.is_empty() {
            continue;
        }
        for selector in split_selector_list(prelude) {
            let (base, pseudos) = split_pseudo(&selector);
            if !pseudos.is_empty() || is_discarded(&base) {
                continue;
            }
            set.media_rules.push(MediaQueryRule {
                selector: base,
                mixin_name: mixin.to_string(),
                properties: declarations.iter().cloned().collect(),
            });
        }
    }
}

/// Parse one `selector-list { body }` pair, recursing into nested blocks with
/// the selectors of this block as parents.
fn parse_style_block(
    prelude: &str,
    body: &str,
    parents: &[String],
    source_file: &str,
    set: &mut RuleSet,
) {
    let selectors = nest_selectors(parents, &split_selector_list(prelude));
    let items = scan_items(body);

    let declarations = parse_declarations(&statements(body));
    if !declarations.is_empty() {
        for selector in &selectors {
            classify(selector, &declarations, source_file, set);
        }
    }

    for item in items {
        if let Item::Block { prelude, body, .. } = item {
            if !prelude.starts_with('@') {
                parse_style_block(prelude, body, &selectors, source_file, set);
            }
        }
    }
}

fn classify(
    selector: &str,
    declarations: &[(String, String)],
    source_file: &str,
    set: &mut RuleSet,
) {
    let (base, pseudos) = split_pseudo(selector);
    if is_discarded(&base) {
        debug!("discarding selector {selector:?}");
        return;
    }
    // Pseudo-elements other than ::before/::after are never meaningful here.
    if pseudos
        .iter()
        .any(|p| p.starts_with("::") && PseudoElement::from_token(p).is_none())
    {
        return;
    }

    if let Some(pseudo_element) = pseudos.iter().find_map(|p| PseudoElement::from_token(p)) {
        set.pseudo_rules.push(PseudoElementRule {
            parent_selector: base,
            pseudo_element,
            properties: declarations.iter().cloned().collect(),
        });
    } else if pseudos.iter().any(|p| p == ":hover") {
        set.hover_rules.push(HoverRule {
            parent_selector: base,
            properties: declarations.iter().cloned().collect(),
        });
    } else {
        set.rules.push(PlainRule {
            selector: base,
            properties: declarations.iter().map(|(name, _)| name.clone()).collect(),
            source_file: source_file.to_string(),
        });
    }
}

/// Selectors that only describe global resets or base elements.
fn is_discarded(selector: &str) -> bool {
    let selector = selector.trim();
    selector.is_empty()
        || selector == "*"
        || selector.starts_with('@')
        || selector.starts_with('[')
        || (!selector.contains('.') && !selector.contains('#'))
}

/// Property/value pairs from a block's top-level statements, restricted to
/// the important properties. `@include font-size(N)` reads back as
/// `font-size: Npx`.
pub fn parse_declarations(statements: &[&str]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for statement in statements {
        let statement = statement.trim();
        let pair = if let Some(rest) = statement.strip_prefix("@include font-size(") {
            rest.strip_suffix(')')
                .map(|size| ("font-size".to_string(), format!("{}px", size.trim())))
        } else {
            statement.split_once(':').map(|(name, value)| {
                let value = value.trim();
                let value = value.strip_suffix("!important").unwrap_or(value).trim();
                (name.trim().to_ascii_lowercase(), value.to_string())
            })
        };
        let Some((name, value)) = pair else {
            continue;
        };
        if value.is_empty() || !properties::is_important(&name) {
            continue;
        }
        match out.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => out.push((name, value)),
        }
    }
    out
}

/// Remove pseudo-class and pseudo-element tokens from a selector, returning
/// the stripped selector and the removed tokens (lowercased, colons kept).
pub fn split_pseudo(selector: &str) -> (String, Vec<String>) {
    let mut base = String::with_capacity(selector.len());
    let mut pseudos = Vec::new();
    let mut chars = selector.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            base.push(ch);
            if let Some(escaped) = chars.next() {
                base.push(escaped);
            }
            continue;
        }
        if ch != ':' {
            base.push(ch);
            continue;
        }
        let mut token = String::from(":");
        if chars.peek() == Some(&':') {
            token.push(':');
            chars.next();
        }
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() || next == '-' || next == '_' {
                token.push(next.to_ascii_lowercase());
                chars.next();
            } else {
                break;
            }
        }
        // Functional pseudo-classes drop their argument too.
        if chars.peek() == Some(&'(') {
            let mut depth = 0usize;
            for next in chars.by_ref() {
                match next {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
        pseudos.push(token);
    }
    (collapse_whitespace(&base), pseudos)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a selector list on top-level commas.
fn split_selector_list(prelude: &str) -> Vec<String> {
    let mut selectors = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in prelude.chars() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                selectors.push(collapse_whitespace(&current));
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    selectors.push(collapse_whitespace(&current));
    selectors.retain(|s| !s.is_empty());
    selectors
}

fn nest_selectors(parents: &[String], children: &[String]) -> Vec<String> {
    if parents.is_empty() {
        return children.to_vec();
    }
    let mut nested = Vec::with_capacity(parents.len() * children.len());
    for parent in parents {
        for child in children {
            if child.contains('&') {
                nested.push(child.replace('&', parent));
            } else {
                nested.push(format!("{parent} {child}"));
            }
        }
    }
    nested
}

/// Remove `/* ... */` comments; an unterminated comment swallows the rest.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item<'a> {
    Statement(&'a str),
    /// `start..end` spans the prelude through the closing brace.
    Block {
        prelude: &'a str,
        body: &'a str,
        start: usize,
        end: usize,
    },
}

fn statements(body: &str) -> Vec<&str> {
    scan_items(body)
        .into_iter()
        .filter_map(|item| match item {
            Item::Statement(text) => Some(text),
            Item::Block { .. } => None,
        })
        .collect()
}

/// Split text into top-level `;`-terminated statements and `{}` blocks.
fn scan_items(text: &str) -> Vec<Item<'_>> {
    let bytes = text.as_bytes();
    let mut items = Vec::new();
    let mut segment_start = 0;
    let mut parens = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            b';' if parens == 0 => {
                push_statement(&mut items, &text[segment_start..i]);
                segment_start = i + 1;
            }
            b'{' => {
                let Some(close) = matching_brace(bytes, i) else {
                    return items;
                };
                items.push(Item::Block {
                    prelude: text[segment_start..i].trim(),
                    body: &text[i + 1..close],
                    start: segment_start,
                    end: close + 1,
                });
                i = close + 1;
                segment_start = i;
                parens = 0;
                continue;
            }
            b'}' => segment_start = i + 1,
            _ => {}
        }
        i += 1;
    }
    push_statement(&mut items, &text[segment_start..]);
    items
}

fn push_statement<'a>(items: &mut Vec<Item<'a>>, text: &'a str) {
    let text = text.trim();
    if !text.is_empty() {
        items.push(Item::Statement(text));
    }
}

fn skip_string(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut j = open + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b if b == quote => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut j = open;
    while j < bytes.len() {
        match bytes[j] {
            b'"' | b'\'' => {
                j = skip_string(bytes, j);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}
