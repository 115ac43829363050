use crate::dom::dom_tree::{self, ElementNode, NodeRef};
use crate::style::owned_css::{OwnedDeclaration, OwnedStylesheet};
use std::collections::{BTreeMap, HashSet};

/// ------------------------------
/// 1. Selector Parsing
/// ------------------------------

/// Supported attribute selector operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeOperator {
    /// [attr="value"]
    Exact,
    /// [attr~="value"]
    Includes,
    /// [attr^="value"]
    Prefix,
    /// [attr$="value"]
    Suffix,
    /// [attr*="value"]
    Substring,
    /// [attr|="value"]
    DashMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    pub name: String,
    /// None means only an existence check.
    pub operator: Option<AttributeOperator>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: HashSet<String>,
    pub attributes: Vec<AttributeSelector>,
}

/// A key compound selector plus the compounds to its left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    pub key: CompoundSelector,
    /// Ancestors with their combinators, nearest first.
    pub ancestors: Vec<(Combinator, CompoundSelector)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Descendant combinator (a space).
    Descendant,
    /// Child combinator (`>`).
    Child,
    /// Adjacent sibling combinator (`+`).
    AdjacentSibling,
    /// General sibling combinator (`~`).
    GeneralSibling,
}

/// Parse a compound selector string, e.g. `div.red#header[data-type~="main"]`.
pub fn parse_compound_selector(selector: &str) -> CompoundSelector {
    let mut compound = CompoundSelector::default();
    let mut chars = selector.chars().peekable();
    let mut buffer = String::new();

    if let Some(&ch) = chars.peek() {
        if ch.is_alphabetic() || ch == '*' {
            while let Some(&ch) = chars.peek() {
                if matches!(ch, '#' | '.' | '[') {
                    break;
                }
                buffer.push(ch);
                chars.next();
            }
            if buffer != "*" {
                compound.tag = Some(buffer.to_ascii_lowercase());
            }
            buffer.clear();
        }
    }

    while let Some(ch) = chars.next() {
        match ch {
            '#' | '.' => {
                while let Some(&next) = chars.peek() {
                    if matches!(next, '#' | '.' | '[') {
                        break;
                    }
                    buffer.push(next);
                    chars.next();
                }
                if !buffer.is_empty() {
                    if ch == '#' {
                        compound.id = Some(buffer.clone());
                    } else {
                        compound.classes.insert(buffer.clone());
                    }
                }
                buffer.clear();
            }
            '[' => {
                for next in chars.by_ref() {
                    if next == ']' {
                        break;
                    }
                    buffer.push(next);
                }
                if let Some(attribute) = parse_attribute_selector(&buffer) {
                    compound.attributes.push(attribute);
                }
                buffer.clear();
            }
            _ => {}
        }
    }
    compound
}

/// Parse the inside of `[...]`.
fn parse_attribute_selector(body: &str) -> Option<AttributeSelector> {
    let Some(eq) = body.find('=') else {
        let name = body.trim();
        return (!name.is_empty()).then(|| AttributeSelector {
            name: name.to_string(),
            operator: None,
            value: None,
        });
    };
    let (left, value) = (&body[..eq], &body[eq + 1..]);
    let (name, operator) = match left.chars().last() {
        Some('~') => (&left[..left.len() - 1], AttributeOperator::Includes),
        Some('^') => (&left[..left.len() - 1], AttributeOperator::Prefix),
        Some('$') => (&left[..left.len() - 1], AttributeOperator::Suffix),
        Some('*') => (&left[..left.len() - 1], AttributeOperator::Substring),
        Some('|') => (&left[..left.len() - 1], AttributeOperator::DashMatch),
        _ => (left, AttributeOperator::Exact),
    };
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
    Some(AttributeSelector {
        name: name.to_string(),
        operator: Some(operator),
        value: Some(value.to_string()),
    })
}

/// Parse a complex selector such as `div.red > p#header + span.foo`.
/// Combinators must be separated by whitespace.
pub fn parse_complex_selector(selector: &str) -> Option<ComplexSelector> {
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut pending = None;
    for token in selector.split_whitespace() {
        let combinator = match token {
            ">" => Some(Combinator::Child),
            "+" => Some(Combinator::AdjacentSibling),
            "~" => Some(Combinator::GeneralSibling),
            _ => None,
        };
        if combinator.is_some() {
            pending = combinator;
            continue;
        }
        if !compounds.is_empty() {
            combinators.push(pending.take().unwrap_or(Combinator::Descendant));
        }
        compounds.push(parse_compound_selector(token));
    }
    let key = compounds.pop()?;
    let ancestors = combinators.into_iter().zip(compounds).rev().collect();
    Some(ComplexSelector { key, ancestors })
}

/// ------------------------------
/// 2. Specificity & Cascade
/// ------------------------------

/// Specificity as (id_count, class+attribute_count, tag_count).
pub fn compute_specificity(compound: &CompoundSelector) -> (u32, u32, u32) {
    let id_count = u32::from(compound.id.is_some());
    let class_count = (compound.classes.len() + compound.attributes.len()) as u32;
    let tag_count = u32::from(compound.tag.is_some());
    (id_count, class_count, tag_count)
}

pub fn compute_complex_specificity(selector: &ComplexSelector) -> (u32, u32, u32) {
    let mut spec = compute_specificity(&selector.key);
    for (_, compound) in &selector.ancestors {
        let (a, b, c) = compute_specificity(compound);
        spec.0 += a;
        spec.1 += b;
        spec.2 += c;
    }
    spec
}

/// One selector of an author rule, ready for matching.
#[derive(Debug, Clone)]
pub struct CascadeRule {
    pub selector: ComplexSelector,
    pub specificity: (u32, u32, u32),
    pub declarations: Vec<OwnedDeclaration>,
    pub source_order: usize,
}

/// Split a stylesheet's rules into one [`CascadeRule`] per selector.
/// `first_order` continues source order across stylesheets.
pub fn cascade_rules(sheet: &OwnedStylesheet, first_order: usize) -> Vec<CascadeRule> {
    let mut rules = Vec::new();
    for (offset, rule) in sheet.rules.iter().enumerate() {
        for selector in &rule.selectors {
            if let Some(parsed) = parse_complex_selector(selector) {
                rules.push(CascadeRule {
                    specificity: compute_complex_specificity(&parsed),
                    selector: parsed,
                    declarations: rule.declarations.clone(),
                    source_order: first_order + offset,
                });
            }
        }
    }
    rules
}

/// Split a space separated value, keeping parenthesized groups together.
pub fn split_components(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, ch) in value.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    parts.push(&value[s..i]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        parts.push(&value[s..]);
    }
    parts
}

/// Expand shorthand properties into longhands. Box shorthands take the usual
/// one to four values; axis pairs take one or two.
fn expand_shorthand(property: &str, value: &str) -> Vec<(String, String)> {
    let sides = match property {
        "margin" | "padding" => {
            let parts = split_components(value);
            let (top, right, bottom, left) = match parts.as_slice() {
                [a] => (*a, *a, *a, *a),
                [a, b] => (*a, *b, *a, *b),
                [a, b, c] => (*a, *b, *c, *b),
                [a, b, c, d] => (*a, *b, *c, *d),
                _ => return vec![(property.to_string(), value.to_string())],
            };
            return [("top", top), ("right", right), ("bottom", bottom), ("left", left)]
                .iter()
                .map(|(side, v)| (format!("{property}-{side}"), v.to_string()))
                .collect();
        }
        "gap" => ["row-gap", "column-gap"],
        "overflow" => ["overflow-x", "overflow-y"],
        _ => return vec![(property.to_string(), value.to_string())],
    };
    match split_components(value).as_slice() {
        [a] => vec![(sides[0].to_string(), a.to_string()), (sides[1].to_string(), a.to_string())],
        [a, b] => vec![(sides[0].to_string(), a.to_string()), (sides[1].to_string(), b.to_string())],
        _ => vec![(property.to_string(), value.to_string())],
    }
}

/// Declared values for an element: matched rules by specificity then source
/// order, inline style above rules, `!important` above both. Expanded
/// shorthands are stored as their longhands.
pub fn declared_values(
    element: &NodeRef,
    rules: &[CascadeRule],
    inline: &[OwnedDeclaration],
) -> BTreeMap<String, String> {
    let mut matched: Vec<&CascadeRule> = rules
        .iter()
        .filter(|rule| matches_complex_selector(element, &rule.selector))
        .collect();
    matched.sort_by_key(|rule| (rule.specificity, rule.source_order));

    let mut declared = BTreeMap::new();
    for important in [false, true] {
        let from_rules = matched.iter().flat_map(|rule| rule.declarations.iter());
        for decl in from_rules.chain(inline.iter()) {
            if decl.important != important {
                continue;
            }
            for (property, value) in expand_shorthand(&decl.property, &decl.value) {
                declared.insert(property, value);
            }
        }
    }
    declared
}

/// ------------------------------
/// 3. Selector Matching
/// ------------------------------

/// Checks tag, id, classes and attribute conditions.
pub fn matches_compound(elem: &ElementNode, compound: &CompoundSelector) -> bool {
    if let Some(ref tag) = compound.tag {
        if !elem.tag.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(ref id) = compound.id {
        if elem.id() != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.iter().all(|class| elem.has_class(class)) {
        return false;
    }
    compound.attributes.iter().all(|attr_sel| {
        let Some(actual) = elem.attr(&attr_sel.name) else {
            return false;
        };
        let (Some(operator), Some(expected)) = (&attr_sel.operator, &attr_sel.value) else {
            return true;
        };
        match operator {
            AttributeOperator::Exact => actual == expected,
            AttributeOperator::Includes => actual.split_whitespace().any(|w| w == expected),
            AttributeOperator::Prefix => actual.starts_with(expected.as_str()),
            AttributeOperator::Suffix => actual.ends_with(expected.as_str()),
            AttributeOperator::Substring => actual.contains(expected.as_str()),
            AttributeOperator::DashMatch => {
                actual == expected || actual.starts_with(&format!("{expected}-"))
            }
        }
    })
}

fn node_matches(node: &NodeRef, compound: &CompoundSelector) -> bool {
    node.borrow()
        .as_element()
        .is_some_and(|elem| matches_compound(elem, compound))
}

/// Matches right to left, using parent and sibling links.
pub fn matches_complex_selector(candidate: &NodeRef, complex: &ComplexSelector) -> bool {
    if !node_matches(candidate, &complex.key) {
        return false;
    }
    let mut current = candidate.clone();
    for (combinator, compound) in &complex.ancestors {
        let found = match combinator {
            Combinator::Child => {
                dom_tree::parent_element(&current).filter(|parent| node_matches(parent, compound))
            }
            Combinator::Descendant => {
                let mut ancestor = dom_tree::parent_element(&current);
                while let Some(node) = ancestor.take() {
                    if node_matches(&node, compound) {
                        ancestor = Some(node);
                        break;
                    }
                    ancestor = dom_tree::parent_element(&node);
                }
                ancestor
            }
            Combinator::AdjacentSibling => dom_tree::previous_element_siblings(&current)
                .into_iter()
                .next()
                .filter(|sibling| node_matches(sibling, compound)),
            Combinator::GeneralSibling => dom_tree::previous_element_siblings(&current)
                .into_iter()
                .find(|sibling| node_matches(sibling, compound)),
        };
        match found {
            Some(node) => current = node,
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::page_html::create_dom_tree;
    use crate::style::owned_css::OwnedRule;
    use pretty_assertions::assert_eq;

    fn sheet(rules: &[(&str, &[(&str, &str)])]) -> OwnedStylesheet {
        OwnedStylesheet {
            rules: rules
                .iter()
                .map(|(selector, decls)| OwnedRule {
                    selectors: vec![selector.to_string()],
                    declarations: decls.iter().map(|(p, v)| OwnedDeclaration::new(p, v)).collect(),
                })
                .collect(),
        }
    }

    fn find(document: &crate::dom::dom_tree::Document, id: &str) -> NodeRef {
        let html = document.document_element().unwrap();
        dom_tree::descendant_elements(&html)
            .into_iter()
            .find(|node| node.borrow().as_element().and_then(|e| e.id()) == Some(id))
            .unwrap()
    }

    const PAGE: &str = "<html><body>\
        <div class=\"card\" id=\"card\">\
          <h2 id=\"first\" class=\"title\">a</h2>\
          <p id=\"second\" data-kind=\"lead text\">b</p>\
          <section><p id=\"deep\">c</p></section>\
        </div></body></html>";

    #[test]
    fn test_parse_complex_selector_orders_ancestors_nearest_first() {
        let selector = parse_complex_selector("div.card > section p").unwrap();
        assert_eq!(selector.key.tag.as_deref(), Some("p"));
        assert_eq!(selector.ancestors[0].0, Combinator::Descendant);
        assert_eq!(selector.ancestors[0].1.tag.as_deref(), Some("section"));
        assert_eq!(selector.ancestors[1].0, Combinator::Child);
        assert!(selector.ancestors[1].1.classes.contains("card"));
        assert_eq!(compute_complex_specificity(&selector), (0, 1, 3));
    }

    #[test]
    fn test_combinators_match() {
        let document = create_dom_tree(PAGE);
        let second = find(&document, "second");
        let deep = find(&document, "deep");
        let parse = |s: &str| parse_complex_selector(s).unwrap();

        assert!(matches_complex_selector(&second, &parse(".card > p")));
        assert!(matches_complex_selector(&second, &parse("h2.title + p")));
        assert!(matches_complex_selector(&second, &parse("[data-kind~=\"lead\"]")));
        assert!(!matches_complex_selector(&deep, &parse(".card > p")));
        assert!(matches_complex_selector(&deep, &parse(".card p")));
        assert!(matches_complex_selector(&deep, &parse("h2 ~ section > p")));
        assert!(!matches_complex_selector(&deep, &parse("h2 + section p")));
    }

    #[test]
    fn test_specificity_wins() {
        let document = create_dom_tree(PAGE);
        let first = find(&document, "first");
        let rules = cascade_rules(
            &sheet(&[("#first", &[("color", "green")]), ("h2", &[("color", "blue")])]),
            0,
        );
        let declared = declared_values(&first, &rules, &[]);
        assert_eq!(declared.get("color"), Some(&"green".to_string()));
    }

    #[test]
    fn test_source_order() {
        let document = create_dom_tree(PAGE);
        let first = find(&document, "first");
        let rules = cascade_rules(
            &sheet(&[("h2", &[("font-size", "12px")]), ("h2", &[("font-size", "14px")])]),
            0,
        );
        let declared = declared_values(&first, &rules, &[]);
        assert_eq!(declared.get("font-size"), Some(&"14px".to_string()));
    }

    #[test]
    fn test_inline_and_important_precedence() {
        let document = create_dom_tree(PAGE);
        let first = find(&document, "first");
        let mut important = OwnedDeclaration::new("height", "30px");
        important.important = true;
        let stylesheet = OwnedStylesheet {
            rules: vec![OwnedRule {
                selectors: vec![".title".to_string()],
                declarations: vec![OwnedDeclaration::new("width", "10px"), important],
            }],
        };
        let rules = cascade_rules(&stylesheet, 0);
        let inline = vec![
            OwnedDeclaration::new("width", "20px"),
            OwnedDeclaration::new("height", "40px"),
        ];
        let declared = declared_values(&first, &rules, &inline);
        assert_eq!(declared["width"], "20px");
        assert_eq!(declared["height"], "30px");
    }

    #[test]
    fn test_shorthand_expansion() {
        let document = create_dom_tree(PAGE);
        let card = find(&document, "card");
        let rules = cascade_rules(
            &sheet(&[(
                ".card",
                &[("margin", "10px 5px"), ("padding", "1px 2px 3px"), ("gap", "4px")],
            )]),
            0,
        );
        let declared = declared_values(&card, &rules, &[]);
        assert_eq!(declared["margin-top"], "10px");
        assert_eq!(declared["margin-right"], "5px");
        assert_eq!(declared["margin-bottom"], "10px");
        assert_eq!(declared["margin-left"], "5px");
        assert_eq!(declared["padding-left"], "2px");
        assert_eq!(declared["padding-bottom"], "3px");
        assert_eq!(declared["row-gap"], "4px");
        assert_eq!(declared["column-gap"], "4px");
        assert!(!declared.contains_key("margin"));
    }

    #[test]
    fn test_split_components_keeps_functions_whole() {
        assert_eq!(
            split_components("calc(1px + 2px) 0 auto"),
            vec!["calc(1px + 2px)", "0", "auto"]
        );
    }
}
