use std::collections::HashSet;

/// Class prefix the inspector uses for its own highlight markers. Such classes
/// are never reported or matched.
pub const INSPECTOR_CLASS_PREFIX: &str = "element-inspector-";

/// Read-only view of a rendered page the engine inspects.
///
/// Implemented by live DOM bridges and by [`StaticPage`](crate::page::StaticPage);
/// tests implement it over synthetic trees.
pub trait StyleSource {
    /// Handles compare equal when they refer to the same element.
    type Handle: Clone + PartialEq;

    /// The browser's resolved value for `property`, or an empty string.
    fn computed_value(&self, element: &Self::Handle, property: &str) -> String;

    /// Element children in document order.
    fn children(&self, element: &Self::Handle) -> Vec<Self::Handle>;

    fn parent(&self, element: &Self::Handle) -> Option<Self::Handle>;

    /// Lowercase tag name.
    fn tag_name(&self, element: &Self::Handle) -> String;

    fn id(&self, element: &Self::Handle) -> Option<String>;

    /// Raw class list, including any inspector marker classes.
    fn class_list(&self, element: &Self::Handle) -> Vec<String>;

    /// The `<html>` element.
    fn document_element(&self) -> Option<Self::Handle>;

    /// Class list with inspector marker classes removed.
    fn classes(&self, element: &Self::Handle) -> Vec<String> {
        self.class_list(element)
            .into_iter()
            .filter(|c| !c.starts_with(INSPECTOR_CLASS_PREFIX))
            .collect()
    }
}

/// One compound part of a simplified selector: `tag#id.class.class`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorPart {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: HashSet<String>,
}

impl SelectorPart {
    /// Parse a compound part, e.g. `div.card#main`. Attribute brackets and
    /// anything after them are ignored; `\\` escapes the next character.
    pub fn parse(part: &str) -> Self {
        let mut compound = SelectorPart::default();
        let mut buffer = String::new();
        let mut kind = '\0';
        let mut chars = part.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => buffer.extend(chars.next()),
                '#' | '.' => {
                    compound.push_token(kind, &mut buffer);
                    kind = ch;
                }
                '[' => break,
                _ => buffer.push(ch),
            }
        }
        compound.push_token(kind, &mut buffer);
        compound
    }

    fn push_token(&mut self, kind: char, buffer: &mut String) {
        if !buffer.is_empty() {
            match kind {
                '#' => self.id = Some(buffer.clone()),
                '.' => {
                    self.classes.insert(buffer.clone());
                }
                _ if buffer.as_str() != "*" => self.tag = Some(buffer.to_ascii_lowercase()),
                _ => {}
            }
        }
        buffer.clear();
    }

    pub fn matches<S: StyleSource>(&self, source: &S, element: &S::Handle) -> bool {
        if let Some(tag) = &self.tag {
            if !source.tag_name(element).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if source.id(element).as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let element_classes: HashSet<String> = source.classes(element).into_iter().collect();
            if !self.classes.is_subset(&element_classes) {
                return false;
            }
        }
        true
    }
}

/// Split a selector on `>` and whitespace into compound parts.
pub fn selector_parts(selector: &str) -> Vec<SelectorPart> {
    selector
        .split(|c: char| c == '>' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(SelectorPart::parse)
        .collect()
}

/// Does `element` satisfy `selector`?
///
/// Child and descendant combinators are treated alike: the last part must
/// match the element, and the remaining parts must be found, right to left,
/// somewhere up the ancestor chain. Non-matching ancestors are skipped, so
/// `.a > .b` also matches `.b` nested deeper under `.a`.
pub fn matches<S: StyleSource>(source: &S, element: &S::Handle, selector: &str) -> bool {
    let parts = selector_parts(selector);
    let Some((last, ancestors)) = parts.split_last() else {
        return false;
    };
    if !last.matches(source, element) {
        return false;
    }

    let mut remaining = ancestors.len();
    let mut current = source.parent(element);
    while remaining > 0 {
        let Some(ancestor) = current else {
            break;
        };
        if ancestors[remaining - 1].matches(source, &ancestor) {
            remaining -= 1;
        }
        current = source.parent(&ancestor);
    }
    remaining == 0
}

/// 1-based, tag-indexed absolute path, e.g. `/html[1]/body[1]/div[2]`.
pub fn xpath_of<S: StyleSource>(source: &S, element: &S::Handle) -> String {
    let mut steps = Vec::new();
    let mut current = element.clone();
    loop {
        let tag = source.tag_name(&current);
        let Some(parent) = source.parent(&current) else {
            steps.push(format!("{tag}[1]"));
            break;
        };
        let siblings = source.children(&parent);
        let mut ordinal = 0;
        for sibling in &siblings {
            if source.tag_name(sibling) == tag {
                ordinal += 1;
            }
            if *sibling == current {
                break;
            }
        }
        steps.push(format!("{tag}[{}]", ordinal.max(1)));
        current = parent;
    }
    steps.reverse();
    format!("/{}", steps.join("/"))
}

/// Resolve a path produced by [`xpath_of`] back to its element.
pub fn resolve_xpath<S: StyleSource>(source: &S, xpath: &str) -> Option<S::Handle> {
    let mut steps = xpath.split('/').filter(|s| !s.is_empty());
    let (root_tag, root_index) = parse_step(steps.next()?)?;
    let root = source.document_element()?;
    if source.tag_name(&root) != root_tag || root_index != 1 {
        return None;
    }

    let mut current = root;
    for step in steps {
        let (tag, index) = parse_step(step)?;
        current = source
            .children(&current)
            .into_iter()
            .filter(|child| source.tag_name(child) == tag)
            .nth(index.checked_sub(1)?)?;
    }
    Some(current)
}

fn parse_step(step: &str) -> Option<(String, usize)> {
    match step.split_once('[') {
        Some((tag, rest)) => {
            let index = rest.strip_suffix(']')?.parse().ok()?;
            Some((tag.to_ascii_lowercase(), index))
        }
        None => Some((step.to_ascii_lowercase(), 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ElementSnapshot, SnapshotPage};
    use pretty_assertions::assert_eq;

    fn card_page(parent_class: &str) -> SnapshotPage {
        let document = ElementSnapshot::new("html").with_child(
            ElementSnapshot::new("body").with_child(
                ElementSnapshot::new("div")
                    .with_class(parent_class)
                    .with_child(ElementSnapshot::new("span").with_class("title")),
            ),
        );
        SnapshotPage::new(document, Vec::new())
    }

    #[test]
    fn test_child_selector_matches_through_parent() {
        let page = card_page("card");
        let span = resolve_xpath(&page, "/html[1]/body[1]/div[1]/span[1]").unwrap();
        assert!(matches(&page, &span, ".card > .title"));
        assert!(matches(&page, &span, "div.card span.title"));
        assert!(!matches(&page, &span, ".card > .subtitle"));

        let page = card_page("wrapper");
        let span = resolve_xpath(&page, "/html[1]/body[1]/div[1]/span[1]").unwrap();
        assert!(!matches(&page, &span, ".card > .title"));
    }

    #[test]
    fn test_non_matching_ancestors_are_skipped() {
        let page = card_page("card");
        let span = resolve_xpath(&page, "/html[1]/body[1]/div[1]/span[1]").unwrap();
        // body sits between html and the span's parent; child intent is lost.
        assert!(matches(&page, &span, "html > .title"));
        assert!(matches(&page, &span, "html .card .title"));
        // Parts are consumed in order, nearest ancestor first.
        assert!(!matches(&page, &span, ".card html .title"));
    }

    #[test]
    fn test_escaped_class_names_match() {
        let document = ElementSnapshot::new("html")
            .with_child(ElementSnapshot::new("body").with_class("md:flex"));
        let page = SnapshotPage::new(document, Vec::new());
        let body = resolve_xpath(&page, "/html[1]/body[1]").unwrap();
        assert!(matches(&page, &body, ".md\\:flex"));
        assert!(!matches(&page, &body, ".md"));
    }

    #[test]
    fn test_parse_compound_part() {
        let part = SelectorPart::parse("DIV#main.card.wide[data-x=1].ignored");
        assert_eq!(part.tag.as_deref(), Some("div"));
        assert_eq!(part.id.as_deref(), Some("main"));
        let mut classes: Vec<_> = part.classes.into_iter().collect();
        classes.sort();
        assert_eq!(classes, vec!["card".to_string(), "wide".to_string()]);

        assert_eq!(SelectorPart::parse("*"), SelectorPart::default());
    }

    #[test]
    fn test_selector_parts_split_on_combinators() {
        let parts = selector_parts(".card>.title  span");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].tag.as_deref(), Some("span"));
        assert!(selector_parts("   ").is_empty());
    }
}
