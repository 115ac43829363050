//! A static HTML page as a [`StyleSource`]: html5ever for the tree,
//! lightningcss for the author stylesheets, and a small cascade that reports
//! values the way a browser's computed style would.

use crate::dom::dom_tree::{self, Node, NodeRef};
use crate::error::{Result, StylecastError};
use crate::parser::page_html;
use crate::properties;
use crate::snapshot::{DocumentSnapshot, ElementSnapshot, SnapshotPage};
use crate::source_map::{resolve_url, Fetcher, InspectedPage, StylesheetRef};
use crate::style::cascade::{self, CascadeRule};
use crate::style::page_css;
use crate::style::selector_match::StyleSource;
use crate::style::values;
use log::{debug, info, warn};
use std::collections::BTreeMap;

const ROOT_FONT_SIZE: f64 = 16.0;

/// Properties whose bare numbers are not lengths.
const UNITLESS_PROPERTIES: &[&str] = &[
    "z-index",
    "opacity",
    "flex",
    "flex-grow",
    "flex-shrink",
    "font-weight",
    "line-height",
];

/// Shorthands reported from their longhands.
const COMPOSED_SHORTHANDS: &[&str] = &["margin", "padding", "gap", "overflow"];

type Computed = BTreeMap<String, String>;

pub struct StaticPage {
    page: SnapshotPage,
}

impl StaticPage {
    pub fn load<F: Fetcher + ?Sized>(html: &str, base_url: &str, fetcher: &F) -> Result<Self> {
        let snapshot = Self::snapshot(html, base_url, fetcher)?;
        Ok(StaticPage {
            page: SnapshotPage::new(snapshot.document, snapshot.stylesheets),
        })
    }

    /// Parse and style the page, returning the serializable snapshot a live
    /// page bridge would have sent.
    pub fn snapshot<F: Fetcher + ?Sized>(
        html: &str,
        base_url: &str,
        fetcher: &F,
    ) -> Result<DocumentSnapshot> {
        let document = page_html::create_dom_tree(html);
        let root = document
            .document_element()
            .ok_or_else(|| StylecastError::Parse("document has no root element".to_string()))?;

        let stylesheets = collect_stylesheets(&root, base_url);
        let rules = load_rules(&stylesheets, fetcher);
        info!(
            "page has {} stylesheets, {} cascade rules",
            stylesheets.len(),
            rules.len()
        );

        Ok(DocumentSnapshot {
            document: style_element(&root, &rules, None),
            stylesheets,
        })
    }

    pub fn len(&self) -> usize {
        self.page.len()
    }

    pub fn is_empty(&self) -> bool {
        self.page.is_empty()
    }
}

impl StyleSource for StaticPage {
    type Handle = usize;

    fn computed_value(&self, element: &usize, property: &str) -> String {
        self.page.computed_value(element, property)
    }

    fn children(&self, element: &usize) -> Vec<usize> {
        self.page.children(element)
    }

    fn parent(&self, element: &usize) -> Option<usize> {
        self.page.parent(element)
    }

    fn tag_name(&self, element: &usize) -> String {
        self.page.tag_name(element)
    }

    fn id(&self, element: &usize) -> Option<String> {
        self.page.id(element)
    }

    fn class_list(&self, element: &usize) -> Vec<String> {
        self.page.class_list(element)
    }

    fn document_element(&self) -> Option<usize> {
        self.page.document_element()
    }
}

impl InspectedPage for StaticPage {
    fn stylesheets(&self) -> Vec<StylesheetRef> {
        self.page.stylesheets()
    }
}

/// `<link rel="stylesheet">` and `<style>` elements, in document order.
fn collect_stylesheets(root: &NodeRef, base_url: &str) -> Vec<StylesheetRef> {
    let mut sheets = Vec::new();
    for node in std::iter::once(root.clone()).chain(dom_tree::descendant_elements(root)) {
        let node = node.borrow();
        let Some(element) = node.as_element() else {
            continue;
        };
        match element.tag.as_str() {
            "link" => {
                let is_stylesheet = element
                    .attr("rel")
                    .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")));
                let Some(href) = element.attr("href").filter(|_| is_stylesheet) else {
                    continue;
                };
                match resolve_url(base_url, href) {
                    Ok(href) => sheets.push(StylesheetRef::External { href }),
                    Err(err) => warn!("skipping stylesheet link {href:?}: {err}"),
                }
            }
            "style" => sheets.push(StylesheetRef::Inline {
                text: node.text_content(),
                base_url: base_url.to_string(),
            }),
            _ => {}
        }
    }
    sheets
}

fn load_rules<F: Fetcher + ?Sized>(stylesheets: &[StylesheetRef], fetcher: &F) -> Vec<CascadeRule> {
    let mut rules = Vec::new();
    let mut order = 0;
    for sheet in stylesheets {
        let text = match sheet {
            StylesheetRef::External { href } => match fetcher.fetch_text(href) {
                Ok(text) => text,
                Err(err) => {
                    warn!("stylesheet not applied to page: {err}");
                    continue;
                }
            },
            StylesheetRef::Inline { text, .. } => text.clone(),
        };
        match page_css::parse_stylesheet(&text) {
            Ok(owned) => {
                rules.extend(cascade::cascade_rules(&owned, order));
                order += owned.rules.len();
            }
            Err(err) => warn!("stylesheet not applied to page: {err}"),
        }
    }
    rules
}

fn style_element(node: &NodeRef, rules: &[CascadeRule], parent: Option<&Computed>) -> ElementSnapshot {
    let (tag, id, classes, inline) = {
        let borrowed = node.borrow();
        match &*borrowed {
            Node::Element(element) => (
                element.tag.clone(),
                element.id().map(str::to_string),
                element.class_list().iter().map(|c| c.to_string()).collect(),
                element
                    .attr("style")
                    .map(page_css::parse_inline_style)
                    .unwrap_or_default(),
            ),
            _ => (String::new(), None, Vec::new(), Vec::new()),
        }
    };

    let declared = cascade::declared_values(node, rules, &inline);
    let computed = compute_values(&tag, &declared, parent);
    debug!("<{tag}> computed {} properties", computed.len());

    let children = dom_tree::element_children(node)
        .iter()
        .map(|child| style_element(child, rules, Some(&computed)))
        .collect();

    ElementSnapshot {
        tag_name: tag,
        id,
        classes,
        computed,
        children,
    }
}

/// Resolve declared values into computed ones: inheritance, initial values,
/// absolute lengths, `rgb()` colors and composed box shorthands.
pub fn compute_values(tag: &str, declared: &BTreeMap<String, String>, parent: Option<&Computed>) -> Computed {
    let parent_value = |property: &str| parent.and_then(|p| p.get(property)).cloned();
    let parent_font_size = parent_value("font-size")
        .and_then(|v| values::parse_px(&v))
        .unwrap_or(ROOT_FONT_SIZE);

    let font_size = resolve_font_size(declared.get("font-size").map(String::as_str), parent_font_size);
    let mut computed = Computed::new();
    computed.insert("font-size".to_string(), px(font_size));

    for &property in properties::IMPORTANT_PROPERTIES {
        if property == "font-size" || COMPOSED_SHORTHANDS.contains(&property) {
            continue;
        }
        let inherited = || parent_value(property).unwrap_or_else(|| properties::initial_value(tag, property).to_string());
        let value = match declared.get(property).map(|v| v.trim()) {
            Some("inherit") => inherited(),
            Some("initial") => properties::initial_value(tag, property).to_string(),
            Some("unset") | None if properties::is_inheritable(property) => inherited(),
            Some("unset") | None => properties::initial_value(tag, property).to_string(),
            Some(value) => computed_form(property, value, font_size),
        };
        computed.insert(property.to_string(), value);
    }

    for &shorthand in COMPOSED_SHORTHANDS {
        let parts: Vec<&str> = properties::longhands(shorthand)
            .iter()
            .map(|longhand| computed.get(*longhand).map(String::as_str).unwrap_or(""))
            .collect();
        computed.insert(shorthand.to_string(), compose(&parts));
    }
    computed
}

fn px(value: f64) -> String {
    format!("{}px", values::format_ratio(value))
}

fn resolve_font_size(declared: Option<&str>, parent_px: f64) -> f64 {
    let Some(value) = declared.map(str::trim) else {
        return parent_px;
    };
    let number = |suffix: &str| -> Option<f64> { value.strip_suffix(suffix)?.trim().parse().ok() };
    if let Some(px) = values::parse_px(value) {
        return px;
    }
    if let Some(rem) = number("rem") {
        return rem * ROOT_FONT_SIZE;
    }
    if let Some(em) = number("em") {
        return em * parent_px;
    }
    if let Some(percent) = number("%") {
        return parent_px * percent / 100.0;
    }
    match value {
        "xx-small" => 9.0,
        "x-small" => 10.0,
        "small" => 13.0,
        "medium" | "initial" => ROOT_FONT_SIZE,
        "large" => 18.0,
        "x-large" => 24.0,
        "xx-large" => 32.0,
        "smaller" => parent_px / 1.2,
        "larger" => parent_px * 1.2,
        _ => parent_px,
    }
}

/// One declared value in the form a browser reports it.
fn computed_form(property: &str, value: &str, font_size: f64) -> String {
    match (property, value) {
        ("font-weight", "normal") => return "400".to_string(),
        ("font-weight", "bold") => return "700".to_string(),
        ("line-height", v) => {
            if let Ok(ratio) = v.parse::<f64>() {
                return px(ratio * font_size);
            }
        }
        _ => {}
    }

    let unitless = UNITLESS_PROPERTIES.contains(&property);
    let color = properties::is_color_property(property);
    cascade::split_components(value)
        .into_iter()
        .map(|component| {
            if color {
                if let Some(rgb) = browser_color(component) {
                    return rgb;
                }
            }
            absolute_length(component, font_size, unitless).unwrap_or_else(|| component.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn absolute_length(component: &str, font_size: f64, unitless: bool) -> Option<String> {
    if component == "0" {
        return (!unitless).then(|| "0px".to_string());
    }
    if let Some(rem) = component.strip_suffix("rem") {
        return rem.parse::<f64>().ok().map(|n| px(n * ROOT_FONT_SIZE));
    }
    let em = component.strip_suffix("em")?;
    em.parse::<f64>().ok().map(|n| px(n * font_size))
}

/// `rgb()`/`rgba()` form of a color token; other tokens yield `None`.
fn browser_color(token: &str) -> Option<String> {
    // Lengths and numbers never name a color, even when they read as bare hex.
    if token.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
        return None;
    }
    let color = csscolorparser::parse(token).ok()?;
    let [r, g, b, _] = color.to_rgba8();
    if (color.a - 1.0).abs() < 1e-6 {
        Some(format!("rgb({}, {}, {})", r, g, b))
    } else {
        Some(format!("rgba({}, {}, {}, {})", r, g, b, values::format_ratio(color.a)))
    }
}

/// Shortest browser serialization of a four-side (top right bottom left) or
/// two-axis value list.
fn compose(parts: &[&str]) -> String {
    match parts {
        [t, r, b, l] if l == r && t == b && t == r => t.to_string(),
        [t, r, b, l] if l == r && t == b => format!("{t} {r}"),
        [t, r, b, l] if l == r => format!("{t} {r} {b}"),
        [a, b] if a == b => a.to_string(),
        _ => parts.join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_map::MemoryFetcher;
    use crate::style::selector_match::resolve_xpath;
    use pretty_assertions::assert_eq;

    const HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <link rel="stylesheet" href="css/site.css">
  <style>
    .card { padding: 10px 20px; color: #333333; }
    .card > .title { font-size: 2em; margin-top: 8px; }
    .card:hover { padding: 0; }
  </style>
</head>
<body>
  <div class="card" style="height: 100px">
    <h2 class="title">Title</h2>
    <span class="note">note</span>
  </div>
</body>
</html>"#;

    fn load() -> StaticPage {
        let fetcher = MemoryFetcher::new().with(
            "https://site.test/css/site.css",
            ".note { line-height: 1.5; font-weight: bold; }",
        );
        StaticPage::load(HTML, "https://site.test/index.html", &fetcher).unwrap()
    }

    #[test]
    fn test_stylesheets_in_document_order() {
        let page = load();
        let sheets = page.stylesheets();
        assert_eq!(sheets.len(), 2);
        assert_eq!(
            sheets[0],
            StylesheetRef::External {
                href: "https://site.test/css/site.css".to_string()
            }
        );
        assert!(matches!(&sheets[1], StylesheetRef::Inline { base_url, .. } if base_url == "https://site.test/index.html"));
    }

    #[test]
    fn test_computed_values() {
        let page = load();
        let card = resolve_xpath(&page, "/html[1]/body[1]/div[1]").unwrap();
        assert_eq!(page.computed_value(&card, "padding"), "10px 20px");
        assert_eq!(page.computed_value(&card, "padding-left"), "20px");
        assert_eq!(page.computed_value(&card, "color"), "rgb(51, 51, 51)");
        assert_eq!(page.computed_value(&card, "height"), "100px");
        assert_eq!(page.computed_value(&card, "display"), "block");
        assert_eq!(page.computed_value(&card, "margin"), "0px");

        let title = resolve_xpath(&page, "/html[1]/body[1]/div[1]/h2[1]").unwrap();
        assert_eq!(page.computed_value(&title, "font-size"), "32px");
        assert_eq!(page.computed_value(&title, "margin"), "8px 0px 0px");
        assert_eq!(page.computed_value(&title, "color"), "rgb(51, 51, 51)");

        let note = resolve_xpath(&page, "/html[1]/body[1]/div[1]/span[1]").unwrap();
        assert_eq!(page.computed_value(&note, "display"), "inline");
        assert_eq!(page.computed_value(&note, "line-height"), "24px");
        assert_eq!(page.computed_value(&note, "font-weight"), "700");
    }

    #[test]
    fn test_unreachable_stylesheet_is_skipped() {
        let page = StaticPage::load(HTML, "https://site.test/index.html", &MemoryFetcher::new()).unwrap();
        let note = resolve_xpath(&page, "/html[1]/body[1]/div[1]/span[1]").unwrap();
        assert_eq!(page.computed_value(&note, "font-weight"), "400");
        assert_eq!(page.computed_value(&note, "line-height"), "normal");
    }

    #[test]
    fn test_compose() {
        assert_eq!(compose(&["1px", "1px", "1px", "1px"]), "1px");
        assert_eq!(compose(&["1px", "2px", "1px", "2px"]), "1px 2px");
        assert_eq!(compose(&["1px", "2px", "3px", "2px"]), "1px 2px 3px");
        assert_eq!(compose(&["1px", "2px", "3px", "4px"]), "1px 2px 3px 4px");
        assert_eq!(compose(&["normal", "4px"]), "normal 4px");
    }

    #[test]
    fn test_computed_form_units_and_colors() {
        assert_eq!(computed_form("letter-spacing", "0.1em", 20.0), "2px");
        assert_eq!(computed_form("margin-top", "1.5rem", 20.0), "24px");
        assert_eq!(computed_form("top", "0", 16.0), "0px");
        assert_eq!(computed_form("opacity", "0", 16.0), "0");
        assert_eq!(computed_form("background-color", "#fff", 16.0), "rgb(255, 255, 255)");
        assert_eq!(computed_form("border", "1px solid #000", 16.0), "1px solid rgb(0, 0, 0)");
    }
}
