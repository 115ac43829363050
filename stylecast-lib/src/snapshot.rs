//! A serializable page snapshot: an element tree with the computed styles a
//! live DOM bridge captured. It answers [`StyleSource`] queries without a
//! browser, which is also how the engine is tested.

use crate::error::Result;
use crate::source_map::{InspectedPage, StylesheetRef};
use crate::style::selector_match::StyleSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One captured element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub tag_name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Computed values by property name. Missing properties read as empty.
    #[serde(default)]
    pub computed: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<ElementSnapshot>,
}

impl ElementSnapshot {
    pub fn new(tag_name: &str) -> Self {
        ElementSnapshot {
            tag_name: tag_name.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_style(mut self, property: &str, value: &str) -> Self {
        self.computed.insert(property.to_string(), value.to_string());
        self
    }

    pub fn with_child(mut self, child: ElementSnapshot) -> Self {
        self.children.push(child);
        self
    }
}

/// Snapshot document as sent by a host: the `<html>` element plus the page's
/// stylesheets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub document: ElementSnapshot,
    #[serde(default)]
    pub stylesheets: Vec<StylesheetRef>,
}

#[derive(Debug)]
struct FlatElement {
    tag_name: String,
    id: Option<String>,
    classes: Vec<String>,
    computed: BTreeMap<String, String>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Arena-backed [`StyleSource`] over an [`ElementSnapshot`] tree. Handles are
/// arena indices; index 0 is the document element.
#[derive(Debug)]
pub struct SnapshotPage {
    elements: Vec<FlatElement>,
    stylesheets: Vec<StylesheetRef>,
}

impl SnapshotPage {
    pub fn new(document: ElementSnapshot, stylesheets: Vec<StylesheetRef>) -> Self {
        let mut page = SnapshotPage {
            elements: Vec::new(),
            stylesheets,
        };
        page.push(document, None);
        page
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: DocumentSnapshot = serde_json::from_str(json)?;
        Ok(SnapshotPage::new(snapshot.document, snapshot.stylesheets))
    }

    fn push(&mut self, element: ElementSnapshot, parent: Option<usize>) -> usize {
        let index = self.elements.len();
        self.elements.push(FlatElement {
            tag_name: element.tag_name.to_ascii_lowercase(),
            id: element.id,
            classes: element.classes,
            computed: element.computed,
            parent,
            children: Vec::new(),
        });
        for child in element.children {
            let child_index = self.push(child, Some(index));
            self.elements[index].children.push(child_index);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl StyleSource for SnapshotPage {
    type Handle = usize;

    fn computed_value(&self, element: &usize, property: &str) -> String {
        self.elements
            .get(*element)
            .and_then(|e| e.computed.get(property))
            .cloned()
            .unwrap_or_default()
    }

    fn children(&self, element: &usize) -> Vec<usize> {
        self.elements
            .get(*element)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    fn parent(&self, element: &usize) -> Option<usize> {
        self.elements.get(*element)?.parent
    }

    fn tag_name(&self, element: &usize) -> String {
        self.elements
            .get(*element)
            .map(|e| e.tag_name.clone())
            .unwrap_or_default()
    }

    fn id(&self, element: &usize) -> Option<String> {
        self.elements.get(*element)?.id.clone()
    }

    fn class_list(&self, element: &usize) -> Vec<String> {
        self.elements
            .get(*element)
            .map(|e| e.classes.clone())
            .unwrap_or_default()
    }

    fn document_element(&self) -> Option<usize> {
        (!self.elements.is_empty()).then_some(0)
    }
}

impl InspectedPage for SnapshotPage {
    fn stylesheets(&self) -> Vec<StylesheetRef> {
        self.stylesheets.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::selector_match::{matches, resolve_xpath, xpath_of};

    #[test]
    fn test_inspector_classes_are_invisible() {
        let document = ElementSnapshot::new("html").with_child(
            ElementSnapshot::new("body")
                .with_class("element-inspector-highlight")
                .with_class("home"),
        );
        let page = SnapshotPage::new(document, Vec::new());
        let body = resolve_xpath(&page, "/html[1]/body[1]").unwrap();
        assert_eq!(page.classes(&body), vec!["home".to_string()]);
        assert!(!matches(&page, &body, ".element-inspector-highlight"));
    }

    #[test]
    fn test_xpath_round_trip_uses_tag_ordinals() {
        let document = ElementSnapshot::new("html").with_child(
            ElementSnapshot::new("body")
                .with_child(ElementSnapshot::new("p"))
                .with_child(ElementSnapshot::new("div"))
                .with_child(ElementSnapshot::new("p").with_id("second")),
        );
        let page = SnapshotPage::new(document, Vec::new());
        let second = resolve_xpath(&page, "/html[1]/body[1]/p[2]").unwrap();
        assert_eq!(page.id(&second).as_deref(), Some("second"));
        assert_eq!(xpath_of(&page, &second), "/html[1]/body[1]/p[2]");
        assert_eq!(resolve_xpath(&page, "/html[1]/body[1]/p[3]"), None);
        assert_eq!(resolve_xpath(&page, "/html[1]/body[1]/p[0]"), None);
        assert_eq!(resolve_xpath(&page, "/body[1]"), None);
    }

    #[test]
    fn test_snapshot_json() {
        let json = r#"{
            "document": {
                "tagName": "HTML",
                "children": [{ "tagName": "body", "computed": { "color": "rgb(0, 0, 0)" } }]
            },
            "stylesheets": [{ "kind": "external", "href": "https://example.com/main.css" }]
        }"#;
        let page = SnapshotPage::from_json(json).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page.computed_value(&1, "color"), "rgb(0, 0, 0)");
        assert_eq!(page.computed_value(&1, "margin"), "");
        assert_eq!(page.tag_name(&0), "html");
        assert_eq!(page.stylesheets().len(), 1);
    }
}
