use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use stylecast_lib::page::StaticPage;
use stylecast_lib::parser::css_rules;
use stylecast_lib::sass::{self, SassOptions};
use stylecast_lib::session::InspectorSession;
use stylecast_lib::snapshot::{ElementSnapshot, SnapshotPage};
use stylecast_lib::source_map::{MemoryFetcher, SourceMapIndex, StylesheetRef};
use stylecast_lib::style::selector_match::resolve_xpath;
use stylecast_lib::tree_builder::{BuildOptions, StyleNode, StyleTreeBuilder};

const MAIN_CSS: &str = "https://site.test/css/main.css";
const MAIN_MAP: &str = "https://site.test/css/main.css.map";

fn card_document() -> ElementSnapshot {
    let card = ElementSnapshot::new("div")
        .with_class("card")
        .with_style("padding", "20px")
        .with_style("display", "flex")
        .with_style("margin", "10px")
        .with_child(
            ElementSnapshot::new("h2")
                .with_class("title")
                .with_style("font-size", "24px")
                .with_style("color", "rgb(51, 51, 51)"),
        )
        .with_child(
            ElementSnapshot::new("p")
                .with_class("text")
                .with_style("font-size", "16px")
                .with_style("line-height", "24px"),
        )
        .with_child(ElementSnapshot::new("span").with_style("color", "rgb(51, 51, 51)"));
    ElementSnapshot::new("html").with_child(ElementSnapshot::new("body").with_child(card))
}

/// Selector paths of every node with styles, mapped to its property names.
fn authored_paths(node: &StyleNode, parent: &str, out: &mut Vec<(String, BTreeSet<String>)>) {
    let path = if parent.is_empty() {
        node.selector.clone()
    } else {
        format!("{parent} {}", node.selector)
    };
    if !node.styles.is_empty() {
        out.push((path.clone(), node.styles.keys().cloned().collect()));
    }
    for child in &node.children {
        authored_paths(child, &path, out);
    }
}

#[test]
fn test_serialized_tree_parses_back_to_the_same_rules() {
    let page = SnapshotPage::new(card_document(), Vec::new());
    let rules = css_rules::parse_with_source(
        ".card { padding: 20px; display: flex; }\n\
         .card .title { font-size: 24px; color: #333; }\n\
         .card .text { line-height: 1.5; }",
        "main.css",
    );
    let mut index = SourceMapIndex::default();
    index.insert_file(
        "main.css",
        ["padding", "display", "font-size", "color", "line-height"]
            .iter()
            .map(|p| p.to_string())
            .collect(),
    );
    let root = resolve_xpath(&page, "/html[1]/body[1]/div[1]").unwrap();
    let tree = StyleTreeBuilder::new(&page, &rules, &index, BuildOptions::default()).build(&root);
    assert_eq!(tree.children[1].styles["line-height"], "1.5");

    let scss = sass::serialize(&tree, &SassOptions::default());
    assert!(scss.contains("@include font-size(24);"));
    let reparsed = css_rules::parse(&scss);

    let mut expected = Vec::new();
    authored_paths(&tree, "", &mut expected);
    let actual: Vec<(String, BTreeSet<String>)> = reparsed
        .rules
        .iter()
        .map(|rule| (rule.selector.clone(), rule.properties.clone()))
        .collect();
    assert_eq!(actual, expected);
    assert_eq!(
        expected.iter().map(|(path, _)| path.as_str()).collect::<Vec<_>>(),
        vec![".card", ".card h2.title", ".card p.text", ".card span"]
    );
}

fn session_with_vendor_sheet() -> InspectorSession<SnapshotPage, MemoryFetcher> {
    let stylesheets = vec![
        StylesheetRef::External {
            href: "https://cdn.test/vendor.css".to_string(),
        },
        StylesheetRef::External {
            href: MAIN_CSS.to_string(),
        },
    ];
    let page = SnapshotPage::new(card_document(), stylesheets);
    let fetcher = MemoryFetcher::new()
        .with("https://cdn.test/vendor.css", ".card { margin: 10px; }")
        .with(
            MAIN_CSS,
            ".card{padding:20px}\n/*# sourceMappingURL=main.css.map */",
        )
        .with(
            MAIN_MAP,
            r#"{"version":3,"sources":["../scss/main.scss"],"sourcesContent":[".card {\n  padding: 20px;\n}\n"]}"#,
        );
    InspectorSession::new(page, fetcher)
}

#[test]
fn test_stylesheets_without_source_maps_contribute_nothing() {
    let mut session = session_with_vendor_sheet();
    let snapshot = session.load_source_maps();
    assert_eq!(
        snapshot.index.by_file.keys().collect::<Vec<_>>(),
        vec!["main.css"]
    );
    assert!(snapshot.rules.rules.iter().all(|r| r.source_file == "main.css"));

    let tree = session
        .build_style_tree("/html[1]/body[1]/div[1]", BuildOptions::default())
        .unwrap();
    assert_eq!(tree.styles.keys().collect::<Vec<_>>(), vec!["padding"]);

    let unfiltered = BuildOptions {
        use_source_map: false,
        ..Default::default()
    };
    let tree = session
        .build_style_tree("/html[1]/body[1]/div[1]", unfiltered)
        .unwrap();
    assert_eq!(tree.styles["margin"], "10px");
    assert_eq!(tree.styles["display"], "flex");
}

#[test]
fn test_json_commands_over_a_snapshot() {
    let document = json!({
        "document": {
            "tagName": "html",
            "children": [{
                "tagName": "body",
                "children": [{
                    "tagName": "ul",
                    "id": "menu",
                    "classes": ["nav", "element-inspector-selected"],
                    "computed": {"gap": "8px", "display": "flex"},
                    "children": [
                        {"tagName": "li", "classes": ["item"], "computed": {"padding": "4px"}},
                        {"tagName": "li", "classes": ["item"], "computed": {"padding": "4px"}}
                    ]
                }]
            }]
        },
        "stylesheets": [{"kind": "external", "href": MAIN_CSS}]
    });
    let page = SnapshotPage::from_json(&document.to_string()).unwrap();
    let fetcher = MemoryFetcher::new()
        .with(
            MAIN_CSS,
            "#menu{gap:8px}.nav .item{padding:4px}\n/*# sourceMappingURL=main.css.map */",
        )
        .with(
            MAIN_MAP,
            r##"{"sources":["main.scss"],"sourcesContent":["#menu {\n  gap: 8px;\n\n  .item {\n    padding: 4px;\n  }\n}\n"]}"##,
        );
    let mut session = InspectorSession::new(page, fetcher);
    let mut call = |request: Value| -> Value {
        serde_json::from_str(&session.handle_json(&request.to_string())).unwrap()
    };

    let loaded = call(json!({"action": "loadSourceMaps"}));
    assert_eq!(loaded["propertyCount"], json!(2));

    let info = call(json!({"action": "getElementInfo", "xpath": "/html[1]/body[1]/ul[1]"}));
    assert_eq!(
        info["data"],
        json!({"tagName": "ul", "id": "menu", "classes": ["nav"], "childCount": 2})
    );

    let tree = call(json!({"action": "buildStyleTree", "xpath": "/html[1]/body[1]/ul[1]", "maxDepth": 0}));
    assert_eq!(tree["data"]["selector"], json!("#menu"));
    assert_eq!(tree["data"]["styles"], json!({"gap": "8px"}));
    assert_eq!(tree["data"]["children"], json!([]));

    let rendered = call(json!({"action": "renderSass", "xpath": "/html[1]/body[1]/ul[1]"}));
    assert_eq!(
        rendered["data"],
        json!("#menu {\n  gap: 8px;\n\n  li.item {\n    padding: 4px;\n  }\n\n  li.item {\n    padding: 4px;\n  }\n\n}\n")
    );

    let missing = call(json!({"action": "getElementInfo", "xpath": "/html[1]/body[1]/ol[1]"}));
    assert_eq!(missing, json!({"status": "error", "error": "Element not found"}));
}

#[test]
fn test_static_page_end_to_end() {
    let html = r##"<!DOCTYPE html>
<html>
<head><link rel="stylesheet" href="/css/main.css"></head>
<body><a class="btn" href="#">Go</a></body>
</html>"##;
    let css = ".btn { color: #ff0000; padding: 8px 16px; }\n\
               .btn:hover { color: #0000ff; }\n\
               @media (max-width: 767px) { .btn { padding: 4px; } }\n\
               /*# sourceMappingURL=main.css.map */\n";
    let map = json!({
        "version": 3,
        "sources": ["../scss/main.scss"],
        "sourcesContent": [
            ".btn {\n  color: red;\n  padding: 8px 16px;\n\n  &:hover {\n    color: blue;\n  }\n\n  @include sp {\n    padding: 4px;\n  }\n}\n"
        ]
    });
    let fetcher = MemoryFetcher::new()
        .with(MAIN_CSS, css)
        .with(MAIN_MAP, &map.to_string());
    let page = StaticPage::load(html, "https://site.test/pages/index.html", &fetcher).unwrap();
    let mut session = InspectorSession::new(page, fetcher);
    session.load_source_maps();

    let scss = session
        .render_sass(
            "/html[1]/body[1]/a[1]",
            BuildOptions::default(),
            &SassOptions::default(),
        )
        .unwrap();
    let expected = "\
a.btn {
  color: #ff0000;
  padding: 8px 16px;

  @include sp {
    padding: 4px;
  }

  @include hover() {
    color: #0000ff;
  }
}
";
    assert_eq!(scss, expected);
}
