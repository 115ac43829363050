//! Per-attachment inspection session: owns the rule caches for one page and
//! answers the host transport's commands.
//!
//! Caches live behind an [`Arc`]. A tree build clones the `Arc` first, so a
//! reload or clear that lands mid-build never changes the rules that build
//! sees; the new caches apply to the next request.

use crate::error::{Result, StylecastError};
use crate::parser::css_rules::RuleSet;
use crate::sass::{self, SassOptions};
use crate::source_map::{self, Fetcher, InspectedPage, SourceMapIndex};
use crate::style::selector_match::{self, StyleSource};
use crate::tree_builder::{BuildOptions, StyleNode, StyleTreeBuilder};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const KNOWN_ACTIONS: &[&str] = &[
    "loadSourceMaps",
    "clearSourceMaps",
    "getSourceMapStatus",
    "buildStyleTree",
    "getElementInfo",
    "renderSass",
];

/// Rules and authored properties from one load.
#[derive(Debug, Default)]
pub struct RuleSnapshot {
    pub rules: RuleSet,
    pub index: SourceMapIndex,
}

/// Requests accepted from the host transport.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    LoadSourceMaps,
    ClearSourceMaps,
    GetSourceMapStatus,
    #[serde(rename_all = "camelCase")]
    BuildStyleTree {
        xpath: String,
        #[serde(default)]
        use_source_map: Option<bool>,
        #[serde(default)]
        max_depth: Option<usize>,
    },
    GetElementInfo {
        xpath: String,
    },
    #[serde(rename_all = "camelCase")]
    RenderSass {
        xpath: String,
        #[serde(default)]
        use_source_map: Option<bool>,
        #[serde(default)]
        options: SassOptions,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    pub count: usize,
    pub properties: Vec<String>,
}

/// Summary of an element, as shown before its styles are built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag_name: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub child_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    #[serde(rename_all = "camelCase")]
    Loaded {
        status: Status,
        property_count: usize,
        properties: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    SourceMapStatus {
        has_source_map: bool,
        property_count: usize,
        properties: Vec<String>,
        by_file: BTreeMap<String, FileStatus>,
    },
    Tree {
        status: Status,
        data: StyleNode,
    },
    Element {
        status: Status,
        data: ElementInfo,
    },
    Text {
        status: Status,
        data: String,
    },
    Ack {
        status: Status,
    },
    Error {
        status: Status,
        error: String,
    },
}

impl Response {
    pub fn error(err: &StylecastError) -> Self {
        Response::Error {
            status: Status::Error,
            error: err.to_string(),
        }
    }
}

pub struct InspectorSession<P: InspectedPage, F: Fetcher> {
    page: P,
    fetcher: F,
    snapshot: Arc<RuleSnapshot>,
    build_options: BuildOptions,
}

impl<P: InspectedPage, F: Fetcher> InspectorSession<P, F> {
    pub fn new(page: P, fetcher: F) -> Self {
        InspectorSession {
            page,
            fetcher,
            snapshot: Arc::new(RuleSnapshot::default()),
            build_options: BuildOptions::default(),
        }
    }

    pub fn with_build_options(mut self, options: BuildOptions) -> Self {
        self.build_options = options;
        self
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    /// End the attachment, dropping all caches.
    pub fn detach(self) -> P {
        self.page
    }

    /// The caches builds currently run against.
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Rebuild both caches from the page's current stylesheets.
    pub fn load_source_maps(&mut self) -> Arc<RuleSnapshot> {
        let stylesheets = self.page.stylesheets();
        let resolution = source_map::resolve(&stylesheets, &self.fetcher);
        self.snapshot = Arc::new(RuleSnapshot {
            rules: resolution.rules,
            index: resolution.index,
        });
        info!(
            "loaded {} authored properties from {} stylesheets",
            self.snapshot.index.property_count(),
            stylesheets.len()
        );
        self.snapshot()
    }

    pub fn clear_source_maps(&mut self) {
        self.snapshot = Arc::new(RuleSnapshot::default());
    }

    pub fn element(&self, xpath: &str) -> Result<<P as StyleSource>::Handle> {
        selector_match::resolve_xpath(&self.page, xpath)
            .ok_or_else(|| StylecastError::ElementNotFound(xpath.to_string()))
    }

    pub fn element_info(&self, xpath: &str) -> Result<ElementInfo> {
        let element = self.element(xpath)?;
        Ok(ElementInfo {
            tag_name: self.page.tag_name(&element),
            id: self.page.id(&element).filter(|id| !id.is_empty()),
            classes: self.page.classes(&element),
            child_count: self.page.children(&element).len(),
        })
    }

    /// Build the style tree rooted at `element`.
    ///
    /// With no source map loaded, source-map filtering is switched off;
    /// otherwise every property would be filtered away.
    pub fn build_for(&self, element: &<P as StyleSource>::Handle, options: BuildOptions) -> StyleNode {
        let snapshot = self.snapshot();
        let mut options = options;
        if options.use_source_map && !snapshot.index.has_source_map() {
            debug!("no source map loaded, building from the full property list");
            options.use_source_map = false;
        }
        StyleTreeBuilder::new(&self.page, &snapshot.rules, &snapshot.index, options).build(element)
    }

    pub fn build_style_tree(&self, xpath: &str, options: BuildOptions) -> Result<StyleNode> {
        let element = self.element(xpath)?;
        Ok(self.build_for(&element, options))
    }

    pub fn render_sass(
        &self,
        xpath: &str,
        options: BuildOptions,
        sass_options: &SassOptions,
    ) -> Result<String> {
        let tree = self.build_style_tree(xpath, options)?;
        Ok(sass::serialize(&tree, sass_options))
    }

    pub fn source_map_status(&self) -> Response {
        let index = &self.snapshot.index;
        Response::SourceMapStatus {
            has_source_map: index.has_source_map(),
            property_count: index.property_count(),
            properties: index.all.iter().cloned().collect(),
            by_file: index
                .by_file
                .iter()
                .map(|(file, props)| {
                    let status = FileStatus {
                        count: props.len(),
                        properties: props.iter().cloned().collect(),
                    };
                    (file.clone(), status)
                })
                .collect(),
        }
    }

    fn options_for(&self, use_source_map: Option<bool>, max_depth: Option<usize>) -> BuildOptions {
        BuildOptions {
            use_source_map: use_source_map.unwrap_or(self.build_options.use_source_map),
            max_depth: max_depth.unwrap_or(self.build_options.max_depth),
        }
    }

    pub fn handle(&mut self, command: Command) -> Response {
        match command {
            Command::LoadSourceMaps => {
                let snapshot = self.load_source_maps();
                Response::Loaded {
                    status: Status::Ok,
                    property_count: snapshot.index.property_count(),
                    properties: snapshot.index.all.iter().cloned().collect(),
                }
            }
            Command::ClearSourceMaps => {
                self.clear_source_maps();
                Response::Ack { status: Status::Ok }
            }
            Command::GetSourceMapStatus => self.source_map_status(),
            Command::BuildStyleTree {
                xpath,
                use_source_map,
                max_depth,
            } => {
                let options = self.options_for(use_source_map, max_depth);
                match self.build_style_tree(&xpath, options) {
                    Ok(data) => Response::Tree {
                        status: Status::Ok,
                        data,
                    },
                    Err(err) => Response::error(&err),
                }
            }
            Command::GetElementInfo { xpath } => match self.element_info(&xpath) {
                Ok(data) => Response::Element {
                    status: Status::Ok,
                    data,
                },
                Err(err) => Response::error(&err),
            },
            Command::RenderSass {
                xpath,
                use_source_map,
                options,
            } => {
                let build = self.options_for(use_source_map, None);
                match self.render_sass(&xpath, build, &options) {
                    Ok(data) => Response::Text {
                        status: Status::Ok,
                        data,
                    },
                    Err(err) => Response::error(&err),
                }
            }
        }
    }

    /// Decode a JSON request, run it, and encode the response.
    pub fn handle_json(&mut self, request: &str) -> String {
        let response = match parse_command(request) {
            Ok(command) => self.handle(command),
            Err(err) => Response::error(&err),
        };
        serde_json::to_string(&response).unwrap_or_else(|err| {
            format!(r#"{{"status":"error","error":"{}"}}"#, err.to_string().replace('"', "'"))
        })
    }
}

/// Parse a `{"action": ...}` request; unrecognized actions are
/// [`StylecastError::UnknownCommand`].
pub fn parse_command(request: &str) -> Result<Command> {
    let value: serde_json::Value = serde_json::from_str(request)?;
    let action = value
        .get("action")
        .and_then(|a| a.as_str())
        .unwrap_or_default()
        .to_string();
    if !KNOWN_ACTIONS.contains(&action.as_str()) {
        return Err(StylecastError::UnknownCommand(action));
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ElementSnapshot, SnapshotPage};
    use crate::source_map::{MemoryFetcher, StylesheetRef};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    const CSS_URL: &str = "https://site.test/css/main.css";

    fn session() -> InspectorSession<SnapshotPage, MemoryFetcher> {
        let document = ElementSnapshot::new("html").with_child(
            ElementSnapshot::new("body").with_child(
                ElementSnapshot::new("div")
                    .with_class("card")
                    .with_style("padding", "16px")
                    .with_style("margin", "0px")
                    .with_style("color", "rgb(17, 17, 17)")
                    .with_child(ElementSnapshot::new("p").with_class("card-text")),
            ),
        );
        let page = SnapshotPage::new(
            document,
            vec![StylesheetRef::External {
                href: CSS_URL.to_string(),
            }],
        );
        let fetcher = MemoryFetcher::new()
            .with(
                CSS_URL,
                ".card{padding:16px}\n/*# sourceMappingURL=main.css.map */",
            )
            .with(
                "https://site.test/css/main.css.map",
                r#"{"sources":["main.scss"],"sourcesContent":[".card {\n  padding: 16px;\n}"]}"#,
            );
        InspectorSession::new(page, fetcher)
    }

    fn call(session: &mut InspectorSession<SnapshotPage, MemoryFetcher>, request: Value) -> Value {
        serde_json::from_str(&session.handle_json(&request.to_string())).unwrap()
    }

    #[test]
    fn test_load_status_and_clear() {
        let mut session = session();
        let loaded = call(&mut session, json!({"action": "loadSourceMaps"}));
        assert_eq!(
            loaded,
            json!({"status": "ok", "propertyCount": 1, "properties": ["padding"]})
        );

        let status = call(&mut session, json!({"action": "getSourceMapStatus"}));
        assert_eq!(
            status,
            json!({
                "hasSourceMap": true,
                "propertyCount": 1,
                "properties": ["padding"],
                "byFile": {"main.css": {"count": 1, "properties": ["padding"]}}
            })
        );

        let cleared = call(&mut session, json!({"action": "clearSourceMaps"}));
        assert_eq!(cleared, json!({"status": "ok"}));
        let status = call(&mut session, json!({"action": "getSourceMapStatus"}));
        assert_eq!(status["hasSourceMap"], json!(false));
        assert_eq!(status["propertyCount"], json!(0));
    }

    #[test]
    fn test_build_style_tree_command() {
        let mut session = session();
        call(&mut session, json!({"action": "loadSourceMaps"}));
        let response = call(
            &mut session,
            json!({"action": "buildStyleTree", "xpath": "/html[1]/body[1]/div[1]"}),
        );
        assert_eq!(response["status"], json!("ok"));
        assert_eq!(response["data"]["selector"], json!(".card"));
        assert_eq!(response["data"]["styles"], json!({"padding": "16px"}));
        assert_eq!(response["data"]["children"][0]["tagName"], json!("p"));
        assert_eq!(
            response["data"]["children"][0]["xpath"],
            json!("/html[1]/body[1]/div[1]/p[1]")
        );
    }

    #[test]
    fn test_missing_element_and_unknown_command() {
        let mut session = session();
        let response = call(
            &mut session,
            json!({"action": "buildStyleTree", "xpath": "/html[1]/body[1]/div[9]"}),
        );
        assert_eq!(response, json!({"status": "error", "error": "Element not found"}));

        let response = call(&mut session, json!({"action": "launchRockets"}));
        assert_eq!(
            response,
            json!({"status": "error", "error": "Unknown command: launchRockets"})
        );
    }

    #[test]
    fn test_build_without_maps_uses_full_property_list() {
        let session = session();
        let tree = session
            .build_style_tree("/html[1]/body[1]/div[1]", BuildOptions::default())
            .unwrap();
        assert_eq!(tree.styles["padding"], "16px");
        assert_eq!(tree.styles["color"], "#111111");
        assert!(!tree.styles.contains_key("margin"));
    }

    #[test]
    fn test_session_defaults_apply_to_commands() {
        let shallow = BuildOptions {
            max_depth: 0,
            ..Default::default()
        };
        let mut session = session().with_build_options(shallow);
        call(&mut session, json!({"action": "loadSourceMaps"}));
        let response = call(
            &mut session,
            json!({"action": "buildStyleTree", "xpath": "/html[1]/body[1]/div[1]"}),
        );
        assert_eq!(response["data"]["children"], json!([]));
        let response = call(
            &mut session,
            json!({"action": "buildStyleTree", "xpath": "/html[1]/body[1]/div[1]", "maxDepth": 1}),
        );
        assert_eq!(response["data"]["children"][0]["tagName"], json!("p"));

        let page = session.detach();
        assert_eq!(page.len(), 4);
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let mut session = session();
        session.load_source_maps();
        let before = session.snapshot();
        session.clear_source_maps();
        assert_eq!(before.index.property_count(), 1);
        assert_eq!(session.snapshot().index.property_count(), 0);
    }

    #[test]
    fn test_element_info_and_render() {
        let mut session = session();
        let info = call(
            &mut session,
            json!({"action": "getElementInfo", "xpath": "/html[1]/body[1]/div[1]"}),
        );
        assert_eq!(
            info,
            json!({"status": "ok", "data": {"tagName": "div", "id": null, "classes": ["card"], "childCount": 1}})
        );

        call(&mut session, json!({"action": "loadSourceMaps"}));
        let rendered = call(
            &mut session,
            json!({"action": "renderSass", "xpath": "/html[1]/body[1]/div[1]", "options": {"emitHoverMixin": false}}),
        );
        assert_eq!(
            rendered["data"],
            json!(".card {\n  padding: 16px;\n\n  p.card-text {\n  }\n\n}\n")
        );
    }
}
