//! Source map resolution: find each stylesheet's map, read the original
//! preprocessor source and record which properties the author actually wrote.
//!
//! Stylesheets without a `sourceMappingURL` are treated as third-party CSS and
//! excluded from both the property index and the rule caches. A stylesheet
//! whose map or sources cannot be fetched or parsed contributes an empty
//! property set; nothing here fails the whole resolution.

use crate::error::{Result, StylecastError};
use crate::parser::css_rules::{self, RuleSet};
use crate::properties;
use crate::style::selector_match::StyleSource;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use url::Url;

/// Preprocessor keywords that look like `name: value` lines but are not
/// property declarations.
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "each", "while", "include", "extend", "import", "use", "forward", "mixin",
    "function", "return", "warn", "error", "debug",
];

const MAIN_SOURCE_EXTENSIONS: &[&str] = &["scss", "sass"];

/// A stylesheet attached to the inspected document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StylesheetRef {
    /// `<link rel="stylesheet" href>`; `href` is absolute.
    External { href: String },
    /// `<style>` text, with the document URL as its base.
    Inline {
        text: String,
        #[serde(rename = "baseUrl")]
        base_url: String,
    },
}

/// A page the engine can inspect: computed styles plus its stylesheets.
pub trait InspectedPage: StyleSource {
    fn stylesheets(&self) -> Vec<StylesheetRef>;
}

/// Retrieves text bodies, bypassing whatever origin restrictions the page
/// itself is subject to.
pub trait Fetcher: Send + Sync {
    /// Fails with [`StylecastError::Fetch`] on transport errors and non-2xx
    /// responses.
    fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP(S) fetcher.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(None)
    }

    /// `None` means requests never time out.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StylecastError::fetch("<client>", e))?;
        Ok(HttpFetcher { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| StylecastError::fetch(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StylecastError::fetch(url, format!("HTTP {}", status.as_u16())));
        }
        response.text().map_err(|e| StylecastError::fetch(url, e))
    }
}

/// Reads `file://` URLs from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch_text(&self, url: &str) -> Result<String> {
        let path = Url::parse(url)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| StylecastError::fetch(url, "not a file URL"))?;
        std::fs::read_to_string(&path).map_err(|e| StylecastError::fetch(url, e))
    }
}

/// Dispatches on scheme: `data:`, `file:` and everything else over HTTP.
pub struct DefaultFetcher {
    http: HttpFetcher,
}

impl DefaultFetcher {
    pub fn new() -> Result<Self> {
        Ok(DefaultFetcher {
            http: HttpFetcher::new()?,
        })
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch_text(&self, url: &str) -> Result<String> {
        if url.starts_with("data:") {
            decode_data_url(url)
        } else if url.starts_with("file:") {
            FileFetcher.fetch_text(url)
        } else {
            self.http.fetch_text(url)
        }
    }
}

/// Serves bodies from memory; anything else is a fetch failure.
#[derive(Debug, Default, Clone)]
pub struct MemoryFetcher {
    bodies: HashMap<String, String>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.insert(url, body);
        self
    }

    pub fn insert(&mut self, url: &str, body: &str) {
        self.bodies.insert(url.to_string(), body.to_string());
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch_text(&self, url: &str) -> Result<String> {
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| StylecastError::fetch(url, "HTTP 404"))
    }
}

/// Decode a `data:` URL body (base64 or raw).
pub fn decode_data_url(url: &str) -> Result<String> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| StylecastError::Parse(format!("not a data URL: {url}")))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| StylecastError::Parse("data URL without payload".to_string()))?;
    if meta.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        let bytes = BASE64_STANDARD
            .decode(payload.trim())
            .map_err(|e| StylecastError::Parse(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| StylecastError::Parse(e.to_string()))
    } else {
        Ok(payload.to_string())
    }
}

/// Authored property names per compiled CSS file, plus their union.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMapIndex {
    pub by_file: BTreeMap<String, BTreeSet<String>>,
    pub all: BTreeSet<String>,
}

impl SourceMapIndex {
    pub fn insert_file(&mut self, css_file: &str, authored: BTreeSet<String>) {
        self.all.extend(authored.iter().cloned());
        self.by_file
            .entry(css_file.to_string())
            .or_default()
            .extend(authored);
    }

    /// True when at least one stylesheet carried a source map.
    pub fn has_source_map(&self) -> bool {
        !self.by_file.is_empty()
    }

    pub fn property_count(&self) -> usize {
        self.all.len()
    }

    pub fn file(&self, css_file: &str) -> Option<&BTreeSet<String>> {
        self.by_file.get(css_file)
    }
}

/// Everything one (re)load produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub index: SourceMapIndex,
    pub rules: RuleSet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceMap {
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    source_root: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    sources_content: Option<Vec<Option<String>>>,
}

/// Result for one stylesheet that carried a map.
struct SheetResult {
    css_file: String,
    authored: BTreeSet<String>,
    rules: RuleSet,
}

/// Resolve every stylesheet. Sheets are processed in parallel; merging
/// happens afterwards in document order.
pub fn resolve<F: Fetcher + ?Sized>(stylesheets: &[StylesheetRef], fetcher: &F) -> Resolution {
    let results: Vec<Option<SheetResult>> = stylesheets
        .par_iter()
        .map(|sheet| resolve_sheet(sheet, fetcher))
        .collect();

    let mut resolution = Resolution::default();
    for result in results.into_iter().flatten() {
        resolution.index.insert_file(&result.css_file, result.authored);
        resolution.rules.extend(result.rules);
    }
    info!(
        "resolved {} of {} stylesheets with source maps, {} authored properties, {} plain rules",
        resolution.index.by_file.len(),
        stylesheets.len(),
        resolution.index.property_count(),
        resolution.rules.rules.len()
    );
    resolution
}

fn resolve_sheet<F: Fetcher + ?Sized>(sheet: &StylesheetRef, fetcher: &F) -> Option<SheetResult> {
    let (css_text, base_url) = match sheet {
        StylesheetRef::External { href } => match fetcher.fetch_text(href) {
            Ok(text) => (text, href.as_str()),
            Err(err) => {
                warn!("skipping stylesheet: {err}");
                return None;
            }
        },
        StylesheetRef::Inline { text, base_url } => (text.clone(), base_url.as_str()),
    };

    let Some(map_reference) = find_source_mapping_url(&css_text) else {
        debug!("no sourceMappingURL in stylesheet at {base_url}, excluding it");
        return None;
    };
    let map_url = match resolve_url(base_url, &map_reference) {
        Ok(url) => url,
        Err(err) => {
            warn!("unresolvable source map reference {map_reference:?}: {err}");
            return Some(empty_result(sheet, &map_reference, &css_text));
        }
    };

    let map = match load_map(&map_url, fetcher) {
        Ok(map) => map,
        Err(err) => {
            warn!("source map {map_url} unusable: {err}");
            return Some(empty_result(sheet, &map_url, &css_text));
        }
    };

    let css_file = css_file_name(sheet, &map_url, &map);
    let authored = authored_properties(&map, &map_url, &css_file, fetcher);
    debug!("{css_file}: {} authored properties", authored.len());
    Some(SheetResult {
        rules: css_rules::parse_with_source(&css_text, &css_file),
        css_file,
        authored,
    })
}

fn empty_result(sheet: &StylesheetRef, map_url: &str, css_text: &str) -> SheetResult {
    let css_file = match sheet {
        StylesheetRef::External { href } => file_name(href),
        StylesheetRef::Inline { .. } => file_name(map_url.trim_end_matches(".map")),
    };
    SheetResult {
        rules: css_rules::parse_with_source(css_text, &css_file),
        css_file,
        authored: BTreeSet::new(),
    }
}

fn load_map<F: Fetcher + ?Sized>(map_url: &str, fetcher: &F) -> Result<SourceMap> {
    let body = if map_url.starts_with("data:") {
        decode_data_url(map_url)?
    } else {
        fetcher.fetch_text(map_url)?
    };
    serde_json::from_str(&body).map_err(|e| StylecastError::Parse(e.to_string()))
}

fn authored_properties<F: Fetcher + ?Sized>(
    map: &SourceMap,
    map_url: &str,
    css_file: &str,
    fetcher: &F,
) -> BTreeSet<String> {
    let stem = css_file.strip_suffix(".css").unwrap_or(css_file);
    let embedded = map.sources_content.as_deref().unwrap_or_default();
    let mut authored = BTreeSet::new();

    for (i, source) in map.sources.iter().enumerate() {
        if is_dependency(source) || !is_main_source(source, stem) {
            continue;
        }
        // A missing or null `sourcesContent` entry means the body was not embedded.
        if let Some(Some(content)) = embedded.get(i) {
            authored.extend(extract_authored_properties(content));
            continue;
        }
        let reference = match &map.source_root {
            Some(root) if !root.is_empty() => format!("{}/{}", root.trim_end_matches('/'), source),
            _ => source.clone(),
        };
        let fetched = resolve_url(map_url, &reference).and_then(|url| fetcher.fetch_text(&url));
        match fetched {
            Ok(text) => authored.extend(extract_authored_properties(&text)),
            Err(err) => warn!("skipping source {source}: {err}"),
        }
    }
    authored
}

fn is_dependency(source: &str) -> bool {
    source.ends_with(".css") || source.contains("node_modules/")
}

/// Is `source` the main preprocessor file for a stylesheet with this stem?
/// Partials (`_name.scss`) never are.
fn is_main_source(source: &str, css_stem: &str) -> bool {
    let name = file_name(source);
    if name.starts_with('_') {
        return false;
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) => {
            stem == css_stem && MAIN_SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        }
        None => false,
    }
}

/// Property names declared in preprocessor source, one declaration per line.
///
/// A declaration is an indented (two spaces or a tab) `name: value` line whose
/// name is not a variable, directive or control keyword and whose value does
/// not open a block. Only important properties are returned.
pub fn extract_authored_properties(source: &str) -> BTreeSet<String> {
    let mut authored = BTreeSet::new();
    for line in source.lines() {
        if !(line.starts_with("  ") || line.starts_with('\t')) {
            continue;
        }
        let trimmed = line.trim();
        let Some((name, value)) = trimmed.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        let is_identifier = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '-')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !is_identifier || value.is_empty() || value.ends_with('{') {
            continue;
        }
        let name = name.to_ascii_lowercase();
        if CONTROL_KEYWORDS.contains(&name.as_str()) || !properties::is_important(&name) {
            continue;
        }
        authored.insert(name);
    }
    authored
}

/// The last `sourceMappingURL` annotation in a stylesheet, if any.
pub fn find_source_mapping_url(css: &str) -> Option<String> {
    let marker = "sourceMappingURL=";
    let start = css.rfind(marker)? + marker.len();
    let preceding = css[..start - marker.len()].trim_end();
    if !(preceding.ends_with("/*#") || preceding.ends_with("/*@")) {
        return None;
    }
    let value: String = css[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '*')
        .collect();
    (!value.is_empty()).then_some(value)
}

/// Resolve `reference` against `base`; absolute references pass through.
pub fn resolve_url(base: &str, reference: &str) -> Result<String> {
    if let Ok(absolute) = Url::parse(reference) {
        return Ok(absolute.to_string());
    }
    let base = Url::parse(base).map_err(|e| StylecastError::Parse(format!("{base}: {e}")))?;
    base.join(reference)
        .map(|u| u.to_string())
        .map_err(|e| StylecastError::Parse(format!("{reference}: {e}")))
}

/// Last path segment, without query or fragment.
fn file_name(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn css_file_name(sheet: &StylesheetRef, map_url: &str, map: &SourceMap) -> String {
    match sheet {
        StylesheetRef::External { href } => file_name(href),
        StylesheetRef::Inline { .. } => match &map.file {
            Some(file) if !file.is_empty() => file_name(file),
            _ => file_name(map_url).trim_end_matches(".map").to_string(),
        },
    }
}
