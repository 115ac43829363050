use crate::error::Result;
use crate::page::StaticPage;
use crate::sass::{self, SassOptions};
use crate::session::InspectorSession;
use crate::source_map::Fetcher;
use crate::tree_builder::{BuildOptions, StyleNode};

pub mod stylecast {
    use super::*;

    /// Load a static page, resolve its source maps and build the style tree
    /// rooted at `xpath`.
    pub fn build_tree<F: Fetcher>(
        html_content: &str,
        base_url: &str,
        xpath: &str,
        fetcher: F,
        options: BuildOptions,
    ) -> Result<StyleNode> {
        let page = StaticPage::load(html_content, base_url, &fetcher)?;
        let mut session = InspectorSession::new(page, fetcher);
        session.load_source_maps();
        session.build_style_tree(xpath, options)
    }

    pub fn generate<F: Fetcher>(
        html_content: &str,
        base_url: &str,
        xpath: &str,
        fetcher: F,
        options: BuildOptions,
        sass_options: &SassOptions,
    ) -> Result<String> {
        let tree = build_tree(html_content, base_url, xpath, fetcher, options)?;
        Ok(sass::serialize(&tree, sass_options))
    }
}
