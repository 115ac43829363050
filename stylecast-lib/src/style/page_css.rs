//! Parses page stylesheets with lightningcss into owned rules for the
//! reference page's cascade.
//!
//! Only plain style rules are kept: selectors with pseudo-classes or
//! pseudo-elements and everything inside `@media` describe states and
//! viewports a static page is never in.

use crate::error::{Result, StylecastError};
use crate::style::owned_css::{OwnedDeclaration, OwnedRule, OwnedStylesheet};
use lightningcss::declaration::DeclarationBlock;
use lightningcss::printer::PrinterOptions;
use lightningcss::rules::{style::StyleRule, CssRule};
use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use lightningcss::traits::ToCss;
use log::debug;

fn parser_options<'o, 'i>() -> ParserOptions<'o, 'i> {
    ParserOptions {
        error_recovery: true,
        ..ParserOptions::default()
    }
}

/// Parse a raw CSS string and convert it to a fully-owned stylesheet.
pub fn parse_stylesheet(css_text: &str) -> Result<OwnedStylesheet> {
    let sheet = StyleSheet::parse(css_text, parser_options())
        .map_err(|e| StylecastError::Parse(e.to_string()))?;

    let mut rules = Vec::new();
    for rule in &sheet.rules.0 {
        match rule {
            CssRule::Style(style_rule) => {
                if let Some(owned) = convert_style_rule(style_rule) {
                    rules.push(owned);
                }
            }
            CssRule::Media(_) => debug!("skipping @media block"),
            _ => {}
        }
    }
    Ok(OwnedStylesheet { rules })
}

/// Declarations of a `style` attribute. Unparseable input yields nothing.
pub fn parse_inline_style(style: &str) -> Vec<OwnedDeclaration> {
    match DeclarationBlock::parse_string(style, parser_options()) {
        Ok(block) => convert_declarations(&block),
        Err(err) => {
            debug!("ignoring inline style {style:?}: {err:?}");
            Vec::new()
        }
    }
}

fn convert_style_rule(style_rule: &StyleRule<'_>) -> Option<OwnedRule> {
    let selectors: Vec<String> = style_rule
        .selectors
        .0
        .iter()
        .filter_map(|selector| selector.to_css_string(PrinterOptions::default()).ok())
        .filter(|selector| !selector.contains(':'))
        .collect();
    if selectors.is_empty() {
        return None;
    }
    Some(OwnedRule {
        selectors,
        declarations: convert_declarations(&style_rule.declarations),
    })
}

/// Normal declarations followed by `!important` ones.
fn convert_declarations(block: &DeclarationBlock<'_>) -> Vec<OwnedDeclaration> {
    let normal = block.declarations.iter().map(|p| (p, false));
    let important = block.important_declarations.iter().map(|p| (p, true));
    normal
        .chain(important)
        .filter_map(|(property, important)| {
            let value = property
                .value_to_css_string(PrinterOptions::default())
                .ok()?;
            Some(OwnedDeclaration {
                property: property.property_id().name().to_string(),
                value,
                important,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_rules_are_kept_in_order() {
        let sheet = parse_stylesheet(
            ".card { padding: 16px; }\n\
             .card:hover { padding: 20px; }\n\
             @media (max-width: 767px) { .card { padding: 8px; } }\n\
             #main, .wide > p { width: 100px !important; }",
        )
        .unwrap();
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].selectors, vec![".card".to_string()]);
        assert_eq!(
            sheet.rules[0].declarations,
            vec![OwnedDeclaration::new("padding", "16px")]
        );
        assert_eq!(
            sheet.rules[1].selectors,
            vec!["#main".to_string(), ".wide > p".to_string()]
        );
        assert!(sheet.rules[1].declarations[0].important);
    }

    #[test]
    fn test_inline_style() {
        let declarations = parse_inline_style("height: 40px; display: block");
        assert_eq!(
            declarations,
            vec![
                OwnedDeclaration::new("height", "40px"),
                OwnedDeclaration::new("display", "block"),
            ]
        );
    }

    #[test]
    fn test_display_renders_rules() {
        let sheet = parse_stylesheet(".a { height: 10px }").unwrap();
        assert_eq!(sheet.to_string(), ".a {\n  height: 10px;\n}\n");
    }
}
