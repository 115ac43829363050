// Owned copies of lightningcss rules, so the page can outlive the parser's
// borrowed input.
use std::fmt;

/// Style rules of one stylesheet, in source order. `@media`, `@font-face`
/// and friends are not carried.
#[derive(Debug, Default, Clone)]
pub struct OwnedStylesheet {
    pub rules: Vec<OwnedRule>,
}

#[derive(Debug, Clone)]
pub struct OwnedRule {
    /// e.g. "div", ".card > .title", "#header"
    pub selectors: Vec<String>,
    pub declarations: Vec<OwnedDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedDeclaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

impl OwnedDeclaration {
    pub fn new(property: &str, value: &str) -> Self {
        OwnedDeclaration {
            property: property.to_string(),
            value: value.to_string(),
            important: false,
        }
    }
}

impl fmt::Display for OwnedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {{", self.selectors.join(", "))?;
        for decl in &self.declarations {
            let bang = if decl.important { " !important" } else { "" };
            writeln!(f, "  {}: {}{};", decl.property, decl.value, bang)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for OwnedStylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.rules {
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}
