pub mod cascade;
pub mod owned_css;
pub mod page_css;
pub mod selector_match;
pub mod values;
