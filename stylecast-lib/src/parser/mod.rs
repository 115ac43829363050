pub mod css_rules;
pub mod page_html;
