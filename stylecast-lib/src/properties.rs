//! Static property tables: which properties are worth extracting, what their
//! browser defaults look like, which shorthands cover which longhands, and the
//! breakpoints that map `@media` conditions to mixin names.

/// Layout, box, text and color properties the engine extracts. Everything
/// else a stylesheet declares is ignored.
pub const IMPORTANT_PROPERTIES: &[&str] = &[
    // display & position
    "display",
    "position",
    "top",
    "right",
    "bottom",
    "left",
    "z-index",
    "float",
    "clear",
    // box
    "width",
    "height",
    "min-width",
    "min-height",
    "max-width",
    "max-height",
    "margin",
    "margin-top",
    "margin-right",
    "margin-bottom",
    "margin-left",
    "padding",
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
    "box-sizing",
    "overflow",
    "overflow-x",
    "overflow-y",
    // border
    "border",
    "border-top",
    "border-right",
    "border-bottom",
    "border-left",
    "border-width",
    "border-style",
    "border-color",
    "border-radius",
    "outline",
    "outline-color",
    "box-shadow",
    // background
    "background",
    "background-color",
    "background-image",
    "background-size",
    "background-position",
    "background-repeat",
    // text
    "color",
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "line-height",
    "letter-spacing",
    "text-align",
    "text-decoration",
    "text-decoration-color",
    "text-transform",
    "white-space",
    "vertical-align",
    // flex & grid
    "flex",
    "flex-direction",
    "flex-wrap",
    "flex-grow",
    "flex-shrink",
    "flex-basis",
    "justify-content",
    "align-items",
    "align-self",
    "gap",
    "row-gap",
    "column-gap",
    "grid-template-columns",
    "grid-template-rows",
    // misc
    "opacity",
    "visibility",
    "transform",
    "transition",
    "cursor",
    "object-fit",
    "list-style",
    "content",
];

/// Properties whose values carry colors that may be rewritten to hex.
pub const COLOR_PROPERTIES: &[&str] = &[
    "color",
    "background",
    "background-color",
    "border",
    "border-top",
    "border-right",
    "border-bottom",
    "border-left",
    "border-color",
    "outline",
    "outline-color",
    "text-decoration-color",
    "box-shadow",
];

/// Properties a child takes from its parent when nothing sets them.
pub const INHERITABLE_PROPERTIES: &[&str] = &[
    "color",
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "line-height",
    "letter-spacing",
    "text-align",
    "text-transform",
    "white-space",
    "visibility",
    "cursor",
    "list-style",
];

/// Known breakpoint conditions (whitespace removed, lowercased) and the mixin
/// each one becomes. Composite conditions come first so that containment
/// checks pick the most specific entry.
pub const BREAKPOINTS: &[(&str, &str)] = &[
    ("(min-width:768px)and(max-width:1023px)", "tab"),
    ("(min-width:768px)and(max-width:1024px)", "tab"),
    ("(max-width:767px)", "sp"),
    ("(max-width:768px)", "sp"),
    ("(max-width:1023px)", "tab"),
    ("(max-width:1024px)", "tab"),
    ("(min-width:768px)", "pc"),
    ("(min-width:769px)", "pc"),
    ("(min-width:1024px)", "pc-wide"),
    ("(min-width:1025px)", "pc-wide"),
];

/// Tags whose initial `display` is `block`.
pub const BLOCK_TAGS: &[&str] = &[
    "html", "body", "div", "section", "article", "aside", "nav", "header", "footer", "main",
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "form", "figure", "blockquote", "pre",
    "address", "fieldset", "hr", "dl", "dd", "dt",
];

pub fn is_important(property: &str) -> bool {
    IMPORTANT_PROPERTIES.contains(&property)
}

pub fn is_color_property(property: &str) -> bool {
    COLOR_PROPERTIES.contains(&property)
}

pub fn is_inheritable(property: &str) -> bool {
    INHERITABLE_PROPERTIES.contains(&property)
}

/// Literal computed values that mean "nothing was authored here".
pub fn default_values(property: &str) -> &'static [&'static str] {
    match property {
        "position" => &["static"],
        "top" | "right" | "bottom" | "left" => &["auto", "0px"],
        "z-index" => &["auto"],
        "float" | "clear" => &["none"],
        "width" | "height" | "flex-basis" => &["auto"],
        "min-width" | "min-height" => &["0px", "auto"],
        "max-width" | "max-height" => &["none"],
        "margin" | "padding" => &["0px", "0px 0px 0px 0px"],
        "margin-top" | "margin-right" | "margin-bottom" | "margin-left" => &["0px"],
        "padding-top" | "padding-right" | "padding-bottom" | "padding-left" => &["0px"],
        "box-sizing" => &["content-box"],
        "overflow" | "overflow-x" | "overflow-y" => &["visible"],
        "border" | "border-top" | "border-right" | "border-bottom" | "border-left" => {
            &["0px none rgb(0, 0, 0)", "none", "0px"]
        }
        "border-width" => &["0px"],
        "border-style" => &["none"],
        "border-radius" => &["0px"],
        "outline" => &["rgb(0, 0, 0) none 0px", "none"],
        "box-shadow" => &["none"],
        "background" => &["rgba(0, 0, 0, 0) none repeat scroll 0% 0% / auto padding-box border-box"],
        "background-color" => &["rgba(0, 0, 0, 0)", "transparent"],
        "background-image" => &["none"],
        "background-size" => &["auto"],
        "background-position" => &["0% 0%"],
        "background-repeat" => &["repeat"],
        "font-weight" => &["400", "normal"],
        "font-style" => &["normal"],
        "line-height" | "letter-spacing" => &["normal"],
        "text-align" => &["start", "left"],
        "text-decoration" => &["none", "none solid rgb(0, 0, 0)"],
        "text-transform" => &["none"],
        "white-space" => &["normal"],
        "vertical-align" => &["baseline"],
        "flex" => &["0 1 auto"],
        "flex-direction" => &["row"],
        "flex-wrap" => &["nowrap"],
        "flex-grow" => &["0"],
        "flex-shrink" => &["1"],
        "justify-content" | "align-items" | "align-self" => &["normal", "auto"],
        "gap" | "row-gap" | "column-gap" => &["normal", "0px"],
        "grid-template-columns" | "grid-template-rows" => &["none"],
        "opacity" => &["1"],
        "visibility" => &["visible"],
        "transform" => &["none"],
        "transition" => &["all 0s ease 0s", "all"],
        "cursor" => &["auto"],
        "object-fit" => &["fill"],
        "list-style" => &["outside none disc", "disc outside none"],
        "content" => &["normal", "none"],
        _ => &[],
    }
}

/// Longhands covered by a shorthand property.
pub fn longhands(shorthand: &str) -> &'static [&'static str] {
    match shorthand {
        "margin" => &["margin-top", "margin-right", "margin-bottom", "margin-left"],
        "padding" => &["padding-top", "padding-right", "padding-bottom", "padding-left"],
        "border" => &[
            "border-top",
            "border-right",
            "border-bottom",
            "border-left",
            "border-width",
            "border-style",
            "border-color",
        ],
        "background" => &[
            "background-color",
            "background-image",
            "background-size",
            "background-position",
            "background-repeat",
        ],
        "flex" => &["flex-grow", "flex-shrink", "flex-basis"],
        "gap" => &["row-gap", "column-gap"],
        "overflow" => &["overflow-x", "overflow-y"],
        "outline" => &["outline-color"],
        "text-decoration" => &["text-decoration-color"],
        _ => &[],
    }
}

pub fn shorthands() -> impl Iterator<Item = &'static str> {
    IMPORTANT_PROPERTIES
        .iter()
        .copied()
        .filter(|p| !longhands(p).is_empty())
}

/// Maps a raw `@media` prelude to a breakpoint mixin name, if it is one of
/// the known conditions.
pub fn breakpoint_mixin(condition: &str) -> Option<&'static str> {
    let normalized: String = condition
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    BREAKPOINTS
        .iter()
        .find(|(known, _)| normalized.contains(known))
        .map(|(_, mixin)| *mixin)
}

/// Initial value reported for a property when nothing sets or inherits it.
pub fn initial_value(tag: &str, property: &str) -> &'static str {
    match property {
        "display" if BLOCK_TAGS.contains(&tag) => "block",
        "display" if tag == "li" => "list-item",
        "display" if matches!(tag, "head" | "style" | "script" | "link" | "meta" | "title") => {
            "none"
        }
        "display" => "inline",
        "color" => "rgb(0, 0, 0)",
        "font-size" => "16px",
        "font-family" => "serif",
        _ => default_values(property).first().copied().unwrap_or(""),
    }
}
