//! Turns computed style strings back into forms an author would have written.

use crate::properties;

/// Normalize one computed value for `property`.
///
/// `font_size_px` is the element's own computed font size, used for the
/// `line-height` and `letter-spacing` conversions.
pub fn normalize_value(property: &str, value: &str, font_size_px: Option<f64>) -> String {
    if properties::is_color_property(property) {
        return rgb_to_hex(value);
    }
    match (property, font_size_px) {
        ("line-height", Some(base)) if is_px(value) => px_to_unitless(value, base),
        ("letter-spacing", Some(base)) if is_px(value) => px_to_em(value, base),
        _ => value.to_string(),
    }
}

/// Rewrite every opaque `rgb()`/`rgba()` inside `value` to `#rrggbb`.
/// Translucent colors are left exactly as written.
pub fn rgb_to_hex(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = find_rgb_call(rest) {
        out.push_str(&rest[..start]);
        let call = &rest[start..];
        let Some(close) = call.find(')') else {
            out.push_str(call);
            return out;
        };
        let whole = &call[..=close];
        match opaque_hex(whole) {
            Some(hex) => out.push_str(&hex),
            None => out.push_str(whole),
        }
        rest = &call[close + 1..];
    }
    out.push_str(rest);
    out
}

fn find_rgb_call(text: &str) -> Option<usize> {
    let lower = text.to_ascii_lowercase();
    let rgba = lower.find("rgba(");
    let rgb = lower.find("rgb(");
    match (rgb, rgba) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// `rgb(1, 2, 3)` / `rgba(1 2 3 / 1)` to hex, or `None` when translucent
/// or unparseable.
fn opaque_hex(call: &str) -> Option<String> {
    let open = call.find('(')?;
    let inner = &call[open + 1..call.len() - 1];
    let parts: Vec<&str> = inner
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 3 || parts.len() > 4 {
        return None;
    }
    if let Some(alpha) = parts.get(3) {
        if parse_alpha(alpha)? < 1.0 {
            return None;
        }
    }
    let mut hex = String::from("#");
    for channel in &parts[..3] {
        let value: f64 = channel.parse().ok()?;
        hex.push_str(&format!("{:02x}", value.round().clamp(0.0, 255.0) as u8));
    }
    Some(hex)
}

fn parse_alpha(alpha: &str) -> Option<f64> {
    match alpha.strip_suffix('%') {
        Some(percent) => percent.parse::<f64>().ok().map(|p| p / 100.0),
        None => alpha.parse().ok(),
    }
}

fn is_px(value: &str) -> bool {
    parse_px(value).is_some()
}

/// `"24px"` → `24.0`.
pub fn parse_px(value: &str) -> Option<f64> {
    value.trim().strip_suffix("px")?.trim().parse().ok()
}

/// Pixel value as a unitless multiple of `font_size_px`.
pub fn px_to_unitless(value: &str, font_size_px: f64) -> String {
    match parse_px(value) {
        Some(px) if font_size_px > 0.0 => format_ratio(px / font_size_px),
        _ => value.to_string(),
    }
}

/// Pixel value as `em` relative to `font_size_px`.
pub fn px_to_em(value: &str, font_size_px: f64) -> String {
    match parse_px(value) {
        Some(px) if font_size_px > 0.0 => format!("{}em", format_ratio(px / font_size_px)),
        _ => value.to_string(),
    }
}

/// At most four decimals, trailing zeros trimmed.
pub fn format_ratio(ratio: f64) -> String {
    let fixed = format!("{:.4}", ratio);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}
