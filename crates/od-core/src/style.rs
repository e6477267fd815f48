//! Per-shape style records and the default/override merge policy.
//!
//! Styles are persisted as loose JSON objects, so every field goes through
//! an explicit merge step: a well-formed value overrides, anything else
//! (missing, `null`, NaN, wrong type, empty string) falls back to the shape's
//! default. The same rule applies when a single field is patched at runtime.

use crate::shape::ShapeKind;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ─── Colors ──────────────────────────────────────────────────────────────

/// RGBA color. Stored as 4 × f32 [0.0, 1.0], serialized as a hex string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn hex_pair(hi: u8, lo: u8) -> Option<f32> {
    Some((hex_val(hi)? << 4 | hex_val(lo)?) as f32 / 255.0)
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from 8-bit channels.
    pub const fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0)
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA` (the `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let b = hex.as_bytes();
        match b.len() {
            6 => Some(Self::rgba(
                hex_pair(b[0], b[1])?,
                hex_pair(b[2], b[3])?,
                hex_pair(b[4], b[5])?,
                1.0,
            )),
            8 => Some(Self::rgba(
                hex_pair(b[0], b[1])?,
                hex_pair(b[2], b[3])?,
                hex_pair(b[4], b[5])?,
                hex_pair(b[6], b[7])?,
            )),
            _ => None,
        }
    }

    /// Emit as `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    pub fn to_hex(&self) -> String {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let (r, g, b, a) = (byte(self.r), byte(self.g), byte(self.b), byte(self.a));
        if a == 255 {
            format!("#{r:02X}{g:02X}{b:02X}")
        } else {
            format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("bad color `{s}`")))
    }
}

const BLUE: Color = Color::rgb8(0x29, 0x62, 0xFF);
const RED: Color = Color::rgb8(0xF2, 0x36, 0x45);
const GREY: Color = Color::rgb8(0x78, 0x7B, 0x86);
const WHITE: Color = Color::rgb8(0xFF, 0xFF, 0xFF);

// ─── Dash pattern ────────────────────────────────────────────────────────

/// Stroke dash pattern. Numeric form (0–4) matches the host chart's
/// line-style constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineDash {
    #[default]
    Solid,
    Dotted,
    Dashed,
    LargeDashed,
    SparseDotted,
}

impl LineDash {
    fn from_value(v: &Value) -> Option<Self> {
        if let Some(n) = v.as_u64() {
            return match n {
                0 => Some(Self::Solid),
                1 => Some(Self::Dotted),
                2 => Some(Self::Dashed),
                3 => Some(Self::LargeDashed),
                4 => Some(Self::SparseDotted),
                _ => None,
            };
        }
        match v.as_str()? {
            "solid" => Some(Self::Solid),
            "dotted" => Some(Self::Dotted),
            "dashed" => Some(Self::Dashed),
            "large-dashed" => Some(Self::LargeDashed),
            "sparse-dotted" => Some(Self::SparseDotted),
            _ => None,
        }
    }
}

// ─── Field merge helpers ─────────────────────────────────────────────────

/// Apply one field of `patch`: a present key overrides `current` when
/// `parse` accepts it and resets it to `default` otherwise. Absent keys
/// leave `current` untouched.
fn merge<T>(
    patch: &Map<String, Value>,
    key: &str,
    parse: impl Fn(&Value) -> Option<T>,
    current: &mut T,
    default: T,
) {
    if let Some(v) = patch.get(key) {
        match parse(v) {
            Some(value) => *current = value,
            None => {
                log::debug!("style field `{key}` malformed ({v}), using default");
                *current = default;
            }
        }
    }
}

fn finite(v: &Value) -> Option<f64> {
    v.as_f64().filter(|n| n.is_finite())
}

fn positive(v: &Value) -> Option<f64> {
    finite(v).filter(|n| *n > 0.0)
}

fn unit(v: &Value) -> Option<f64> {
    finite(v).filter(|n| (0.0..=1.0).contains(n))
}

fn color(v: &Value) -> Option<Color> {
    v.as_str().and_then(Color::from_hex)
}

fn boolean(v: &Value) -> Option<bool> {
    v.as_bool()
}

fn levels(v: &Value) -> Option<Vec<f64>> {
    let items = v.as_array()?;
    let parsed: Option<Vec<f64>> = items.iter().map(finite).collect();
    parsed.filter(|l| !l.is_empty())
}

// ─── Style records ───────────────────────────────────────────────────────

/// Style of the rectangle family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RectangleStyle {
    pub fill_color: Color,
    pub fill_opacity: f64,
    pub border_color: Color,
    pub border_width: f64,
    pub border_dash: LineDash,
    pub label_color: Color,
    pub label_size: f64,
    pub show_label: bool,
}

impl Default for RectangleStyle {
    fn default() -> Self {
        Self {
            fill_color: BLUE,
            fill_opacity: 0.2,
            border_color: BLUE,
            border_width: 1.0,
            border_dash: LineDash::Solid,
            label_color: WHITE,
            label_size: 12.0,
            show_label: true,
        }
    }
}

impl RectangleStyle {
    fn apply(&mut self, patch: &Map<String, Value>, d: &Self) {
        merge(patch, "fillColor", color, &mut self.fill_color, d.fill_color);
        merge(patch, "fillOpacity", unit, &mut self.fill_opacity, d.fill_opacity);
        merge(patch, "borderColor", color, &mut self.border_color, d.border_color);
        merge(patch, "borderWidth", positive, &mut self.border_width, d.border_width);
        merge(patch, "borderDash", LineDash::from_value, &mut self.border_dash, d.border_dash);
        merge(patch, "labelColor", color, &mut self.label_color, d.label_color);
        merge(patch, "labelSize", positive, &mut self.label_size, d.label_size);
        merge(patch, "showLabel", boolean, &mut self.show_label, d.show_label);
    }
}

/// Style of the line family (segments, rays, horizontal and vertical lines).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStyle {
    pub color: Color,
    pub width: f64,
    pub dash: LineDash,
    pub label_color: Color,
    pub label_size: f64,
    pub show_label: bool,
    pub show_price_label: bool,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: BLUE,
            width: 2.0,
            dash: LineDash::Solid,
            label_color: BLUE,
            label_size: 12.0,
            show_label: true,
            show_price_label: false,
        }
    }
}

impl LineStyle {
    fn apply(&mut self, patch: &Map<String, Value>, d: &Self) {
        merge(patch, "color", color, &mut self.color, d.color);
        merge(patch, "width", positive, &mut self.width, d.width);
        merge(patch, "dash", LineDash::from_value, &mut self.dash, d.dash);
        merge(patch, "labelColor", color, &mut self.label_color, d.label_color);
        merge(patch, "labelSize", positive, &mut self.label_size, d.label_size);
        merge(patch, "showLabel", boolean, &mut self.show_label, d.show_label);
        merge(patch, "showPriceLabel", boolean, &mut self.show_price_label, d.show_price_label);
    }
}

/// Standard retracement ratios.
pub const DEFAULT_FIB_LEVELS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

/// Style of a fibonacci retracement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FibonacciStyle {
    pub line_color: Color,
    pub line_width: f64,
    pub line_dash: LineDash,
    pub fill_opacity: f64,
    pub levels: Vec<f64>,
    pub show_labels: bool,
}

impl Default for FibonacciStyle {
    fn default() -> Self {
        Self {
            line_color: GREY,
            line_width: 1.0,
            line_dash: LineDash::Solid,
            fill_opacity: 0.1,
            levels: DEFAULT_FIB_LEVELS.to_vec(),
            show_labels: true,
        }
    }
}

impl FibonacciStyle {
    fn apply(&mut self, patch: &Map<String, Value>, d: &Self) {
        merge(patch, "lineColor", color, &mut self.line_color, d.line_color);
        merge(patch, "lineWidth", positive, &mut self.line_width, d.line_width);
        merge(patch, "lineDash", LineDash::from_value, &mut self.line_dash, d.line_dash);
        merge(patch, "fillOpacity", unit, &mut self.fill_opacity, d.fill_opacity);
        merge(patch, "levels", levels, &mut self.levels, d.levels.clone());
        merge(patch, "showLabels", boolean, &mut self.show_labels, d.show_labels);
    }
}

/// Typed style options. The variant is fixed by the annotation's shape kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StyleOptions {
    Rectangle(RectangleStyle),
    Line(LineStyle),
    Fibonacci(FibonacciStyle),
}

impl StyleOptions {
    /// Defaults for a shape kind.
    pub fn defaults_for(kind: ShapeKind) -> Self {
        match kind {
            ShapeKind::Rectangle | ShapeKind::RectangleExtended => {
                Self::Rectangle(RectangleStyle::default())
            }
            ShapeKind::Line | ShapeKind::LineRay => Self::Line(LineStyle::default()),
            ShapeKind::HorizontalLine | ShapeKind::HorizontalRay => Self::Line(LineStyle {
                color: RED,
                width: 1.0,
                label_color: RED,
                show_price_label: true,
                ..LineStyle::default()
            }),
            ShapeKind::VerticalLine => Self::Line(LineStyle {
                color: GREY,
                width: 1.0,
                label_color: GREY,
                ..LineStyle::default()
            }),
            ShapeKind::Fibonacci => Self::Fibonacci(FibonacciStyle::default()),
        }
    }

    /// Build a style from a persisted JSON value, merging over the defaults.
    /// A non-object value yields the defaults unchanged.
    pub fn from_value(kind: ShapeKind, value: &Value) -> Self {
        let mut style = Self::defaults_for(kind);
        style.apply_patch(kind, value);
        style
    }

    /// Patch individual fields. Malformed fields reset to the default.
    pub fn apply_patch(&mut self, kind: ShapeKind, patch: &Value) {
        let Some(patch) = patch.as_object() else {
            if !patch.is_null() {
                log::warn!("ignoring non-object style patch for {kind}: {patch}");
            }
            return;
        };
        let defaults = Self::defaults_for(kind);
        match (self, &defaults) {
            (Self::Rectangle(s), Self::Rectangle(d)) => s.apply(patch, d),
            (Self::Line(s), Self::Line(d)) => s.apply(patch, d),
            (Self::Fibonacci(s), Self::Fibonacci(d)) => s.apply(patch, d),
            (s, _) => {
                log::warn!("style family mismatch for {kind}, resetting to defaults");
                *s = Self::from_value(kind, &Value::Object(patch.clone()));
            }
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Stroke width that drives the hit tolerance.
    pub fn stroke_width(&self) -> f64 {
        match self {
            Self::Rectangle(s) => s.border_width,
            Self::Line(s) => s.width,
            Self::Fibonacci(s) => s.line_width,
        }
    }

    /// The emphasised look of a selected annotation. Derived on demand so the
    /// persisted style is never touched.
    pub fn selection_override(&self) -> Self {
        match self {
            Self::Rectangle(s) => Self::Rectangle(RectangleStyle {
                border_width: s.border_width + 1.0,
                border_dash: LineDash::Solid,
                fill_opacity: (s.fill_opacity + 0.1).min(1.0),
                ..s.clone()
            }),
            Self::Line(s) => Self::Line(LineStyle {
                width: s.width + 1.0,
                show_price_label: true,
                ..s.clone()
            }),
            Self::Fibonacci(s) => Self::Fibonacci(FibonacciStyle {
                line_width: s.line_width + 1.0,
                ..s.clone()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn color_hex_roundtrip() {
        let c = Color::from_hex("#2962FF").unwrap();
        assert_eq!(c.to_hex(), "#2962FF");
        let translucent = Color::from_hex("#FF000080").unwrap();
        assert_eq!(translucent.to_hex(), "#FF000080");
        assert!(Color::from_hex("#12").is_none());
        assert!(Color::from_hex("zzzzzz").is_none());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let style = StyleOptions::from_value(
            ShapeKind::Rectangle,
            &json!({ "fillColor": "#00FF00", "borderWidth": 3 }),
        );
        let StyleOptions::Rectangle(s) = style else {
            panic!("expected rectangle style");
        };
        assert_eq!(s.fill_color.to_hex(), "#00FF00");
        assert_eq!(s.border_width, 3.0);
        assert_eq!(s.fill_opacity, RectangleStyle::default().fill_opacity);
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let style = StyleOptions::from_value(
            ShapeKind::Line,
            &json!({ "color": 42, "width": "wide", "dash": 9, "showLabel": "yes" }),
        );
        assert_eq!(style, StyleOptions::defaults_for(ShapeKind::Line));
    }

    #[test]
    fn patch_resets_malformed_field_and_keeps_others() {
        let mut style = StyleOptions::from_value(
            ShapeKind::Line,
            &json!({ "color": "#00FF00", "width": 4 }),
        );
        style.apply_patch(ShapeKind::Line, &json!({ "width": null }));
        let StyleOptions::Line(s) = &style else {
            panic!("expected line style");
        };
        assert_eq!(s.width, LineStyle::default().width);
        assert_eq!(s.color.to_hex(), "#00FF00");
    }

    #[test]
    fn dash_accepts_numeric_and_named_forms() {
        let a = StyleOptions::from_value(ShapeKind::Line, &json!({ "dash": 2 }));
        let b = StyleOptions::from_value(ShapeKind::Line, &json!({ "dash": "dashed" }));
        assert_eq!(a, b);
    }

    #[test]
    fn fibonacci_levels_reject_non_numeric_entries() {
        let style =
            StyleOptions::from_value(ShapeKind::Fibonacci, &json!({ "levels": [0, "x", 1] }));
        let StyleOptions::Fibonacci(s) = style else {
            panic!("expected fibonacci style");
        };
        assert_eq!(s.levels, DEFAULT_FIB_LEVELS.to_vec());
    }

    #[test]
    fn selection_override_leaves_original_untouched() {
        let style = StyleOptions::defaults_for(ShapeKind::Line);
        let selected = style.selection_override();
        assert_eq!(selected.stroke_width(), style.stroke_width() + 1.0);
        assert_eq!(style, StyleOptions::defaults_for(ShapeKind::Line));
    }

    #[test]
    fn serialized_style_reloads_identically() {
        let style = StyleOptions::from_value(
            ShapeKind::Fibonacci,
            &json!({ "levels": [0, 0.5, 1], "lineColor": "#112233" }),
        );
        let reloaded = StyleOptions::from_value(ShapeKind::Fibonacci, &style.to_value());
        assert_eq!(reloaded, style);
    }
}
