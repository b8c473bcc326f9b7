//! Standalone SVG rendering of a [`Scene`] for headless export.
//!
//! Output is in map-space: the viewport transform is not applied, so the
//! document covers the whole map at 1:1 regardless of pan and zoom. Layers
//! match the canvas renderer: background, hexes, labels, then highlight.

#[cfg(test)]
#[path = "svg_test.rs"]
mod svg_test;

use std::fmt::Write as _;

use canvas::consts::{HEX_STROKE, HEX_STROKE_WIDTH, HIGHLIGHT_STROKE, HIGHLIGHT_STROKE_WIDTH, LABEL_COLOR};
use canvas::geometry::Point;
use canvas::render::Scene;

/// Label font size in map-space pixels.
const LABEL_FONT_SIZE: f64 = 14.0;
const LABEL_ATTRS: &str = r#"font-family="sans-serif" text-anchor="middle" dominant-baseline="middle""#;

/// A background image referenced by URL, drawn at its natural size.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundImage {
    pub href: String,
    pub width: f64,
    pub height: f64,
}

/// Serialise `scene` to an SVG document.
#[must_use]
pub fn to_svg(scene: &Scene, background: Option<&BackgroundImage>) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    if write_svg(&mut out, scene, background).is_err() {
        out.clear();
    }
    out
}

fn write_svg(out: &mut String, scene: &Scene, background: Option<&BackgroundImage>) -> std::fmt::Result {
    let (w, h) = (fmt_num(scene.map_w), fmt_num(scene.map_h));
    writeln!(out, r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#)?;

    if let Some(image) = background {
        let t = scene.background;
        writeln!(
            out,
            r#"  <image href="{}" width="{}" height="{}" transform="translate({} {}) scale({} {})"/>"#,
            escape(&image.href),
            fmt_num(image.width),
            fmt_num(image.height),
            fmt_num(t.translate_x),
            fmt_num(t.translate_y),
            fmt_num(t.scale_x),
            fmt_num(t.scale_y),
        )?;
    }

    writeln!(out, r#"  <g id="hex-grid-group" stroke="{HEX_STROKE}" stroke-width="{}">"#, fmt_num(HEX_STROKE_WIDTH))?;
    for hex in &scene.hexes {
        writeln!(
            out,
            r#"    <polygon points="{}" fill="{}" opacity="{}"/>"#,
            points(&hex.corners),
            hex.fill,
            fmt_num(hex.opacity),
        )?;
    }
    writeln!(out, "  </g>")?;

    let labelled: Vec<_> = scene.hexes.iter().filter_map(|h| h.label.as_deref().map(|l| (h.center, l))).collect();
    if !labelled.is_empty() {
        writeln!(
            out,
            r#"  <g fill="{LABEL_COLOR}" font-size="{}" {LABEL_ATTRS}>"#,
            fmt_num(LABEL_FONT_SIZE),
        )?;
        for (center, label) in labelled {
            writeln!(
                out,
                r#"    <text x="{}" y="{}" textLength="{}" lengthAdjust="spacingAndGlyphs">{}</text>"#,
                fmt_num(center.x),
                fmt_num(center.y),
                fmt_num(label_length(label, scene.label_max_w)),
                escape(label),
            )?;
        }
        writeln!(out, "  </g>")?;
    }

    if let Some(corners) = &scene.highlight {
        writeln!(
            out,
            r#"  <polygon points="{}" fill="none" stroke="{HIGHLIGHT_STROKE}" stroke-width="{}"/>"#,
            points(corners),
            fmt_num(HIGHLIGHT_STROKE_WIDTH),
        )?;
    }

    writeln!(out, "</svg>")
}

/// Approximate rendered width, capped so long names squeeze inside the hex.
fn label_length(label: &str, max_w: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let estimate = label.chars().count() as f64 * LABEL_FONT_SIZE * 0.6;
    estimate.min(max_w)
}

fn points(corners: &[Point; 6]) -> String {
    corners.iter().map(|p| format!("{},{}", fmt_num(p.x), fmt_num(p.y))).collect::<Vec<_>>().join(" ")
}

/// Two decimals, trailing zeros trimmed.
fn fmt_num(v: f64) -> String {
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_owned() } else { s.to_owned() }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
