//! Rendering: projects a map session to drawable primitives, then draws them.
//!
//! [`scene`] is pure and holds no graphics handles, so the projection is
//! testable natively and reusable by other backends (the host's SVG export).
//! [`draw`] is the only place that touches [`web_sys::CanvasRenderingContext2d`].
//!
//! All fallible `Canvas2D` calls propagate errors via `Result<(), JsValue>`.
//! The top-level caller ([`crate::engine::Engine::render`]) handles the result.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

use crate::consts::{
    CONTROLLED_FILL, EXPLORED_OPACITY, HEX_FILL, HEX_SIZE, HEX_STROKE, HEX_STROKE_WIDTH, HIGHLIGHT_STROKE,
    HIGHLIGHT_STROKE_WIDTH, LABEL_COLOR, LABEL_FONT, UNEXPLORED_OPACITY,
};
use crate::engine::MapSession;
use crate::geometry::{HexCoord, Point, cell_polygon, hex_width};
use crate::grid::BackgroundTransform;

/// One visible hex, ready to fill and stroke in map-space.
#[derive(Debug, Clone, PartialEq)]
pub struct HexShape {
    pub coord: HexCoord,
    pub center: Point,
    pub corners: [Point; 6],
    pub fill: &'static str,
    pub opacity: f64,
    /// Non-empty names only.
    pub label: Option<String>,
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Container size in CSS pixels.
    pub viewport_w: f64,
    pub viewport_h: f64,
    /// Map-space to screen-space: `screen = map * scale + translate`.
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    /// Map extent in map-space pixels.
    pub map_w: f64,
    pub map_h: f64,
    pub background: BackgroundTransform,
    /// Row-major; hidden hexes omitted.
    pub hexes: Vec<HexShape>,
    /// Corners of the selected hex.
    pub highlight: Option<[Point; 6]>,
    /// Maximum label width in map-space pixels.
    pub label_max_w: f64,
}

/// Project the session's model and viewport into a [`Scene`].
#[must_use]
pub fn scene(session: &MapSession) -> Scene {
    let hex_scale = session.config.hex_scale;
    let hexes = session
        .grid
        .iter()
        .filter(|cell| cell.is_visible)
        .map(|cell| {
            let (center, corners) = cell_polygon(cell.coord, hex_scale);
            HexShape {
                coord: cell.coord,
                center,
                corners,
                fill: if cell.is_controlled { CONTROLLED_FILL } else { HEX_FILL },
                opacity: if cell.is_explored { EXPLORED_OPACITY } else { UNEXPLORED_OPACITY },
                label: (!cell.name.is_empty()).then(|| cell.name.clone()),
            }
        })
        .collect();
    let highlight = session.selection().map(|coord| cell_polygon(coord, hex_scale).1);
    let (viewport_w, viewport_h) = session.viewport.container_size();
    let (translate_x, translate_y) = session.viewport.translate();
    let (map_w, map_h) = session.viewport.map_size();
    Scene {
        viewport_w,
        viewport_h,
        scale: session.viewport.scale(),
        translate_x,
        translate_y,
        map_w,
        map_h,
        background: session.config.background_transform(),
        hexes,
        highlight,
        label_max_w: hex_width(HEX_SIZE) * hex_scale * 0.9,
    }
}

/// Draw the full scene: background, hexes, labels, then the selection highlight.
///
/// `dpr` is the device pixel ratio.
///
/// # Errors
///
/// Returns `Err` if any `Canvas2D` call fails (e.g. invalid context state).
pub fn draw(
    ctx: &CanvasRenderingContext2d,
    scene: &Scene,
    background: Option<&HtmlImageElement>,
    dpr: f64,
) -> Result<(), JsValue> {
    // Layer 1: clear and set up the viewport transform.
    ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;
    ctx.clear_rect(0.0, 0.0, scene.viewport_w, scene.viewport_h);
    ctx.translate(scene.translate_x, scene.translate_y)?;
    ctx.scale(scene.scale, scene.scale)?;

    // Layer 2: background image.
    if let Some(image) = background {
        let t = scene.background;
        ctx.save();
        ctx.translate(t.translate_x, t.translate_y)?;
        ctx.scale(t.scale_x, t.scale_y)?;
        ctx.draw_image_with_html_image_element(image, 0.0, 0.0)?;
        ctx.restore();
    }

    // Layer 3: hexes, then labels above every outline.
    for hex in &scene.hexes {
        draw_hex(ctx, hex);
    }
    ctx.save();
    ctx.set_fill_style_str(LABEL_COLOR);
    ctx.set_font(LABEL_FONT);
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");
    for hex in &scene.hexes {
        if let Some(label) = &hex.label {
            let fitted = fit_text_with_ellipsis(ctx, label, scene.label_max_w);
            ctx.fill_text(&fitted, hex.center.x, hex.center.y)?;
        }
    }
    ctx.restore();

    // Layer 4: selection.
    if let Some(corners) = &scene.highlight {
        ctx.save();
        trace_polygon(ctx, corners);
        ctx.set_stroke_style_str(HIGHLIGHT_STROKE);
        ctx.set_line_width(HIGHLIGHT_STROKE_WIDTH);
        ctx.stroke();
        ctx.restore();
    }

    Ok(())
}

fn draw_hex(ctx: &CanvasRenderingContext2d, hex: &HexShape) {
    ctx.save();
    ctx.set_global_alpha(hex.opacity);
    trace_polygon(ctx, &hex.corners);
    ctx.set_fill_style_str(hex.fill);
    ctx.fill();
    ctx.set_stroke_style_str(HEX_STROKE);
    ctx.set_line_width(HEX_STROKE_WIDTH);
    ctx.stroke();
    ctx.restore();
}

fn trace_polygon(ctx: &CanvasRenderingContext2d, corners: &[Point; 6]) {
    ctx.begin_path();
    ctx.move_to(corners[0].x, corners[0].y);
    for p in &corners[1..] {
        ctx.line_to(p.x, p.y);
    }
    ctx.close_path();
}

// =============================================================
// Text
// =============================================================

fn fit_text_with_ellipsis(ctx: &CanvasRenderingContext2d, text: &str, max_w: f64) -> String {
    if measured_text_width(ctx, text) <= max_w {
        return text.to_owned();
    }
    let ellipsis = "...";
    let mut chars: Vec<char> = text.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let candidate = format!("{}{ellipsis}", chars.iter().collect::<String>().trim_end());
        if measured_text_width(ctx, &candidate) <= max_w {
            return candidate;
        }
    }
    ellipsis.to_owned()
}

fn measured_text_width(ctx: &CanvasRenderingContext2d, text: &str) -> f64 {
    match ctx.measure_text(text) {
        Ok(metrics) => metrics.width(),
        Err(_) => f64::INFINITY,
    }
}
