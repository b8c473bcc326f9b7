//! Viewport controller: zoom scale, pan translation, and bounds enforcement.
//!
//! Screen-space is `map * scale + translate`. Every mutation finishes with
//! [`Viewport::clamp_and_apply`], which recomputes the translation from the
//! absolute scale and container size, so repeated pan/zoom never compounds
//! rounding error.
//!
//! BOUNDS
//! ======
//! On an axis where the scaled map fits inside the container, the map is
//! centered. Otherwise the translation is clamped to
//! `[-(scaled - visible), margin]`, where `margin = min(100, 5% of container)`
//! and `visible = container - margin`, which allows a small overscroll while
//! keeping part of the map on screen.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use crate::consts::{BOUNDARY_MARGIN_MAX_PX, BOUNDARY_MARGIN_RATIO, MAX_SCALE, MIN_SCALE, ZOOM_STEP};
use crate::geometry::Point;

/// Direction of a single zoom step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    /// Wheel convention: scrolling up (negative `dy`) zooms in.
    #[must_use]
    pub fn from_wheel(dy: f64) -> Self {
        if dy < 0.0 { Self::In } else { Self::Out }
    }
}

/// Pan/zoom state for one map session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    scale: f64,
    translate_x: f64,
    translate_y: f64,
    container_w: f64,
    container_h: f64,
    map_w: f64,
    map_h: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Viewport {
    /// A viewport at scale 1 over a map of the given extent, with no container yet.
    #[must_use]
    pub fn new(map_w: f64, map_h: f64) -> Self {
        Self { scale: 1.0, translate_x: 0.0, translate_y: 0.0, container_w: 0.0, container_h: 0.0, map_w, map_h }
    }

    // --- Queries ---

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[must_use]
    pub fn translate(&self) -> (f64, f64) {
        (self.translate_x, self.translate_y)
    }

    #[must_use]
    pub fn container_size(&self) -> (f64, f64) {
        (self.container_w, self.container_h)
    }

    #[must_use]
    pub fn map_size(&self) -> (f64, f64) {
        (self.map_w, self.map_h)
    }

    /// Overscroll allowance for an axis with the given container dimension.
    #[must_use]
    pub fn boundary_margin(container: f64) -> f64 {
        BOUNDARY_MARGIN_MAX_PX.min(container * BOUNDARY_MARGIN_RATIO)
    }

    #[must_use]
    pub fn screen_to_map(&self, screen: Point) -> Point {
        Point { x: (screen.x - self.translate_x) / self.scale, y: (screen.y - self.translate_y) / self.scale }
    }

    #[must_use]
    pub fn map_to_screen(&self, map: Point) -> Point {
        Point { x: map.x * self.scale + self.translate_x, y: map.y * self.scale + self.translate_y }
    }

    // --- Mutations ---

    pub fn set_container_size(&mut self, width: f64, height: f64) {
        self.container_w = width;
        self.container_h = height;
        self.clamp_and_apply();
    }

    /// Record a new map extent (after a load, rebuild, or background image change).
    pub fn set_map_size(&mut self, width: f64, height: f64) {
        self.map_w = width;
        self.map_h = height;
        self.clamp_and_apply();
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.translate_x += dx;
        self.translate_y += dy;
        self.clamp_and_apply();
    }

    /// Step the scale by one increment, keeping the anchor's map point fixed on screen.
    ///
    /// Zooming in anchors at `(pointer_x, pointer_y)`; zooming out anchors at
    /// the container center so the map is not flung off-screen near an edge.
    pub fn zoom_at(&mut self, pointer_x: f64, pointer_y: f64, direction: ZoomDirection) {
        let (next, anchor) = match direction {
            ZoomDirection::In => (self.scale + ZOOM_STEP, Point::new(pointer_x, pointer_y)),
            ZoomDirection::Out => (self.scale - ZOOM_STEP, Point::new(self.container_w / 2.0, self.container_h / 2.0)),
        };
        let next = next.clamp(MIN_SCALE, MAX_SCALE);
        let fixed = self.screen_to_map(anchor);
        self.scale = next;
        self.translate_x = anchor.x - fixed.x * next;
        self.translate_y = anchor.y - fixed.y * next;
        self.clamp_and_apply();
    }

    /// Enforce the bounds on both axes from the current absolute state.
    pub fn clamp_and_apply(&mut self) {
        self.translate_x = clamp_axis(self.translate_x, self.container_w, self.map_w * self.scale);
        self.translate_y = clamp_axis(self.translate_y, self.container_h, self.map_h * self.scale);
    }

    /// Center on axes where the map fits; align to the top-left edge otherwise.
    pub fn center(&mut self) {
        let scaled_w = self.map_w * self.scale;
        let scaled_h = self.map_h * self.scale;
        self.translate_x = if scaled_w <= self.container_w { (self.container_w - scaled_w) / 2.0 } else { 0.0 };
        self.translate_y = if scaled_h <= self.container_h { (self.container_h - scaled_h) / 2.0 } else { 0.0 };
        self.clamp_and_apply();
    }

    /// Back to scale 1, centered.
    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.center();
    }
}

fn clamp_axis(translate: f64, container: f64, scaled: f64) -> f64 {
    if scaled <= container {
        return (container - scaled) / 2.0;
    }
    let margin = Viewport::boundary_margin(container);
    let visible = container - margin;
    translate.clamp(-(scaled - visible), margin)
}
