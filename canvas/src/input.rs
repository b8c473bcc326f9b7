//! Input model: pointer targets, wheel deltas, and the gesture state machine.
//!
//! `GestureRouter` turns pointer-down/move/up sequences into exactly one of a
//! hex click or a pan drag. A press on a hex only arms it; the click commits on
//! release if the pointer stayed within the drag threshold and is still over
//! the same hex. A press on the background has no click meaning and pans from
//! the first move. Wheel input bypasses the router entirely.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::consts::DRAG_THRESHOLD_PX;
use crate::geometry::{HexCoord, Point};

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    Middle,
    Secondary,
}

impl Button {
    /// Map a DOM `PointerEvent.button` value.
    #[must_use]
    pub fn from_dom(button: i16) -> Self {
        match button {
            1 => Self::Middle,
            2 => Self::Secondary,
            _ => Self::Primary,
        }
    }
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// What lies under the pointer, as resolved by the hit-tester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Hex(HexCoord),
    Background,
}

impl From<Option<HexCoord>> for PointerTarget {
    fn from(hit: Option<HexCoord>) -> Self {
        hit.map_or(Self::Background, Self::Hex)
    }
}

/// Active gesture between pointer-down and pointer-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GesturePhase {
    /// No pointer is down.
    #[default]
    Idle,
    /// Pressed on a hex; becomes a click on release unless the pointer travels.
    ArmedOnHex(HexCoord),
    /// Pressed on the background; the next move starts panning.
    ArmedOnBackground,
    /// Panning; release ends the gesture without a click.
    Dragging,
}

/// The single effect of one pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    None,
    /// Screen-space delta to forward to the viewport.
    Pan { dx: f64, dy: f64 },
    HexClicked(HexCoord),
}

/// Click-versus-drag disambiguation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureRouter {
    phase: GesturePhase,
    /// Screen position of the pointer-down that started the gesture.
    down: Point,
    /// Screen position of the previous pointer event.
    last: Point,
}

impl Default for GestureRouter {
    fn default() -> Self {
        Self { phase: GesturePhase::Idle, down: Point::new(0.0, 0.0), last: Point::new(0.0, 0.0) }
    }
}

impl GestureRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    /// Whether a pan is in progress (drives the `grabbing` cursor).
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, GesturePhase::Dragging)
    }

    pub fn pointer_down(&mut self, screen: Point, target: PointerTarget) -> GestureOutcome {
        self.down = screen;
        self.last = screen;
        self.phase = match target {
            PointerTarget::Hex(coord) => GesturePhase::ArmedOnHex(coord),
            PointerTarget::Background => GesturePhase::ArmedOnBackground,
        };
        GestureOutcome::None
    }

    pub fn pointer_move(&mut self, screen: Point) -> GestureOutcome {
        match self.phase {
            GesturePhase::Idle => GestureOutcome::None,
            GesturePhase::ArmedOnHex(_) => {
                let moved_x = (screen.x - self.down.x).abs();
                let moved_y = (screen.y - self.down.y).abs();
                if moved_x <= DRAG_THRESHOLD_PX && moved_y <= DRAG_THRESHOLD_PX {
                    return GestureOutcome::None;
                }
                // Catch up on the travel made while armed.
                self.phase = GesturePhase::Dragging;
                self.pan_to(screen)
            }
            GesturePhase::ArmedOnBackground => {
                self.phase = GesturePhase::Dragging;
                self.pan_to(screen)
            }
            GesturePhase::Dragging => self.pan_to(screen),
        }
    }

    /// Release. `target` is whatever lies under the pointer now.
    pub fn pointer_up(&mut self, target: PointerTarget) -> GestureOutcome {
        let phase = std::mem::take(&mut self.phase);
        match phase {
            GesturePhase::ArmedOnHex(coord) if target == PointerTarget::Hex(coord) => GestureOutcome::HexClicked(coord),
            _ => GestureOutcome::None,
        }
    }

    /// Pointer left the window: abandon the gesture.
    pub fn pointer_leave(&mut self) -> GestureOutcome {
        self.phase = GesturePhase::Idle;
        GestureOutcome::None
    }

    fn pan_to(&mut self, screen: Point) -> GestureOutcome {
        let outcome = GestureOutcome::Pan { dx: screen.x - self.last.x, dy: screen.y - self.last.y };
        self.last = screen;
        outcome
    }
}
