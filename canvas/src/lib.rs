//! Hex map engine for the campaign tracker.
//!
//! This crate is compiled to WebAssembly and mounted in the browser through
//! [`engine::MapCanvas`], and is also linked natively by the `hexkeep` host.
//! It owns one open map at a time:
//! the hex grid and its per-cell state, the pan/zoom viewport, the gesture
//! state machine that separates hex clicks from drags, and the detail panel's
//! edit operations. Persistence is not done here; every handler returns
//! [`engine::Action`]s and the host performs the requested reads and writes,
//! feeding results back through `MapSession::apply_*`.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::MapSession`], browser [`engine::Engine`], and the JS mount [`engine::MapCanvas`] |
//! | [`geometry`] | Hex centers, polygons, and neighbour offsets |
//! | [`grid`] | Map config, hex records, and the cell store |
//! | [`viewport`] | Zoom scale, pan translation, and bounds |
//! | [`input`] | Pointer types and the gesture state machine |
//! | [`hit`] | Hit-testing map points against visible hexes |
//! | [`presenter`] | Selected-hex view model and edit requests |
//! | [`render`] | Scene projection and Canvas2D drawing |
//! | [`consts`] | Layout, zoom, and style constants |

pub mod consts;
pub mod engine;
pub mod geometry;
pub mod grid;
pub mod hit;
pub mod input;
pub mod presenter;
pub mod render;
pub mod viewport;
