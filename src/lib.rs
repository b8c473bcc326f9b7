//! Host for the hex map engine: persistence, dispatch, and export.
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Environment-driven host settings |
//! | [`api`] | `MapStore` trait, `StoreError`, and the HTTP adapter |
//! | [`dispatch`] | `Host`: executes engine actions against a store |
//! | [`maps`] | Open, create, save, and share whole maps |
//! | [`svg`] | Headless SVG export of a rendered scene |

pub mod api;
pub mod config;
pub mod dispatch;
pub mod maps;
pub mod svg;
