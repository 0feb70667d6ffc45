//! Recipe model: requirements, overlays, platform facts, layout and host conf.

pub mod conf;
pub mod error;
pub mod exports;
pub mod layout;
pub mod overlay;
pub mod platform;
pub mod recipe;
pub mod requirement;
