//! CLI command implementations.

pub mod effects;
pub mod render;
pub mod validate;
