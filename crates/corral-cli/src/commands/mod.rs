//! CLI commands

pub mod apply;
pub mod package;
pub mod render;
pub mod serve;
pub mod sync;
pub mod templates;
