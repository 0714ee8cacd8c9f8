//! egui presentation layer.

pub mod app;
pub mod rich_text;
