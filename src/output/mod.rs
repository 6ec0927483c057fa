//! Report output: console text and JSON

pub mod json;
pub mod text;
