//! Small shared utilities

pub mod fast_time;
