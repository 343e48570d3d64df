//! HTTP handlers, one module per resource.

pub mod diagrams;
pub mod edits;
pub mod history;
pub mod tasks;
