//! Request and response types for the HTTP API.

pub mod diagrams;
pub mod edits;
pub mod tasks;
