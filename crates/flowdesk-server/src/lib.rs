//! HTTP server and canvas orchestration for flowdesk diagrams.
//!
//! The [`canvas`] module holds the editing logic (one [`canvas::Canvas`]
//! per open diagram); everything else is the axum surface around it.

pub mod canvas;
pub mod config;
pub mod error;
pub mod gesture;
pub mod handlers;
pub mod router;
pub mod schema;
pub mod session;
pub mod state;
