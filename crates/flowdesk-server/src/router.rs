//! Router assembly for the flowdesk HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with
//! CORS and tracing middleware layers.

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Diagrams
        .route(
            "/diagrams",
            get(handlers::diagrams::list_diagrams).post(handlers::diagrams::create_diagram),
        )
        .route(
            "/diagrams/{id}",
            get(handlers::diagrams::get_diagram).delete(handlers::diagrams::delete_diagram),
        )
        .route("/diagrams/{id}/render", get(handlers::diagrams::render_diagram))
        // Editing
        .route("/diagrams/{id}/patches", post(handlers::edits::apply_patches))
        .route("/diagrams/{id}/connect", post(handlers::edits::connect))
        .route("/diagrams/{id}/remove", post(handlers::edits::remove))
        .route("/diagrams/{id}/move", post(handlers::edits::move_node))
        .route("/diagrams/{id}/retry", post(handlers::edits::retry))
        .route("/diagrams/{id}/viewport", post(handlers::edits::pan_zoom))
        // History
        .route("/diagrams/{id}/undo", post(handlers::history::undo))
        .route("/diagrams/{id}/redo", post(handlers::history::redo))
        // Tasks
        .route("/tasks", get(handlers::tasks::list_tasks))
        .route(
            "/tasks/{id}",
            put(handlers::tasks::upsert_task).delete(handlers::tasks::delete_task),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
