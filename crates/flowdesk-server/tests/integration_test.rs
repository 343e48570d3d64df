//! End-to-end tests for the flowdesk HTTP API.
//!
//! Each test builds a fresh AppState backed by a SQLite database in its own
//! temp directory and drives the router with `tower::ServiceExt::oneshot`,
//! without starting a network server.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use flowdesk_server::config::ServerConfig;
use flowdesk_server::router::build_router;
use flowdesk_server::state::AppState;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

const DEBOUNCE_MS: i64 = 20;

/// Creates state backed by a unique temp database. Keep the `TempDir` alive
/// for the duration of the test.
fn test_state() -> (AppState, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig {
        db_path: dir.path().join("flowdesk.db").to_string_lossy().into_owned(),
        ..ServerConfig::default()
    };
    config.canvas.viewport_debounce_ms = DEBOUNCE_MS;
    let state = AppState::new(config).expect("failed to create AppState");
    (state, dir)
}

fn test_app() -> (Router, TempDir) {
    let (state, dir) = test_state();
    (build_router(state), dir)
}

async fn send(app: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(path);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!(null));
    (status, json)
}

async fn get_json(app: &Router, path: &str) -> (StatusCode, Value) {
    send(app, "GET", path, None).await
}

async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", path, Some(body)).await
}

/// Creates a diagram with nodes `a`, `b`, `c` and returns its id.
async fn diagram_abc(app: &Router) -> String {
    let (status, created) = post_json(app, "/diagrams", json!({ "name": "release plan" })).await;
    assert_eq!(status, StatusCode::OK, "{created}");
    let id = created["diagram"]["id"].as_str().unwrap().to_string();

    let patches: Vec<Value> = [("a", 0.0), ("b", 100.0), ("c", 200.0)]
        .iter()
        .map(|(node, x)| {
            json!({
                "type": "addNode",
                "node": { "id": node, "type": "default", "position": { "x": x, "y": 0.0 } }
            })
        })
        .collect();
    let (status, view) = post_json(
        app,
        &format!("/diagrams/{}/patches", id),
        json!({ "patches": patches }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{view}");
    assert_eq!(view["frame"]["nodes"].as_array().unwrap().len(), 3);
    id
}

fn node<'a>(view: &'a Value, id: &str) -> &'a Value {
    view["frame"]["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["id"] == id)
        .unwrap()
}

// ---------------------------------------------------------------------------
// Diagrams
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_list_get_delete() {
    let (app, _dir) = test_app();
    let id = diagram_abc(&app).await;

    let (status, list) = get_json(&app, "/diagrams").await;
    assert_eq!(status, StatusCode::OK);
    let diagrams = list["diagrams"].as_array().unwrap();
    assert_eq!(diagrams.len(), 1);
    assert_eq!(diagrams[0]["nodeCount"], 3);

    let (status, document) = get_json(&app, &format!("/diagrams/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(document["meta"]["name"], "release plan");
    assert_eq!(document["nodes"].as_array().unwrap().len(), 3);

    let (status, _) = send(&app, "DELETE", &format!("/diagrams/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = get_json(&app, &format!("/diagrams/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn delete_closes_the_session_for_good() {
    let (state, _dir) = test_state();
    let app = build_router(state.clone());
    let id = diagram_abc(&app).await;
    let (status, _) = get_json(&app, &format!("/diagrams/{}/render", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.sessions.len(), 1);

    let (status, _) = send(&app, "DELETE", &format!("/diagrams/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.sessions.is_empty());

    let (status, _) = get_json(&app, &format!("/diagrams/{}/render", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(state.sessions.is_empty());
}

#[tokio::test]
async fn empty_name_is_rejected() {
    let (app, _dir) = test_app();
    let (status, body) = post_json(&app, "/diagrams", json!({ "name": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn unknown_patch_type_is_rejected() {
    let (app, _dir) = test_app();
    let id = diagram_abc(&app).await;
    let (status, _) = post_json(
        &app,
        &format!("/diagrams/{}/patches", id),
        json!({ "patches": [{ "type": "teleportNode", "id": "a" }] }),
    )
    .await;
    assert!(status.is_client_error());
}

// ---------------------------------------------------------------------------
// Editing and history
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cycle_is_rejected_and_undo_redo_round_trip() {
    let (app, _dir) = test_app();
    let id = diagram_abc(&app).await;
    let connect = format!("/diagrams/{}/connect", id);

    let (status, ab) = post_json(&app, &connect, json!({ "source": "a", "target": "b" })).await;
    assert_eq!(status, StatusCode::OK, "{ab}");
    assert!(ab["edgeId"].is_string());

    let (status, rejected) = post_json(&app, &connect, json!({ "source": "b", "target": "a" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(rejected["error"]["code"], "CYCLE_REJECTED");
    assert_eq!(rejected["error"]["details"]["path"], json!(["a", "b"]));

    let (status, dup) = post_json(&app, &connect, json!({ "source": "a", "target": "b" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(dup["error"]["code"], "DUPLICATE_CONNECTION");

    let (status, bc) = post_json(&app, &connect, json!({ "source": "b", "target": "c" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bc["view"]["frame"]["edges"].as_array().unwrap().len(), 2);

    let (status, undone) = post_json(&app, &format!("/diagrams/{}/undo", id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(undone["applied"], true);
    assert_eq!(undone["view"]["frame"]["edges"].as_array().unwrap().len(), 1);
    assert_eq!(undone["view"]["canRedo"], true);

    let (_, document) = get_json(&app, &format!("/diagrams/{}", id)).await;
    assert_eq!(document["edges"].as_array().unwrap().len(), 1);

    let (_, redone) = post_json(&app, &format!("/diagrams/{}/redo", id), json!({})).await;
    assert_eq!(redone["applied"], true);
    assert_eq!(redone["view"]["frame"]["edges"].as_array().unwrap().len(), 2);

    let (_, again) = post_json(&app, &format!("/diagrams/{}/redo", id), json!({})).await;
    assert_eq!(again["applied"], false);
}

#[tokio::test]
async fn raw_add_edge_closing_a_loop_is_rejected() {
    let (app, _dir) = test_app();
    let id = diagram_abc(&app).await;
    let (status, _) = post_json(
        &app,
        &format!("/diagrams/{}/connect", id),
        json!({ "source": "a", "target": "b" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, rejected) = post_json(
        &app,
        &format!("/diagrams/{}/patches", id),
        json!({ "patches": [{
            "type": "addEdge",
            "edge": { "id": "ba", "source": "b", "target": "a", "type": "default", "connectionHash": "" }
        }] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{rejected}");
    assert_eq!(rejected["error"]["code"], "CYCLE_REJECTED");
    assert_eq!(rejected["error"]["details"]["path"], json!(["a", "b"]));

    let (_, document) = get_json(&app, &format!("/diagrams/{}", id)).await;
    assert_eq!(document["edges"].as_array().unwrap().len(), 1);
    let (_, view) = get_json(&app, &format!("/diagrams/{}/render", id)).await;
    assert_eq!(view["frame"]["edges"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn undo_restores_the_stored_document_exactly() {
    let (app, _dir) = test_app();
    let id = diagram_abc(&app).await;
    let connect = format!("/diagrams/{}/connect", id);
    post_json(&app, &connect, json!({ "source": "a", "target": "b" })).await;
    post_json(&app, &connect, json!({ "source": "b", "target": "c" })).await;
    let (_, before) = get_json(&app, &format!("/diagrams/{}", id)).await;

    // Let the wall clock move so fresh stamps would differ.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (status, _) = post_json(&app, &format!("/diagrams/{}/remove", id), json!({ "nodes": ["b"] })).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (status, _) = post_json(&app, &format!("/diagrams/{}/undo", id), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, after) = get_json(&app, &format!("/diagrams/{}", id)).await;
    assert_eq!(after, before);
}

#[tokio::test]
async fn viewport_shows_at_once_and_is_saved_after_the_window() {
    let (app, _dir) = test_app();
    let id = diagram_abc(&app).await;
    let moved = json!({ "x": 120.0, "y": -40.0, "zoom": 1.5 });

    let (status, view) = post_json(&app, &format!("/diagrams/{}/viewport", id), moved.clone()).await;
    assert_eq!(status, StatusCode::OK, "{view}");
    assert_eq!(view["frame"]["viewport"], moved);
    assert_eq!(view["canUndo"], true);
    let (_, document) = get_json(&app, &format!("/diagrams/{}", id)).await;
    assert_ne!(document["meta"]["viewport"], moved);

    let mut saved = false;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(DEBOUNCE_MS as u64)).await;
        let (_, document) = get_json(&app, &format!("/diagrams/{}", id)).await;
        if document["meta"]["viewport"] == moved {
            saved = true;
            break;
        }
    }
    assert!(saved, "viewport was never saved");

    // A raw updateViewport takes the same path and stays out of history:
    // undo still reverts the batch that added the nodes.
    let raw = json!({ "x": 0.0, "y": 0.0, "zoom": 2.0 });
    let (status, view) = post_json(
        &app,
        &format!("/diagrams/{}/patches", id),
        json!({ "patches": [{ "type": "updateViewport", "viewport": raw }] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{view}");
    assert_eq!(view["frame"]["viewport"], raw);
    let (_, undone) = post_json(&app, &format!("/diagrams/{}/undo", id), json!({})).await;
    assert_eq!(undone["applied"], true);
    assert!(undone["view"]["frame"]["nodes"].as_array().unwrap().is_empty());
    assert_eq!(undone["view"]["frame"]["viewport"], raw);

    let (status, rejected) = post_json(
        &app,
        &format!("/diagrams/{}/viewport", id),
        json!({ "x": 0.0, "y": 0.0, "zoom": 0.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(rejected["error"]["code"], "INVALID_GEOMETRY");
}

#[tokio::test]
async fn move_commits_one_update() {
    let (app, _dir) = test_app();
    let id = diagram_abc(&app).await;
    let (status, moved) = post_json(
        &app,
        &format!("/diagrams/{}/move", id),
        json!({
            "nodeId": "a",
            "path": [{ "x": 10.0, "y": 5.0 }, { "x": 60.0, "y": 30.0 }],
            "to": { "x": 100.0, "y": 50.0 }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{moved}");
    assert_eq!(moved["patch"]["type"], "updateNode");
    assert_eq!(moved["patch"]["changes"]["position"], json!({ "x": 100.0, "y": 50.0 }));
    assert_eq!(node(&moved["view"], "a")["position"], json!({ "x": 100.0, "y": 50.0 }));

    let (_, document) = get_json(&app, &format!("/diagrams/{}", id)).await;
    let a = document["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["id"] == "a")
        .unwrap();
    assert_eq!(a["position"], json!({ "x": 100.0, "y": 50.0 }));
}

#[tokio::test]
async fn removing_a_node_takes_its_edges() {
    let (app, _dir) = test_app();
    let id = diagram_abc(&app).await;
    let connect = format!("/diagrams/{}/connect", id);
    post_json(&app, &connect, json!({ "source": "a", "target": "b" })).await;
    post_json(&app, &connect, json!({ "source": "b", "target": "c" })).await;

    let (status, removed) = post_json(
        &app,
        &format!("/diagrams/{}/remove", id),
        json!({ "nodes": ["b"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{removed}");
    assert_eq!(removed["removedNodes"], 1);
    assert!(removed["view"]["frame"]["edges"].as_array().unwrap().is_empty());

    let (_, undone) = post_json(&app, &format!("/diagrams/{}/undo", id), json!({})).await;
    assert_eq!(undone["view"]["frame"]["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(undone["view"]["frame"]["edges"].as_array().unwrap().len(), 2);

    let (status, _) = post_json(&app, &format!("/diagrams/{}/remove", id), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Tasks and rendering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tasks_resolve_into_render_and_deletion_clears_references() {
    let (app, _dir) = test_app();
    let id = diagram_abc(&app).await;

    let (status, _) = send(
        &app,
        "PUT",
        "/tasks/t1",
        Some(json!({ "title": "Ship the release", "status": "completed", "priority": "high" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(
        &app,
        &format!("/diagrams/{}/patches", id),
        json!({ "patches": [{
            "type": "updateNode",
            "id": "a",
            "changes": { "data": { "taskRef": "t1" } }
        }] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, view) = get_json(&app, &format!("/diagrams/{}/render?theme=dark", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["theme"], "dark");
    let a = node(&view, "a");
    assert_eq!(a["resolvedTask"]["title"], "Ship the release");
    assert_eq!(a["decorations"][0], json!({ "kind": "statusBadge", "status": "completed" }));

    let (status, _) = send(&app, "DELETE", "/tasks/t1", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, tasks) = get_json(&app, "/tasks").await;
    assert!(tasks["tasks"].as_array().unwrap().is_empty());

    let (_, view) = get_json(&app, &format!("/diagrams/{}/render", id)).await;
    let a = node(&view, "a");
    assert!(a["resolvedTask"].is_null());
    assert!(a["data"]["taskRef"].is_null());

    let (_, document) = get_json(&app, &format!("/diagrams/{}", id)).await;
    assert!(document["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .all(|n| n["data"]["taskRef"].is_null()));

    let (status, _) = send(&app, "DELETE", "/tasks/t1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_theme_is_a_client_error() {
    let (app, _dir) = test_app();
    let id = diagram_abc(&app).await;
    let (status, _) = get_json(&app, &format!("/diagrams/{}/render?theme=sepia", id)).await;
    assert!(status.is_client_error());
}
