//! HTTP graph export for bootstrapping peers

use crate::node::SharedNode;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{debug, error};

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

async fn graph_handler(State(node): State<SharedNode>) -> Response {
    let exported = node.lock().export_graph();

    match exported {
        Ok(snapshot) => {
            debug!("Serving network graph ({} records)", snapshot.graph.len());
            (StatusCode::OK, Json(snapshot)).into_response()
        }
        Err(e) => {
            error!("Failed to export network graph: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Router serving the signed graph export at `route`
pub fn build_router(node: SharedNode, route: &str) -> Router {
    Router::new()
        .route(route, get(graph_handler))
        .with_state(node)
}
