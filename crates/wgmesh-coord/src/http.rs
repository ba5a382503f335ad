//! Coordinator HTTP API
//!
//! Three routes: POST /register, POST /heartbeat, GET /peers. Application
//! outcomes are reported in-band as `{success, error}` with status 200;
//! HTTP status codes are reserved for protocol errors (400 malformed
//! body or missing query, 404 unknown peer on /peers, 405 wrong method).

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::warn;

use wgmesh_proto::{
    HeartbeatRequest, HeartbeatResponse, PeerListResponse, RegisterRequest, RegisterResponse,
};

use crate::error::CoordError;
use crate::registry::Registry;

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<Registry>,
    pub server_public_key: String,
}

/// Build the coordinator router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/register", post(handle_register))
        .route("/heartbeat", post(handle_heartbeat))
        .route("/peers", get(handle_peers))
        .with_state(state)
}

async fn handle_register(
    State(state): State<ApiState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        return (StatusCode::BAD_REQUEST, "invalid request body").into_response();
    };

    match state.registry.register(&req).await {
        Ok(reg) => Json(RegisterResponse {
            success: true,
            error: None,
            assigned_ip: reg.assigned_ip.to_string(),
            network_cidr: reg.network_cidr,
            peer_id: reg.peer_id,
            server_public_key: state.server_public_key.clone(),
        })
        .into_response(),
        Err(e) => {
            warn!(error = %e, "registration rejected");
            Json(RegisterResponse::failure(e.to_string())).into_response()
        }
    }
}

async fn handle_heartbeat(
    State(state): State<ApiState>,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        return (StatusCode::BAD_REQUEST, "invalid request body").into_response();
    };

    match state.registry.heartbeat(&req.peer_id, &req.endpoint).await {
        Ok(()) => Json(HeartbeatResponse::ok()).into_response(),
        Err(e) => Json(HeartbeatResponse::failure(e.to_string())).into_response(),
    }
}

#[derive(Deserialize)]
struct PeersQuery {
    peer_id: Option<String>,
}

async fn handle_peers(
    State(state): State<ApiState>,
    Query(query): Query<PeersQuery>,
) -> Response {
    let Some(peer_id) = query.peer_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing peer_id").into_response();
    };

    match state.registry.list_peers_except(&peer_id).await {
        Ok(peers) => Json(PeerListResponse { peers }).into_response(),
        Err(CoordError::UnknownPeer(_)) => {
            (StatusCode::NOT_FOUND, "peer not found").into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}
