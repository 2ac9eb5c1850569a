//! REST API handlers.
//!
//! Each handler reads via the state store or delegates to the lifecycle
//! service and the autoscaler, returning JSON responses.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/nodes` | List all nodes |
//! | POST | `/api/v1/nodes` | Register a node |
//! | GET | `/api/v1/nodes/:id` | Get node details |
//! | GET | `/api/v1/nodes/:id/status` | Get node status |
//! | GET | `/api/v1/pools` | List pools with derived sizes |
//! | GET | `/api/v1/pools/:id` | Get pool details |
//! | POST | `/api/v1/pools/:id/scale` | Resize a pool |

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};

use ironpool_autoscale::{PoolScaler, ScaleError};
use ironpool_lifecycle::{NodeLifecycle, NodeRegistration, RegisteredInterface};
use ironpool_state::{NodePool, NodeRole, StateStore, WolFlag};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub lifecycle: NodeLifecycle,
    pub scaler: PoolScaler,
}

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    fn fail(data: Option<T>, msg: &str) -> Json<Self> {
        Json(Self {
            success: false,
            data,
            error: Some(msg.to_string()),
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (status, ApiResponse::<()>::fail(None, msg))
}

/// Build the complete API router.
pub fn build_router(store: StateStore, lifecycle: NodeLifecycle, scaler: PoolScaler) -> Router {
    let api_state = ApiState {
        store,
        lifecycle,
        scaler,
    };

    let api_routes = Router::new()
        .route("/nodes", get(list_nodes).post(register_node))
        .route("/nodes/{id}", get(get_node))
        .route("/nodes/{id}/status", get(get_node_status))
        .route("/pools", get(list_pools))
        .route("/pools/{id}", get(get_pool))
        .route("/pools/{id}/scale", post(scale_pool))
        .with_state(api_state);

    Router::new().nest("/api/v1", api_routes)
}

// ── Nodes ──────────────────────────────────────────────────────

/// GET /api/v1/nodes
pub async fn list_nodes(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_nodes() {
        Ok(nodes) => ApiResponse::ok(nodes).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/nodes/:id
pub async fn get_node(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.get_node(&id) {
        Ok(Some(node)) => ApiResponse::ok(node).into_response(),
        Ok(None) => error_response("node not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/nodes/:id/status
pub async fn get_node_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_status(&id) {
        Ok(Some(status)) => ApiResponse::ok(status).into_response(),
        Ok(None) => error_response("node not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// Interface descriptor in a registration request.
#[derive(serde::Deserialize)]
pub struct InterfaceSpec {
    pub name: String,
    pub mac: String,
    pub speed_bps: u64,
    #[serde(default)]
    pub wol: Vec<WolFlag>,
}

/// Registration request body.
#[derive(serde::Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub roles: Vec<NodeRole>,
    pub address: String,
    pub memory_bytes: u64,
    pub cpu_cores: u32,
    pub single_thread_score: u32,
    pub multi_thread_score: u32,
    pub min_power_mw: u32,
    pub max_power_mw: u32,
    #[serde(default)]
    pub interfaces: Vec<InterfaceSpec>,
}

/// POST /api/v1/nodes
pub async fn register_node(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let registration = NodeRegistration {
        name: req.name,
        roles: req.roles,
        address: req.address,
        memory_bytes: req.memory_bytes,
        cpu_cores: req.cpu_cores,
        single_thread_score: req.single_thread_score,
        multi_thread_score: req.multi_thread_score,
        min_power_mw: req.min_power_mw,
        max_power_mw: req.max_power_mw,
        interfaces: req
            .interfaces
            .into_iter()
            .map(|i| RegisteredInterface {
                name: i.name,
                mac: i.mac,
                speed_bps: i.speed_bps,
                wol: i.wol,
            })
            .collect(),
    };

    match state.lifecycle.register_node(registration) {
        Ok(node) => (StatusCode::CREATED, ApiResponse::ok(node)).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Pools ──────────────────────────────────────────────────────

/// Pool detail with derived sizes.
#[derive(serde::Serialize)]
struct PoolView {
    #[serde(flatten)]
    pool: NodePool,
    /// Assigned nodes (current size).
    count: u32,
    /// All bound nodes (size ceiling).
    max_nodes: u32,
}

fn pool_view(store: &StateStore, pool: NodePool) -> Result<PoolView, ironpool_state::StateError> {
    let count = store.pool_count(&pool.id)?;
    let max_nodes = store.pool_max_nodes(&pool.id)?;
    Ok(PoolView {
        pool,
        count,
        max_nodes,
    })
}

/// GET /api/v1/pools
pub async fn list_pools(State(state): State<ApiState>) -> impl IntoResponse {
    let pools = match state.store.list_pools() {
        Ok(pools) => pools,
        Err(e) => {
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
    };

    let mut views = Vec::with_capacity(pools.len());
    for pool in pools {
        match pool_view(&state.store, pool) {
            Ok(view) => views.push(view),
            Err(e) => {
                return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                    .into_response();
            }
        }
    }
    ApiResponse::ok(views).into_response()
}

/// GET /api/v1/pools/:id
pub async fn get_pool(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.get_pool(&id) {
        Ok(Some(pool)) => match pool_view(&state.store, pool) {
            Ok(view) => ApiResponse::ok(view).into_response(),
            Err(e) => {
                error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
            }
        },
        Ok(None) => error_response("pool not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// Scale request body.
#[derive(serde::Deserialize)]
pub struct ScaleRequest {
    pub desired: u32,
}

/// POST /api/v1/pools/:id/scale
pub async fn scale_pool(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<ScaleRequest>,
) -> impl IntoResponse {
    match state.scaler.scale_pool(&id, req.desired).await {
        Ok(outcome) => ApiResponse::ok(outcome).into_response(),
        Err(e @ ScaleError::PoolNotFound(_)) => {
            error_response(&e.to_string(), StatusCode::NOT_FOUND).into_response()
        }
        Err(e @ ScaleError::OutOfBounds { .. }) => {
            error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response()
        }
        Err(e @ ScaleError::Shortfall { .. }) => {
            error_response(&e.to_string(), StatusCode::CONFLICT).into_response()
        }
        // Successes are committed; the caller retries only the failures.
        Err(ScaleError::BatchIncomplete(outcome)) => {
            let msg = format!(
                "scale batch incomplete: {} succeeded, {} failed",
                outcome.succeeded.len(),
                outcome.failed.len()
            );
            (StatusCode::BAD_GATEWAY, ApiResponse::fail(Some(outcome), &msg)).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}
