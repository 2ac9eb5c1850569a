//! API integration tests.
//!
//! Drives the router directly with tower, backed by an in-memory store
//! and a stub power controller so no packets or sessions leave the test.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use ironpool_autoscale::PoolScaler;
use ironpool_lifecycle::NodeLifecycle;
use ironpool_power::{PowerControl, PowerError};
use ironpool_state::*;
use ironpoold::api::build_router;

#[derive(Default)]
struct StubPower {
    boots: Mutex<Vec<String>>,
}

#[async_trait]
impl PowerControl for StubPower {
    async fn boot(&self, node: &Node) -> Result<(), PowerError> {
        self.boots.lock().unwrap().push(node.id.clone());
        Ok(())
    }

    async fn shutdown(&self, _node: &Node) -> Result<(), PowerError> {
        Ok(())
    }
}

fn test_router() -> (StateStore, Arc<StubPower>, axum::Router) {
    let state = StateStore::open_in_memory().unwrap();
    let lifecycle = NodeLifecycle::new(state.clone());
    let power = Arc::new(StubPower::default());
    let scaler = PoolScaler::new(state.clone(), lifecycle.clone(), power.clone());
    let router = build_router(state.clone(), lifecycle, scaler);
    (state, power, router)
}

fn register_body(name: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "name": name,
        "roles": ["worker"],
        "address": "10.0.0.10",
        "memory_bytes": 8_589_934_592u64,
        "cpu_cores": 8,
        "single_thread_score": 1000,
        "multi_thread_score": 8000,
        "min_power_mw": 2000,
        "max_power_mw": 16000,
        "interfaces": [{
            "name": "eth0",
            "mac": "46:6C:A8:E6:0C:D3",
            "speed_bps": 1_000_000_000u64,
            "wol": ["magic_packet"]
        }]
    }))
    .unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn list_nodes_empty() {
    let (_state, _power, router) = test_router();

    let req = Request::builder()
        .uri("/api/v1/nodes")
        .body(Body::empty())
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_node_creates_node_and_pool() {
    let (state, _power, router) = test_router();

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/nodes")
        .header("content-type", "application/json")
        .body(Body::from(register_body("w1")))
        .unwrap();

    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json_body(resp).await;
    let node_id = body["data"]["id"].as_str().unwrap().to_string();

    // Node and status are readable back.
    let req = Request::builder()
        .uri(format!("/api/v1/nodes/{node_id}"))
        .body(Body::empty())
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder()
        .uri(format!("/api/v1/nodes/{node_id}/status"))
        .body(Body::empty())
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["data"]["status"], "active_ready");

    // A capacity pool was bound automatically.
    let req = Request::builder()
        .uri("/api/v1/pools")
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let pools = body["data"].as_array().unwrap();
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0]["name"], "cpu8.memory8589934592");
    assert_eq!(pools[0]["count"], 1);
    assert_eq!(pools[0]["max_nodes"], 1);

    assert_eq!(state.list_nodes().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_node_returns_not_found() {
    let (_state, _power, router) = test_router();

    let req = Request::builder()
        .uri("/api/v1/nodes/ghost")
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scale_unknown_pool_returns_not_found() {
    let (_state, _power, router) = test_router();

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/pools/ghost/scale")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"desired":1}"#))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scale_beyond_bound_nodes_is_rejected() {
    let (state, power, router) = test_router();

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/nodes")
        .header("content-type", "application/json")
        .body(Body::from(register_body("w1")))
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json_body(resp).await;
    let pool_id = body["data"]["pool_id"].as_str().unwrap().to_string();

    // One bound node: desired 2 exceeds the ceiling.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/pools/{pool_id}/scale"))
        .header("content-type", "application/json")
        .body(Body::from(r#"{"desired":2}"#))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert!(power.boots.lock().unwrap().is_empty());
    assert_eq!(state.pool_count(&pool_id).unwrap(), 1);
}

#[tokio::test]
async fn scale_up_wakes_an_inactive_node() {
    let (state, power, router) = test_router();

    // One registered (running) node.
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/nodes")
        .header("content-type", "application/json")
        .body(Body::from(register_body("w1")))
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let body = json_body(resp).await;
    let pool_id = body["data"]["pool_id"].as_str().unwrap().to_string();

    // One powered-off node bound to the same pool, seeded directly.
    let asleep = Node {
        id: "n2".to_string(),
        name: "w2".to_string(),
        roles: vec![NodeRole::Worker],
        address: "10.0.0.11".to_string(),
        memory_bytes: 8 << 30,
        cpu_cores: 8,
        single_thread_score: 1000,
        multi_thread_score: 8000,
        min_power_mw: 2000,
        max_power_mw: 16_000,
        interfaces: vec![NetworkInterface {
            name: "eth0".to_string(),
            mac: "46:6C:A8:E6:0C:D4".to_string(),
            speed_bps: 1_000_000_000,
            wol: vec![WolFlag::MagicPacket],
        }],
        pool_id: Some(pool_id.clone()),
        pool_assigned: false,
        created_at: 0,
        updated_at: 0,
    };
    state.put_node(&asleep).unwrap();
    state
        .put_status(&Status {
            node_id: "n2".to_string(),
            status: NodeStatus::Inactive,
            reason: None,
            message: None,
            last_heartbeat: None,
            last_transition: Some(0),
        })
        .unwrap();

    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/pools/{pool_id}/scale"))
        .header("content-type", "application/json")
        .body(Body::from(r#"{"desired":2}"#))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["data"]["direction"], "up");
    assert_eq!(body["data"]["succeeded"][0], "n2");

    assert_eq!(*power.boots.lock().unwrap(), vec!["n2".to_string()]);
    assert_eq!(
        state.get_status("n2").unwrap().unwrap().status,
        NodeStatus::Booting
    );
    assert_eq!(state.pool_count(&pool_id).unwrap(), 2);
}
