// tests/api_test.rs — Router-level tests over the full engine stack

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio::sync::Semaphore;
use tower::ServiceExt;

use roundtable::api::{build_router, ApiState};
use roundtable::broadcast::MoodBroadcaster;
use roundtable::core::cost::CostAccountant;
use roundtable::core::executor::SequenceExecutor;
use roundtable::core::registry::RunRegistry;
use roundtable::core::types::RunStatus;
use roundtable::infra::config::EngineConfig;
use roundtable::infra::errors::RoundtableError;
use roundtable::persist::MemorySink;
use roundtable::provider::rates::RateTable;
use roundtable::provider::{ProviderGateway, ProviderReply};

struct StubGateway;

#[async_trait::async_trait]
impl ProviderGateway for StubGateway {
    async fn call(
        &self,
        _provider: &str,
        _prompt: &str,
        _max_tokens: Option<u32>,
    ) -> Result<ProviderReply, RoundtableError> {
        Ok(ProviderReply {
            content: "stub reply".into(),
            tokens_used: 100,
            latency: Duration::from_millis(1),
        })
    }
}

/// Blocks every call until a permit is released, so tests control when
/// the run can make progress.
struct GatedGateway {
    permits: Semaphore,
}

#[async_trait::async_trait]
impl ProviderGateway for GatedGateway {
    async fn call(
        &self,
        _provider: &str,
        _prompt: &str,
        _max_tokens: Option<u32>,
    ) -> Result<ProviderReply, RoundtableError> {
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
        Ok(ProviderReply {
            content: "gated reply".into(),
            tokens_used: 100,
            latency: Duration::from_millis(1),
        })
    }
}

fn state_with(gateway: Arc<dyn ProviderGateway>) -> ApiState {
    let registry = Arc::new(RunRegistry::new());
    let broadcaster = Arc::new(MoodBroadcaster::new(32, Duration::from_secs(15)));
    let accountant = Arc::new(CostAccountant::new());
    let executor = Arc::new(SequenceExecutor::new(
        gateway,
        Arc::clone(&registry),
        Arc::new(MemorySink::new()),
        Arc::clone(&broadcaster),
        Arc::clone(&accountant),
        &EngineConfig::default(),
        RateTable::new(&HashMap::new()),
    ));
    ApiState {
        executor,
        registry,
        broadcaster,
        accountant,
        token: None,
    }
}

async fn post_json(state: &ApiState, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = build_router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get_json(state: &ApiState, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = build_router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn wait_terminal(state: &ApiState, run_id: &str) {
    loop {
        if let Some(run) = state.registry.run(run_id).await {
            if run.status.is_terminal() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn test_meeting_lifecycle_over_http() {
    let state = state_with(Arc::new(StubGateway));

    let body = serde_json::json!({
        "name": "quarterly review",
        "initial_prompt": "Review Q3 numbers",
        "steps": [
            {"provider": "openai", "persona": "analyst"},
            {"provider": "claude", "persona": "skeptic"},
        ],
        "iterations": 2,
        "synthesis_provider": "gemini",
    });
    let (status, created) = post_json(&state, "/api/v1/meetings", body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["total_steps"], 5);
    let run_id = created["run_id"].as_str().unwrap().to_string();

    wait_terminal(&state, &run_id).await;

    let (status, run) = get_json(&state, &format!("/api/v1/meetings/{run_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "completed");
    assert!(run["total_cost"].as_f64().unwrap() > 0.0);

    let (status, progress) =
        get_json(&state, &format!("/api/v1/meetings/{run_id}/progress")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["steps_completed"], 5);
    assert_eq!(progress["total_steps"], 5);

    let (status, steps) = get_json(&state, &format!("/api/v1/meetings/{run_id}/steps")).await;
    assert_eq!(status, StatusCode::OK);
    let steps = steps.as_array().unwrap();
    assert_eq!(steps.len(), 5);
    assert_eq!(steps[4]["is_synthesis"], true);

    let (status, list) = get_json(&state, "/api/v1/meetings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_moods_snapshot_has_one_entry_per_agent() {
    let gateway = Arc::new(GatedGateway {
        permits: Semaphore::new(0),
    });
    let state = state_with(gateway.clone());

    let body = serde_json::json!({
        "name": "m",
        "initial_prompt": "p",
        "steps": [
            {"provider": "openai", "persona": "analyst"},
            {"provider": "openai", "persona": "mediator"},
        ],
        "iterations": 3,
    });
    let (_, created) = post_json(&state, "/api/v1/meetings", body).await;
    let run_id = created["run_id"].as_str().unwrap().to_string();

    // Wait for the run loop to seed the meeting, then check the snapshot
    let moods = loop {
        let (status, moods) = get_json(&state, &format!("/api/v1/meetings/{run_id}/moods")).await;
        assert_eq!(status, StatusCode::OK);
        if moods.as_array().unwrap().len() == 2 {
            break moods;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    };
    assert_eq!(moods[0]["agent_id"], "agent-1");
    assert_eq!(moods[0]["mood"], "neutral");
    assert_eq!(moods[1]["agent_id"], "agent-2");

    // A live subscriber keeps the meeting readable past the run's end
    let _sub = state.broadcaster.subscribe(&run_id).await;
    gateway.permits.add_permits(16);
    wait_terminal(&state, &run_id).await;

    let (status, moods) = get_json(&state, &format!("/api/v1/meetings/{run_id}/moods")).await;
    assert_eq!(status, StatusCode::OK);
    // 6 steps ran but the snapshot stays at one entry per chained agent
    let moods = moods.as_array().unwrap();
    assert_eq!(moods.len(), 2);
    assert_ne!(moods[0]["status"], "idle");
}

#[tokio::test]
async fn test_cancel_running_meeting() {
    let gateway = Arc::new(GatedGateway {
        permits: Semaphore::new(0),
    });
    let state = state_with(gateway.clone());

    let body = serde_json::json!({
        "name": "m",
        "initial_prompt": "p",
        "steps": [{"provider": "openai", "persona": "analyst"}],
        "iterations": 5,
    });
    let (_, created) = post_json(&state, "/api/v1/meetings", body).await;
    let run_id = created["run_id"].as_str().unwrap().to_string();

    let (status, ack) = post_json(
        &state,
        &format!("/api/v1/meetings/{run_id}/cancel"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "cancel_requested");

    // Unblock any in-flight call; the run stops at the next boundary
    gateway.permits.add_permits(16);
    wait_terminal(&state, &run_id).await;

    let run = state.registry.run(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_reason.as_deref(), Some("cancelled"));

    // A second cancel hits a terminal run
    let (status, _) = post_json(
        &state,
        &format!("/api/v1/meetings/{run_id}/cancel"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_unknown_meeting_is_404() {
    let state = state_with(Arc::new(StubGateway));
    let (status, _) = post_json(
        &state,
        "/api/v1/meetings/does-not-exist/cancel",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cost_summary_reflects_finished_runs() {
    let state = state_with(Arc::new(StubGateway));

    let (status, empty) = get_json(&state, "/api/v1/cost").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["ledger_entries"], 0);

    let body = serde_json::json!({
        "name": "m",
        "initial_prompt": "p",
        "steps": [{"provider": "openai", "persona": "economist"}],
        "iterations": 4,
    });
    let (_, created) = post_json(&state, "/api/v1/meetings", body).await;
    let run_id = created["run_id"].as_str().unwrap().to_string();
    wait_terminal(&state, &run_id).await;

    let (status, cost) = get_json(&state, "/api/v1/cost").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cost["ledger_entries"], 4);
    assert!(cost["daily_usd"].as_f64().unwrap() > 0.0);
    assert!(cost["monthly_usd"].as_f64().unwrap() >= cost["daily_usd"].as_f64().unwrap());
}

#[tokio::test]
async fn test_create_accepts_description_and_folder_ids() {
    let state = state_with(Arc::new(StubGateway));
    let body = serde_json::json!({
        "name": "m",
        "description": "weekly planning sync",
        "initial_prompt": "p",
        "steps": [{"provider": "openai", "persona": "analyst"}],
        "selected_folders": ["folder-1", "folder-2"],
    });
    let (status, created) = post_json(&state, "/api/v1/meetings", body).await;
    assert_eq!(status, StatusCode::CREATED);
    let run_id = created["run_id"].as_str().unwrap().to_string();
    wait_terminal(&state, &run_id).await;

    let run = state.registry.run(&run_id).await.unwrap();
    assert_eq!(run.definition.description, "weekly planning sync");
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_empty_chain_is_rejected_before_launch() {
    let state = state_with(Arc::new(StubGateway));
    let body = serde_json::json!({
        "name": "m",
        "initial_prompt": "p",
        "steps": [],
    });
    let (status, err) = post_json(&state, "/api/v1/meetings", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].as_str().unwrap().contains("chain length"));

    let (_, list) = get_json(&state, "/api/v1/meetings").await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}
