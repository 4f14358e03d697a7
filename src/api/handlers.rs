// src/api/handlers.rs

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::api::{auth, types::*, ApiState};
use crate::core::types::{ChainStep, MeetingRun, MoodState, RunProgress};
use crate::infra::errors::RoundtableError;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn map_error(e: RoundtableError) -> ApiError {
    let status = match e {
        RoundtableError::Validation(_) => StatusCode::BAD_REQUEST,
        RoundtableError::RunNotFound(_) => StatusCode::NOT_FOUND,
        RoundtableError::RunTerminal { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

/// POST /api/v1/meetings — Validate and launch a meeting run.
pub async fn create_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<MeetingRequest>,
) -> Result<(StatusCode, Json<MeetingCreatedResponse>), ApiError> {
    auth::check_auth(&state, &headers)?;

    let def = body.into_definition().map_err(map_error)?;
    let total_steps = def.total_steps();
    let handle = state.executor.start(def).await.map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(MeetingCreatedResponse {
            run_id: handle.run_id,
            status: "running".into(),
            total_steps,
        }),
    ))
}

/// GET /api/v1/meetings — List known runs, newest first.
pub async fn list_meetings(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MeetingRun>>, ApiError> {
    auth::check_auth(&state, &headers)?;

    let mut runs = state.registry.list_runs().await;
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(runs))
}

/// GET /api/v1/meetings/:id — Run detail.
pub async fn get_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MeetingRun>, ApiError> {
    auth::check_auth(&state, &headers)?;

    match state.registry.run(&id).await {
        Some(run) => Ok(Json(run)),
        None => Err(map_error(RoundtableError::RunNotFound(id))),
    }
}

/// GET /api/v1/meetings/:id/progress — Live progress counters.
pub async fn get_progress(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<RunProgress>, ApiError> {
    auth::check_auth(&state, &headers)?;

    match state.registry.progress(&id).await {
        Some(progress) => Ok(Json(progress)),
        None => Err(map_error(RoundtableError::RunNotFound(id))),
    }
}

/// GET /api/v1/meetings/:id/steps — Finished steps in sequence order.
pub async fn list_steps(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChainStep>>, ApiError> {
    auth::check_auth(&state, &headers)?;

    match state.registry.steps(&id).await {
        Some(steps) => Ok(Json(steps)),
        None => Err(map_error(RoundtableError::RunNotFound(id))),
    }
}

/// POST /api/v1/meetings/:id/cancel — Request cooperative cancellation.
pub async fn cancel_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    auth::check_auth(&state, &headers)?;

    state.executor.cancel(&id).await.map_err(map_error)?;
    Ok(Json(serde_json::json!({
        "run_id": id,
        "status": "cancel_requested",
        "message": "Cancellation recorded. The run stops at the next step boundary."
    })))
}

/// GET /api/v1/meetings/:id/moods — Latest mood snapshot, one entry per agent.
pub async fn get_moods(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<MoodState>>, ApiError> {
    auth::check_auth(&state, &headers)?;

    let mut moods: Vec<MoodState> = state.broadcaster.current(&id).await.into_values().collect();
    moods.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
    Ok(Json(moods))
}

/// GET /api/v1/cost — Daily and monthly spend from the in-memory ledger.
pub async fn get_cost(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<CostSummaryResponse>, ApiError> {
    auth::check_auth(&state, &headers)?;

    Ok(Json(CostSummaryResponse {
        daily_usd: state.accountant.daily().as_f64(),
        monthly_usd: state.accountant.monthly().as_f64(),
        ledger_entries: state.accountant.entry_count(),
    }))
}

/// GET /api/v1/health — Simple health check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
