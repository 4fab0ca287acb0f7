//! HTTP handlers
//!
//! Every trigger response carries a `success` flag and an RFC 3339 timestamp.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, warn};

use libsatcast::{Action, BatchError, BatchResult, BatchSummary, SatcastError, TaskResult};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the server started
    pub uptime: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsResponse {
    pub available_actions: Vec<&'static str>,
    pub description: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    pub action: String,
    pub result: T,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ActionErrorResponse {
    pub success: bool,
    pub error: String,
    pub action: String,
    pub timestamp: String,
}

/// Batch outcome keyed by task, plus the flattened failures
#[derive(Debug, Serialize)]
pub struct BatchResults {
    pub unified: BTreeMap<String, TaskResult>,
    pub errors: Vec<BatchError>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub results: BatchResults,
    pub summary: BatchSummary,
    pub timestamp: String,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn action_error(action: String, error: &SatcastError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ActionErrorResponse {
        success: false,
        error: error.to_string(),
        action,
        timestamp: timestamp(),
    };
    (status, Json(body)).into_response()
}

fn split_batch(batch: BatchResult) -> (BatchResults, BatchSummary) {
    let summary = batch.summary();
    let results = BatchResults {
        unified: batch.per_task,
        errors: batch.errors,
    };
    (results, summary)
}

// ============================================================================
// Handlers
// ============================================================================

/// Liveness probe, always 200
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: timestamp(),
        uptime: state.started.elapsed().as_secs_f64(),
    })
}

pub async fn list_actions() -> Json<ActionsResponse> {
    Json(ActionsResponse {
        available_actions: Action::names(),
        description: "Use POST /execute/:action to run any of these actions",
        timestamp: timestamp(),
    })
}

/// Run one named action
///
/// Unknown names answer 400; a task whose content cannot be gathered
/// answers with that error's status.
pub async fn execute_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
) -> Response {
    let parsed = match action.parse::<Action>() {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(action = %action, "Unknown action requested");
            return action_error(action, &e);
        }
    };

    info!(action = %action, "Executing action");
    match parsed {
        Action::Task(task) => match state.orchestrator.execute(task).await {
            Ok(result) => Json(ActionResponse {
                success: true,
                action,
                result,
                timestamp: timestamp(),
            })
            .into_response(),
            Err(e) => action_error(action, &e),
        },
        Action::AllTasks => {
            let (results, _) = split_batch(state.batch.run().await);
            Json(ActionResponse {
                success: true,
                action,
                result: results,
                timestamp: timestamp(),
            })
            .into_response()
        }
    }
}

/// Run every task in order; individual failures are reported, never fatal
pub async fn execute_all(State(state): State<AppState>) -> Json<BatchResponse> {
    info!("Executing all tasks");
    let (results, summary) = split_batch(state.batch.run().await);

    Json(BatchResponse {
        success: true,
        results,
        summary,
        timestamp: timestamp(),
    })
}
