use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use showmirror_core::{RunMode, TriggerSource};
use showmirror_db::{DbError, IngestRunFailureRow, IngestRunRow};
use uuid::Uuid;

use crate::middleware::RequestId;
use crate::runner::{ActiveRun, StartError};

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct RunItem {
    run_id: Uuid,
    mode: String,
    trigger_source: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    shows_attempted: i32,
    shows_succeeded: i32,
    shows_failed: i32,
    watermark_advanced: bool,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<IngestRunRow> for RunItem {
    fn from(row: IngestRunRow) -> Self {
        Self {
            run_id: row.public_id,
            mode: row.mode,
            trigger_source: row.trigger_source,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            shows_attempted: row.shows_attempted,
            shows_succeeded: row.shows_succeeded,
            shows_failed: row.shows_failed,
            watermark_advanced: row.watermark_advanced,
            error_message: row.error_message,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct FailureItem {
    show_id: i64,
    failure_kind: String,
    message: String,
}

impl From<IngestRunFailureRow> for FailureItem {
    fn from(row: IngestRunFailureRow) -> Self {
        Self {
            show_id: row.show_id,
            failure_kind: row.failure_kind,
            message: row.message,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct RunDetail {
    #[serde(flatten)]
    run: RunItem,
    failures: Vec<FailureItem>,
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<RunItem>>>, ApiError> {
    let rows = showmirror_db::list_ingest_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(RunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RunDetail>>, ApiError> {
    let row = match showmirror_db::get_ingest_run_by_public_id(&state.pool, run_id).await {
        Ok(row) => row,
        Err(DbError::NotFound) => {
            return Err(ApiError::new(
                req_id.0,
                "not_found",
                format!("ingest run {run_id} not found"),
            ))
        }
        Err(e) => return Err(map_db_error(req_id.0, &e)),
    };
    let failures = showmirror_db::list_ingest_run_failures(&state.pool, row.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: RunDetail {
            run: row.into(),
            failures: failures.into_iter().map(FailureItem::from).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn active_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Option<ActiveRun>>> {
    Json(ApiResponse {
        data: state.runs.active().await,
        meta: ResponseMeta::new(req_id.0),
    })
}

pub(super) async fn start_ingest(
    state: State<AppState>,
    req_id: Extension<RequestId>,
) -> Result<(StatusCode, Json<ApiResponse<ActiveRun>>), ApiError> {
    start_run(state, req_id, RunMode::Full).await
}

pub(super) async fn start_update(
    state: State<AppState>,
    req_id: Extension<RequestId>,
) -> Result<(StatusCode, Json<ApiResponse<ActiveRun>>), ApiError> {
    start_run(state, req_id, RunMode::Incremental).await
}

async fn start_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    mode: RunMode,
) -> Result<(StatusCode, Json<ApiResponse<ActiveRun>>), ApiError> {
    match state.runs.try_start(mode, TriggerSource::Api).await {
        Ok(run) => Ok((
            StatusCode::ACCEPTED,
            Json(ApiResponse {
                data: run,
                meta: ResponseMeta::new(req_id.0),
            }),
        )),
        Err(StartError::Busy(busy)) => Err(ApiError::new(
            req_id.0,
            "conflict",
            format!(
                "{} run {} started at {} is still active",
                busy.mode,
                busy.run_id,
                busy.started_at.to_rfc3339()
            ),
        )),
        Err(StartError::LockedElsewhere) => Err(ApiError::new(
            req_id.0,
            "conflict",
            "an ingest run is active in another process",
        )),
        Err(StartError::Ledger(_)) => Err(ApiError::new(
            req_id.0,
            "internal_error",
            "ingest run could not be queued",
        )),
    }
}

pub(super) async fn cancel_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<ActiveRun>>, ApiError> {
    match state.runs.cancel().await {
        Some(run) => Ok(Json(ApiResponse {
            data: run,
            meta: ResponseMeta::new(req_id.0),
        })),
        None => Err(ApiError::new(
            req_id.0,
            "not_found",
            "no ingest run is active",
        )),
    }
}
