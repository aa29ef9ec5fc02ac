//! HTTP API: scheduling, task CRUD, progress, agenda, keywords and
//! planning runs over one shared scheduler.

use crate::calendar::{self, WindowQuery};
use crate::planning::{self, PlanInput, PlanRun, Planner};
use crate::queue::{CandidateQueue, QueuedCandidate};
use crate::scheduler::{ScheduleOutcome, Scheduler};
use crate::tracker::{self, ProgressEntry};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::{NaiveDate, Utc};
use fieldplan_core::{
    aggregate::AgendaOptions,
    config::ApiConfig,
    error::PlanError,
    model::{decode_keywords, Field, KeywordInput, MonthlyKeywords, RawCandidate, RawPatch},
    normalize::normalize_patch,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    scheduler: Arc<Scheduler>,
    queue: Option<CandidateQueue>,
    planner: Option<Arc<Planner>>,
    agenda: AgendaOptions,
    api_key: Option<String>,
    uptime: Instant,
}

impl ApiState {
    pub fn new(scheduler: Arc<Scheduler>, agenda: AgendaOptions, api_key: &str) -> Self {
        Self {
            scheduler,
            queue: None,
            planner: None,
            agenda,
            api_key: (!api_key.is_empty()).then(|| api_key.to_string()),
            uptime: Instant::now(),
        }
    }

    /// Route planning output through `queue` instead of scheduling inline.
    pub fn with_queue(mut self, queue: CandidateQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_planner(mut self, planner: Arc<Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    fn today(&self) -> NaiveDate {
        Utc::now()
            .with_timezone(&self.scheduler.offset())
            .date_naive()
    }
}

/// Check bearer token auth. Returns `None` if authorized, `Some(response)` if rejected.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Option<ApiError> {
    let key = api_key.as_ref()?;

    let Some(header) = headers.get("authorization") else {
        return Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing Authorization header"})),
        ));
    };
    let Ok(value) = header.to_str() else {
        return Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid Authorization header"})),
        ));
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if token == key => None,
        _ => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )),
    }
}

fn authorize(headers: &HeaderMap, state: &ApiState) -> Result<(), ApiError> {
    check_auth(headers, &state.api_key).map_or(Ok(()), Err)
}

/// Map a library error onto a status code and `{"error", "kind"}` body.
fn reject(e: PlanError) -> ApiError {
    let status = match &e {
        PlanError::InvalidScheduleInput(_) | PlanError::ProgressEntryInvalid { .. } => {
            StatusCode::BAD_REQUEST
        }
        PlanError::NotFound(_) => StatusCode::NOT_FOUND,
        PlanError::ConcurrentScheduleConflict { .. } => StatusCode::CONFLICT,
        PlanError::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
        PlanError::Generator(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("request failed: {e}");
    }
    (status, Json(json!({"error": e.to_string(), "kind": e.kind()})))
}

fn not_found(what: String) -> ApiError {
    reject(PlanError::NotFound(what))
}

fn to_json<T: serde::Serialize>(value: &T) -> ApiResult {
    serde_json::to_value(value)
        .map(Json)
        .map_err(|e| reject(PlanError::Store(format!("encode response failed: {e}"))))
}

/// `GET /api/health`
async fn health(headers: HeaderMap, State(state): State<ApiState>) -> ApiResult {
    authorize(&headers, &state)?;
    let db_bytes = state.scheduler.store().db_size().await.map_err(reject)?;
    Ok(Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime.elapsed().as_secs(),
        "db_bytes": db_bytes,
        "planner": state.planner.is_some(),
        "queue": state.queue.is_some(),
    })))
}

#[derive(Deserialize)]
struct FieldBody {
    owner_id: i64,
    crop_name: String,
    #[serde(default)]
    address: String,
    start_date: NaiveDate,
    #[serde(default)]
    description: String,
    #[serde(default)]
    geometry: Option<Value>,
}

/// `PUT /api/fields/{id}`
async fn put_field(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(field_id): Path<i64>,
    Json(body): Json<FieldBody>,
) -> ApiResult {
    authorize(&headers, &state)?;
    let field = Field {
        id: field_id,
        owner_id: body.owner_id,
        crop_name: body.crop_name,
        address: body.address,
        start_date: body.start_date,
        description: body.description,
        geometry: body.geometry,
    };
    state
        .scheduler
        .store()
        .upsert_field(&field)
        .await
        .map_err(reject)?;
    to_json(&field)
}

async fn load_field(state: &ApiState, field_id: i64) -> Result<Field, ApiError> {
    state
        .scheduler
        .store()
        .get_field(field_id)
        .await
        .map_err(reject)?
        .ok_or_else(|| not_found(format!("field {field_id}")))
}

/// `GET /api/fields/{id}`
async fn get_field(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(field_id): Path<i64>,
) -> ApiResult {
    authorize(&headers, &state)?;
    to_json(&load_field(&state, field_id).await?)
}

#[derive(Deserialize)]
struct ScheduleBody {
    /// Defaults to the field's owner.
    #[serde(default)]
    owner_id: Option<i64>,
    #[serde(flatten)]
    candidate: RawCandidate,
}

/// `POST /api/fields/{id}/tasks`: 201 when created, 200 for a duplicate.
async fn schedule_task(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(field_id): Path<i64>,
    Json(body): Json<ScheduleBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    authorize(&headers, &state)?;
    let owner_id = match body.owner_id {
        Some(id) => id,
        None => load_field(&state, field_id).await?.owner_id,
    };
    let outcome = state
        .scheduler
        .schedule(owner_id, field_id, &body.candidate)
        .await
        .map_err(reject)?;
    let status = match &outcome {
        ScheduleOutcome::Created { .. } => StatusCode::CREATED,
        ScheduleOutcome::Duplicate { .. } => StatusCode::OK,
    };
    Ok((status, to_json(&outcome)?))
}

#[derive(Deserialize)]
struct ListQuery {
    owner: i64,
    #[serde(default)]
    field: Option<i64>,
}

/// `GET /api/tasks?owner=&field=`
async fn list_tasks(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> ApiResult {
    authorize(&headers, &state)?;
    let tasks = state
        .scheduler
        .store()
        .list_tasks(query.owner, query.field)
        .await
        .map_err(reject)?;
    to_json(&tasks)
}

/// `GET /api/tasks/{id}`
async fn get_task(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> ApiResult {
    authorize(&headers, &state)?;
    let task = state
        .scheduler
        .store()
        .get_task(&task_id)
        .await
        .map_err(reject)?
        .ok_or_else(|| not_found(format!("task {task_id}")))?;
    to_json(&task)
}

/// `PATCH /api/tasks/{id}`
async fn patch_task(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
    Json(raw): Json<RawPatch>,
) -> ApiResult {
    authorize(&headers, &state)?;
    let patch = normalize_patch(&raw, state.scheduler.offset()).map_err(reject)?;
    let task = state
        .scheduler
        .store()
        .update_task(&task_id, &patch)
        .await
        .map_err(reject)?;
    to_json(&task)
}

/// `DELETE /api/tasks/{id}`
async fn delete_task(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> ApiResult {
    authorize(&headers, &state)?;
    if !state
        .scheduler
        .store()
        .delete_task(&task_id)
        .await
        .map_err(reject)?
    {
        return Err(not_found(format!("task {task_id}")));
    }
    info!("deleted task {task_id}");
    Ok(Json(json!({"deleted": task_id})))
}

/// `GET /api/tasks/{id}/progress`
async fn get_progress(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> ApiResult {
    authorize(&headers, &state)?;
    let store = state.scheduler.store();
    if store.get_task(&task_id).await.map_err(reject)?.is_none() {
        return Err(not_found(format!("task {task_id}")));
    }
    to_json(&store.list_progress(&task_id).await.map_err(reject)?)
}

#[derive(Deserialize)]
struct ProgressBody {
    entries: Vec<ProgressEntry>,
}

/// `POST /api/tasks/{id}/progress`: per-entry results, 200 even when some fail.
async fn post_progress(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
    Json(body): Json<ProgressBody>,
) -> ApiResult {
    authorize(&headers, &state)?;
    let report = tracker::update_progress(state.scheduler.store(), &task_id, &body.entries)
        .await
        .map_err(reject)?;
    to_json(&report)
}

/// `GET /api/agenda?owner=&from=&to=|year=&month=&field=`
async fn agenda(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Query(query): Query<WindowQuery>,
) -> ApiResult {
    authorize(&headers, &state)?;
    let entries = calendar::agenda(state.scheduler.store(), &query, state.agenda)
        .await
        .map_err(reject)?;
    to_json(&entries)
}

/// `GET /api/completion?owner=&from=&to=|year=&month=&field=`
async fn completion(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Query(query): Query<WindowQuery>,
) -> ApiResult {
    authorize(&headers, &state)?;
    let completion = calendar::completion(state.scheduler.store(), &query)
        .await
        .map_err(reject)?;
    to_json(&completion)
}

#[derive(Deserialize)]
struct MonthQuery {
    year: i32,
    month: u32,
}

impl MonthQuery {
    fn check(&self) -> Result<(), ApiError> {
        if (1..=12).contains(&self.month) {
            Ok(())
        } else {
            Err(reject(PlanError::InvalidScheduleInput(
                "month must be 1-12".into(),
            )))
        }
    }
}

/// `GET /api/fields/{id}/keywords?year=&month=`
async fn get_keywords(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(field_id): Path<i64>,
    Query(month): Query<MonthQuery>,
) -> ApiResult {
    authorize(&headers, &state)?;
    month.check()?;
    let entry = state
        .scheduler
        .store()
        .get_keywords(field_id, month.year, month.month)
        .await
        .map_err(reject)?
        .ok_or_else(|| {
            not_found(format!(
                "keywords for field {field_id} {}-{:02}",
                month.year, month.month
            ))
        })?;
    to_json(&entry)
}

#[derive(Deserialize)]
struct KeywordsBody {
    keywords: Vec<KeywordInput>,
}

/// `PUT /api/fields/{id}/keywords?year=&month=`
async fn put_keywords(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(field_id): Path<i64>,
    Query(month): Query<MonthQuery>,
    Json(body): Json<KeywordsBody>,
) -> ApiResult {
    authorize(&headers, &state)?;
    month.check()?;
    load_field(&state, field_id).await?;
    let entry = MonthlyKeywords {
        field_id,
        year: month.year,
        month: month.month,
        keywords: decode_keywords(body.keywords),
    };
    state
        .scheduler
        .store()
        .put_keywords(&entry)
        .await
        .map_err(reject)?;
    to_json(&entry)
}

/// `DELETE /api/fields/{id}/keywords?year=&month=`
async fn delete_keywords(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(field_id): Path<i64>,
    Query(month): Query<MonthQuery>,
) -> ApiResult {
    authorize(&headers, &state)?;
    month.check()?;
    let deleted = state
        .scheduler
        .store()
        .delete_keywords(field_id, month.year, month.month)
        .await
        .map_err(reject)?;
    if !deleted {
        return Err(not_found(format!(
            "keywords for field {field_id} {}-{:02}",
            month.year, month.month
        )));
    }
    Ok(Json(json!({"deleted": true})))
}

#[derive(Deserialize)]
struct PlanBody {
    run: PlanRun,
    #[serde(default)]
    owner_id: Option<i64>,
    /// Planning date, defaults to today in the configured offset.
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(flatten)]
    input: PlanInput,
}

/// `POST /api/fields/{id}/plan`: run the generator, then queue the
/// candidates (202) or, without a queue, schedule them inline (200).
async fn plan(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(field_id): Path<i64>,
    Json(body): Json<PlanBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    authorize(&headers, &state)?;
    let Some(planner) = state.planner.clone() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "no planner command configured", "kind": "generator"})),
        ));
    };
    let field = load_field(&state, field_id).await?;
    let today = body.date.unwrap_or_else(|| state.today());
    let owner_id = body.owner_id.unwrap_or(field.owner_id);

    if body.run == PlanRun::Keywords {
        let keywords = planner
            .monthly_keywords(&field, today)
            .await
            .map_err(reject)?;
        return Ok((StatusCode::OK, Json(json!({"run": body.run, "keywords": keywords}))));
    }

    let candidates = planner
        .candidates(body.run, &field, today, &body.input)
        .await
        .map_err(reject)?;

    match &state.queue {
        Some(queue) => {
            for candidate in &candidates {
                queue
                    .submit(QueuedCandidate {
                        owner_id,
                        field_id,
                        candidate: candidate.clone(),
                    })
                    .await
                    .map_err(reject)?;
            }
            Ok((
                StatusCode::ACCEPTED,
                Json(json!({"run": body.run, "queued": candidates.len()})),
            ))
        }
        None => {
            let report = planning::apply(&state.scheduler, owner_id, field_id, &candidates).await;
            Ok((
                StatusCode::OK,
                Json(json!({"run": body.run, "report": report})),
            ))
        }
    }
}

/// Build the axum router with shared state.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/fields/{id}", put(put_field).get(get_field))
        .route("/api/fields/{id}/tasks", post(schedule_task))
        .route(
            "/api/fields/{id}/keywords",
            get(get_keywords).put(put_keywords).delete(delete_keywords),
        )
        .route("/api/fields/{id}/plan", post(plan))
        .route("/api/tasks", get(list_tasks))
        .route(
            "/api/tasks/{id}",
            get(get_task).patch(patch_task).delete(delete_task),
        )
        .route(
            "/api/tasks/{id}/progress",
            get(get_progress).post(post_progress),
        )
        .route("/api/agenda", get(agenda))
        .route("/api/completion", get(completion))
        .with_state(state)
}

/// Serve until ctrl-c.
pub async fn serve(config: &ApiConfig, state: ApiState) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("API server failed to bind to {addr}: {e}"))?;

    info!("API server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {e}");
            }
            info!("Received shutdown signal");
        })
        .await
        .map_err(|e| anyhow::anyhow!("API server error: {e}"))
}
