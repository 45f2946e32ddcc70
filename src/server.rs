use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::error;

use crate::aggregate::{self, ActivityKind};
use crate::artifact::{ModelArtifact, ModelPerformance};
use crate::cache::SnapshotCache;
use crate::filters::RecordFilter;
use crate::models::RiskLevel;
use crate::predict;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: Arc<SnapshotCache>,
    pub artifact: Option<Arc<ModelArtifact>>,
}

/// Error contract for the JSON API: every failure body is `{"error": ...}`.
/// Internal failures log the cause and return a generic message so no
/// connection details leak to clients.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> ApiError {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(err) => {
                error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/summary", get(summary))
        .route("/api/predictions", get(predictions))
        .route("/api/model_performance", get(model_performance))
        .route("/api/feature_importance", get(feature_importance))
        .route("/api/shortage_timeline", get(shortage_timeline))
        .route("/api/enforcement_timeline", get(enforcement_timeline))
        .route("/api/company_risk", get(company_risk))
        .route("/api/drug_categories", get(drug_categories))
        .route("/api/geography", get(geography))
        .route("/api/shortage_reasons", get(shortage_reasons))
        .route("/api/recall_severity", get(recall_severity))
        .route("/api/risk_distribution", get(risk_distribution))
        .route("/api/top_drugs", get(top_drugs))
        .route("/api/recent_activity", get(recent_activity))
        .route("/api/search_drug", get(search_drug))
        .route("/api/health", get(health))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct FilterParams {
    risk_level: Option<String>,
    company: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ActivityParams {
    #[serde(rename = "type")]
    kind: Option<String>,
    window_days: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    drug_name: Option<String>,
}

fn parse_risk_level(raw: &Option<String>) -> Result<Option<RiskLevel>, ApiError> {
    match raw {
        Some(value) => value
            .parse::<RiskLevel>()
            .map(Some)
            .map_err(|err| ApiError::BadRequest(err.to_string())),
        None => Ok(None),
    }
}

fn parse_limit(raw: &Option<String>, default: usize) -> Result<usize, ApiError> {
    match raw {
        Some(value) => match value.parse::<usize>() {
            Ok(limit) if limit > 0 => Ok(limit),
            _ => Err(ApiError::BadRequest(format!(
                "limit must be a positive integer, got {value:?}"
            ))),
        },
        None => Ok(default),
    }
}

fn build_filter(params: &FilterParams) -> Result<RecordFilter, ApiError> {
    Ok(RecordFilter {
        company: params.company.clone(),
        risk_level: parse_risk_level(&params.risk_level)?,
        from: None,
        to: None,
    })
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn summary(
    State(state): State<AppState>,
) -> Result<Json<aggregate::SummaryMetrics>, ApiError> {
    let snapshot = state.cache.get_or_refresh(&state.pool).await?;
    Ok(Json(aggregate::summary_metrics(
        &snapshot.shortages,
        &snapshot.enforcements,
        Utc::now().date_naive(),
    )))
}

async fn predictions(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = build_filter(&params)?;
    let limit = parse_limit(&params.limit, 50)?;
    let snapshot = state.cache.get_or_refresh(&state.pool).await?;

    let mut entries = predict::predict(
        &snapshot.shortages,
        &snapshot.enforcements,
        state.artifact.as_deref(),
        &filter,
        usize::MAX,
    );
    let total_count = entries.len();
    entries.truncate(limit);
    let returned_count = entries.len();

    Ok(Json(json!({
        "predictions": entries,
        "total_count": total_count,
        "returned_count": returned_count,
    })))
}

async fn model_performance(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, ModelPerformance>> {
    match &state.artifact {
        Some(artifact) => Json(artifact.model_performance.clone()),
        None => Json(BTreeMap::new()),
    }
}

async fn feature_importance(State(state): State<AppState>) -> Json<serde_json::Value> {
    match &state.artifact {
        Some(artifact) => Json(json!(artifact.top_features())),
        None => Json(json!([])),
    }
}

async fn shortage_timeline(
    State(state): State<AppState>,
) -> Result<Json<Vec<aggregate::MonthlyBucket>>, ApiError> {
    let snapshot = state.cache.get_or_refresh(&state.pool).await?;
    Ok(Json(aggregate::group_by_month(
        &snapshot.shortages,
        &[],
        &RecordFilter::default(),
    )))
}

async fn enforcement_timeline(
    State(state): State<AppState>,
) -> Result<Json<Vec<aggregate::MonthlyBucket>>, ApiError> {
    let snapshot = state.cache.get_or_refresh(&state.pool).await?;
    Ok(Json(aggregate::group_by_month(
        &[],
        &snapshot.enforcements,
        &RecordFilter::default(),
    )))
}

async fn company_risk(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<Vec<aggregate::CompanyBucket>>, ApiError> {
    let filter = build_filter(&params)?;
    let limit = parse_limit(&params.limit, 15)?;
    let snapshot = state.cache.get_or_refresh(&state.pool).await?;
    Ok(Json(aggregate::group_by_company(
        &snapshot.shortages,
        &snapshot.enforcements,
        &filter,
        limit,
    )))
}

async fn drug_categories(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<Vec<aggregate::CategoryBucket>>, ApiError> {
    let filter = build_filter(&params)?;
    let limit = parse_limit(&params.limit, 10)?;
    let snapshot = state.cache.get_or_refresh(&state.pool).await?;
    Ok(Json(aggregate::group_by_category(
        &snapshot.shortages,
        &snapshot.enforcements,
        &filter,
        limit,
    )))
}

async fn geography(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<Vec<aggregate::GeographyBucket>>, ApiError> {
    let filter = build_filter(&params)?;
    let limit = parse_limit(&params.limit, aggregate::DEFAULT_GEOGRAPHY_LIMIT)?;
    let snapshot = state.cache.get_or_refresh(&state.pool).await?;
    Ok(Json(aggregate::group_by_geography(
        &snapshot.shortages,
        &snapshot.enforcements,
        &filter,
        limit,
    )))
}

async fn shortage_reasons(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<Vec<aggregate::ReasonBucket>>, ApiError> {
    let filter = build_filter(&params)?;
    let limit = parse_limit(&params.limit, 10)?;
    let snapshot = state.cache.get_or_refresh(&state.pool).await?;
    Ok(Json(aggregate::group_by_reason(
        &snapshot.shortages,
        &snapshot.enforcements,
        &filter,
        limit,
    )))
}

async fn recall_severity(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<Vec<aggregate::SeverityBucket>>, ApiError> {
    let filter = build_filter(&params)?;
    let snapshot = state.cache.get_or_refresh(&state.pool).await?;
    Ok(Json(aggregate::group_by_severity(
        &snapshot.shortages,
        &snapshot.enforcements,
        &filter,
    )))
}

async fn risk_distribution(
    State(state): State<AppState>,
) -> Result<Json<Vec<predict::RiskLevelCount>>, ApiError> {
    let snapshot = state.cache.get_or_refresh(&state.pool).await?;
    let entries = predict::predict(
        &snapshot.shortages,
        &snapshot.enforcements,
        state.artifact.as_deref(),
        &RecordFilter::default(),
        usize::MAX,
    );
    Ok(Json(predict::risk_distribution(&entries)))
}

async fn top_drugs(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<Vec<aggregate::DrugBucket>>, ApiError> {
    let filter = build_filter(&params)?;
    let limit = parse_limit(&params.limit, 10)?;
    let snapshot = state.cache.get_or_refresh(&state.pool).await?;
    Ok(Json(aggregate::top_drugs(
        &snapshot.shortages,
        &snapshot.enforcements,
        &filter,
        limit,
    )))
}

async fn recent_activity(
    State(state): State<AppState>,
    Query(params): Query<ActivityParams>,
) -> Result<Json<Vec<aggregate::ActivityEntry>>, ApiError> {
    let kind = match &params.kind {
        Some(value) => Some(
            value
                .parse::<ActivityKind>()
                .map_err(|err| ApiError::BadRequest(err.to_string()))?,
        ),
        None => None,
    };
    let window_days = match &params.window_days {
        Some(value) => match value.parse::<i64>() {
            Ok(days) if days > 0 => days,
            _ => {
                return Err(ApiError::BadRequest(format!(
                    "window_days must be a positive integer, got {value:?}"
                )))
            }
        },
        None => aggregate::DEFAULT_ACTIVITY_WINDOW_DAYS,
    };

    let snapshot = state.cache.get_or_refresh(&state.pool).await?;
    Ok(Json(aggregate::recent_activity(
        &snapshot.shortages,
        &snapshot.enforcements,
        kind,
        window_days,
        Utc::now().date_naive(),
        &RecordFilter::default(),
    )))
}

async fn search_drug(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<predict::PredictionEntry>, ApiError> {
    let drug_name = params
        .drug_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("drug_name is required".to_string()))?;

    let snapshot = state.cache.get_or_refresh(&state.pool).await?;
    predict::search_drug(
        &snapshot.shortages,
        &snapshot.enforcements,
        state.artifact.as_deref(),
        drug_name,
    )
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("no prediction found for {drug_name:?}")))
}
