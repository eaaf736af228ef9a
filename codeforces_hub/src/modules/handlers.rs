use crate::modules::{
    aggregator::ContestListing,
    models::{
        request::{ContestListParameters, ValidatedQuery},
        response::ApiError,
    },
    normalizer::Problem,
    service::ContestService,
};
use axum::{
    extract::{Extension, Path},
    http::{StatusCode, Uri},
    Json,
};
use std::sync::Arc;
use tokio::time::Instant;

pub async fn list_contests(
    ValidatedQuery(params): ValidatedQuery<ContestListParameters>,
    Extension(service): Extension<Arc<ContestService>>,
) -> Result<Json<ContestListing>, ApiError> {
    let start_process = Instant::now();

    let listing = service
        .within_deadline(service.list_contests(params.category(), params.limit()))
        .await
        .map_err(|e| {
            tracing::error!("request failed cause: {:?}", e);
            ApiError::from_listing(&e)
        })?;

    let time = Instant::now().duration_since(start_process).as_millis();
    tracing::info!(
        target: "querylog",
        "elapsed_time={} contests={} warnings={} params={}",
        time,
        listing.contests.len(),
        listing.warnings.len(),
        serde_json::to_string(&params).unwrap_or_default()
    );

    Ok(Json(listing))
}

pub async fn get_problem(
    Path((contest_id, index)): Path<(String, String)>,
    Extension(service): Extension<Arc<ContestService>>,
) -> Result<Json<Problem>, ApiError> {
    let start_process = Instant::now();

    let contest_id: i64 = contest_id.parse().map_err(|_| {
        tracing::error!("Validation error: contest id {:?} is not an integer", contest_id);
        ApiError::validation(format!("contest id must be an integer, got {:?}", contest_id))
    })?;

    let problem = service
        .within_deadline(service.problem(contest_id, &index))
        .await
        .map_err(|e| {
            tracing::error!("request failed cause: {:?}", e);
            ApiError::from_problem(&e)
        })?;

    let time = Instant::now().duration_since(start_process).as_millis();
    tracing::info!(
        target: "querylog",
        "elapsed_time={} problem={}{}",
        time,
        contest_id,
        index
    );

    Ok(Json(problem))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(uri.path())
}
