use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use hearth_shared::models::{now, Location};
use hearth_shared::store::{StoreError, TrackerStore};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::ReportLocationRequest;

// POST /mobile/locations
// Reports are append-only rows; "current location" is derived from the
// newest row, never by mutation.
pub async fn report_location<S>(
    State(store): State<Arc<S>>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<ReportLocationRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)>
where
    S: TrackerStore,
{
    let coordinates = payload.coordinates;
    if !(-90.0..=90.0).contains(&coordinates.lat) || !(-180.0..=180.0).contains(&coordinates.lon)
    {
        return Err(AppError::bad_request(
            "Coordinates out of range. Expected lat in [-90, 90] and lon in [-180, 180]."
                .to_string(),
        ));
    }

    let location = Location {
        id: Uuid::new_v4().to_string(),
        user_id,
        coordinates,
        created_at: now(),
    };
    let location = store.create_location(location).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "location": location })),
    ))
}

// GET /mobile/locations/latest
pub async fn get_latest_location<S>(
    State(store): State<Arc<S>>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: TrackerStore,
{
    let location = store.latest_location(&user_id).await.map_err(|e| match e {
        StoreError::NotFound => AppError::not_found("No location reported yet.".to_string()),
        other => other.into(),
    })?;

    Ok(Json(serde_json::json!({ "location": location })))
}
