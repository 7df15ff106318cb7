use axum::{
    extract::{Extension, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use hearth_shared::store::TrackerStore;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::SyncResponse;

#[derive(Deserialize, Debug)]
pub struct SyncQuery {
    pub after: String,
}

/// GET /mobile/sync?after=RFC3339
///
/// Returns every visible entity mutated strictly after the watermark,
/// across all four collections. Boundary is exclusive everywhere: a
/// client that stores the maximum timestamp it has seen never re-receives
/// a just-fetched row.
pub async fn get_sync_data<S>(
    State(store): State<Arc<S>>,
    Extension(user_id): Extension<String>,
    Query(params): Query<SyncQuery>,
) -> Result<Json<SyncResponse>>
where
    S: TrackerStore,
{
    let after: DateTime<Utc> = DateTime::parse_from_rfc3339(&params.after)
        .map_err(|_| AppError::bad_request("Invalid time. Expected RFC3339 format.".to_string()))?
        .with_timezone(&Utc);

    // The four deltas have no data dependency on each other; run them
    // concurrently. try_join fails the whole call on the first error, so
    // clients never see a partial response.
    let (users, families, family_members, locations) = tokio::try_join!(
        store.recent_users(&user_id, after),
        store.recent_families(&user_id, after),
        store.recent_memberships(&user_id, after),
        store.recent_locations(&user_id, after),
    )?;

    Ok(Json(SyncResponse {
        users,
        families,
        family_members,
        locations,
    }))
}
