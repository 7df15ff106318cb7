use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use hearth_shared::models::{now, Family};
use hearth_shared::store::{StoreError, TrackerStore};
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::handlers::require_member;
use crate::models::{CreateFamilyRequest, FamilyDisplayResponse};

// POST /mobile/families
pub async fn create_family<S>(
    State(store): State<Arc<S>>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<CreateFamilyRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)>
where
    S: TrackerStore,
{
    let name_len = payload.name.chars().count();
    if !(2..=64).contains(&name_len) {
        return Err(AppError::bad_request(
            "Family name must be between 2 and 64 characters.".to_string(),
        ));
    }
    if payload.code.chars().count() < 8 {
        return Err(AppError::bad_request(
            "Family code must be at least 8 characters.".to_string(),
        ));
    }

    let created_at = now();
    let family = Family {
        id: Uuid::new_v4().to_string(),
        name: payload.name,
        code: payload.code,
        created_by: user_id,
        created_at,
        updated_at: created_at,
        is_deleted: false,
    };

    // The creator's ledger row is written in the same transaction.
    let (family, membership) = store.create_family(family).await.map_err(|e| match e {
        StoreError::Conflict(_) => {
            AppError::conflict("A family with this code already exists.".to_string())
        }
        other => other.into(),
    })?;

    info!("User {} created family {}", family.created_by, family.id);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "family": family,
            "familyMember": membership
        })),
    ))
}

// GET /mobile/families/:family_id/members
pub async fn get_members<S>(
    State(store): State<Arc<S>>,
    Path(family_id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: TrackerStore,
{
    require_member(&*store, &family_id, &user_id).await?;

    let members = store.list_members(&family_id).await?;

    Ok(Json(serde_json::json!({ "members": members })))
}

// GET /mobile/families/:family_id/members/locations
pub async fn get_member_locations<S>(
    State(store): State<Arc<S>>,
    Path(family_id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: TrackerStore,
{
    require_member(&*store, &family_id, &user_id).await?;

    let locations = store.member_locations(&family_id).await?;

    Ok(Json(serde_json::json!({ "locations": locations })))
}

// DELETE /mobile/families/:family_id/members
// Self-service: removes the caller's own ledger row, nothing else.
pub async fn leave_family<S>(
    State(store): State<Arc<S>>,
    Path(family_id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: TrackerStore,
{
    store
        .remove_member(&family_id, &user_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => {
                AppError::not_found("You are not a member of this family.".to_string())
            }
            other => other.into(),
        })?;

    info!("User {} left family {}", user_id, family_id);

    Ok(Json(
        serde_json::json!({ "message": "Left family successfully." }),
    ))
}

// GET /display/families/:code
// Deliberately unauthenticated: a shared screen looks a family up by its
// code. Scoped to display names and last known positions only.
pub async fn get_family_display<S>(
    State(store): State<Arc<S>>,
    Path(code): Path<String>,
) -> Result<Json<FamilyDisplayResponse>>
where
    S: TrackerStore,
{
    let family = store.find_family_by_code(&code).await.map_err(|e| match e {
        StoreError::NotFound => {
            AppError::not_found(format!("Family with code '{}' not found.", code))
        }
        other => other.into(),
    })?;

    let members = store.member_locations(&family.id).await?;

    Ok(Json(FamilyDisplayResponse {
        family_name: family.name,
        members,
    }))
}
