use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use hearth_shared::models::{now, Invitation};
use hearth_shared::store::{StoreError, TrackerStore};
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::handlers::require_member;
use crate::models::CreateInvitationRequest;

// POST /mobile/invitations
pub async fn create_invitation<S>(
    State(store): State<Arc<S>>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)>
where
    S: TrackerStore,
{
    // Only current members may invite into a family.
    require_member(&*store, &payload.family_id, &user_id).await?;

    let recipient = store
        .get_user(&payload.recipient_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::not_found("Recipient not found.".to_string()),
            other => other.into(),
        })?;
    if recipient.is_deleted {
        return Err(AppError::not_found("Recipient not found.".to_string()));
    }

    let invitation = Invitation {
        id: Uuid::new_v4().to_string(),
        sender_id: user_id,
        recipient_id: payload.recipient_id,
        family_id: payload.family_id,
        created_at: now(),
    };
    let invitation = store.create_invitation(invitation).await?;

    info!(
        "User {} invited {} to family {}",
        invitation.sender_id, invitation.recipient_id, invitation.family_id
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "invitation": invitation })),
    ))
}

// GET /mobile/invitations
pub async fn get_invitations<S>(
    State(store): State<Arc<S>>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: TrackerStore,
{
    let invitations = store.pending_invitations(&user_id).await?;

    Ok(Json(serde_json::json!({ "invitations": invitations })))
}

// PUT /mobile/invitations/:invitation_id
// Accepting consumes the invitation and creates the membership in one
// atomic step; only the addressed recipient can do it.
pub async fn accept_invitation<S>(
    State(store): State<Arc<S>>,
    Path(invitation_id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: TrackerStore,
{
    let family_id = store
        .accept_invitation(&invitation_id, &user_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::not_found("Invitation not found.".to_string()),
            other => other.into(),
        })?;

    info!("User {} joined family {} by invitation", user_id, family_id);

    Ok(Json(serde_json::json!({ "familyId": family_id })))
}
