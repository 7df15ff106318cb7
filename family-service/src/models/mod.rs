use hearth_shared::models::{Family, GeoPoint, Location, MemberLocation, Membership, User};
use serde::{Deserialize, Serialize};

// Request DTOs

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateFamilyRequest {
    pub name: String,
    pub code: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    pub recipient_id: String,
    pub family_id: String,
}

#[derive(Deserialize, Debug)]
pub struct ReportLocationRequest {
    pub coordinates: GeoPoint,
}

// Response DTOs

/// The combined changed-since payload of the sync endpoint.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub users: Vec<User>,
    pub families: Vec<Family>,
    pub family_members: Vec<Membership>,
    pub locations: Vec<Location>,
}

/// Public kiosk view of a family: display name plus each member's last
/// known position.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDisplayResponse {
    pub family_name: String,
    pub members: Vec<MemberLocation>,
}
