use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Current time, truncated to millisecond precision.
///
/// Every timestamp in the system goes through this so that the value a
/// handler holds in memory is identical to the value read back from
/// storage (SQLite keeps timestamps as fixed-width RFC 3339 text).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Renders a timestamp in the canonical storage format:
/// RFC 3339, exactly three fractional digits, `Z` suffix.
/// Fixed width keeps lexicographic comparison chronological.
pub fn fmt_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a timestamp previously written with [`fmt_timestamp`].
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

/// An account row. Written by the identity platform; this service only
/// reads them (and seeds them in tests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// A named group whose members share location visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub id: String,
    pub name: String,
    pub code: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// A ledger row granting a user membership of a family. Immutable once
/// created; unique per (family, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: String,
    #[serde(rename = "family")]
    pub family_id: String,
    #[serde(rename = "user")]
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A pending offer for `recipient` to join `family`, created by an
/// existing member. Acceptance consumes the row; pending = row exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    #[serde(rename = "sender")]
    pub sender_id: String,
    #[serde(rename = "recipient")]
    pub recipient_id: String,
    #[serde(rename = "family")]
    pub family_id: String,
    pub created_at: DateTime<Utc>,
}

/// A geographic coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// One position report. Append-only; "current location" is the row with
/// the maximum created timestamp per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    #[serde(rename = "user")]
    pub user_id: String,
    pub coordinates: GeoPoint,
    pub created_at: DateTime<Utc>,
}

/// A member as shown in a family roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub joined_at: DateTime<Utc>,
}

/// A member's most recent position, for the family map and the public
/// display view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberLocation {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub coordinates: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}

/// A pending invitation as shown to its recipient, joined with the
/// inviting family's display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInvitation {
    pub id: String,
    #[serde(rename = "family")]
    pub family_id: String,
    pub family_name: String,
    pub created_at: DateTime<Utc>,
}
