use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Family, FamilyMember, Invitation, Location, MemberLocation, Membership, PendingInvitation,
    User,
};

pub mod sqlite;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate record: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.to_string())
            }
            other => StoreError::Internal(other.to_string()),
        }
    }
}

/// Account rows. The identity platform owns these; the service reads them
/// and the platform integration (and tests) write them.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn put_user(&self, user: User) -> StoreResult<User>;

    async fn get_user(&self, user_id: &str) -> StoreResult<User>;
}

/// Families and the membership ledger.
#[async_trait]
pub trait FamilyStore: Send + Sync {
    /// Creates the family row and the creator's ledger row atomically.
    /// Fails with `Conflict` when the code is already taken.
    async fn create_family(&self, family: Family) -> StoreResult<(Family, Membership)>;

    /// Unauthenticated display lookup. Soft-deleted families are invisible.
    async fn find_family_by_code(&self, code: &str) -> StoreResult<Family>;

    /// Existential ledger check; the precondition for every family-scoped
    /// query.
    async fn is_member(&self, family_id: &str, user_id: &str) -> StoreResult<bool>;

    /// Current members ordered by first name. `joined_at` is the ledger
    /// row's creation time.
    async fn list_members(&self, family_id: &str) -> StoreResult<Vec<FamilyMember>>;

    /// Each member's single most recent position, most recent first.
    /// Members with no reports are omitted.
    async fn member_locations(&self, family_id: &str) -> StoreResult<Vec<MemberLocation>>;

    /// Deletes the (family, user) ledger row. `NotFound` when absent.
    async fn remove_member(&self, family_id: &str, user_id: &str) -> StoreResult<()>;
}

/// The invitation workflow.
#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn create_invitation(&self, invitation: Invitation) -> StoreResult<Invitation>;

    /// Invitations addressed to `recipient_id`, newest first, joined with
    /// the inviting family's display name.
    async fn pending_invitations(&self, recipient_id: &str)
        -> StoreResult<Vec<PendingInvitation>>;

    /// Consumes the invitation and writes the membership row in a single
    /// transaction. Constrained to invitations addressed to
    /// `recipient_id`; `NotFound` otherwise. Returns the joined family id.
    async fn accept_invitation(
        &self,
        invitation_id: &str,
        recipient_id: &str,
    ) -> StoreResult<String>;
}

/// Append-only position reports.
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn create_location(&self, location: Location) -> StoreResult<Location>;

    async fn latest_location(&self, user_id: &str) -> StoreResult<Location>;
}

/// The four changed-since delta queries behind the sync endpoint. All use
/// a strictly-greater watermark comparison and exclude soft-deleted rows.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Users sharing at least one family with `user_id` (self included)
    /// whose `updated_at` is after the watermark.
    async fn recent_users(&self, user_id: &str, after: DateTime<Utc>) -> StoreResult<Vec<User>>;

    /// Families `user_id` belongs to, updated after the watermark.
    async fn recent_families(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> StoreResult<Vec<Family>>;

    /// Ledger rows of `user_id`'s families created after the watermark.
    /// Memberships are immutable, so creation events are the only deltas.
    async fn recent_memberships(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> StoreResult<Vec<Membership>>;

    /// Per co-member, the single most recent report after the watermark.
    async fn recent_locations(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> StoreResult<Vec<Location>>;
}

/// The full storage seam the service is generic over.
pub trait TrackerStore:
    UserStore + FamilyStore + InvitationStore + LocationStore + SyncStore
{
}

impl<T> TrackerStore for T where
    T: UserStore + FamilyStore + InvitationStore + LocationStore + SyncStore
{
}
