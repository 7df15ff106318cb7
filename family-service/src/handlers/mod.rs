use hearth_shared::store::FamilyStore;

use crate::error::{AppError, Result};

pub mod family_handlers;
pub mod invitation_handlers;
pub mod location_handlers;
pub mod sync_handlers;

/// Membership precondition for every family-scoped operation: the caller
/// must have a ledger row for the family, regardless of what family id
/// the client supplied.
pub(crate) async fn require_member<S>(store: &S, family_id: &str, user_id: &str) -> Result<()>
where
    S: FamilyStore + ?Sized,
{
    if store.is_member(family_id, user_id).await? {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "You are not a member of this family.".to_string(),
        ))
    }
}
