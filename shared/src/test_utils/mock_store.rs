use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    now, Family, FamilyMember, Invitation, Location, MemberLocation, Membership,
    PendingInvitation, User,
};
use crate::store::{
    FamilyStore, InvitationStore, LocationStore, StoreError, StoreResult, SyncStore, UserStore,
};

/// In-memory store with the same observable semantics as the SQLite
/// implementation. Backs the handler tests.
#[derive(Default)]
pub struct MockTrackerStore {
    users: RwLock<HashMap<String, User>>,
    families: RwLock<HashMap<String, Family>>,
    memberships: RwLock<Vec<Membership>>,
    invitations: RwLock<Vec<Invitation>>,
    locations: RwLock<Vec<Location>>,
}

impl MockTrackerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Family ids the user belongs to.
    async fn families_of(&self, user_id: &str) -> Vec<String> {
        self.memberships
            .read()
            .await
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.family_id.clone())
            .collect()
    }

    /// Distinct ids of everyone sharing at least one family with the user,
    /// the user included.
    async fn co_member_ids(&self, user_id: &str) -> Vec<String> {
        let families = self.families_of(user_id).await;
        let mut ids: Vec<String> = Vec::new();
        for membership in self.memberships.read().await.iter() {
            if families.contains(&membership.family_id) && !ids.contains(&membership.user_id) {
                ids.push(membership.user_id.clone());
            }
        }
        ids
    }

    async fn latest_location_of(&self, user_id: &str) -> Option<Location> {
        self.locations
            .read()
            .await
            .iter()
            .filter(|l| l.user_id == user_id)
            .max_by_key(|l| l.created_at)
            .cloned()
    }
}

#[async_trait]
impl UserStore for MockTrackerStore {
    async fn put_user(&self, user: User) -> StoreResult<User> {
        self.users
            .write()
            .await
            .insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<User> {
        self.users
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl FamilyStore for MockTrackerStore {
    async fn create_family(&self, family: Family) -> StoreResult<(Family, Membership)> {
        let mut families = self.families.write().await;
        if families.values().any(|f| f.code == family.code) {
            return Err(StoreError::Conflict(format!(
                "family code {} already taken",
                family.code
            )));
        }
        families.insert(family.id.clone(), family.clone());

        let membership = Membership {
            id: Uuid::new_v4().to_string(),
            family_id: family.id.clone(),
            user_id: family.created_by.clone(),
            created_at: family.created_at,
        };
        self.memberships.write().await.push(membership.clone());
        Ok((family, membership))
    }

    async fn find_family_by_code(&self, code: &str) -> StoreResult<Family> {
        self.families
            .read()
            .await
            .values()
            .find(|f| f.code == code && !f.is_deleted)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn is_member(&self, family_id: &str, user_id: &str) -> StoreResult<bool> {
        Ok(self
            .memberships
            .read()
            .await
            .iter()
            .any(|m| m.family_id == family_id && m.user_id == user_id))
    }

    async fn list_members(&self, family_id: &str) -> StoreResult<Vec<FamilyMember>> {
        let users = self.users.read().await;
        let mut members: Vec<FamilyMember> = self
            .memberships
            .read()
            .await
            .iter()
            .filter(|m| m.family_id == family_id)
            .filter_map(|m| {
                users
                    .get(&m.user_id)
                    .filter(|u| !u.is_deleted)
                    .map(|u| FamilyMember {
                        id: u.id.clone(),
                        email: u.email.clone(),
                        first_name: u.first_name.clone(),
                        last_name: u.last_name.clone(),
                        joined_at: m.created_at,
                    })
            })
            .collect();
        members.sort_by(|a, b| {
            (a.first_name.as_str(), a.last_name.as_str())
                .cmp(&(b.first_name.as_str(), b.last_name.as_str()))
        });
        Ok(members)
    }

    async fn member_locations(&self, family_id: &str) -> StoreResult<Vec<MemberLocation>> {
        let users = self.users.read().await;
        let member_ids: Vec<String> = self
            .memberships
            .read()
            .await
            .iter()
            .filter(|m| m.family_id == family_id)
            .map(|m| m.user_id.clone())
            .collect();

        let mut result = Vec::new();
        for member_id in member_ids {
            let user = match users.get(&member_id).filter(|u| !u.is_deleted) {
                Some(user) => user,
                None => continue,
            };
            // Inner-join semantics: members without a report are omitted.
            if let Some(latest) = self.latest_location_of(&member_id).await {
                result.push(MemberLocation {
                    user_id: user.id.clone(),
                    first_name: user.first_name.clone(),
                    last_name: user.last_name.clone(),
                    coordinates: latest.coordinates,
                    recorded_at: latest.created_at,
                });
            }
        }
        result.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(result)
    }

    async fn remove_member(&self, family_id: &str, user_id: &str) -> StoreResult<()> {
        let mut memberships = self.memberships.write().await;
        let before = memberships.len();
        memberships.retain(|m| !(m.family_id == family_id && m.user_id == user_id));
        if memberships.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl InvitationStore for MockTrackerStore {
    async fn create_invitation(&self, invitation: Invitation) -> StoreResult<Invitation> {
        self.invitations.write().await.push(invitation.clone());
        Ok(invitation)
    }

    async fn pending_invitations(
        &self,
        recipient_id: &str,
    ) -> StoreResult<Vec<PendingInvitation>> {
        let families = self.families.read().await;
        let mut pending: Vec<PendingInvitation> = self
            .invitations
            .read()
            .await
            .iter()
            .filter(|i| i.recipient_id == recipient_id)
            .filter_map(|i| {
                families
                    .get(&i.family_id)
                    .filter(|f| !f.is_deleted)
                    .map(|f| PendingInvitation {
                        id: i.id.clone(),
                        family_id: i.family_id.clone(),
                        family_name: f.name.clone(),
                        created_at: i.created_at,
                    })
            })
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    async fn accept_invitation(
        &self,
        invitation_id: &str,
        recipient_id: &str,
    ) -> StoreResult<String> {
        let mut invitations = self.invitations.write().await;
        let position = invitations
            .iter()
            .position(|i| i.id == invitation_id && i.recipient_id == recipient_id)
            .ok_or(StoreError::NotFound)?;
        let invitation = invitations.remove(position);

        let mut memberships = self.memberships.write().await;
        let already_member = memberships
            .iter()
            .any(|m| m.family_id == invitation.family_id && m.user_id == recipient_id);
        if !already_member {
            memberships.push(Membership {
                id: Uuid::new_v4().to_string(),
                family_id: invitation.family_id.clone(),
                user_id: recipient_id.to_string(),
                created_at: now(),
            });
        }
        Ok(invitation.family_id)
    }
}

#[async_trait]
impl LocationStore for MockTrackerStore {
    async fn create_location(&self, location: Location) -> StoreResult<Location> {
        self.locations.write().await.push(location.clone());
        Ok(location)
    }

    async fn latest_location(&self, user_id: &str) -> StoreResult<Location> {
        self.latest_location_of(user_id)
            .await
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl SyncStore for MockTrackerStore {
    async fn recent_users(&self, user_id: &str, after: DateTime<Utc>) -> StoreResult<Vec<User>> {
        let visible = self.co_member_ids(user_id).await;
        let users = self.users.read().await;
        Ok(visible
            .iter()
            .filter_map(|id| users.get(id))
            .filter(|u| u.updated_at > after && !u.is_deleted)
            .cloned()
            .collect())
    }

    async fn recent_families(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> StoreResult<Vec<Family>> {
        let family_ids = self.families_of(user_id).await;
        let families = self.families.read().await;
        Ok(family_ids
            .iter()
            .filter_map(|id| families.get(id))
            .filter(|f| f.updated_at > after && !f.is_deleted)
            .cloned()
            .collect())
    }

    async fn recent_memberships(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> StoreResult<Vec<Membership>> {
        let family_ids = self.families_of(user_id).await;
        let families = self.families.read().await;
        Ok(self
            .memberships
            .read()
            .await
            .iter()
            .filter(|m| family_ids.contains(&m.family_id))
            .filter(|m| {
                families
                    .get(&m.family_id)
                    .map(|f| !f.is_deleted)
                    .unwrap_or(false)
            })
            .filter(|m| m.created_at > after)
            .cloned()
            .collect())
    }

    async fn recent_locations(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> StoreResult<Vec<Location>> {
        let users = self.users.read().await;
        let mut result = Vec::new();
        for member_id in self.co_member_ids(user_id).await {
            if users.get(&member_id).map(|u| u.is_deleted).unwrap_or(true) {
                continue;
            }
            if let Some(latest) = self.latest_location_of(&member_id).await {
                if latest.created_at > after {
                    result.push(latest);
                }
            }
        }
        Ok(result)
    }
}
