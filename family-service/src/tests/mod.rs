
/// Shared scaffolding for the handler tests: a router wired to the mock
/// store, plus seeding helpers that go through the storage traits.
mod common {
    use axum::Router;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use hearth_shared::models::{now, Family, GeoPoint, Invitation, Location, User};
    use hearth_shared::store::{FamilyStore, InvitationStore, LocationStore, UserStore};
    use hearth_shared::test_utils::mock_store::MockTrackerStore;
    use hearth_shared::test_utils::test_logging::init_test_logging;
    use std::sync::Arc;
    use uuid::Uuid;

    use crate::routes::create_router_with_store;

    pub fn create_test_app() -> (Router, Arc<MockTrackerStore>) {
        init_test_logging();
        let store = Arc::new(MockTrackerStore::new());
        let app = create_router_with_store(store.clone(), "");
        (app, store)
    }

    /// A fixed instant well in the past, for tests that need controlled
    /// timestamps.
    pub fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    pub fn ts(seconds: i64) -> DateTime<Utc> {
        base_time() + Duration::seconds(seconds)
    }

    pub async fn seed_user(store: &MockTrackerStore, id: &str, first_name: &str) -> User {
        seed_user_at(store, id, first_name, now()).await
    }

    pub async fn seed_user_at(
        store: &MockTrackerStore,
        id: &str,
        first_name: &str,
        updated_at: DateTime<Utc>,
    ) -> User {
        let user = User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            first_name: first_name.to_string(),
            last_name: "Example".to_string(),
            avatar: None,
            created_at: updated_at,
            updated_at,
            is_deleted: false,
        };
        store.put_user(user).await.unwrap()
    }

    pub async fn seed_family(
        store: &MockTrackerStore,
        creator_id: &str,
        name: &str,
        code: &str,
    ) -> Family {
        seed_family_at(store, creator_id, name, code, now()).await
    }

    pub async fn seed_family_at(
        store: &MockTrackerStore,
        creator_id: &str,
        name: &str,
        code: &str,
        updated_at: DateTime<Utc>,
    ) -> Family {
        let family = Family {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            code: code.to_string(),
            created_by: creator_id.to_string(),
            created_at: updated_at,
            updated_at,
            is_deleted: false,
        };
        let (family, _membership) = store.create_family(family).await.unwrap();
        family
    }

    /// Joins `user_id` to the family the way production does: a pending
    /// invitation that gets accepted.
    pub async fn seed_membership(
        store: &MockTrackerStore,
        family_id: &str,
        sender_id: &str,
        user_id: &str,
    ) {
        let invitation = Invitation {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            recipient_id: user_id.to_string(),
            family_id: family_id.to_string(),
            created_at: now(),
        };
        store.create_invitation(invitation.clone()).await.unwrap();
        store
            .accept_invitation(&invitation.id, user_id)
            .await
            .unwrap();
    }

    pub async fn seed_location(
        store: &MockTrackerStore,
        user_id: &str,
        lat: f64,
        created_at: DateTime<Utc>,
    ) -> Location {
        let location = Location {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            coordinates: GeoPoint { lat, lon: -122.4 },
            created_at,
        };
        store.create_location(location).await.unwrap()
    }
}
