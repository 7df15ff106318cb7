use std::env;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::models::{
    fmt_timestamp, parse_timestamp, Family, FamilyMember, GeoPoint, Invitation, Location,
    MemberLocation, Membership, PendingInvitation, User,
};
use crate::store::{
    FamilyStore, InvitationStore, LocationStore, StoreError, StoreResult, SyncStore, UserStore,
};

const DEFAULT_DATABASE_URL: &str = "sqlite://hearth.db?mode=rwc";

/// SQLite-backed implementation of the storage seam.
///
/// Timestamps are stored as fixed-width RFC 3339 text (see
/// [`fmt_timestamp`]), so `>` comparisons in SQL are chronological.
#[derive(Debug, Clone)]
pub struct SqliteTrackerStore {
    pool: SqlitePool,
}

impl SqliteTrackerStore {
    /// Connects using the `DATABASE_URL` environment variable and
    /// bootstraps the schema.
    pub async fn new() -> StoreResult<Self> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        Self::connect(&url).await
    }

    pub async fn connect(url: &str) -> StoreResult<Self> {
        info!("Connecting to SQLite store at {}", url);
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let store = Self::with_pool(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Wraps an existing pool. The caller is responsible for the schema.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> StoreResult<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                avatar TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE TABLE IF NOT EXISTS families (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                code TEXT NOT NULL,
                created_by TEXT NOT NULL REFERENCES users (id),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_family_code ON families (code)",
            "CREATE TABLE IF NOT EXISTS memberships (
                id TEXT PRIMARY KEY,
                family TEXT NOT NULL REFERENCES families (id) ON DELETE CASCADE,
                user TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_membership_family_user
                ON memberships (family, user)",
            "CREATE TABLE IF NOT EXISTS invitations (
                id TEXT PRIMARY KEY,
                sender TEXT NOT NULL REFERENCES users (id),
                recipient TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                family TEXT NOT NULL REFERENCES families (id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_invitation_recipient ON invitations (recipient)",
            "CREATE TABLE IF NOT EXISTS locations (
                id TEXT PRIMARY KEY,
                user TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_location_user ON locations (user, created_at)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn read_timestamp(row: &SqliteRow, column: &str) -> StoreResult<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    parse_timestamp(&raw)
        .map_err(|e| StoreError::Internal(format!("bad timestamp in column {}: {}", column, e)))
}

fn map_user(row: &SqliteRow) -> StoreResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        avatar: row.try_get("avatar")?,
        created_at: read_timestamp(row, "created_at")?,
        updated_at: read_timestamp(row, "updated_at")?,
        is_deleted: row.try_get("is_deleted")?,
    })
}

fn map_family(row: &SqliteRow) -> StoreResult<Family> {
    Ok(Family {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        created_by: row.try_get("created_by")?,
        created_at: read_timestamp(row, "created_at")?,
        updated_at: read_timestamp(row, "updated_at")?,
        is_deleted: row.try_get("is_deleted")?,
    })
}

fn map_membership(row: &SqliteRow) -> StoreResult<Membership> {
    Ok(Membership {
        id: row.try_get("id")?,
        family_id: row.try_get("family")?,
        user_id: row.try_get("user")?,
        created_at: read_timestamp(row, "created_at")?,
    })
}

fn map_location(row: &SqliteRow) -> StoreResult<Location> {
    Ok(Location {
        id: row.try_get("id")?,
        user_id: row.try_get("user")?,
        coordinates: GeoPoint {
            lat: row.try_get("latitude")?,
            lon: row.try_get("longitude")?,
        },
        created_at: read_timestamp(row, "created_at")?,
    })
}

#[async_trait]
impl UserStore for SqliteTrackerStore {
    async fn put_user(&self, user: User) -> StoreResult<User> {
        sqlx::query(
            "INSERT INTO users (id, email, first_name, last_name, avatar, created_at, updated_at, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (id) DO UPDATE SET
                email = excluded.email,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                avatar = excluded.avatar,
                updated_at = excluded.updated_at,
                is_deleted = excluded.is_deleted",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.avatar)
        .bind(fmt_timestamp(user.created_at))
        .bind(fmt_timestamp(user.updated_at))
        .bind(user.is_deleted)
        .execute(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<User> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        map_user(&row)
    }
}

#[async_trait]
impl FamilyStore for SqliteTrackerStore {
    async fn create_family(&self, family: Family) -> StoreResult<(Family, Membership)> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO families (id, name, code, created_by, created_at, updated_at, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&family.id)
        .bind(&family.name)
        .bind(&family.code)
        .bind(&family.created_by)
        .bind(fmt_timestamp(family.created_at))
        .bind(fmt_timestamp(family.updated_at))
        .bind(family.is_deleted)
        .execute(&mut *tx)
        .await?;

        // The creator is implicitly the first member; the ledger row shares
        // the family's creation timestamp.
        let membership = Membership {
            id: Uuid::new_v4().to_string(),
            family_id: family.id.clone(),
            user_id: family.created_by.clone(),
            created_at: family.created_at,
        };
        sqlx::query("INSERT INTO memberships (id, family, user, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&membership.id)
            .bind(&membership.family_id)
            .bind(&membership.user_id)
            .bind(fmt_timestamp(membership.created_at))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((family, membership))
    }

    async fn find_family_by_code(&self, code: &str) -> StoreResult<Family> {
        let row = sqlx::query("SELECT * FROM families WHERE code = ?1 AND is_deleted = 0")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        map_family(&row)
    }

    async fn is_member(&self, family_id: &str, user_id: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM memberships WHERE family = ?1 AND user = ?2")
            .bind(family_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn list_members(&self, family_id: &str) -> StoreResult<Vec<FamilyMember>> {
        let rows = sqlx::query(
            "SELECT u.id,
                u.email,
                u.first_name,
                u.last_name,
                fm.created_at AS joined_at
             FROM memberships fm
             JOIN users u
                ON fm.user = u.id
             WHERE fm.family = ?1
                AND u.is_deleted = 0
             ORDER BY u.first_name, u.last_name",
        )
        .bind(family_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(FamilyMember {
                    id: row.try_get("id")?,
                    email: row.try_get("email")?,
                    first_name: row.try_get("first_name")?,
                    last_name: row.try_get("last_name")?,
                    joined_at: read_timestamp(row, "joined_at")?,
                })
            })
            .collect()
    }

    async fn member_locations(&self, family_id: &str) -> StoreResult<Vec<MemberLocation>> {
        // Inner join: a member with no reports is omitted. The bare
        // latitude/longitude columns ride along with MAX(created_at), which
        // SQLite resolves to the max row.
        let rows = sqlx::query(
            "SELECT u.id AS user_id,
                u.first_name,
                u.last_name,
                l.latitude,
                l.longitude,
                MAX(l.created_at) AS recorded_at
             FROM memberships fm
             JOIN users u
                ON fm.user = u.id
             JOIN locations l
                ON u.id = l.user
             WHERE fm.family = ?1
                AND u.is_deleted = 0
             GROUP BY u.id
             ORDER BY recorded_at DESC",
        )
        .bind(family_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(MemberLocation {
                    user_id: row.try_get("user_id")?,
                    first_name: row.try_get("first_name")?,
                    last_name: row.try_get("last_name")?,
                    coordinates: GeoPoint {
                        lat: row.try_get("latitude")?,
                        lon: row.try_get("longitude")?,
                    },
                    recorded_at: read_timestamp(row, "recorded_at")?,
                })
            })
            .collect()
    }

    async fn remove_member(&self, family_id: &str, user_id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM memberships WHERE family = ?1 AND user = ?2")
            .bind(family_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl InvitationStore for SqliteTrackerStore {
    async fn create_invitation(&self, invitation: Invitation) -> StoreResult<Invitation> {
        sqlx::query(
            "INSERT INTO invitations (id, sender, recipient, family, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&invitation.id)
        .bind(&invitation.sender_id)
        .bind(&invitation.recipient_id)
        .bind(&invitation.family_id)
        .bind(fmt_timestamp(invitation.created_at))
        .execute(&self.pool)
        .await?;
        Ok(invitation)
    }

    async fn pending_invitations(
        &self,
        recipient_id: &str,
    ) -> StoreResult<Vec<PendingInvitation>> {
        let rows = sqlx::query(
            "SELECT i.id,
                i.family,
                f.name AS family_name,
                i.created_at
             FROM invitations i
             JOIN families f
                ON i.family = f.id
             WHERE i.recipient = ?1
                AND f.is_deleted = 0
             ORDER BY i.created_at DESC",
        )
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PendingInvitation {
                    id: row.try_get("id")?,
                    family_id: row.try_get("family")?,
                    family_name: row.try_get("family_name")?,
                    created_at: read_timestamp(row, "created_at")?,
                })
            })
            .collect()
    }

    async fn accept_invitation(
        &self,
        invitation_id: &str,
        recipient_id: &str,
    ) -> StoreResult<String> {
        // Consuming the invitation and creating the membership must happen
        // together, so both statements run in one transaction. The
        // recipient constraint stops anyone accepting someone else's
        // invitation.
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT family FROM invitations WHERE id = ?1 AND recipient = ?2")
            .bind(invitation_id)
            .bind(recipient_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound)?;
        let family_id: String = row.try_get("family")?;

        // Conflict-ignore keeps the transition idempotent when the
        // recipient is somehow already a member.
        sqlx::query(
            "INSERT INTO memberships (id, family, user, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (family, user) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&family_id)
        .bind(recipient_id)
        .bind(fmt_timestamp(crate::models::now()))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM invitations WHERE id = ?1")
            .bind(invitation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(family_id)
    }
}

#[async_trait]
impl LocationStore for SqliteTrackerStore {
    async fn create_location(&self, location: Location) -> StoreResult<Location> {
        sqlx::query(
            "INSERT INTO locations (id, user, latitude, longitude, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&location.id)
        .bind(&location.user_id)
        .bind(location.coordinates.lat)
        .bind(location.coordinates.lon)
        .bind(fmt_timestamp(location.created_at))
        .execute(&self.pool)
        .await?;
        Ok(location)
    }

    async fn latest_location(&self, user_id: &str) -> StoreResult<Location> {
        let row = sqlx::query(
            "SELECT * FROM locations WHERE user = ?1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        map_location(&row)
    }
}

#[async_trait]
impl SyncStore for SqliteTrackerStore {
    async fn recent_users(&self, user_id: &str, after: DateTime<Utc>) -> StoreResult<Vec<User>> {
        // Self-join on the ledger: every family containing the caller,
        // then every distinct user in those families (the caller included).
        let rows = sqlx::query(
            "SELECT u.id,
                u.email,
                u.first_name,
                u.last_name,
                u.avatar,
                u.created_at,
                MAX(u.updated_at) AS updated_at,
                u.is_deleted
             FROM memberships me
             JOIN memberships fm
                ON me.family = fm.family
             JOIN users u
                ON fm.user = u.id
             WHERE me.user = ?1
                AND u.updated_at > ?2
                AND u.is_deleted = 0
             GROUP BY u.id",
        )
        .bind(user_id)
        .bind(fmt_timestamp(after))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_user).collect()
    }

    async fn recent_families(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> StoreResult<Vec<Family>> {
        let rows = sqlx::query(
            "SELECT f.id,
                f.name,
                f.code,
                f.created_by,
                f.created_at,
                MAX(f.updated_at) AS updated_at,
                f.is_deleted
             FROM memberships me
             JOIN families f
                ON me.family = f.id
             WHERE me.user = ?1
                AND f.updated_at > ?2
                AND f.is_deleted = 0
             GROUP BY f.id",
        )
        .bind(user_id)
        .bind(fmt_timestamp(after))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_family).collect()
    }

    async fn recent_memberships(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> StoreResult<Vec<Membership>> {
        let rows = sqlx::query(
            "SELECT fm.id,
                fm.family,
                fm.user,
                fm.created_at
             FROM memberships me
             JOIN families f
                ON me.family = f.id
             JOIN memberships fm
                ON f.id = fm.family
             WHERE me.user = ?1
                AND fm.created_at > ?2
                AND f.is_deleted = 0",
        )
        .bind(user_id)
        .bind(fmt_timestamp(after))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_membership).collect()
    }

    async fn recent_locations(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> StoreResult<Vec<Location>> {
        // Latest report per co-member, never the full history: mobile
        // clients re-sync often and only need the newest point.
        let rows = sqlx::query(
            "SELECT l.id,
                l.user,
                l.latitude,
                l.longitude,
                MAX(l.created_at) AS created_at
             FROM memberships me
             JOIN memberships fm
                ON me.family = fm.family
             JOIN users u
                ON fm.user = u.id
             JOIN locations l
                ON u.id = l.user
             WHERE me.user = ?1
                AND l.created_at > ?2
                AND u.is_deleted = 0
             GROUP BY l.user",
        )
        .bind(user_id)
        .bind(fmt_timestamp(after))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_location).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::now;
    use chrono::{Duration, TimeZone};

    async fn test_store() -> SqliteTrackerStore {
        // A single connection so every statement sees the same in-memory
        // database.
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        let store = SqliteTrackerStore::with_pool(pool);
        store.init_schema().await.unwrap();
        store
    }

    fn ts(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn user(id: &str, first_name: &str, updated_at: DateTime<Utc>) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            first_name: first_name.to_string(),
            last_name: "Example".to_string(),
            avatar: None,
            created_at: ts(0),
            updated_at,
            is_deleted: false,
        }
    }

    fn family(id: &str, code: &str, created_by: &str, updated_at: DateTime<Utc>) -> Family {
        Family {
            id: id.to_string(),
            name: format!("family {}", id),
            code: code.to_string(),
            created_by: created_by.to_string(),
            created_at: updated_at,
            updated_at,
            is_deleted: false,
        }
    }

    fn location(id: &str, user_id: &str, lat: f64, created_at: DateTime<Utc>) -> Location {
        Location {
            id: id.to_string(),
            user_id: user_id.to_string(),
            coordinates: GeoPoint { lat, lon: -122.4 },
            created_at,
        }
    }

    async fn join_family(store: &SqliteTrackerStore, family_id: &str, sender: &str, user: &str) {
        let invitation = Invitation {
            id: Uuid::new_v4().to_string(),
            sender_id: sender.to_string(),
            recipient_id: user.to_string(),
            family_id: family_id.to_string(),
            created_at: now(),
        };
        store.create_invitation(invitation.clone()).await.unwrap();
        store
            .accept_invitation(&invitation.id, user)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_family_also_creates_creator_membership() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(1))).await.unwrap();

        let (created, membership) = store
            .create_family(family("f1", "REBEL2024", "ana", ts(5)))
            .await
            .unwrap();

        assert_eq!(created.id, "f1");
        assert_eq!(membership.family_id, "f1");
        assert_eq!(membership.user_id, "ana");
        assert_eq!(membership.created_at, ts(5));
        assert!(store.is_member("f1", "ana").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_family_code_is_a_conflict() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(1))).await.unwrap();

        store
            .create_family(family("f1", "REBEL2024", "ana", ts(5)))
            .await
            .unwrap();
        let err = store
            .create_family(family("f2", "REBEL2024", "ana", ts(6)))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        // The transaction rolled back: no second family row, no membership.
        assert_eq!(store.find_family_by_code("REBEL2024").await.unwrap().id, "f1");
        assert!(!store.is_member("f2", "ana").await.unwrap());
    }

    #[tokio::test]
    async fn find_family_by_code_ignores_soft_deleted() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(1))).await.unwrap();
        let mut fam = family("f1", "REBEL2024", "ana", ts(5));
        fam.is_deleted = true;
        store.create_family(fam).await.unwrap();

        assert!(matches!(
            store.find_family_by_code("REBEL2024").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn accept_invitation_consumes_and_joins_atomically() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(1))).await.unwrap();
        store.put_user(user("ben", "Ben", ts(1))).await.unwrap();
        store
            .create_family(family("f1", "REBEL2024", "ana", ts(5)))
            .await
            .unwrap();

        let invitation = Invitation {
            id: "inv1".to_string(),
            sender_id: "ana".to_string(),
            recipient_id: "ben".to_string(),
            family_id: "f1".to_string(),
            created_at: ts(6),
        };
        store.create_invitation(invitation).await.unwrap();

        let family_id = store.accept_invitation("inv1", "ben").await.unwrap();
        assert_eq!(family_id, "f1");
        assert!(store.is_member("f1", "ben").await.unwrap());
        assert!(store.pending_invitations("ben").await.unwrap().is_empty());

        // A retry after success finds the invitation consumed.
        assert!(matches!(
            store.accept_invitation("inv1", "ben").await,
            Err(StoreError::NotFound)
        ));

        // The recipient appears exactly once in the roster.
        let members = store.list_members("f1").await.unwrap();
        let bens = members.iter().filter(|m| m.id == "ben").count();
        assert_eq!(bens, 1);
    }

    #[tokio::test]
    async fn accept_invitation_rejects_other_recipients() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(1))).await.unwrap();
        store.put_user(user("ben", "Ben", ts(1))).await.unwrap();
        store.put_user(user("eve", "Eve", ts(1))).await.unwrap();
        store
            .create_family(family("f1", "REBEL2024", "ana", ts(5)))
            .await
            .unwrap();
        store
            .create_invitation(Invitation {
                id: "inv1".to_string(),
                sender_id: "ana".to_string(),
                recipient_id: "ben".to_string(),
                family_id: "f1".to_string(),
                created_at: ts(6),
            })
            .await
            .unwrap();

        assert!(matches!(
            store.accept_invitation("inv1", "eve").await,
            Err(StoreError::NotFound)
        ));
        // Still pending for the real recipient.
        assert_eq!(store.pending_invitations("ben").await.unwrap().len(), 1);
        assert!(!store.is_member("f1", "eve").await.unwrap());
    }

    #[tokio::test]
    async fn pending_invitations_newest_first_with_family_name() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(1))).await.unwrap();
        store.put_user(user("ben", "Ben", ts(1))).await.unwrap();
        store
            .create_family(family("f1", "CODE00001", "ana", ts(5)))
            .await
            .unwrap();
        store
            .create_family(family("f2", "CODE00002", "ana", ts(5)))
            .await
            .unwrap();

        for (id, family_id, offset) in [("inv1", "f1", 10), ("inv2", "f2", 20)] {
            store
                .create_invitation(Invitation {
                    id: id.to_string(),
                    sender_id: "ana".to_string(),
                    recipient_id: "ben".to_string(),
                    family_id: family_id.to_string(),
                    created_at: ts(offset),
                })
                .await
                .unwrap();
        }

        let pending = store.pending_invitations("ben").await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, "inv2");
        assert_eq!(pending[0].family_name, "family f2");
        assert_eq!(pending[1].id, "inv1");
    }

    #[tokio::test]
    async fn member_locations_returns_latest_per_member_only() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(1))).await.unwrap();
        store.put_user(user("ben", "Ben", ts(1))).await.unwrap();
        store.put_user(user("cal", "Cal", ts(1))).await.unwrap();
        store
            .create_family(family("f1", "REBEL2024", "ana", ts(5)))
            .await
            .unwrap();
        join_family(&store, "f1", "ana", "ben").await;
        join_family(&store, "f1", "ana", "cal").await;

        store.create_location(location("l1", "ana", 10.0, ts(10))).await.unwrap();
        store.create_location(location("l2", "ana", 11.0, ts(20))).await.unwrap();
        store.create_location(location("l3", "ben", 12.0, ts(15))).await.unwrap();
        // cal never reports

        let locations = store.member_locations("f1").await.unwrap();
        assert_eq!(locations.len(), 2);
        // Most recent first: ana's l2 (t+20) then ben's l3 (t+15).
        assert_eq!(locations[0].user_id, "ana");
        assert_eq!(locations[0].coordinates.lat, 11.0);
        assert_eq!(locations[0].recorded_at, ts(20));
        assert_eq!(locations[1].user_id, "ben");
        assert!(locations.iter().all(|l| l.user_id != "cal"));
    }

    #[tokio::test]
    async fn remove_member_deletes_own_row() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(1))).await.unwrap();
        store.put_user(user("ben", "Ben", ts(1))).await.unwrap();
        store
            .create_family(family("f1", "REBEL2024", "ana", ts(5)))
            .await
            .unwrap();
        join_family(&store, "f1", "ana", "ben").await;

        store.remove_member("f1", "ben").await.unwrap();
        assert!(!store.is_member("f1", "ben").await.unwrap());
        assert!(matches!(
            store.remove_member("f1", "ben").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn recent_users_scopes_to_shared_families() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(10))).await.unwrap();
        store.put_user(user("ben", "Ben", ts(20))).await.unwrap();
        store.put_user(user("out", "Out", ts(30))).await.unwrap();
        store
            .create_family(family("f1", "REBEL2024", "ana", ts(5)))
            .await
            .unwrap();
        join_family(&store, "f1", "ana", "ben").await;
        // "out" belongs to an unrelated family.
        store
            .create_family(family("f2", "OTHER0001", "out", ts(5)))
            .await
            .unwrap();

        let users = store.recent_users("ana", ts(0)).await.unwrap();
        let ids: Vec<_> = users.iter().map(|u| u.id.as_str()).collect();
        assert!(ids.contains(&"ana"));
        assert!(ids.contains(&"ben"));
        assert!(!ids.contains(&"out"));
    }

    #[tokio::test]
    async fn recent_users_boundary_is_exclusive() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(10))).await.unwrap();
        store.put_user(user("ben", "Ben", ts(20))).await.unwrap();
        store
            .create_family(family("f1", "REBEL2024", "ana", ts(5)))
            .await
            .unwrap();
        join_family(&store, "f1", "ana", "ben").await;

        // Watermark exactly at ben's updated_at: ben must not reappear.
        let users = store.recent_users("ana", ts(20)).await.unwrap();
        assert!(users.iter().all(|u| u.id != "ben"));

        // One step earlier and he does.
        let users = store.recent_users("ana", ts(19)).await.unwrap();
        assert!(users.iter().any(|u| u.id == "ben"));
    }

    #[tokio::test]
    async fn recent_users_hides_soft_deleted() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(10))).await.unwrap();
        let mut ben = user("ben", "Ben", ts(20));
        ben.is_deleted = true;
        store.put_user(ben).await.unwrap();
        store
            .create_family(family("f1", "REBEL2024", "ana", ts(5)))
            .await
            .unwrap();
        join_family(&store, "f1", "ana", "ben").await;

        let users = store.recent_users("ana", ts(0)).await.unwrap();
        assert!(users.iter().all(|u| u.id != "ben"));
    }

    #[tokio::test]
    async fn recent_families_and_memberships_respect_watermark_and_soft_delete() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(1))).await.unwrap();
        store.put_user(user("ben", "Ben", ts(1))).await.unwrap();
        store
            .create_family(family("f1", "CODE00001", "ana", ts(10)))
            .await
            .unwrap();
        let mut gone = family("f2", "CODE00002", "ana", ts(10));
        gone.is_deleted = true;
        store.create_family(gone).await.unwrap();
        join_family(&store, "f1", "ana", "ben").await;

        let families = store.recent_families("ana", ts(0)).await.unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].id, "f1");

        // Exactly at the update timestamp: excluded.
        assert!(store.recent_families("ana", ts(10)).await.unwrap().is_empty());

        // Membership delta scoped to live families only; both f1 ledger
        // rows (creator + ben) are creation events.
        let memberships = store.recent_memberships("ana", ts(0)).await.unwrap();
        assert_eq!(memberships.len(), 2);
        assert!(memberships.iter().all(|m| m.family_id == "f1"));

        // Ben's join is the only ledger row after the family's creation.
        let late = store.recent_memberships("ana", ts(10)).await.unwrap();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].user_id, "ben");
    }

    #[tokio::test]
    async fn recent_locations_latest_per_user_after_watermark() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(1))).await.unwrap();
        store.put_user(user("ben", "Ben", ts(1))).await.unwrap();
        store
            .create_family(family("f1", "REBEL2024", "ana", ts(5)))
            .await
            .unwrap();
        join_family(&store, "f1", "ana", "ben").await;

        store.create_location(location("l1", "ben", 10.0, ts(10))).await.unwrap();
        store.create_location(location("l2", "ben", 11.0, ts(30))).await.unwrap();
        store.create_location(location("l3", "ana", 12.0, ts(20))).await.unwrap();

        let locations = store.recent_locations("ana", ts(0)).await.unwrap();
        assert_eq!(locations.len(), 2);
        let ben_loc = locations.iter().find(|l| l.user_id == "ben").unwrap();
        assert_eq!(ben_loc.id, "l2");
        assert_eq!(ben_loc.created_at, ts(30));

        // Watermark past ana's report: only ben's newest remains.
        let locations = store.recent_locations("ana", ts(20)).await.unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].user_id, "ben");

        // Watermark at the newest report: nothing.
        assert!(store.recent_locations("ana", ts(30)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn latest_location_for_user() {
        let store = test_store().await;
        store.put_user(user("ana", "Ana", ts(1))).await.unwrap();

        assert!(matches!(
            store.latest_location("ana").await,
            Err(StoreError::NotFound)
        ));

        store.create_location(location("l1", "ana", 10.0, ts(10))).await.unwrap();
        store.create_location(location("l2", "ana", 11.0, ts(20))).await.unwrap();

        let latest = store.latest_location("ana").await.unwrap();
        assert_eq!(latest.id, "l2");
    }
}
