/// Session Store
///
/// Durable record of issued refresh tokens. The authentication service only
/// needs `put`, `get` and `revoke`; each call is an independent short
/// transaction. Records are never updated except to set `revoked_at`, and
/// never deleted here (retention is handled outside the service).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;

/// Row tracking a refresh token's validity
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SessionRecord {
    /// The refresh token itself; unique key
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Returns `None` if `issued_at + ttl` is not a representable instant
    pub fn new(token: String, user_id: Uuid, issued_at: DateTime<Utc>, ttl: Duration) -> Option<Self> {
        let expires_at = issued_at.checked_add_signed(ttl)?;
        Some(Self {
            token,
            user_id,
            created_at: issued_at,
            expires_at,
            revoked_at: None,
        })
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Same boundary as access tokens: `expires_at == now` is expired
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new record
    ///
    /// # Errors
    /// `Conflict` if a record with the same token already exists
    async fn put(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// # Errors
    /// `NotFound` if no record has this token
    async fn get(&self, token: &str) -> Result<SessionRecord, StoreError>;

    /// Mark a record revoked at `at`
    ///
    /// Revoking an already revoked record succeeds and keeps the original
    /// `revoked_at`.
    ///
    /// # Errors
    /// `NotFound` if no record has this token
    async fn revoke(&self, token: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// In-process store for tests and single-node development
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.token) {
            return Err(StoreError::Conflict);
        }
        records.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<SessionRecord, StoreError> {
        self.records
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn revoke(&self, token: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(token).ok_or(StoreError::NotFound)?;
        if record.revoked_at.is_none() {
            record.revoked_at = Some(at);
        }
        Ok(())
    }
}

/// Postgres-backed store over the `refresh_tokens` table
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn put(&self, record: &SessionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token, user_id, created_at, updated_at, expires_at, revoked_at)
            VALUES ($1, $2, $3, $3, $4, $5)
            "#,
        )
        .bind(&record.token)
        .bind(record.user_id)
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(record.revoked_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, token: &str) -> Result<SessionRecord, StoreError> {
        sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT token, user_id, created_at, expires_at, revoked_at
            FROM refresh_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn revoke(&self, token: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = COALESCE(revoked_at, $1), updated_at = $1
            WHERE token = $2
            "#,
        )
        .bind(at)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
