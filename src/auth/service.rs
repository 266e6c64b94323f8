/// Authentication Service
///
/// Composes the password hasher, token codec, refresh token generator,
/// header extractor and session store into the operations the HTTP layer
/// calls. Failures are logged with their real cause here and leave as a
/// single coarse [`AuthError`], so callers cannot tell an expired token from
/// a forged or unknown one.

use std::sync::Arc;

use actix_web::http::header::HeaderMap;
use chrono::Duration;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::auth::extract::{extract_api_key, extract_bearer};
use crate::auth::jwt::TokenCodec;
use crate::auth::password::{verify_against_dummy_hash, verify_password};
use crate::auth::refresh_token::generate_refresh_token;
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::{AuthError, StoreError};
use crate::session_store::{SessionRecord, SessionStore};

/// Tokens handed out at login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct AuthService {
    codec: TokenCodec,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl AuthService {
    pub fn new(config: &JwtSettings, sessions: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            codec: TokenCodec::new(config, clock.clone()),
            sessions,
            clock,
            access_ttl: config.access_token_ttl(),
            refresh_ttl: config.refresh_token_ttl(),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Verify a password and open a session for `subject`
    ///
    /// # Errors
    /// - `InvalidCredentials` on a wrong password or an unreadable stored hash
    /// - `TransientFailure` if the new refresh token collided in the store;
    ///   the caller may retry once
    /// - `EntropyUnavailable`, `SigningFailure`, `StoreFailure` on infrastructure failure
    pub async fn login(
        &self,
        password: &str,
        stored_hash: &str,
        subject: Uuid,
    ) -> Result<Session, AuthError> {
        match verify_password(password, stored_hash) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(user_id = %subject, "Login rejected: password mismatch");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                tracing::error!(user_id = %subject, error = %e, "Login rejected: stored credential unusable");
                return Err(AuthError::InvalidCredentials);
            }
        }

        let access_token = self.mint_access_token(subject)?;
        let refresh_token = generate_refresh_token().map_err(|e| {
            tracing::error!(error = %e, "Refresh token generation failed");
            AuthError::from(e)
        })?;

        let record = SessionRecord::new(
            refresh_token.clone(),
            subject,
            self.clock.now(),
            self.refresh_ttl,
        )
        .ok_or_else(|| {
            tracing::error!(user_id = %subject, "Session expiry out of range");
            AuthError::StoreFailure("session expiry out of range".to_string())
        })?;
        match self.sessions.put(&record).await {
            Ok(()) => {}
            Err(StoreError::Conflict) => {
                tracing::warn!(user_id = %subject, "Refresh token collided with an existing session");
                return Err(AuthError::TransientFailure);
            }
            Err(e) => {
                tracing::error!(user_id = %subject, error = %e, "Failed to persist session");
                return Err(AuthError::StoreFailure(e.to_string()));
            }
        }

        tracing::info!(user_id = %subject, expires_at = %record.expires_at, "Session issued");

        Ok(Session {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Reject a login for an account that does not exist
    ///
    /// Spends the same hashing work as [`AuthService::login`] with a wrong
    /// password and returns the same error.
    pub fn reject_unknown_account(&self, password: &str) -> AuthError {
        verify_against_dummy_hash(password);
        AuthError::InvalidCredentials
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The refresh token itself is not rotated.
    ///
    /// # Errors
    /// `Unauthorized` if the token is unknown, revoked or expired
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let record = self.lookup_session(refresh_token).await?;

        if record.is_revoked() {
            tracing::warn!(user_id = %record.user_id, "Refresh rejected: session revoked");
            return Err(AuthError::Unauthorized);
        }
        if record.is_expired_at(self.clock.now()) {
            tracing::info!(user_id = %record.user_id, "Refresh rejected: session expired");
            return Err(AuthError::Unauthorized);
        }

        let access_token = self.mint_access_token(record.user_id)?;
        tracing::info!(user_id = %record.user_id, "Access token refreshed");
        Ok(access_token)
    }

    /// Revoke the session behind a refresh token
    ///
    /// Revoking an already revoked session, or a token that was never
    /// issued, succeeds; the caller cannot probe which tokens exist.
    ///
    /// # Errors
    /// `StoreFailure` if the store is unavailable
    pub async fn revoke_session(&self, refresh_token: &str) -> Result<(), AuthError> {
        match self.sessions.revoke(refresh_token, self.clock.now()).await {
            Ok(()) => {
                tracing::info!("Session revoked");
                Ok(())
            }
            Err(StoreError::NotFound) => {
                tracing::warn!("Revoke of unknown refresh token ignored");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to revoke session");
                Err(AuthError::StoreFailure(e.to_string()))
            }
        }
    }

    /// Identify the caller from `Authorization: Bearer <access token>`
    ///
    /// # Errors
    /// `Unauthorized` for a missing, malformed, forged or expired token
    pub fn authenticate_request(&self, headers: &HeaderMap) -> Result<Uuid, AuthError> {
        let token = extract_bearer(headers).map_err(|e| {
            tracing::warn!(error = %e, "Request rejected: no bearer token");
            AuthError::Unauthorized
        })?;

        self.codec.verify(&token).map_err(|e| {
            tracing::warn!(error = %e, "Request rejected: access token invalid");
            AuthError::Unauthorized
        })
    }

    /// Check `Authorization: ApiKey <key>` against the configured key
    ///
    /// A missing header is compared as an empty key, so every rejection
    /// takes the same path.
    ///
    /// # Errors
    /// `Unauthorized` unless the presented key equals `expected_key`
    pub fn authenticate_webhook(&self, headers: &HeaderMap, expected_key: &str) -> Result<(), AuthError> {
        let presented = extract_api_key(headers).unwrap_or_default();
        let matches: bool = presented.as_bytes().ct_eq(expected_key.as_bytes()).into();

        if matches && !expected_key.is_empty() {
            Ok(())
        } else {
            tracing::warn!("Webhook rejected: API key mismatch");
            Err(AuthError::Unauthorized)
        }
    }

    async fn lookup_session(&self, refresh_token: &str) -> Result<SessionRecord, AuthError> {
        match self.sessions.get(refresh_token).await {
            Ok(record) => Ok(record),
            Err(StoreError::NotFound) => {
                tracing::warn!("Refresh rejected: unknown refresh token");
                Err(AuthError::Unauthorized)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load session");
                Err(AuthError::StoreFailure(e.to_string()))
            }
        }
    }

    fn mint_access_token(&self, subject: Uuid) -> Result<String, AuthError> {
        self.codec.mint(subject, self.access_ttl).map_err(|e| {
            tracing::error!(user_id = %subject, error = %e, "Access token signing failed");
            AuthError::SigningFailure(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::clock::ManualClock;
    use crate::configuration::Secret;
    use crate::session_store::InMemorySessionStore;
    use actix_web::http::header::{HeaderValue, AUTHORIZATION};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    fn test_config() -> JwtSettings {
        JwtSettings {
            secret: Secret::new("unit-test-secret-unit-test-secret"),
            access_token_expiry: 3600,
            refresh_token_expiry: 60 * 24 * 3600,
            issuer: "chirpy".to_string(),
        }
    }

    fn service() -> (AuthService, Arc<InMemorySessionStore>, ManualClock) {
        let store = Arc::new(InMemorySessionStore::new());
        let clock = ManualClock::default();
        let service = AuthService::new(&test_config(), store.clone(), Arc::new(clock.clone()));
        (service, store, clock)
    }

    fn auth_header(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    /// Store that reports every insert as a duplicate
    struct CollidingStore;

    #[async_trait]
    impl SessionStore for CollidingStore {
        async fn put(&self, _record: &SessionRecord) -> Result<(), StoreError> {
            Err(StoreError::Conflict)
        }

        async fn get(&self, _token: &str) -> Result<SessionRecord, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn revoke(&self, _token: &str, _at: DateTime<Utc>) -> Result<(), StoreError> {
            Err(StoreError::NotFound)
        }
    }

    /// Store whose backend is down
    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn put(&self, _record: &SessionRecord) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn get(&self, _token: &str) -> Result<SessionRecord, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn revoke(&self, _token: &str, _at: DateTime<Utc>) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let (service, store, clock) = service();
        let user_id = Uuid::new_v4();
        let hash = hash_password("secret123").unwrap();

        let session = service.login("secret123", &hash, user_id).await.unwrap();

        let record = store.get(&session.refresh_token).await.unwrap();
        assert_eq!(record.user_id, user_id);
        assert_eq!(record.revoked_at, None);
        assert_eq!(record.expires_at, clock.now() + Duration::days(60));
        assert_eq!(session.expires_in, 3600);
        assert_eq!(service.codec().verify(&session.access_token), Ok(user_id));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (service, store, _) = service();
        let hash = hash_password("secret123").unwrap();

        let result = service.login("secret124", &hash, Uuid::new_v4()).await;

        assert_eq!(result, Err(AuthError::InvalidCredentials));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_login_with_corrupt_hash_looks_like_wrong_password() {
        let (service, _, _) = service();

        let result = service.login("secret123", "garbage", Uuid::new_v4()).await;

        assert_eq!(result, Err(AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_unknown_account_matches_wrong_password() {
        let (service, store, _) = service();
        let hash = hash_password("secret123").unwrap();

        let wrong_password = service.login("secret124", &hash, Uuid::new_v4()).await;

        assert_eq!(Err(service.reject_unknown_account("secret124")), wrong_password);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_login_conflict_is_transient() {
        let service = AuthService::new(
            &test_config(),
            Arc::new(CollidingStore),
            Arc::new(ManualClock::default()),
        );
        let hash = hash_password("secret123").unwrap();

        let result = service.login("secret123", &hash, Uuid::new_v4()).await;

        assert_eq!(result, Err(AuthError::TransientFailure));
    }

    #[tokio::test]
    async fn test_store_outage_is_not_unauthorized() {
        let service = AuthService::new(
            &test_config(),
            Arc::new(BrokenStore),
            Arc::new(ManualClock::default()),
        );

        assert!(matches!(
            service.refresh("anything").await,
            Err(AuthError::StoreFailure(_))
        ));
        assert!(matches!(
            service.revoke_session("anything").await,
            Err(AuthError::StoreFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_issues_new_access_token() {
        let (service, _, _) = service();
        let user_id = Uuid::new_v4();
        let hash = hash_password("secret123").unwrap();
        let session = service.login("secret123", &hash, user_id).await.unwrap();

        let access_token = service.refresh(&session.refresh_token).await.unwrap();

        assert_ne!(access_token, session.access_token);
        assert_eq!(service.codec().verify(&access_token), Ok(user_id));
    }

    #[tokio::test]
    async fn test_refresh_unknown_token() {
        let (service, _, _) = service();

        assert_eq!(service.refresh("nope").await, Err(AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn test_refresh_after_expiry() {
        let (service, _, clock) = service();
        let hash = hash_password("secret123").unwrap();
        let session = service.login("secret123", &hash, Uuid::new_v4()).await.unwrap();

        clock.advance(Duration::days(60) - Duration::seconds(1));
        assert!(service.refresh(&session.refresh_token).await.is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(
            service.refresh(&session.refresh_token).await,
            Err(AuthError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn test_revoked_session_cannot_refresh() {
        let (service, _, _) = service();
        let hash = hash_password("secret123").unwrap();
        let session = service.login("secret123", &hash, Uuid::new_v4()).await.unwrap();

        service.revoke_session(&session.refresh_token).await.unwrap();

        assert_eq!(
            service.refresh(&session.refresh_token).await,
            Err(AuthError::Unauthorized)
        );
        // Second revoke of the same session still succeeds
        assert_eq!(service.revoke_session(&session.refresh_token).await, Ok(()));
    }

    #[tokio::test]
    async fn test_revoke_unknown_session_succeeds() {
        let (service, store, _) = service();

        assert_eq!(service.revoke_session("never-issued").await, Ok(()));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_login_with_unrepresentable_session_expiry_fails_cleanly() {
        let mut config = test_config();
        config.refresh_token_expiry = i64::MAX;
        let store = Arc::new(InMemorySessionStore::new());
        let service = AuthService::new(&config, store.clone(), Arc::new(ManualClock::default()));
        let hash = hash_password("secret123").unwrap();

        let result = service.login("secret123", &hash, Uuid::new_v4()).await;

        assert!(matches!(result, Err(AuthError::StoreFailure(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_authenticate_request() {
        let (service, _, clock) = service();
        let user_id = Uuid::new_v4();
        let token = service.codec().mint(user_id, Duration::hours(1)).unwrap();

        let headers = auth_header(&format!("Bearer {}", token));
        assert_eq!(service.authenticate_request(&headers), Ok(user_id));

        clock.advance(Duration::hours(1));
        assert_eq!(service.authenticate_request(&headers), Err(AuthError::Unauthorized));
    }

    #[test]
    fn test_authenticate_request_collapses_failures() {
        let (service, _, _) = service();

        let cases = [
            HeaderMap::new(),
            auth_header("Bearer not.a.jwt"),
            auth_header("Token abc"),
            auth_header("Bearer "),
        ];

        for headers in cases.iter() {
            assert_eq!(service.authenticate_request(headers), Err(AuthError::Unauthorized));
        }
    }

    #[test]
    fn test_authenticate_webhook() {
        let (service, _, _) = service();

        assert_eq!(
            service.authenticate_webhook(&auth_header("ApiKey rightkey"), "rightkey"),
            Ok(())
        );
        assert_eq!(
            service.authenticate_webhook(&auth_header("ApiKey wrongkey"), "rightkey"),
            Err(AuthError::Unauthorized)
        );
        assert_eq!(
            service.authenticate_webhook(&auth_header("Bearer rightkey"), "rightkey"),
            Err(AuthError::Unauthorized)
        );
        assert_eq!(
            service.authenticate_webhook(&HeaderMap::new(), "rightkey"),
            Err(AuthError::Unauthorized)
        );
    }

    #[test]
    fn test_webhook_rejects_when_no_key_configured() {
        let (service, _, _) = service();

        assert_eq!(
            service.authenticate_webhook(&HeaderMap::new(), ""),
            Err(AuthError::Unauthorized)
        );
    }
}
