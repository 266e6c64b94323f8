/// Authentication Routes
///
/// Login, access token refresh, and session revocation.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{extract_bearer, AuthService, Session};
use crate::error::{AppError, AuthError, ErrorContext, StoreError};
use crate::users::{UserRecord, UserResponse, UserStore};
use crate::validators::is_valid_email;

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response: the user plus both tokens
#[derive(Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Refresh response carrying only the new access token
#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// POST /api/login
///
/// Authenticate with email and password. Returns an access token and a
/// refresh token.
///
/// # Errors
/// - 401: Malformed email, unknown email or wrong password (same response for all)
/// - 503: Refresh token collided twice in a row
/// - 500: Internal server error
pub async fn login(
    form: web::Json<LoginRequest>,
    users: web::Data<dyn UserStore>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let email = match is_valid_email(&form.email) {
        Ok(email) => email,
        Err(e) => {
            tracing::warn!(request_id = %context.request_id, error = %e, "Login with malformed email");
            return Err(auth.reject_unknown_account(&form.password).into());
        }
    };

    let user = match users.find_by_email(&email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            tracing::warn!(request_id = %context.request_id, "Login for unknown email");
            return Err(auth.reject_unknown_account(&form.password).into());
        }
        Err(e) => return Err(e.into()),
    };

    let session = open_session(&auth, &form.password, &user).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(LoginResponse {
        user: UserResponse::from(&user),
        token: session.access_token,
        refresh_token: session.refresh_token,
        token_type: "Bearer",
        expires_in: session.expires_in,
    }))
}

/// A fresh refresh token is drawn on retry, so one retry clears a collision.
async fn open_session(
    auth: &AuthService,
    password: &str,
    user: &UserRecord,
) -> Result<Session, AuthError> {
    match auth.login(password, &user.hashed_password, user.id).await {
        Err(AuthError::TransientFailure) => {
            tracing::warn!(user_id = %user.id, "Retrying login after refresh token collision");
            auth.login(password, &user.hashed_password, user.id).await
        }
        other => other,
    }
}

/// POST /api/refresh
///
/// Exchange `Authorization: Bearer <refresh token>` for a new access token.
/// The refresh token stays valid; it is not rotated.
///
/// # Errors
/// - 401: Missing, unknown, revoked, or expired refresh token
pub async fn refresh(
    req: HttpRequest,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let refresh_token = bearer_or_unauthorized(&req)?;
    let token = auth.refresh(&refresh_token).await?;

    tracing::info!(request_id = %context.request_id, "Token refreshed successfully");

    Ok(HttpResponse::Ok().json(TokenResponse { token }))
}

/// POST /api/revoke
///
/// Revoke the session behind `Authorization: Bearer <refresh token>`.
///
/// Unknown and already revoked tokens are accepted alike.
///
/// # Errors
/// - 401: Missing refresh token
pub async fn revoke(
    req: HttpRequest,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("session_revoke");

    let refresh_token = bearer_or_unauthorized(&req)?;
    auth.revoke_session(&refresh_token).await?;

    tracing::info!(request_id = %context.request_id, "Session revoked");

    Ok(HttpResponse::NoContent().finish())
}

fn bearer_or_unauthorized(req: &HttpRequest) -> Result<String, AppError> {
    extract_bearer(req.headers()).map_err(|e| {
        tracing::warn!(error = %e, "Refresh token missing from request");
        AppError::Auth(AuthError::Unauthorized)
    })
}
