/// User Routes
///
/// Account registration, credential updates, and the authenticated caller's
/// profile.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::auth::{hash_password, AuthService};
use crate::error::{AppError, ErrorContext};
use crate::middleware::AuthenticatedUser;
use crate::users::{UserResponse, UserStore};
use crate::validators::is_valid_email;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/users
///
/// # Errors
/// - 400: Malformed email or oversized password
/// - 409: Email already registered
pub async fn create_user(
    form: web::Json<CreateUserRequest>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let email = is_valid_email(&form.email)?;
    let hashed_password = hash_password(&form.password)?;

    let user = users.create(&email, &hashed_password).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(UserResponse::from(&user)))
}

/// PUT /api/users
///
/// Replace the caller's email and password.
///
/// # Errors
/// - 401: Missing, forged or expired access token
/// - 400: Malformed email or oversized password
/// - 409: Email belongs to another account
pub async fn update_user(
    req: HttpRequest,
    form: web::Json<UpdateUserRequest>,
    auth: web::Data<AuthService>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_update");

    let user_id = auth.authenticate_request(req.headers())?;
    let email = is_valid_email(&form.email)?;
    let hashed_password = hash_password(&form.password)?;

    let user = users
        .update_credentials(user_id, &email, &hashed_password)
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User credentials updated"
    );

    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// GET /api/me
///
/// **Requires a valid access token**; identity is injected by `JwtMiddleware`.
pub async fn get_current_user(
    caller: web::ReqData<AuthenticatedUser>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let AuthenticatedUser(user_id) = caller.into_inner();
    let user = users.find_by_id(user_id).await?;

    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}
