/// Payment provider webhook
///
/// The provider authenticates with a static `Authorization: ApiKey <key>`.
/// The key is checked before the body is even parsed.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthService;
use crate::configuration::WebhookSettings;
use crate::error::AppError;
use crate::users::UserStore;

const USER_UPGRADED: &str = "user.upgraded";

#[derive(Deserialize)]
pub struct PolkaEvent {
    pub event: String,
    pub data: PolkaEventData,
}

#[derive(Deserialize)]
pub struct PolkaEventData {
    pub user_id: Uuid,
}

/// POST /api/polka/webhooks
///
/// # Errors
/// - 401: Missing or wrong API key
/// - 400: Body is not a valid event
/// - 404: `user.upgraded` for an unknown user
pub async fn polka_webhook(
    req: HttpRequest,
    body: web::Bytes,
    auth: web::Data<AuthService>,
    webhook: web::Data<WebhookSettings>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    auth.authenticate_webhook(req.headers(), webhook.polka_api_key.expose())?;

    let event: PolkaEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid webhook payload: {}", e)))?;

    if event.event != USER_UPGRADED {
        tracing::debug!(event = %event.event, "Ignoring webhook event");
        return Ok(HttpResponse::NoContent().finish());
    }

    users.upgrade(event.data.user_id).await?;
    tracing::info!(user_id = %event.data.user_id, "User upgraded to premium");

    Ok(HttpResponse::NoContent().finish())
}
