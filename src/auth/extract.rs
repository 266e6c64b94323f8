/// Credential extraction from the `Authorization` header
///
/// Accepted shapes are `Authorization: Bearer <token>` and
/// `Authorization: ApiKey <key>`. The scheme is case-sensitive, exactly one
/// space separates it from the credential, and the request must carry a
/// single `Authorization` header. Anything else is `MissingCredential`.

use actix_web::http::header::{HeaderMap, AUTHORIZATION};

use crate::error::ExtractError;

pub const BEARER_SCHEME: &str = "Bearer";
pub const API_KEY_SCHEME: &str = "ApiKey";

/// Pull a bearer token (access or refresh) out of the request headers
pub fn extract_bearer(headers: &HeaderMap) -> Result<String, ExtractError> {
    extract_scheme(headers, BEARER_SCHEME)
}

/// Pull a webhook API key out of the request headers
pub fn extract_api_key(headers: &HeaderMap) -> Result<String, ExtractError> {
    extract_scheme(headers, API_KEY_SCHEME)
}

fn extract_scheme(headers: &HeaderMap, scheme: &str) -> Result<String, ExtractError> {
    let mut values = headers.get_all(AUTHORIZATION);
    let value = values.next().ok_or(ExtractError::MissingCredential)?;
    if values.next().is_some() {
        return Err(ExtractError::MissingCredential);
    }

    let value = value.to_str().map_err(|_| ExtractError::MissingCredential)?;
    let (presented_scheme, credential) = value
        .split_once(' ')
        .ok_or(ExtractError::MissingCredential)?;

    if presented_scheme != scheme
        || credential.is_empty()
        || credential.chars().any(char::is_whitespace)
    {
        return Err(ExtractError::MissingCredential);
    }

    Ok(credential.to_string())
}
