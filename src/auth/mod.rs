/// Authentication module
///
/// Password hashing, access token signing/verification, refresh token
/// generation, `Authorization` header parsing, and the service that ties
/// them to the session store.

mod claims;
mod extract;
mod jwt;
mod password;
mod refresh_token;
mod service;

pub use claims::Claims;
pub use extract::{extract_api_key, extract_bearer, API_KEY_SCHEME, BEARER_SCHEME};
pub use jwt::TokenCodec;
pub use password::{hash_password, verify_against_dummy_hash, verify_password, MAX_PASSWORD_BYTES};
pub use refresh_token::{generate_refresh_token, REFRESH_TOKEN_LENGTH};
pub use service::{AuthService, Session};
