/// Refresh Token Generation
///
/// Refresh tokens are opaque: 32 bytes from the operating system CSPRNG,
/// hex encoded to 64 characters. They carry no structure and are only ever
/// matched against the session store, never parsed.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::EntropyError;

const REFRESH_TOKEN_BYTES: usize = 32;

/// Length of the encoded token in characters
pub const REFRESH_TOKEN_LENGTH: usize = REFRESH_TOKEN_BYTES * 2;

/// Generate a new cryptographically secure refresh token
///
/// # Errors
/// Returns `EntropyError` if the OS random source is unavailable. The failure
/// is not retried.
pub fn generate_refresh_token() -> Result<String, EntropyError> {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| EntropyError(e.to_string()))?;

    Ok(hex::encode(bytes))
}
