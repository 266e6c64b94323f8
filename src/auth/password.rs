/// Password Hashing and Verification
///
/// One-way salted bcrypt hashing at a fixed cost. The salt and cost travel
/// inside the produced hash string.

use bcrypt::{hash, verify, DEFAULT_COST};
use lazy_static::lazy_static;

use crate::error::HashingError;

/// bcrypt only reads the first 72 bytes of its input; longer secrets are
/// rejected instead of silently truncated.
pub const MAX_PASSWORD_BYTES: usize = 72;

lazy_static! {
    // Same cost as real hashes; compared against when no account matches
    static ref DUMMY_HASH: Option<String> = hash("no-such-account", DEFAULT_COST).ok();
}

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if the password exceeds [`MAX_PASSWORD_BYTES`] or bcrypt
/// cannot obtain salt.
pub fn hash_password(password: &str) -> Result<String, HashingError> {
    check_length(password)?;

    hash(password, DEFAULT_COST).map_err(|e| HashingError::Bcrypt(e.to_string()))
}

/// Verify a password against its hash
///
/// A mismatch is `Ok(false)`. An `Err` means the stored hash is corrupt,
/// which callers must handle exactly like a mismatch toward the end user.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, HashingError> {
    check_length(password)?;

    verify(password, stored_hash).map_err(|e| HashingError::Bcrypt(e.to_string()))
}

/// Do the work of one [`verify_password`] call against a hash no password
/// matches. Login for an unknown account then takes as long as a wrong
/// password.
pub fn verify_against_dummy_hash(password: &str) {
    if let Some(dummy) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, dummy);
    }
}

fn check_length(password: &str) -> Result<(), HashingError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(HashingError::InputTooLong(MAX_PASSWORD_BYTES));
    }
    Ok(())
}
