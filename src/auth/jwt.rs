/// Access Token Signing and Verification
///
/// HS256 JWTs keyed by the process-wide secret. The secret is handed to
/// [`TokenCodec::new`] once at startup; verification never reads ambient state.
///
/// Expiry is checked against the injected [`Clock`] with no leeway: a token is
/// rejected from the second its `exp` is reached. This is an audit policy,
/// clock skew between issuers is not tolerated.

use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::TokenError;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(config: &JwtSettings, clock: Arc<dyn Clock>) -> Self {
        let secret = config.secret.expose().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            clock,
        }
    }

    /// Mint an access token for `subject` valid for `ttl` from now
    ///
    /// # Errors
    /// Returns `Encoding` if `ttl` is shorter than one second or signing fails
    pub fn mint(&self, subject: Uuid, ttl: Duration) -> Result<String, TokenError> {
        let ttl_seconds = ttl.num_seconds();
        if ttl_seconds < 1 {
            return Err(TokenError::Encoding(
                "token lifetime must be at least one second".to_string(),
            ));
        }

        let claims = Claims::new(subject, &self.issuer, self.clock.now(), ttl_seconds);

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify an access token and return its subject
    ///
    /// Order of checks: signature, then claims, then expiry.
    ///
    /// # Errors
    /// - `SignatureInvalid` if the signature does not match
    /// - `Malformed` if the token or its claims cannot be parsed or the issuer differs
    /// - `Expired` if `now >= exp`
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let claims = self.decode_claims(token)?;

        if claims.is_expired_at(self.clock.now()) {
            return Err(TokenError::Expired);
        }

        claims.subject()
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry is judged against our own clock below
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::configuration::Secret;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: Secret::new("test-secret-key-at-least-32-characters-long"),
            access_token_expiry: 3600,
            refresh_token_expiry: 60 * 24 * 3600,
            issuer: "chirpy".to_string(),
        }
    }

    fn codec_with_clock() -> (TokenCodec, ManualClock) {
        let clock = ManualClock::default();
        let codec = TokenCodec::new(&get_test_config(), Arc::new(clock.clone()));
        (codec, clock)
    }

    /// Replace one character in the middle of the signature segment
    fn tamper_signature(token: &str) -> String {
        let dot = token.rfind('.').unwrap();
        let mut chars: Vec<char> = token.chars().collect();
        let idx = dot + 1 + (chars.len() - dot - 1) / 2;
        chars[idx] = if chars[idx] == 'A' { 'B' } else { 'A' };
        chars.into_iter().collect()
    }

    #[test]
    fn test_mint_and_verify_token() {
        let (codec, _) = codec_with_clock();
        let user_id = Uuid::new_v4();

        let token = codec.mint(user_id, Duration::hours(1)).expect("Failed to mint token");

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(codec.verify(&token), Ok(user_id));
    }

    #[test]
    fn test_tokens_for_same_subject_differ() {
        let (codec, _) = codec_with_clock();
        let user_id = Uuid::new_v4();

        let first = codec.mint(user_id, Duration::hours(1)).unwrap();
        let second = codec.mint(user_id, Duration::hours(1)).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_token_expires_exactly_at_exp() {
        let (codec, clock) = codec_with_clock();
        let user_id = Uuid::new_v4();
        let token = codec.mint(user_id, Duration::hours(1)).unwrap();

        clock.advance(Duration::minutes(59));
        assert_eq!(codec.verify(&token), Ok(user_id));

        clock.advance(Duration::minutes(1));
        assert_eq!(codec.verify(&token), Err(TokenError::Expired));

        clock.advance(Duration::days(30));
        assert_eq!(codec.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_sub_second_ttl_is_rejected() {
        let (codec, _) = codec_with_clock();

        let result = codec.mint(Uuid::new_v4(), Duration::milliseconds(500));

        assert!(matches!(result, Err(TokenError::Encoding(_))));
    }

    #[test]
    fn test_tampered_signature() {
        let (codec, _) = codec_with_clock();
        let token = codec.mint(Uuid::new_v4(), Duration::hours(1)).unwrap();

        let tampered = tamper_signature(&token);

        assert_ne!(tampered, token);
        assert_eq!(codec.verify(&tampered), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_tampered_payload_fails_signature() {
        let (codec, _) = codec_with_clock();
        let token = codec.mint(Uuid::new_v4(), Duration::hours(1)).unwrap();
        let other = codec.mint(Uuid::new_v4(), Duration::hours(1)).unwrap();

        // Header and signature of one token around the payload of another
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let spliced = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert_eq!(codec.verify(&spliced), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_token_from_other_secret() {
        let (codec, clock) = codec_with_clock();
        let mut config = get_test_config();
        config.secret = Secret::new("a-completely-different-signing-secret!!");
        let foreign = TokenCodec::new(&config, Arc::new(clock));

        let token = foreign.mint(Uuid::new_v4(), Duration::hours(1)).unwrap();

        assert_eq!(codec.verify(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_invalid_token() {
        let (codec, _) = codec_with_clock();

        assert!(codec.verify("invalid.token.here").is_err());
        assert!(matches!(codec.verify(""), Err(TokenError::Malformed(_))));
        assert!(matches!(codec.verify("no-dots-at-all"), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_signed_but_unparseable_claims() {
        #[derive(serde::Serialize)]
        struct Partial {
            sub: String,
            iss: String,
        }

        let (codec, _) = codec_with_clock();
        let key = EncodingKey::from_secret(get_test_config().secret.expose().as_bytes());
        let token = encode(
            &Header::new(ALGORITHM),
            &Partial {
                sub: Uuid::new_v4().to_string(),
                iss: "chirpy".to_string(),
            },
            &key,
        )
        .unwrap();

        assert!(matches!(codec.verify(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_signed_claims_with_non_uuid_subject() {
        let (codec, clock) = codec_with_clock();
        let mut claims = Claims::new(Uuid::new_v4(), "chirpy", clock.now(), 3600);
        claims.sub = "user-42".to_string();
        let key = EncodingKey::from_secret(get_test_config().secret.expose().as_bytes());
        let token = encode(&Header::new(ALGORITHM), &claims, &key).unwrap();

        assert!(matches!(codec.verify(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_wrong_issuer() {
        let (codec, clock) = codec_with_clock();
        let mut config = get_test_config();
        config.issuer = "someone-else".to_string();
        let other_issuer = TokenCodec::new(&config, Arc::new(clock));

        let token = other_issuer.mint(Uuid::new_v4(), Duration::hours(1)).unwrap();

        assert!(matches!(codec.verify(&token), Err(TokenError::Malformed(_))));
    }
}
