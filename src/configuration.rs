use std::fmt;

use chrono::Duration;
use config::ConfigError;

/// Upper bound for either token lifetime (ten years)
pub const MAX_TOKEN_TTL_SECONDS: i64 = 10 * 365 * 24 * 3600;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub webhook: WebhookSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username,
            self.password.expose(),
            self.host,
            self.port,
            self.database_name
        )
    }
}

/// Access/refresh token settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct JwtSettings {
    /// HMAC signing key; rotating it invalidates every outstanding access token
    pub secret: Secret,
    pub access_token_expiry: i64,  // seconds (3600 = 1 hour)
    pub refresh_token_expiry: i64, // seconds (5184000 = 60 days)
    pub issuer: String,
}

impl JwtSettings {
    pub fn access_token_ttl(&self) -> Duration {
        Duration::try_seconds(self.access_token_expiry).unwrap_or(Duration::MAX)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::try_seconds(self.refresh_token_expiry).unwrap_or(Duration::MAX)
    }

    /// Reject settings that would make every login or refresh fail
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.expose().is_empty() {
            return Err(ConfigError::Message("jwt.secret must not be empty".to_string()));
        }
        check_ttl("jwt.access_token_expiry", self.access_token_expiry)?;
        check_ttl("jwt.refresh_token_expiry", self.refresh_token_expiry)
    }
}

fn check_ttl(key: &str, seconds: i64) -> Result<(), ConfigError> {
    if (1..=MAX_TOKEN_TTL_SECONDS).contains(&seconds) {
        Ok(())
    } else {
        Err(ConfigError::Message(format!(
            "{} must be between 1 and {} seconds, got {}",
            key, MAX_TOKEN_TTL_SECONDS, seconds
        )))
    }
}

/// Payment provider webhook settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct WebhookSettings {
    pub polka_api_key: Secret,
}

/// Configuration value that must never show up in logs
#[derive(serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// Load settings from `configuration.yaml` (optional) overlaid with
/// `APP_`-prefixed environment variables, e.g. `APP_JWT__SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;

    settings.jwt.validate()?;
    if settings.webhook.polka_api_key.expose().is_empty() {
        return Err(ConfigError::Message(
            "webhook.polka_api_key must not be empty".to_string(),
        ));
    }

    Ok(settings)
}
