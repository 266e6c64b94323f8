use std::net::TcpListener;
use std::sync::Arc;

use chirpy::auth::AuthService;
use chirpy::clock::SystemClock;
use chirpy::configuration::get_configuration;
use chirpy::session_store::PgSessionStore;
use chirpy::startup::{run, AppState};
use chirpy::telemetry::init_telemetry;
use chirpy::users::PgUserStore;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    // A missing signing secret or webhook key aborts startup here
    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
    })?;
    tracing::info!("Database ready");

    let auth = AuthService::new(
        &configuration.jwt,
        Arc::new(PgSessionStore::new(pool.clone())),
        Arc::new(SystemClock),
    );
    let state = AppState::new(
        auth,
        Arc::new(PgUserStore::new(pool)),
        configuration.webhook.clone(),
    );

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, state)?.await
}
