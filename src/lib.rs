pub mod auth;
pub mod clock;
pub mod configuration;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod session_store;
pub mod startup;
pub mod telemetry;
pub mod users;
pub mod validators;
