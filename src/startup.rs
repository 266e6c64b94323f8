use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::configuration::WebhookSettings;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    create_user, get_current_user, health_check, login, polka_webhook, refresh, revoke,
    update_user,
};
use crate::users::UserStore;

/// Shared state handed to every worker
#[derive(Clone)]
pub struct AppState {
    pub auth: web::Data<AuthService>,
    pub users: web::Data<dyn UserStore>,
    pub webhook: web::Data<WebhookSettings>,
}

impl AppState {
    pub fn new(auth: AuthService, users: Arc<dyn UserStore>, webhook: WebhookSettings) -> Self {
        Self {
            auth: web::Data::new(auth),
            users: web::Data::from(users),
            webhook: web::Data::new(webhook),
        }
    }
}

/// Register shared state and all `/api` routes
pub fn configure(state: AppState) -> impl Fn(&mut web::ServiceConfig) + Clone {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(state.auth.clone())
            .app_data(state.users.clone())
            .app_data(state.webhook.clone())
            .service(
                web::scope("/api")
                    // Public routes
                    .route("/healthz", web::get().to(health_check))
                    .service(
                        web::resource("/users")
                            .route(web::post().to(create_user))
                            // Checks the access token itself
                            .route(web::put().to(update_user)),
                    )
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/revoke", web::post().to(revoke))
                    .route("/polka/webhooks", web::post().to(polka_webhook))
                    // Protected routes (require an access token)
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(state.auth.get_ref().clone()))
                            .route(web::get().to(get_current_user)),
                    ),
            );
    }
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let routes = configure(state);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(routes.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
