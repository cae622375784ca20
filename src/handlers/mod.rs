// HTTP request handlers for the relying party
pub mod login;
pub mod session;

use actix_web::web;

// Re-export the main handler functions
pub use login::{login, LoginConfig, LoginOptions, LoginOrchestrator};
pub use session::{health, session_info};

/// Register the relying party routes
///
/// Expects `LoginOrchestrator` and `SessionCookieStore` as app data.
pub fn configure_services(cfg: &mut web::ServiceConfig, login_path: &str) {
    cfg.route(login_path, web::get().to(login))
        .route("/session", web::get().to(session_info))
        .route("/ping", web::get().to(health));
}
