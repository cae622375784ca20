#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_web::{middleware::Logger, web, App, HttpServer};
use rp_session::{handlers::configure_services, settings::RpSettings};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = RpSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e:#}")))?;

    let session_store = settings
        .session_store()
        .map_err(|e| std::io::Error::other(format!("Failed to create session store: {e}")))?;
    let orchestrator = settings
        .login_orchestrator()
        .map_err(|e| std::io::Error::other(format!("Failed to create login handler: {e}")))?;

    start_server(settings, session_store, orchestrator).await
}

/// Start the server with stateless cookie sessions
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(
    settings: RpSettings,
    session_store: rp_session::SessionCookieStore,
    orchestrator: rp_session::LoginOrchestrator,
) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings, orchestrator.redirect_uri());

    let session_store = web::Data::new(session_store);
    let orchestrator = web::Data::new(orchestrator);
    let login_path = settings.oidc.routes.login.clone();

    HttpServer::new(move || {
        let login_path = login_path.clone();
        App::new()
            .app_data(session_store.clone())
            .app_data(orchestrator.clone())
            .wrap(Logger::default())
            .configure(move |cfg| configure_services(cfg, &login_path))
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &RpSettings, redirect_uri: &str) {
    log::info!("Starting rp-session {} on http://{bind_address}", rp_session::VERSION);
    log::info!("  GET  {:<12} - Start login", settings.oidc.routes.login);
    log::info!("  GET  /session      - Session status");
    log::info!("  GET  /ping         - Health check");
    log::info!("Callback URL for the identity provider: {redirect_uri}");
}
