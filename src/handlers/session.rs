// Session inspection and health endpoints
use actix_web::{web, HttpRequest, HttpResponse};
use log::error;
use serde::Serialize;
use serde_json::Value;

use crate::session::SessionCookieStore;

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub authenticated: bool,
    pub issued_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// `GET /session`
///
/// Reports whether a valid session is present. With rolling sessions enabled
/// the session is re-saved so its idle timer restarts.
pub async fn session_info(req: HttpRequest, store: web::Data<SessionCookieStore>) -> HttpResponse {
    let Some(stored) = store.read::<Value>(&req) else {
        return HttpResponse::Ok().json(SessionInfo {
            authenticated: false,
            issued_at: None,
        });
    };

    let mut response = HttpResponse::Ok();
    if store.policy().rolling {
        let renewed = store.save(
            &req,
            &mut response,
            Some(&stored.session),
            Some(stored.created_at),
        );
        if let Err(e) = renewed {
            error!("Failed to renew session: {e}");
        }
    }
    response.json(SessionInfo {
        authenticated: true,
        issued_at: Some(stored.created_at),
    })
}

/// `GET /ping`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    })
}
