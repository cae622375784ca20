//! Request helpers that replay response cookies the way a browser would

use actix_web::http::header;
use actix_web::{test, HttpRequest, HttpResponse};
use std::collections::HashMap;
use url::Url;

/// `Cookie` header value for the cookies a response leaves in the browser
///
/// Later `Set-Cookie` headers override earlier ones and cleared cookies
/// (empty value) are dropped.
#[must_use]
pub fn cookie_header(response: &HttpResponse) -> String {
    let mut jar: Vec<(String, String)> = Vec::new();
    for cookie in response.cookies() {
        jar.retain(|(name, _)| name != cookie.name());
        if !cookie.value().is_empty() {
            jar.push((cookie.name().to_string(), cookie.value().to_string()));
        }
    }
    jar.iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Next request from the browser after receiving `response`
#[must_use]
pub fn request_from_response(response: &HttpResponse) -> HttpRequest {
    let cookies = cookie_header(response);
    let mut req = test::TestRequest::default();
    if !cookies.is_empty() {
        req = req.insert_header((header::COOKIE, cookies));
    }
    req.to_http_request()
}

/// Query parameters of the `Location` header
///
/// # Panics
///
/// Panics if the response has no absolute `Location` URL.
#[must_use]
pub fn location_params(response: &HttpResponse) -> HashMap<String, String> {
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("response has a Location header");
    Url::parse(location)
        .expect("Location is an absolute URL")
        .query_pairs()
        .into_owned()
        .collect()
}
