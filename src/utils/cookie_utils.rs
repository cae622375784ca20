use actix_web::cookie::{
    time::{Duration, OffsetDateTime},
    Cookie, SameSite,
};
use actix_web::{HttpRequest, HttpResponseBuilder};
use std::collections::HashMap;

/// Attributes applied to a cookie when it is written or cleared
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieAttributes {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub same_site: Option<SameSite>,
    pub secure: Option<bool>,
    pub http_only: Option<bool>,
    pub expires: Option<OffsetDateTime>,
}

impl CookieAttributes {
    /// Only the attributes that identify a cookie (domain and path)
    #[must_use]
    pub fn scope(&self) -> Self {
        Self {
            domain: self.domain.clone(),
            path: self.path.clone(),
            ..Self::default()
        }
    }

    /// Build a cookie carrying these attributes
    #[must_use]
    pub fn to_cookie(&self, name: &str, value: &str) -> Cookie<'static> {
        let mut cookie = Cookie::new(name.to_owned(), value.to_owned());
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        if let Some(path) = &self.path {
            cookie.set_path(path.clone());
        }
        cookie.set_same_site(self.same_site);
        cookie.set_secure(self.secure);
        cookie.set_http_only(self.http_only);
        if let Some(expires) = self.expires {
            cookie.set_expires(expires);
        }
        cookie
    }
}

/// All request cookies keyed by name
///
/// When a name repeats, the first occurrence wins. An unparseable
/// `Cookie` header yields an empty map.
#[must_use]
pub fn get_all(req: &HttpRequest) -> HashMap<String, String> {
    let mut all = HashMap::new();
    if let Ok(cookies) = req.cookies() {
        for cookie in cookies.iter() {
            all.entry(cookie.name().to_string())
                .or_insert_with(|| cookie.value().to_string());
        }
    }
    all
}

/// Value of a single request cookie
#[must_use]
pub fn get(req: &HttpRequest, name: &str) -> Option<String> {
    req.cookie(name).map(|cookie| cookie.value().to_string())
}

/// Append a `Set-Cookie` header to the response
pub fn set(res: &mut HttpResponseBuilder, name: &str, value: &str, attributes: &CookieAttributes) {
    res.cookie(attributes.to_cookie(name, value));
}

/// Append a `Set-Cookie` header that removes the cookie from the browser
///
/// Only domain and path are taken from `attributes`; they must match the
/// ones the cookie was written with.
pub fn clear(res: &mut HttpResponseBuilder, name: &str, attributes: &CookieAttributes) {
    res.cookie(expired_cookie(name, attributes));
}

/// Cookie with an empty value that expired at the Unix epoch
#[must_use]
pub fn expired_cookie(name: &str, attributes: &CookieAttributes) -> Cookie<'static> {
    let mut cookie = attributes.scope().to_cookie(name, "");
    cookie.set_max_age(Duration::ZERO);
    cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
    cookie
}

/// Length of the `Set-Cookie` value for `name=value` with these attributes
#[must_use]
pub fn serialized_len(name: &str, value: &str, attributes: &CookieAttributes) -> usize {
    attributes.to_cookie(name, value).to_string().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test::TestRequest, HttpResponse};

    #[test]
    fn test_get_all_keeps_first_duplicate() {
        let req = TestRequest::default()
            .insert_header(("Cookie", "a=1; b=2; a=3"))
            .to_http_request();
        let all = get_all(&req);
        assert_eq!(all.len(), 2);
        assert_eq!(all["a"], "1");
        assert_eq!(all["b"], "2");
        assert_eq!(get(&req, "b").as_deref(), Some("2"));
        assert_eq!(get(&req, "missing"), None);
    }

    #[test]
    fn test_set_and_clear_write_headers() {
        let attributes = CookieAttributes {
            domain: Some("example.com".to_string()),
            path: Some("/".to_string()),
            same_site: Some(SameSite::Lax),
            secure: Some(true),
            http_only: Some(true),
            expires: None,
        };

        let mut builder = HttpResponse::Ok();
        set(&mut builder, "session", "value", &attributes);
        clear(&mut builder, "stale", &attributes);
        let response = builder.finish();

        let cookies: Vec<_> = response.cookies().collect();
        assert_eq!(cookies.len(), 2);

        let written = &cookies[0];
        assert_eq!(written.name(), "session");
        assert_eq!(written.value(), "value");
        assert_eq!(written.same_site(), Some(SameSite::Lax));
        assert_eq!(written.secure(), Some(true));
        assert_eq!(written.http_only(), Some(true));

        let cleared = &cookies[1];
        assert_eq!(cleared.name(), "stale");
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.domain(), Some("example.com"));
        assert_eq!(cleared.max_age(), Some(Duration::ZERO));
        // Clearing does not repeat SameSite/Secure
        assert_eq!(cleared.same_site(), None);
    }

    #[test]
    fn test_serialized_len_counts_attributes() {
        let bare = serialized_len("s", "", &CookieAttributes::default());
        let scoped = serialized_len(
            "s",
            "",
            &CookieAttributes {
                path: Some("/".to_string()),
                ..CookieAttributes::default()
            },
        );
        assert_eq!(bare, "s=".len());
        assert_eq!(scoped, "s=; Path=/".len());
    }
}
