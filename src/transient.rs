//! Transient Cookie Store - One-Time Signed Values for the Login Redirect
//!
//! Values such as the nonce, state and PKCE verifier must survive exactly one
//! round trip through the identity provider. Each one is written as its own
//! cookie `<value>.<signature>` and consumed (cleared) on the first read.
//!
//! Browsers that ignore `SameSite=None` drop such cookies on a cross-site
//! callback, so a shadow cookie `_<key>` without `SameSite` is written
//! alongside when legacy support is enabled.

use actix_web::cookie::SameSite;
use actix_web::{HttpRequest, HttpResponseBuilder};

use crate::errors::ConfigError;
use crate::oauth::generators;
use crate::utils::cookie_utils::{self, CookieAttributes};
use crate::utils::crypto::{self, KeyPurpose, KeyRing};

/// Cookie attributes shared by every transient cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientCookieConfig {
    pub domain: Option<String>,
    pub path: Option<String>,
    /// Ignored for `SameSite=None` cookies, which are always secure
    pub secure: Option<bool>,
    pub legacy_same_site_cookie: bool,
}

impl Default for TransientCookieConfig {
    fn default() -> Self {
        Self {
            domain: None,
            path: Some("/".to_string()),
            secure: None,
            legacy_same_site_cookie: true,
        }
    }
}

/// Per-call options for [`TransientCookieStore::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientOptions {
    pub same_site: SameSite,
    /// Value to store; a fresh nonce when `None`
    pub value: Option<String>,
}

impl Default for TransientOptions {
    fn default() -> Self {
        Self {
            same_site: SameSite::None,
            value: None,
        }
    }
}

impl TransientOptions {
    #[must_use]
    pub fn same_site(same_site: SameSite) -> Self {
        Self {
            same_site,
            value: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// HMAC-signed, consume-once cookie store
#[derive(Debug, Clone)]
pub struct TransientCookieStore {
    keys: KeyRing,
    config: TransientCookieConfig,
}

impl TransientCookieStore {
    /// Create a store signing with keys derived from `secrets`
    ///
    /// # Errors
    ///
    /// Returns an error if no secret is given or a secret is too short.
    pub fn new<S: AsRef<str>>(
        secrets: &[S],
        config: TransientCookieConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            keys: KeyRing::new(secrets, KeyPurpose::Signing)?,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TransientCookieConfig {
        &self.config
    }

    #[must_use]
    pub fn generate_nonce() -> String {
        generators::nonce()
    }

    #[must_use]
    pub fn generate_code_verifier() -> String {
        generators::code_verifier()
    }

    #[must_use]
    pub fn calculate_code_challenge(verifier: &str) -> String {
        generators::code_challenge(verifier)
    }

    /// Write a signed cookie for `key` and return the unsigned value
    pub fn save(
        &self,
        key: &str,
        res: &mut HttpResponseBuilder,
        options: TransientOptions,
    ) -> String {
        let value = options.value.unwrap_or_else(Self::generate_nonce);
        let is_none = options.same_site == SameSite::None;

        let attributes = CookieAttributes {
            domain: self.config.domain.clone(),
            path: self.config.path.clone(),
            same_site: Some(options.same_site),
            secure: if is_none { Some(true) } else { self.config.secure },
            http_only: Some(true),
            expires: None,
        };
        cookie_utils::set(res, key, &self.signed(key, &value), &attributes);

        if is_none && self.config.legacy_same_site_cookie {
            let shadow = shadow_name(key);
            let attributes = CookieAttributes {
                same_site: None,
                secure: self.config.secure,
                ..attributes
            };
            cookie_utils::set(res, &shadow, &self.signed(&shadow, &value), &attributes);
        }

        log::debug!("stored transient value for {key}");
        value
    }

    /// Consume the value stored under `key`
    ///
    /// The cookie (and its shadow) is cleared whether or not it verifies, so
    /// a value can be read at most once.
    pub fn read(
        &self,
        key: &str,
        req: &HttpRequest,
        res: &mut HttpResponseBuilder,
    ) -> Option<String> {
        let cookies = cookie_utils::get_all(req);
        let scope = CookieAttributes {
            domain: self.config.domain.clone(),
            path: self.config.path.clone(),
            ..CookieAttributes::default()
        };

        let mut value = cookies
            .get(key)
            .and_then(|cookie| self.unsigned(key, cookie));
        cookie_utils::clear(res, key, &scope);

        if self.config.legacy_same_site_cookie {
            let shadow = shadow_name(key);
            if value.is_none() {
                value = cookies
                    .get(&shadow)
                    .and_then(|cookie| self.unsigned(&shadow, cookie));
                if value.is_some() {
                    log::debug!("recovered {key} from legacy same-site cookie");
                }
            }
            cookie_utils::clear(res, &shadow, &scope);
        }

        if value.is_none() {
            log::debug!("no valid transient value for {key}");
        }
        value
    }

    fn signed(&self, name: &str, value: &str) -> String {
        let signature = crypto::sign(signing_input(name, value).as_bytes(), self.keys.current());
        format!("{value}.{signature}")
    }

    fn unsigned(&self, name: &str, cookie: &str) -> Option<String> {
        let (value, signature) = cookie.rsplit_once('.')?;
        crypto::verify(signing_input(name, value).as_bytes(), signature, &self.keys)
            .then(|| value.to_string())
    }
}

fn shadow_name(key: &str) -> String {
    format!("_{key}")
}

fn signing_input(name: &str, value: &str) -> String {
    format!("{name}={value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::requests::request_from_response;
    use actix_web::{test::TestRequest, HttpResponse};

    const SECRET: &str = "transient-test-secret";

    fn store(secrets: &[&str], legacy: bool) -> TransientCookieStore {
        TransientCookieStore::new(
            secrets,
            TransientCookieConfig {
                legacy_same_site_cookie: legacy,
                ..TransientCookieConfig::default()
            },
        )
        .unwrap()
    }

    fn save(
        store: &TransientCookieStore,
        key: &str,
        options: TransientOptions,
    ) -> (String, HttpResponse) {
        let mut builder = HttpResponse::Ok();
        let value = store.save(key, &mut builder, options);
        (value, builder.finish())
    }

    fn read(
        store: &TransientCookieStore,
        key: &str,
        req: &HttpRequest,
    ) -> (Option<String>, HttpResponse) {
        let mut builder = HttpResponse::Ok();
        let value = store.read(key, req, &mut builder);
        (value, builder.finish())
    }

    #[test]
    fn test_save_writes_signed_value_and_shadow() {
        let store = store(&[SECRET], true);
        let (value, response) = save(&store, "nonce", TransientOptions::default());

        let cookies: Vec<_> = response.cookies().collect();
        assert_eq!(cookies.len(), 2);

        let primary = &cookies[0];
        assert_eq!(primary.name(), "nonce");
        assert!(primary.value().starts_with(&format!("{value}.")));
        assert_eq!(primary.same_site(), Some(SameSite::None));
        assert_eq!(primary.secure(), Some(true));
        assert_eq!(primary.http_only(), Some(true));

        let shadow = &cookies[1];
        assert_eq!(shadow.name(), "_nonce");
        assert_eq!(shadow.same_site(), None);
        assert_eq!(shadow.secure(), None);
        assert_ne!(shadow.value(), primary.value());
    }

    #[test]
    fn test_lax_save_has_no_shadow() {
        let store = store(&[SECRET], true);
        let (_, response) = save(
            &store,
            "state",
            TransientOptions::same_site(SameSite::Lax).with_value("abc"),
        );
        let cookies: Vec<_> = response.cookies().collect();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].same_site(), Some(SameSite::Lax));
        assert_eq!(cookies[0].secure(), None);
    }

    #[test]
    fn test_read_returns_value_and_clears() {
        let store = store(&[SECRET], true);
        let options = TransientOptions::default().with_value("a.b.c");
        let (value, response) = save(&store, "state", options);
        assert_eq!(value, "a.b.c");

        let req = request_from_response(&response);
        let (read_value, cleared) = read(&store, "state", &req);
        assert_eq!(read_value.as_deref(), Some("a.b.c"));

        let names: Vec<_> = cleared
            .cookies()
            .filter(|c| c.value().is_empty())
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["state", "_state"]);

        // The browser applies the clears before the next request
        let req = request_from_response(&cleared);
        assert_eq!(read(&store, "state", &req).0, None);
    }

    #[test]
    fn test_tampered_value_is_absent_and_cleared() {
        let store = store(&[SECRET], false);
        let (_, response) = save(&store, "nonce", TransientOptions::default().with_value("good"));
        let signed = response.cookies().next().unwrap().value().to_string();
        let (_, signature) = signed.rsplit_once('.').unwrap();

        let req = TestRequest::default()
            .insert_header(("Cookie", format!("nonce=evil.{signature}")))
            .to_http_request();
        let (value, cleared) = read(&store, "nonce", &req);
        assert_eq!(value, None);
        assert_eq!(cleared.cookies().next().unwrap().name(), "nonce");
    }

    #[test]
    fn test_signature_is_bound_to_cookie_name() {
        let store = store(&[SECRET], false);
        let (_, response) = save(&store, "nonce", TransientOptions::default().with_value("v"));
        let signed = response.cookies().next().unwrap().value().to_string();

        let req = TestRequest::default()
            .insert_header(("Cookie", format!("state={signed}")))
            .to_http_request();
        assert_eq!(read(&store, "state", &req).0, None);
    }

    #[test]
    fn test_legacy_shadow_is_used_when_primary_missing() {
        let store = store(&[SECRET], true);
        let (value, response) = save(&store, "nonce", TransientOptions::default());
        let shadow = response
            .cookies()
            .find(|c| c.name() == "_nonce")
            .unwrap()
            .value()
            .to_string();

        let req = TestRequest::default()
            .insert_header(("Cookie", format!("_nonce={shadow}")))
            .to_http_request();
        assert_eq!(read(&store, "nonce", &req).0, Some(value));

        let without_legacy = self::store(&[SECRET], false);
        assert_eq!(read(&without_legacy, "nonce", &req).0, None);
    }

    #[test]
    fn test_rotation_keeps_outstanding_values_valid() {
        let previous = store(&["second-secret"], false);
        let (value, response) = save(&previous, "nonce", TransientOptions::default());
        let req = request_from_response(&response);

        let rotated = store(&["first-secret", "second-secret"], false);
        assert_eq!(read(&rotated, "nonce", &req).0, Some(value));

        let dropped = store(&["first-secret"], false);
        assert_eq!(read(&dropped, "nonce", &req).0, None);
    }

    #[test]
    fn test_swapped_key_order_still_verifies() {
        let before = store(&["first-secret", "second-secret"], false);
        let (value, response) = save(&before, "state", TransientOptions::default());
        let req = request_from_response(&response);

        let after = store(&["second-secret", "first-secret"], false);
        assert_eq!(read(&after, "state", &req).0, Some(value));

        // New writes sign with the new first key only
        let (fresh, response) = save(&after, "state", TransientOptions::default());
        let req = request_from_response(&response);
        assert_eq!(read(&store(&["second-secret"], false), "state", &req).0, Some(fresh));
    }

    #[test]
    fn test_generators_delegate() {
        let verifier = TransientCookieStore::generate_code_verifier();
        assert_eq!(
            TransientCookieStore::calculate_code_challenge(&verifier),
            generators::code_challenge(&verifier)
        );
        assert_ne!(
            TransientCookieStore::generate_nonce(),
            TransientCookieStore::generate_nonce()
        );
    }
}
