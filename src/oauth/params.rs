//! Authorization request parameters
//!
//! Parameters are an ordered string map so the generated authorization URL is
//! stable. Layers are merged explicitly: library defaults, then configured
//! parameters, then per-call overrides, with `redirect_uri` applied last.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::ConfigError;

pub const RESPONSE_TYPE: &str = "response_type";
pub const RESPONSE_MODE: &str = "response_mode";
pub const SCOPE: &str = "scope";
pub const REDIRECT_URI: &str = "redirect_uri";
pub const MAX_AGE: &str = "max_age";

/// `response_type` values accepted for login
pub const ALLOWED_RESPONSE_TYPES: &[&str] = &["id_token", "code id_token", "code"];

static OPENID_SCOPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bopenid\b").expect("valid openid scope pattern"));

/// Ordered authorization parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationParams(BTreeMap<String, String>);

impl AuthorizationParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Library defaults: implicit `id_token` flow with a form-post callback
    #[must_use]
    pub fn defaults() -> Self {
        Self::new()
            .with(RESPONSE_TYPE, "id_token")
            .with(RESPONSE_MODE, "form_post")
            .with(SCOPE, "openid profile email")
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn response_type(&self) -> Option<&str> {
        self.get(RESPONSE_TYPE)
    }

    #[must_use]
    pub fn response_mode(&self) -> Option<&str> {
        self.get(RESPONSE_MODE)
    }

    #[must_use]
    pub fn max_age(&self) -> Option<&str> {
        self.get(MAX_AGE)
    }

    /// PKCE applies to any response type that returns a code
    #[must_use]
    pub fn uses_pkce(&self) -> bool {
        self.response_type().is_some_and(|rt| rt.contains("code"))
    }

    #[must_use]
    pub fn is_form_post(&self) -> bool {
        self.response_mode() == Some("form_post")
    }

    /// Apply `layers` in order over each other, then force `redirect_uri`
    #[must_use]
    pub fn merge(layers: &[&AuthorizationParams], redirect_uri: &str) -> Self {
        let mut merged = Self::new();
        for layer in layers {
            merged
                .0
                .extend(layer.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged.with(REDIRECT_URI, redirect_uri)
    }

    /// Reject parameters that cannot start an OpenID Connect login
    ///
    /// # Errors
    ///
    /// Returns an error if `response_type` is not an allowed value or `scope`
    /// lacks the `openid` token.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let response_type = self.response_type().unwrap_or_default();
        if !ALLOWED_RESPONSE_TYPES.contains(&response_type) {
            return Err(ConfigError::InvalidResponseType(response_type.to_string()));
        }
        match self.get(SCOPE) {
            Some(scope) if OPENID_SCOPE.is_match(scope) => Ok(()),
            _ => Err(ConfigError::MissingOpenidScope),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AuthorizationParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_layers_later_wins() {
        let configured = AuthorizationParams::new()
            .with(RESPONSE_TYPE, "code")
            .with("audience", "api");
        let call = AuthorizationParams::new()
            .with("audience", "other")
            .with(REDIRECT_URI, "https://evil.example/cb");

        let merged = AuthorizationParams::merge(
            &[&AuthorizationParams::defaults(), &configured, &call],
            "https://app.example/callback",
        );

        assert_eq!(merged.response_type(), Some("code"));
        assert_eq!(merged.response_mode(), Some("form_post"));
        assert_eq!(merged.get("audience"), Some("other"));
        assert_eq!(merged.get(REDIRECT_URI), Some("https://app.example/callback"));
    }

    #[test]
    fn test_validate_response_type() {
        for response_type in ALLOWED_RESPONSE_TYPES {
            let params = AuthorizationParams::defaults().with(RESPONSE_TYPE, *response_type);
            assert!(params.validate().is_ok(), "{response_type}");
        }

        let params = AuthorizationParams::defaults().with(RESPONSE_TYPE, "token");
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidResponseType(rt)) if rt == "token"
        ));
    }

    #[test]
    fn test_validate_scope_requires_openid_word() {
        let ok = AuthorizationParams::defaults().with(SCOPE, "email openid");
        assert!(ok.validate().is_ok());

        for scope in ["profile email", "openidx", ""] {
            let params = AuthorizationParams::defaults().with(SCOPE, scope);
            assert!(
                matches!(params.validate(), Err(ConfigError::MissingOpenidScope)),
                "{scope:?}"
            );
        }
    }

    #[test]
    fn test_uses_pkce() {
        assert!(!AuthorizationParams::defaults().uses_pkce());
        assert!(AuthorizationParams::defaults()
            .with(RESPONSE_TYPE, "code id_token")
            .uses_pkce());
    }
}
