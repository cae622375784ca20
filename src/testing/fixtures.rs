//! Test fixtures providing pre-built stores, orchestrators and settings

use std::sync::Arc;

use crate::handlers::login::{LoginConfig, LoginOrchestrator};
use crate::oauth::{AuthorizationParams, StaticClient};
use crate::session::{ExpiryPolicy, SessionCookieConfig, SessionCookieStore};
use crate::settings::RpSettings;
use crate::transient::{TransientCookieConfig, TransientCookieStore};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Secret shared by every fixture store
    pub const SECRET: &'static str = "test-secret-for-rp-session";
    pub const CLIENT_ID: &'static str = "test-client";
    pub const BASE_URL: &'static str = "https://rp.example.com";
    pub const AUTHORIZATION_ENDPOINT: &'static str = "https://op.example.com/authorize";

    /// Session store with default cookie and expiry settings
    ///
    /// # Panics
    ///
    /// Panics if the fixture configuration is rejected.
    #[must_use]
    pub fn session_store() -> SessionCookieStore {
        SessionCookieStore::new(
            &[Self::SECRET],
            SessionCookieConfig::default(),
            ExpiryPolicy::default(),
        )
        .expect("fixture session store")
    }

    /// Transient store with legacy same-site cookies enabled
    ///
    /// # Panics
    ///
    /// Panics if the fixture secret is rejected.
    #[must_use]
    pub fn transient_store() -> TransientCookieStore {
        TransientCookieStore::new(&[Self::SECRET], TransientCookieConfig::default())
            .expect("fixture transient store")
    }

    #[must_use]
    pub fn login_config() -> LoginConfig {
        LoginConfig {
            base_url: Self::BASE_URL.to_string(),
            callback_path: "/callback".to_string(),
            authorization_params: AuthorizationParams::new(),
        }
    }

    /// Orchestrator backed by a [`StaticClient`]
    ///
    /// # Panics
    ///
    /// Panics if the fixture base URL is rejected.
    #[must_use]
    pub fn login_orchestrator() -> LoginOrchestrator {
        LoginOrchestrator::new(
            Self::login_config(),
            Self::transient_store(),
            Arc::new(StaticClient::new(Self::AUTHORIZATION_ENDPOINT, Self::CLIENT_ID)),
        )
        .expect("fixture login orchestrator")
    }

    /// Settings equivalent to the fixtures above
    #[must_use]
    pub fn settings() -> RpSettings {
        let mut settings = RpSettings::default();
        settings.application.base_url = Self::BASE_URL.to_string();
        settings.session.secret = vec![Self::SECRET.to_string()].into();
        settings.oidc.client_id = Some(Self::CLIENT_ID.to_string());
        settings.oidc.authorization_endpoint = Some(Self::AUTHORIZATION_ENDPOINT.to_string());
        settings
    }
}
