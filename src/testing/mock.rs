//! Mock collaborators for isolated unit testing

use actix_web::HttpRequest;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use url::Url;

use crate::oauth::{AuthorizationParams, LoginStateHook, OidcClient, OidcError};
use crate::utils::logging::{SessionEvent, SessionObserver};

/// Observer that keeps every event for later assertions
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingObserver {
    /// Events recorded so far, oldest first
    ///
    /// # Panics
    ///
    /// Panics if a previous assertion poisoned the lock.
    #[must_use]
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().expect("observer lock").clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_event(&self, event: &SessionEvent) {
        self.events.lock().expect("observer lock").push(event.clone());
    }
}

/// OpenID Connect client whose discovery always fails
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingClient;

#[async_trait]
impl OidcClient for FailingClient {
    async fn authorization_url(&self, _params: &AuthorizationParams) -> Result<Url, OidcError> {
        Err(OidcError::MissingEndpoint("authorization_endpoint"))
    }
}

/// Login state hook returning a fixed value
#[derive(Debug, Clone)]
pub struct FixedStateHook(pub Value);

#[async_trait(?Send)]
impl LoginStateHook for FixedStateHook {
    async fn login_state(&self, _req: &HttpRequest, _return_to: &str) -> Value {
        self.0.clone()
    }
}
