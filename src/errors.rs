//! Error types for `rp-session`
//!
//! Only configuration mistakes and collaborator failures are errors here.
//! A tampered, expired or missing cookie is never an error: the stores
//! report it as `None`.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::oauth::client::OidcError;

/// Fatal configuration errors, raised at startup or at request entry
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one secret must be configured")]
    EmptySecret,

    #[error("secret #{index} is shorter than {min} characters")]
    SecretTooShort { index: usize, min: usize },

    #[error("session policy is invalid: {0}")]
    InvalidPolicy(String),

    #[error("cookie attributes leave no room for a value within {max_cookie_size} bytes")]
    CookieTooLarge { max_cookie_size: usize },

    #[error("response_type should be one of id_token, code id_token, code (got {0:?})")]
    InvalidResponseType(String),

    #[error("scope should contain \"openid\"")]
    MissingOpenidScope,

    #[error("custom state value must be an object")]
    InvalidLoginState,

    #[error("{0} must be configured")]
    MissingSetting(&'static str),

    #[error("invalid value {value:?} for {name}")]
    InvalidSetting { name: &'static str, value: String },

    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors raised while writing a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("session encryption failed")]
    Encrypt,
}

/// Errors raised by login initiation
#[derive(Debug, Error)]
pub enum LoginError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] OidcError),

    #[error("failed to encode login state: {0}")]
    State(#[from] serde_json::Error),
}

impl ResponseError for LoginError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        log::error!("Login initiation failed: {self}");
        let error = if matches!(self, Self::Transport(_)) {
            "bad_gateway"
        } else {
            "server_error"
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": error,
            "message": self.to_string(),
        }))
    }
}
