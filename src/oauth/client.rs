//! OpenID Connect client collaborator
//!
//! Only the authorization endpoint is needed to start a login. It is either
//! configured directly ([`StaticClient`]) or resolved once from the issuer's
//! discovery document ([`DiscoveryClient`]).

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::OnceCell;
use url::Url;

use super::params::AuthorizationParams;

/// Errors from the OpenID Connect client or the network behind it
#[derive(Debug, Error)]
pub enum OidcError {
    #[error("discovery request failed: {0}")]
    Discovery(#[from] reqwest::Error),

    #[error("discovery document is missing {0}")]
    MissingEndpoint(&'static str),

    #[error("invalid endpoint URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Builds authorization URLs for an identity provider
#[async_trait]
pub trait OidcClient: Send + Sync {
    /// Authorization URL carrying `params` and the client id
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization endpoint cannot be resolved.
    async fn authorization_url(&self, params: &AuthorizationParams) -> Result<Url, OidcError>;
}

fn build_url(
    endpoint: &str,
    client_id: &str,
    params: &AuthorizationParams,
) -> Result<Url, OidcError> {
    let mut url = Url::parse(endpoint).map_err(|source| OidcError::InvalidUrl {
        url: endpoint.to_string(),
        source,
    })?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", client_id);
        for (key, value) in params.iter() {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Client with a fixed authorization endpoint
#[derive(Debug, Clone)]
pub struct StaticClient {
    authorization_endpoint: String,
    client_id: String,
}

impl StaticClient {
    #[must_use]
    pub fn new(authorization_endpoint: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            authorization_endpoint: authorization_endpoint.into(),
            client_id: client_id.into(),
        }
    }
}

#[async_trait]
impl OidcClient for StaticClient {
    async fn authorization_url(&self, params: &AuthorizationParams) -> Result<Url, OidcError> {
        build_url(&self.authorization_endpoint, &self.client_id, params)
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    authorization_endpoint: Option<String>,
}

/// Client that resolves the authorization endpoint from
/// `<issuer>/.well-known/openid-configuration` on first use
#[derive(Debug)]
pub struct DiscoveryClient {
    issuer_base_url: String,
    client_id: String,
    http_client: reqwest::Client,
    authorization_endpoint: OnceCell<String>,
}

impl DiscoveryClient {
    #[must_use]
    pub fn new(issuer_base_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            issuer_base_url: issuer_base_url.into(),
            client_id: client_id.into(),
            http_client: reqwest::Client::new(),
            authorization_endpoint: OnceCell::new(),
        }
    }

    /// Discovery document location for the configured issuer
    #[must_use]
    pub fn discovery_url(&self) -> String {
        format!(
            "{}/.well-known/openid-configuration",
            self.issuer_base_url.trim_end_matches('/')
        )
    }

    async fn resolve_authorization_endpoint(&self) -> Result<String, OidcError> {
        let discovery_url = self.discovery_url();
        log::info!("Discovering authorization endpoint from {discovery_url}");

        let document: DiscoveryDocument = self
            .http_client
            .get(&discovery_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        document
            .authorization_endpoint
            .ok_or(OidcError::MissingEndpoint("authorization_endpoint"))
    }
}

#[async_trait]
impl OidcClient for DiscoveryClient {
    async fn authorization_url(&self, params: &AuthorizationParams) -> Result<Url, OidcError> {
        let endpoint = self
            .authorization_endpoint
            .get_or_try_init(|| self.resolve_authorization_endpoint())
            .await?;
        build_url(endpoint, &self.client_id, params)
    }
}
