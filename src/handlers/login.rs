// Login initiation: authorization request, transient cookies and redirect
use actix_web::cookie::SameSite;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, info};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::errors::{ConfigError, LoginError};
use crate::oauth::params::MAX_AGE;
use crate::oauth::state::{self, DefaultLoginState, LoginStateHook};
use crate::oauth::{AuthorizationParams, OidcClient};
use crate::transient::{TransientCookieStore, TransientOptions};
use crate::utils::html_safe;

pub const NONCE_COOKIE: &str = "nonce";
pub const STATE_COOKIE: &str = "state";
pub const CODE_VERIFIER_COOKIE: &str = "code_verifier";
pub const MAX_AGE_COOKIE: &str = "max_age";

/// Application-level login configuration
#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub base_url: String,
    pub callback_path: String,
    /// Configured layer, applied over the library defaults
    pub authorization_params: AuthorizationParams,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            callback_path: "/callback".to_string(),
            authorization_params: AuthorizationParams::new(),
        }
    }
}

/// Per-request login options
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    /// Where to send the user after login; the base URL when `None`
    pub return_to: Option<String>,
    /// Per-call layer, applied last before `redirect_uri`
    pub authorization_params: AuthorizationParams,
}

/// Starts OpenID Connect logins
pub struct LoginOrchestrator {
    config: LoginConfig,
    redirect_uri: String,
    transient: TransientCookieStore,
    client: Arc<dyn OidcClient>,
    state_hook: Arc<dyn LoginStateHook>,
}

impl LoginOrchestrator {
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be parsed or joined with the
    /// callback path.
    pub fn new(
        config: LoginConfig,
        transient: TransientCookieStore,
        client: Arc<dyn OidcClient>,
    ) -> Result<Self, ConfigError> {
        let redirect_uri = resolve_redirect_uri(&config.base_url, &config.callback_path)?;
        Ok(Self {
            config,
            redirect_uri,
            transient,
            client,
            state_hook: Arc::new(DefaultLoginState),
        })
    }

    #[must_use]
    pub fn with_state_hook(mut self, hook: Arc<dyn LoginStateHook>) -> Self {
        self.state_hook = hook;
        self
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Defaults, configured and per-call parameters, merged and validated
    ///
    /// # Errors
    ///
    /// Returns an error if the merged parameters cannot start a login.
    pub fn authorization_params(
        &self,
        options: &LoginOptions,
    ) -> Result<AuthorizationParams, ConfigError> {
        let params = AuthorizationParams::merge(
            &[
                &AuthorizationParams::defaults(),
                &self.config.authorization_params,
                &options.authorization_params,
            ],
            &self.redirect_uri,
        );
        params.validate()?;
        Ok(params)
    }

    /// Build the authorization request and redirect the browser to it
    ///
    /// Validation happens before any cookie is written. On success the
    /// response carries the nonce, state and, when used, PKCE verifier and
    /// `max_age` as transient cookies.
    ///
    /// The PKCE verifier is kept only in the `code_verifier` transient
    /// cookie, never in the state object; the callback reads it from there.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid parameters or login state, and for
    /// failures of the OpenID Connect client.
    pub async fn initiate(
        &self,
        req: &HttpRequest,
        options: LoginOptions,
    ) -> Result<HttpResponse, LoginError> {
        let mut params = self.authorization_params(&options)?;
        let return_to = options
            .return_to
            .unwrap_or_else(|| self.config.base_url.clone());

        let login_state = self.state_hook.login_state(req, &return_to).await;
        let login_state =
            state::prepare_state(login_state, &TransientCookieStore::generate_nonce(), &return_to)?;

        let same_site = if params.is_form_post() {
            SameSite::Lax
        } else {
            SameSite::None
        };
        let options = || TransientOptions::same_site(same_site);

        let mut response = HttpResponse::Found();
        let nonce = self.transient.save(NONCE_COOKIE, &mut response, options());
        let state_value = self.transient.save(
            STATE_COOKIE,
            &mut response,
            options().with_value(state::encode_state(&login_state)?),
        );
        params.insert("nonce", nonce);
        params.insert("state", state_value);

        if params.uses_pkce() {
            let verifier = self.transient.save(
                CODE_VERIFIER_COOKIE,
                &mut response,
                options().with_value(TransientCookieStore::generate_code_verifier()),
            );
            let challenge = TransientCookieStore::calculate_code_challenge(&verifier);
            params.insert("code_challenge", challenge);
            params.insert("code_challenge_method", "S256");
        }

        if let Some(max_age) = params.get(MAX_AGE).map(ToString::to_string) {
            self.transient
                .save(MAX_AGE_COOKIE, &mut response, options().with_value(max_age));
        }

        let url = self.client.authorization_url(&params).await?;
        debug!(
            "authorization request uses response_type {:?}, pkce {}",
            params.response_type(),
            params.uses_pkce()
        );
        info!("Redirecting to identity provider: {}", url.origin().ascii_serialization());

        Ok(response
            .insert_header((header::LOCATION, url.as_str()))
            .content_type("text/html; charset=utf-8")
            .body(format!("Found. Redirecting to {}", html_safe(url.as_str()))))
    }
}

fn resolve_redirect_uri(base_url: &str, callback_path: &str) -> Result<String, ConfigError> {
    let base = Url::parse(base_url).map_err(|source| ConfigError::InvalidUrl {
        url: base_url.to_string(),
        source,
    })?;
    base.join(callback_path)
        .map(String::from)
        .map_err(|source| ConfigError::InvalidUrl {
            url: callback_path.to_string(),
            source,
        })
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "returnTo")]
    pub return_to: Option<String>,
}

/// `GET /login`
///
/// # Errors
///
/// Returns a [`LoginError`] response when login initiation fails.
pub async fn login(
    req: HttpRequest,
    query: web::Query<LoginQuery>,
    orchestrator: web::Data<LoginOrchestrator>,
) -> Result<HttpResponse, LoginError> {
    orchestrator
        .initiate(
            &req,
            LoginOptions {
                return_to: query.into_inner().return_to,
                ..LoginOptions::default()
            },
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::params::{RESPONSE_MODE, RESPONSE_TYPE, SCOPE};
    use crate::oauth::{decode_state, generators};
    use crate::testing::fixtures::TestFixtures;
    use crate::testing::mock::{FailingClient, FixedStateHook};
    use crate::testing::requests::{location_params, request_from_response};
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn options(params: &[(&str, &str)]) -> LoginOptions {
        LoginOptions {
            return_to: None,
            authorization_params: params.iter().copied().collect(),
        }
    }

    fn cookie_names(response: &HttpResponse) -> Vec<String> {
        response.cookies().map(|c| c.name().to_string()).collect()
    }

    fn read_transient(key: &str, response: &HttpResponse) -> Option<String> {
        let req = request_from_response(response);
        TestFixtures::transient_store().read(key, &req, &mut HttpResponse::Ok())
    }

    #[actix_web::test]
    async fn test_default_login_redirects_with_form_post() {
        let orchestrator = TestFixtures::login_orchestrator();
        let req = TestRequest::get().uri("/login").to_http_request();

        let response = orchestrator.initiate(&req, LoginOptions::default()).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);

        let query = location_params(&response);
        assert_eq!(query["client_id"], TestFixtures::CLIENT_ID);
        assert_eq!(query["response_type"], "id_token");
        assert_eq!(query["response_mode"], "form_post");
        assert_eq!(query["scope"], "openid profile email");
        assert_eq!(query["redirect_uri"], "https://rp.example.com/callback");
        assert!(!query.contains_key("code_challenge"));

        let names = cookie_names(&response);
        assert_eq!(names, vec!["nonce", "state"]);
        for cookie in response.cookies() {
            assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        }

        assert_eq!(read_transient("nonce", &response).as_deref(), Some(query["nonce"].as_str()));
        assert_eq!(read_transient("state", &response).as_deref(), Some(query["state"].as_str()));
    }

    #[actix_web::test]
    async fn test_state_carries_return_to_and_fresh_nonce() {
        let orchestrator = TestFixtures::login_orchestrator();
        let req = TestRequest::default().to_http_request();

        let response = orchestrator.initiate(&req, LoginOptions::default()).await.unwrap();
        let query = location_params(&response);
        let state = decode_state(&query["state"]);
        assert_eq!(state["returnTo"], "https://rp.example.com");
        assert_ne!(state["nonce"], Value::String(query["nonce"].clone()));

        let response = orchestrator
            .initiate(
                &req,
                LoginOptions {
                    return_to: Some("/profile".to_string()),
                    ..LoginOptions::default()
                },
            )
            .await
            .unwrap();
        let state = decode_state(&location_params(&response)["state"]);
        assert_eq!(state["returnTo"], "/profile");
    }

    #[actix_web::test]
    async fn test_code_flow_uses_pkce() {
        let orchestrator = TestFixtures::login_orchestrator();
        let req = TestRequest::default().to_http_request();

        let response = orchestrator
            .initiate(&req, options(&[(RESPONSE_TYPE, "code"), (RESPONSE_MODE, "query")]))
            .await
            .unwrap();
        let query = location_params(&response);

        assert!(cookie_names(&response).contains(&"code_verifier".to_string()));
        assert_eq!(query["code_challenge_method"], "S256");

        let verifier = read_transient("code_verifier", &response).unwrap();
        assert_eq!(query["code_challenge"], generators::code_challenge(&verifier));

        // Cross-site callbacks need SameSite=None plus the legacy shadow
        let nonce = response.cookies().find(|c| c.name() == "nonce").unwrap();
        assert_eq!(nonce.same_site(), Some(SameSite::None));
        assert_eq!(nonce.secure(), Some(true));
        assert!(cookie_names(&response).contains(&"_code_verifier".to_string()));
    }

    #[actix_web::test]
    async fn test_id_token_flow_never_writes_verifier() {
        let orchestrator = TestFixtures::login_orchestrator();
        let req = TestRequest::default().to_http_request();

        let response = orchestrator
            .initiate(&req, options(&[(RESPONSE_MODE, "fragment")]))
            .await
            .unwrap();
        let names = cookie_names(&response);
        assert!(!names.iter().any(|name| name.contains("code_verifier")));
    }

    #[actix_web::test]
    async fn test_max_age_is_stored() {
        let orchestrator = TestFixtures::login_orchestrator();
        let req = TestRequest::default().to_http_request();

        let response = orchestrator
            .initiate(&req, options(&[(MAX_AGE, "3600")]))
            .await
            .unwrap();
        assert_eq!(location_params(&response)["max_age"], "3600");
        assert_eq!(read_transient("max_age", &response).as_deref(), Some("3600"));
    }

    #[actix_web::test]
    async fn test_invalid_parameters_fail_before_cookies() {
        let orchestrator = TestFixtures::login_orchestrator();
        let req = TestRequest::default().to_http_request();

        let err = orchestrator
            .initiate(&req, options(&[(RESPONSE_TYPE, "token")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::Config(ConfigError::InvalidResponseType(_))));

        let err = orchestrator
            .initiate(&req, options(&[(SCOPE, "profile")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::Config(ConfigError::MissingOpenidScope)));
    }

    #[actix_web::test]
    async fn test_redirect_uri_cannot_be_overridden() {
        let orchestrator = TestFixtures::login_orchestrator();
        let req = TestRequest::default().to_http_request();

        let response = orchestrator
            .initiate(&req, options(&[("redirect_uri", "https://evil.example/cb")]))
            .await
            .unwrap();
        assert_eq!(
            location_params(&response)["redirect_uri"],
            orchestrator.redirect_uri()
        );
    }

    #[actix_web::test]
    async fn test_custom_state_hook() {
        let orchestrator = TestFixtures::login_orchestrator()
            .with_state_hook(Arc::new(FixedStateHook(json!({"tenant": "acme"}))));
        let req = TestRequest::default().to_http_request();

        let response = orchestrator.initiate(&req, LoginOptions::default()).await.unwrap();
        let state = decode_state(&location_params(&response)["state"]);
        assert_eq!(state["tenant"], "acme");
        assert_eq!(state["returnTo"], "https://rp.example.com");

        let orchestrator = TestFixtures::login_orchestrator()
            .with_state_hook(Arc::new(FixedStateHook(json!("not-an-object"))));
        let err = orchestrator
            .initiate(&req, LoginOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::Config(ConfigError::InvalidLoginState)));
    }

    #[actix_web::test]
    async fn test_state_hook_sees_request() {
        struct PathHook;

        #[async_trait(?Send)]
        impl LoginStateHook for PathHook {
            async fn login_state(&self, req: &HttpRequest, _return_to: &str) -> Value {
                json!({ "from": req.path() })
            }
        }

        let orchestrator = TestFixtures::login_orchestrator().with_state_hook(Arc::new(PathHook));
        let req = TestRequest::get().uri("/members/login").to_http_request();
        let response = orchestrator.initiate(&req, LoginOptions::default()).await.unwrap();
        let state = decode_state(&location_params(&response)["state"]);
        assert_eq!(state["from"], "/members/login");
    }

    #[actix_web::test]
    async fn test_client_failure_is_transport_error() {
        let orchestrator = LoginOrchestrator::new(
            TestFixtures::login_config(),
            TestFixtures::transient_store(),
            Arc::new(FailingClient),
        )
        .unwrap();
        let req = TestRequest::default().to_http_request();

        let err = orchestrator
            .initiate(&req, LoginOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::Transport(_)));
    }

    #[actix_web::test]
    async fn test_body_escapes_url() {
        let orchestrator = TestFixtures::login_orchestrator();
        let req = TestRequest::default().to_http_request();

        let response = orchestrator.initiate(&req, LoginOptions::default()).await.unwrap();
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(body, format!("Found. Redirecting to {}", location.replace('&', "&amp;")));
    }

    #[test]
    fn test_redirect_uri_resolution() {
        assert_eq!(
            resolve_redirect_uri("https://rp.example.com", "/callback").unwrap(),
            "https://rp.example.com/callback"
        );
        assert_eq!(
            resolve_redirect_uri("https://rp.example.com/app/", "callback").unwrap(),
            "https://rp.example.com/app/callback"
        );
        assert!(resolve_redirect_uri("not a url", "/callback").is_err());
    }

    #[actix_web::test]
    async fn test_login_handler() {
        let app = actix_web::test::init_service(
            actix_web::App::new()
                .app_data(web::Data::new(TestFixtures::login_orchestrator()))
                .route("/login", web::get().to(login)),
        )
        .await;

        let req = TestRequest::get()
            .uri("/login?returnTo=%2Fdashboard")
            .to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);

        let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        let url = Url::parse(location).unwrap();
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(decode_state(&query["state"])["returnTo"], "/dashboard");
    }
}
