use actix_web::cookie::SameSite;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::ConfigError;
use crate::handlers::login::{LoginConfig, LoginOptions, LoginOrchestrator};
use crate::oauth::{DiscoveryClient, OidcClient, StaticClient};
use crate::session::{
    ExpiryPolicy, SessionCookieConfig, SessionCookieStore, COOKIE_NAME, MAX_COOKIE_SIZE,
};
use crate::transient::{TransientCookieConfig, TransientCookieStore};

const SETTINGS_FILE: &str = "Settings.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpSettings {
    /// Write `_<key>` shadow cookies for browsers that drop `SameSite=None`
    pub legacy_same_site_cookie: bool,
    pub application: ApplicationSettings,
    pub session: SessionSettings,
    pub oidc: OidcSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Public URL of this application, used for `redirect_uri` and the
    /// default `returnTo`
    pub base_url: String,
}

/// One secret or a list, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretSetting {
    Single(String),
    List(Vec<String>),
}

/// Absolute session lifetime in seconds, or `"disabled"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AbsoluteDuration {
    Seconds(i64),
    Keyword(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub secret: SecretSetting,
    pub name: String,
    pub rolling: bool,
    pub rolling_duration: i64,
    pub absolute_duration: AbsoluteDuration,
    pub cookie: CookieSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub domain: Option<String>,
    pub path: String,
    pub secure: Option<bool>,
    pub same_site: String,
    pub http_only: bool,
    /// Browser-session cookie without `Expires`
    pub transient: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcSettings {
    pub issuer_base_url: Option<String>,
    /// Skips discovery when set
    pub authorization_endpoint: Option<String>,
    pub client_id: Option<String>,
    pub routes: RouteSettings,
    pub authorization_params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    pub login: String,
    pub callback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for RpSettings {
    fn default() -> Self {
        Self {
            legacy_same_site_cookie: true,
            application: ApplicationSettings::default(),
            session: SessionSettings::default(),
            oidc: OidcSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for SecretSetting {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl From<Vec<String>> for SecretSetting {
    fn from(secrets: Vec<String>) -> Self {
        Self::List(secrets)
    }
}

impl SecretSetting {
    #[must_use]
    pub fn secrets(&self) -> Vec<String> {
        match self {
            Self::Single(secret) => vec![secret.clone()],
            Self::List(secrets) => secrets.clone(),
        }
    }
}

impl Default for AbsoluteDuration {
    fn default() -> Self {
        Self::Seconds(7 * 24 * 60 * 60)
    }
}

impl AbsoluteDuration {
    /// Seconds, or `None` when disabled
    ///
    /// # Errors
    ///
    /// Returns an error for any keyword other than `disabled`.
    pub fn seconds(&self) -> Result<Option<i64>, ConfigError> {
        match self {
            Self::Seconds(seconds) => Ok(Some(*seconds)),
            Self::Keyword(keyword) if keyword.eq_ignore_ascii_case("disabled") => Ok(None),
            Self::Keyword(keyword) => Err(ConfigError::InvalidSetting {
                name: "session.absolute_duration",
                value: keyword.clone(),
            }),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secret: SecretSetting::default(),
            name: COOKIE_NAME.to_string(),
            rolling: true,
            rolling_duration: 24 * 60 * 60,
            absolute_duration: AbsoluteDuration::default(),
            cookie: CookieSettings::default(),
        }
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            domain: None,
            path: "/".to_string(),
            secure: None,
            same_site: "Lax".to_string(),
            http_only: true,
            transient: false,
        }
    }
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            callback: "/callback".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn parse_same_site(value: &str) -> Result<SameSite, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "lax" => Ok(SameSite::Lax),
        "strict" => Ok(SameSite::Strict),
        "none" => Ok(SameSite::None),
        _ => Err(ConfigError::InvalidSetting {
            name: "session.cookie.same_site",
            value: value.to_string(),
        }),
    }
}

impl RpSettings {
    /// Load settings from configuration files and environment variables,
    /// then initialise logging
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A settings file cannot be read or parsed
    /// - The logger is already initialised
    /// - The resulting configuration is invalid
    pub fn load() -> anyhow::Result<Self> {
        Self::load_env_file();

        let settings_dir = std::env::var("RP_SETTINGS_DIR").ok().map(PathBuf::from);
        let (mut settings, sources) =
            Self::load_base_settings(Path::new("."), settings_dir.as_deref())?;
        Self::apply_env_overrides(&mut settings);

        env_logger::Builder::new()
            .parse_filters(&settings.logging.level)
            .try_init()
            .context("failed to initialise logger")?;

        for source in &sources {
            log::info!("Loaded settings from {}", source.display());
        }
        if let Some(dir) = settings_dir.filter(|dir| !dir.join(SETTINGS_FILE).exists()) {
            log::info!("RP_SETTINGS_DIR set but no {SETTINGS_FILE} found in {}", dir.display());
        }

        settings.validate().context("invalid configuration")?;
        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    ///
    /// Priority (highest first): `settings_dir/Settings.toml`,
    /// `root/Settings.toml`, defaults. Environment overrides are applied
    /// separately. Returns the files that were read.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed.
    pub fn load_base_settings(
        root: &Path,
        settings_dir: Option<&Path>,
    ) -> anyhow::Result<(Self, Vec<PathBuf>)> {
        let mut settings = Self::default();
        let mut sources = Vec::new();

        let candidates = std::iter::once(root.join(SETTINGS_FILE))
            .chain(settings_dir.map(|dir| dir.join(SETTINGS_FILE)));
        for path in candidates {
            if path.exists() {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                settings = basic_toml::from_str(&content)
                    .with_context(|| format!("failed to parse {}", path.display()))?;
                sources.push(path);
            }
        }

        Ok((settings, sources))
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_oidc_env_overrides(&mut settings.oidc);

        Self::apply_parsed_env_override(
            "LEGACY_SAME_SITE_COOKIE",
            &mut settings.legacy_same_site_cookie,
        );
        if let Ok(level) = std::env::var("RUST_LOG") {
            settings.logging.level = level;
        }
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        Self::apply_parsed_env_override("PORT", &mut app_settings.port);
        if let Ok(base_url) = std::env::var("BASE_URL") {
            app_settings.base_url = base_url;
        }
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        if let Ok(secret) = std::env::var("SESSION_SECRET") {
            let secrets: Vec<String> = secret
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();
            if !secrets.is_empty() {
                session_settings.secret = SecretSetting::List(secrets);
            }
        }
        if let Ok(name) = std::env::var("SESSION_NAME") {
            session_settings.name = name;
        }
        Self::apply_parsed_env_override("SESSION_ROLLING", &mut session_settings.rolling);
        Self::apply_parsed_env_override(
            "SESSION_ROLLING_DURATION",
            &mut session_settings.rolling_duration,
        );
        if let Ok(value) = std::env::var("SESSION_ABSOLUTE_DURATION") {
            session_settings.absolute_duration = value
                .parse()
                .map_or(AbsoluteDuration::Keyword(value), AbsoluteDuration::Seconds);
        }
        if let Ok(secure) = std::env::var("COOKIE_SECURE") {
            if let Ok(secure) = secure.parse::<bool>() {
                session_settings.cookie.secure = Some(secure);
            }
        }
    }

    fn apply_oidc_env_overrides(oidc_settings: &mut OidcSettings) {
        if let Ok(issuer) = std::env::var("ISSUER_BASE_URL") {
            oidc_settings.issuer_base_url = Some(issuer);
        }
        if let Ok(client_id) = std::env::var("CLIENT_ID") {
            oidc_settings.client_id = Some(client_id);
        }
    }

    /// Helper function to apply parsed environment variable overrides
    fn apply_parsed_env_override<T: std::str::FromStr>(env_var: &str, target: &mut T) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<T>() {
                *target = value;
            }
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Build every component once so misconfiguration fails at startup
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session_store()?;
        self.login_orchestrator()?;
        Ok(())
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// # Errors
    ///
    /// Returns an error if the SameSite value is unknown.
    pub fn session_cookie_config(&self) -> Result<SessionCookieConfig, ConfigError> {
        let cookie = &self.session.cookie;
        Ok(SessionCookieConfig {
            name: self.session.name.clone(),
            domain: cookie.domain.clone(),
            path: Some(cookie.path.clone()),
            same_site: Some(parse_same_site(&cookie.same_site)?),
            secure: cookie.secure,
            http_only: cookie.http_only,
            transient: cookie.transient,
            max_cookie_size: MAX_COOKIE_SIZE,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the absolute duration is neither seconds nor
    /// `disabled`.
    pub fn expiry_policy(&self) -> Result<ExpiryPolicy, ConfigError> {
        Ok(ExpiryPolicy {
            rolling: self.session.rolling,
            rolling_duration: self.session.rolling_duration,
            absolute_duration: self.session.absolute_duration.seconds()?,
        })
    }

    /// # Errors
    ///
    /// Returns an error if secrets, cookie attributes or expiry policy are
    /// invalid.
    pub fn session_store(&self) -> Result<SessionCookieStore, ConfigError> {
        SessionCookieStore::new(
            &self.session.secret.secrets(),
            self.session_cookie_config()?,
            self.expiry_policy()?,
        )
    }

    /// # Errors
    ///
    /// Returns an error if the secrets are invalid.
    pub fn transient_store(&self) -> Result<TransientCookieStore, ConfigError> {
        TransientCookieStore::new(
            &self.session.secret.secrets(),
            TransientCookieConfig {
                domain: self.session.cookie.domain.clone(),
                path: Some(self.session.cookie.path.clone()),
                secure: self.session.cookie.secure,
                legacy_same_site_cookie: self.legacy_same_site_cookie,
            },
        )
    }

    /// Static client when an authorization endpoint is configured,
    /// discovery against the issuer otherwise
    ///
    /// # Errors
    ///
    /// Returns an error if the client id or both endpoint sources are missing.
    pub fn oidc_client(&self) -> Result<Arc<dyn OidcClient>, ConfigError> {
        let client_id = self
            .oidc
            .client_id
            .clone()
            .ok_or(ConfigError::MissingSetting("oidc.client_id"))?;

        if let Some(endpoint) = &self.oidc.authorization_endpoint {
            return Ok(Arc::new(StaticClient::new(endpoint.clone(), client_id)));
        }
        let issuer = self
            .oidc
            .issuer_base_url
            .clone()
            .ok_or(ConfigError::MissingSetting("oidc.issuer_base_url"))?;
        Ok(Arc::new(DiscoveryClient::new(issuer, client_id)))
    }

    #[must_use]
    pub fn login_config(&self) -> LoginConfig {
        LoginConfig {
            base_url: self.application.base_url.clone(),
            callback_path: self.oidc.routes.callback.clone(),
            authorization_params: self.oidc.authorization_params.iter().collect(),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the transient store, OIDC client or configured
    /// authorization parameters are invalid.
    pub fn login_orchestrator(&self) -> Result<LoginOrchestrator, ConfigError> {
        let orchestrator = LoginOrchestrator::new(
            self.login_config(),
            self.transient_store()?,
            self.oidc_client()?,
        )?;
        // Configured parameters must be usable without per-call overrides
        orchestrator.authorization_params(&LoginOptions::default())?;
        Ok(orchestrator)
    }
}
