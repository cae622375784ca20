#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the rp-session crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod errors;
pub mod handlers;
pub mod oauth;
pub mod session;
pub mod settings;
pub mod transient;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use errors::{ConfigError, LoginError, SessionError};
pub use handlers::{health, login, session_info, LoginOptions, LoginOrchestrator};
pub use oauth::{AuthorizationParams, OidcClient};
pub use session::{ExpiryPolicy, SessionCookieConfig, SessionCookieStore, StoredSession};
pub use settings::RpSettings;
pub use transient::{TransientCookieStore, TransientOptions};
