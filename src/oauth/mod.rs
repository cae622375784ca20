//! OpenID Connect login plumbing
//!
//! Authorization parameters, the client that turns them into an
//! authorization URL, random value generators and the login state carried
//! through the redirect.

pub mod client;
pub mod generators;
pub mod params;
pub mod state;

pub use client::{DiscoveryClient, OidcClient, OidcError, StaticClient};
pub use params::AuthorizationParams;
pub use state::{decode_state, encode_state, DefaultLoginState, LoginStateHook};
