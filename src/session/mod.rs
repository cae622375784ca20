//! Session Management Module
//!
//! Stateless sessions kept entirely in encrypted cookies.
//!
//! # Modules
//!
//! - [`manager`] - Session cookie store: read, save and clear
//! - [`codec`] - Envelope encryption with integrity-protected timestamps
//! - [`policy`] - Rolling and absolute expiry rules
//! - [`cookie`] - Cookie naming, chunk sizing and reassembly

pub mod codec;
pub mod cookie;
pub mod manager;
pub mod policy;

// Re-export commonly used items for convenience
pub use codec::{DecryptError, EnvelopeHeader, SessionCodec};
pub use cookie::{SessionCookieConfig, COOKIE_NAME, MAX_COOKIE_SIZE};
pub use manager::{SessionCookieStore, StoredSession};
pub use policy::ExpiryPolicy;
