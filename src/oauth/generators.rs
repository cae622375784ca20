//! Random values for the authorization request (RFC 7636 S256 for PKCE)

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

use crate::utils::crypto::generate_token;

/// Random bytes behind every nonce and code verifier
const RANDOM_BYTES: usize = 32;

/// Fresh nonce for `nonce` and `state` values
#[must_use]
pub fn nonce() -> String {
    generate_token(RANDOM_BYTES)
}

/// Fresh PKCE code verifier (43 characters of base64url)
#[must_use]
pub fn code_verifier() -> String {
    generate_token(RANDOM_BYTES)
}

/// S256 code challenge: base64url(SHA-256(verifier))
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
