//! Session envelope encryption
//!
//! Sessions are sealed as a compact JWE using direct key agreement and
//! AES-256-GCM (`alg: dir`, `enc: A256GCM`). The protected header carries the
//! `iat`/`uat`/`exp` timestamps and is bound to the ciphertext as associated
//! data, so the timestamps cannot be altered without failing decryption.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::SessionError;
use crate::utils::crypto::{self, KeyRing};

const ALG: &str = "dir";
const ENC: &str = "A256GCM";
const TAG_SIZE: usize = 16;

/// Timestamps carried in the protected header, in Unix epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Issued at: set when the session is created, kept across renewals
    pub iat: i64,
    /// Updated at: refreshed on every save
    pub uat: i64,
    /// Expiry computed from the policy in force at save time
    pub exp: i64,
}

#[derive(Serialize, Deserialize)]
struct ProtectedHeader {
    alg: String,
    enc: String,
    #[serde(flatten)]
    times: EnvelopeHeader,
}

/// Envelope is malformed, uses another algorithm, or no key opens it
#[derive(Debug, Error, PartialEq, Eq)]
#[error("session envelope could not be decrypted")]
pub struct DecryptError;

/// Encrypts and decrypts session envelopes with a [`KeyRing`]
#[derive(Debug, Clone)]
pub struct SessionCodec {
    keys: KeyRing,
}

impl SessionCodec {
    #[must_use]
    pub fn new(keys: KeyRing) -> Self {
        Self { keys }
    }

    /// Seal `plaintext` under the current key
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be serialized or the cipher
    /// rejects the input.
    pub fn encrypt(&self, plaintext: &[u8], times: EnvelopeHeader) -> Result<String, SessionError> {
        let header = serde_json::to_vec(&ProtectedHeader {
            alg: ALG.to_string(),
            enc: ENC.to_string(),
            times,
        })?;
        let header = URL_SAFE_NO_PAD.encode(header);

        let iv = crypto::generate_iv();
        let mut sealed = crypto::seal(self.keys.current(), &iv, plaintext, header.as_bytes())
            .ok_or(SessionError::Encrypt)?;
        let tag = sealed.split_off(sealed.len() - TAG_SIZE);

        Ok(format!(
            "{header}..{}.{}.{}",
            URL_SAFE_NO_PAD.encode(iv),
            URL_SAFE_NO_PAD.encode(sealed),
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }

    /// Open an envelope with any key in the ring
    ///
    /// # Errors
    ///
    /// Returns [`DecryptError`] for any structural or authentication failure.
    pub fn decrypt(&self, envelope: &str) -> Result<(EnvelopeHeader, Vec<u8>), DecryptError> {
        let parts: Vec<&str> = envelope.split('.').collect();
        let [header_b64, encrypted_key, iv, ciphertext, tag] = parts.as_slice() else {
            return Err(DecryptError);
        };
        if !encrypted_key.is_empty() {
            return Err(DecryptError);
        }

        let header: ProtectedHeader = URL_SAFE_NO_PAD
            .decode(header_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(DecryptError)?;
        if header.alg != ALG || header.enc != ENC {
            return Err(DecryptError);
        }

        let decode = |part: &str| URL_SAFE_NO_PAD.decode(part).map_err(|_| DecryptError);
        let iv = decode(*iv)?;
        let mut sealed = decode(*ciphertext)?;
        let tag = decode(*tag)?;
        if tag.len() != TAG_SIZE {
            return Err(DecryptError);
        }
        sealed.extend_from_slice(&tag);

        let plaintext =
            crypto::open(&self.keys, &iv, &sealed, header_b64.as_bytes()).ok_or(DecryptError)?;
        Ok((header.times, plaintext))
    }
}
