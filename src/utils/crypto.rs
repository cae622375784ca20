// Key material and cryptographic primitives shared by the cookie stores

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::errors::ConfigError;

/// Nonce size for AES-256-GCM encryption (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Encryption key size for AES-256 (256 bits)
pub const ENCRYPTION_KEY_SIZE: usize = 32;

/// Shortest secret accepted when building a key ring
pub const MIN_SECRET_LENGTH: usize = 8;

type HmacSha256 = Hmac<Sha256>;

/// A derived 256-bit symmetric key
pub type DerivedKey = [u8; ENCRYPTION_KEY_SIZE];

/// What a derived key is used for
///
/// Each purpose has its own HKDF info string, so one configured secret
/// yields unrelated encryption and signing keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPurpose {
    /// AES-256-GCM session envelope encryption
    Encryption,
    /// HMAC-SHA256 transient cookie signing
    Signing,
}

impl KeyPurpose {
    const fn info(self) -> &'static [u8] {
        match self {
            Self::Encryption => b"JWE CEK",
            Self::Signing => b"JWS Cookie Signing",
        }
    }
}

/// Derive a 32-byte key from a configured secret using HKDF-SHA256
#[must_use]
pub fn derive_key(secret: &str, purpose: KeyPurpose) -> DerivedKey {
    let hk = Hkdf::<Sha256>::new(None, secret.as_bytes());
    let mut key = [0u8; ENCRYPTION_KEY_SIZE];
    hk.expand(purpose.info(), &mut key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    key
}

/// Ordered set of keys derived from the configured secrets
///
/// The first key is used for every new encryption or signature. All keys
/// are tried when decrypting or verifying, which lets a secret be rotated
/// without invalidating cookies issued under the previous one.
#[derive(Clone)]
pub struct KeyRing {
    keys: Vec<DerivedKey>,
}

impl KeyRing {
    /// Build a key ring from one or more secrets
    ///
    /// # Errors
    ///
    /// Returns an error if no secret is given or any secret is shorter than
    /// [`MIN_SECRET_LENGTH`] characters.
    pub fn new<S: AsRef<str>>(secrets: &[S], purpose: KeyPurpose) -> Result<Self, ConfigError> {
        if secrets.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        let keys = secrets
            .iter()
            .enumerate()
            .map(|(index, secret)| {
                let secret = secret.as_ref();
                if secret.chars().count() < MIN_SECRET_LENGTH {
                    return Err(ConfigError::SecretTooShort {
                        index,
                        min: MIN_SECRET_LENGTH,
                    });
                }
                Ok(derive_key(secret, purpose))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { keys })
    }

    /// Key used for new encryptions and signatures
    #[must_use]
    pub fn current(&self) -> &DerivedKey {
        &self.keys[0]
    }

    /// Every key, current first
    pub fn keys(&self) -> impl Iterator<Item = &DerivedKey> {
        self.keys.iter()
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("keys", &format_args!("[{} redacted]", self.keys.len()))
            .finish()
    }
}

/// Generate a cryptographically secure random token of `length` bytes
///
/// The token is base64url-encoded without padding.
#[must_use]
pub fn generate_token(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a fresh AES-GCM initialization vector
#[must_use]
pub fn generate_iv() -> [u8; NONCE_SIZE] {
    let mut iv = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext` with AES-256-GCM, authenticating `aad` alongside it
///
/// Returns the ciphertext with the 16-byte tag appended, or `None` if the
/// cipher rejects the input.
#[must_use]
pub fn seal(
    key: &DerivedKey,
    iv: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Option<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(iv), Payload { msg: plaintext, aad })
        .ok()
}

/// Decrypt a sealed buffer, trying every key in the ring
///
/// Returns `None` when no key authenticates the ciphertext.
#[must_use]
pub fn open(ring: &KeyRing, iv: &[u8], sealed: &[u8], aad: &[u8]) -> Option<Vec<u8>> {
    if iv.len() != NONCE_SIZE {
        return None;
    }
    let nonce = Nonce::from_slice(iv);
    ring.keys().find_map(|key| {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
            .decrypt(nonce, Payload { msg: sealed, aad })
            .ok()
    })
}

fn mac(key: &DerivedKey) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length")
}

/// Sign a message with HMAC-SHA256, returning a base64url signature
#[must_use]
pub fn sign(message: &[u8], key: &DerivedKey) -> String {
    let mut mac = mac(key);
    mac.update(message);
    general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Verify a base64url HMAC-SHA256 signature against every key in the ring
#[must_use]
pub fn verify(message: &[u8], signature: &str, ring: &KeyRing) -> bool {
    let Ok(signature) = general_purpose::URL_SAFE_NO_PAD.decode(signature) else {
        return false;
    };
    ring.keys().any(|key| {
        let mut mac = mac(key);
        mac.update(message);
        mac.verify_slice(&signature).is_ok()
    })
}
