//! Reversible sealing of audio links with a shared key.
//!
//! The sealed form is `base64url(nonce || ciphertext)` where the ciphertext
//! is XChaCha20-Poly1305 under `SHA-256(key)`. The same link sealed twice
//! gives different strings, and a client holding the key can open it again.
//! Anything sealed under another key, or altered in transit, fails to open.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{ApiError, ApiResult};

const NONCE_LEN: usize = 24;

#[derive(Clone)]
pub struct LinkCipher {
    aead: XChaCha20Poly1305,
}

impl LinkCipher {
    pub fn new(key: &str) -> Self {
        let key = Sha256::digest(key.as_bytes());
        Self {
            aead: XChaCha20Poly1305::new(Key::from_slice(key.as_slice())),
        }
    }

    pub fn seal(&self, link: &str) -> ApiResult<String> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.seal_with_nonce(link, nonce)
    }

    fn seal_with_nonce(&self, link: &str, nonce: [u8; NONCE_LEN]) -> ApiResult<String> {
        let ciphertext = self
            .aead
            .encrypt(XNonce::from_slice(&nonce), link.as_bytes())
            .map_err(|e| ApiError::Internal(format!("Failed to seal link: {}", e)))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Reverse [`LinkCipher::seal`]; `None` unless sealed with this key and unmodified
    pub fn open(&self, sealed: &str) -> Option<String> {
        let data = URL_SAFE_NO_PAD.decode(sealed).ok()?;
        if data.len() < NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .aead
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}
