//! AES-GCM AEAD cipher.
//!
//! Key length is implied by the decoded passphrase: 16/24/32 bytes select
//! AES-128/192/256-GCM. Each call to [`GcmCipher::encrypt`] draws a fresh
//! random 12-byte nonce, prepends it to the ciphertext, and the AEAD tag is
//! appended automatically by the underlying cipher. Grounded on the teacher
//! crate's `crypto::aes256::Aes256Block`, generalized from a fixed 256-bit
//! key to all three AES key sizes the spec allows.

use aes_gcm::aead::{Aead, KeyInit, OsRng, rand_core::RngCore};
use aes_gcm::{Aes128Gcm, Aes192Gcm, Aes256Gcm, Nonce};

use super::{Cipher, CryptoError};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

enum Inner {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

pub struct GcmCipher {
    inner: Inner,
}

impl GcmCipher {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let inner = match key.len() {
            16 => Inner::Aes128(Aes128Gcm::new_from_slice(key).map_err(|e| CryptoError::Encrypt(e.to_string()))?),
            24 => Inner::Aes192(Aes192Gcm::new_from_slice(key).map_err(|e| CryptoError::Encrypt(e.to_string()))?),
            32 => Inner::Aes256(Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::Encrypt(e.to_string()))?),
            other => return Err(CryptoError::BadKeyLength(other)),
        };
        Ok(Self { inner })
    }

    fn generate_nonce() -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }
}

impl Cipher for GcmCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce_bytes = Self::generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = match &self.inner {
            Inner::Aes128(c) => c.encrypt(nonce, plaintext),
            Inner::Aes192(c) => c.encrypt(nonce, plaintext),
            Inner::Aes256(c) => c.encrypt(nonce, plaintext),
        }
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::TooShort);
        }

        let nonce = Nonce::from_slice(&ciphertext[..NONCE_LEN]);
        let body = &ciphertext[NONCE_LEN..];

        match &self.inner {
            Inner::Aes128(c) => c.decrypt(nonce, body),
            Inner::Aes192(c) => c.decrypt(nonce, body),
            Inner::Aes256(c) => c.decrypt(nonce, body),
        }
        .map_err(|e| CryptoError::Decrypt(e.to_string()))
    }
}
