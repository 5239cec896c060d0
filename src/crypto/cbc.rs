//! AES-CBC block cipher mode with PKCS#7 padding.
//!
//! No authentication — a tampered ciphertext decrypts to garbage (or fails
//! padding validation) rather than being rejected outright. This is a
//! preserved weakness from the source system (spec.md §4.1/§9); callers
//! that need integrity should select [`super::CipherKind::Gcm`] instead.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::aead::{OsRng, rand_core::RngCore};

use super::{Cipher, CryptoError, pkcs7_pad, pkcs7_unpad};

const BLOCK_SIZE: usize = 16;
const IV_LEN: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

enum KeySize {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

pub struct CbcCipher {
    key: KeySize,
}

impl CbcCipher {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let key = match key.len() {
            16 => KeySize::Aes128(key.try_into().unwrap()),
            24 => KeySize::Aes192(key.try_into().unwrap()),
            32 => KeySize::Aes256(key.try_into().unwrap()),
            other => return Err(CryptoError::BadKeyLength(other)),
        };
        Ok(Self { key })
    }
}

impl Cipher for CbcCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut buf = pkcs7_pad(plaintext, BLOCK_SIZE);
        let buf_len = buf.len();

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        match &self.key {
            KeySize::Aes128(k) => Aes128CbcEnc::new(k.into(), &iv.into())
                .encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buf, buf_len)
                .map_err(|e| CryptoError::Encrypt(e.to_string()))?,
            KeySize::Aes192(k) => Aes192CbcEnc::new(k.into(), &iv.into())
                .encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buf, buf_len)
                .map_err(|e| CryptoError::Encrypt(e.to_string()))?,
            KeySize::Aes256(k) => Aes256CbcEnc::new(k.into(), &iv.into())
                .encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buf, buf_len)
                .map_err(|e| CryptoError::Encrypt(e.to_string()))?,
        };

        let mut out = Vec::with_capacity(IV_LEN + buf.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&buf);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < IV_LEN {
            return Err(CryptoError::TooShort);
        }

        let iv = &ciphertext[..IV_LEN];
        let mut body = ciphertext[IV_LEN..].to_vec();
        if body.is_empty() || body.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidSize);
        }

        let plain = match &self.key {
            KeySize::Aes128(k) => Aes128CbcDec::new(k.into(), iv.into())
                .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut body)
                .map_err(|e| CryptoError::Decrypt(e.to_string()))?,
            KeySize::Aes192(k) => Aes192CbcDec::new(k.into(), iv.into())
                .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut body)
                .map_err(|e| CryptoError::Decrypt(e.to_string()))?,
            KeySize::Aes256(k) => Aes256CbcDec::new(k.into(), iv.into())
                .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut body)
                .map_err(|e| CryptoError::Decrypt(e.to_string()))?,
        };

        Ok(pkcs7_unpad(plain, BLOCK_SIZE)?.to_vec())
    }
}
