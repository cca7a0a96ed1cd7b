//! Symmetric envelope for cookie payloads.
//!
//! A token is base64(iv || ciphertext): AES-256-CBC with PKCS#7 padding and a
//! fresh random 16-byte IV per call. The backend holds the same key and
//! reverses the envelope.

use aes::Aes256;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{RelayError, Result};

const KEY_LENGTH: usize = 32;
const IV_LENGTH: usize = 16;
const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Derive a 32-byte key from a UTF-8 secret: the first 32 bytes, right-padded
/// with ASCII '0' when shorter.
///
/// Not a KDF. The backend derives the identical key from the same secret, so
/// the rule is part of the envelope contract.
pub fn derive_key(secret: &str) -> [u8; KEY_LENGTH] {
    let mut key = [b'0'; KEY_LENGTH];
    let bytes = secret.as_bytes();
    let len = bytes.len().min(KEY_LENGTH);
    key[..len].copy_from_slice(&bytes[..len]);
    key
}

/// Encrypt a payload into a transportable token.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<String> {
    let key = check_key(key)?;

    let mut iv = [0u8; IV_LENGTH];
    OsRng.fill_bytes(&mut iv);

    let plaintext_len = plaintext.len();
    let mut buffer = plaintext.to_vec();
    buffer.resize(plaintext_len + BLOCK_SIZE - plaintext_len % BLOCK_SIZE, 0);

    let encryptor = Aes256CbcEnc::new_from_slices(key, &iv)
        .map_err(|e| RelayError::Crypto(format!("Failed to create AES encryptor: {}", e)))?;
    let ciphertext = encryptor
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, plaintext_len)
        .map_err(|_| RelayError::Crypto("Failed to pad payload".to_string()))?;

    let mut combined = Vec::with_capacity(IV_LENGTH + ciphertext.len());
    combined.extend_from_slice(&iv);
    combined.extend_from_slice(ciphertext);
    Ok(BASE64.encode(combined))
}

/// Decrypt a token produced by [`encrypt`].
pub fn decrypt(token: &str, key: &[u8]) -> Result<Vec<u8>> {
    let key = check_key(key)?;

    let combined = BASE64
        .decode(token)
        .map_err(|e| RelayError::Crypto(format!("Malformed token: {}", e)))?;
    if combined.len() < IV_LENGTH + BLOCK_SIZE {
        return Err(RelayError::Crypto("Truncated token".to_string()));
    }
    let (iv, ciphertext) = combined.split_at(IV_LENGTH);

    let mut buffer = ciphertext.to_vec();
    let decryptor = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| RelayError::Crypto(format!("Failed to create AES decryptor: {}", e)))?;
    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| {
            RelayError::Crypto("Invalid padding: wrong key or corrupt token".to_string())
        })?;
    Ok(plaintext.to_vec())
}

fn check_key(key: &[u8]) -> Result<&[u8]> {
    if key.len() != KEY_LENGTH {
        return Err(RelayError::Crypto(format!(
            "Key must be exactly {} bytes, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_restores_plaintext() {
        let key = derive_key("test-secret");
        let token = encrypt(b"hello cookies", &key).expect("encrypt");
        let plaintext = decrypt(&token, &key).expect("decrypt");
        assert_eq!(plaintext, b"hello cookies");
    }

    #[test]
    fn roundtrip_handles_block_aligned_input() {
        let key = derive_key("test-secret");
        let input = [7u8; 32];
        let token = encrypt(&input, &key).expect("encrypt");
        assert_eq!(decrypt(&token, &key).expect("decrypt"), input);
    }

    #[test]
    fn fresh_iv_per_call() {
        let key = derive_key("test-secret");
        let first = encrypt(b"payload", &key).expect("encrypt");
        let second = encrypt(b"payload", &key).expect("encrypt");
        assert_ne!(first, second);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let token = encrypt(b"payload", &derive_key("right")).expect("encrypt");
        let err = decrypt(&token, &derive_key("wrong")).expect_err("wrong key");
        assert!(matches!(err, RelayError::Crypto(_)));
    }

    #[test]
    fn rejects_bad_key_lengths() {
        assert!(encrypt(b"payload", &[0u8; 16]).is_err());
        assert!(encrypt(b"payload", &[0u8; 33]).is_err());
        assert!(decrypt("AAAA", &[0u8; 16]).is_err());
    }

    #[test]
    fn rejects_malformed_tokens() {
        let key = derive_key("secret");
        assert!(decrypt("not base64 %%%", &key).is_err());
        assert!(decrypt("AAAA", &key).is_err());
    }

    #[test]
    fn derive_key_truncates_and_pads() {
        let long = "x".repeat(40);
        assert_eq!(derive_key(&long), [b'x'; 32]);

        let short = derive_key("abc");
        assert_eq!(&short[..3], b"abc");
        assert!(short[3..].iter().all(|b| *b == b'0'));
    }
}
