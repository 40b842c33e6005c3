//! Chunked RSA-OAEP (SHA-512) encryption of request bodies.
//!
//! A single OAEP block holds at most `key_bytes - 2 * hash_bytes - 2` bytes
//! of plaintext, so payloads are split into windows of that size and the
//! ciphertext blocks (each exactly `key_bytes` long) are concatenated.
//! Decryption walks the ciphertext in `key_bytes` strides.

use std::fmt;
use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha512};

use crate::error::CryptoError;

/// Public-key side: encrypts outgoing payloads.
#[derive(Debug, Clone)]
pub enum Encrypter {
    NoOp,
    Rsa(RsaPublicKey),
}

/// Private-key side: decrypts incoming payloads.
#[derive(Clone)]
pub enum Decrypter {
    NoOp,
    Rsa(RsaPrivateKey),
}

impl Encrypter {
    /// Load a PEM public key; an empty path selects `NoOp`.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        match read_key_file(path.as_ref())? {
            Some(pem) => Self::from_pem(&pem),
            None => Ok(Encrypter::NoOp),
        }
    }

    /// Parse an SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| CryptoError::KeyParse(e.to_string()))?;
        Ok(Encrypter::Rsa(key))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let Encrypter::Rsa(key) = self else {
            return Ok(plaintext.to_vec());
        };

        let step = plaintext_block_len(key.size())?;
        let mut rng = rand::thread_rng();
        let mut ciphertext = Vec::with_capacity(plaintext.len().div_ceil(step) * key.size());
        for block in plaintext.chunks(step) {
            let encrypted = key.encrypt(&mut rng, Oaep::new::<Sha512>(), block)?;
            ciphertext.extend_from_slice(&encrypted);
        }
        Ok(ciphertext)
    }
}

impl Decrypter {
    /// Load a PEM private key; an empty path selects `NoOp`.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        match read_key_file(path.as_ref())? {
            Some(pem) => Self::from_pem(&pem),
            None => Ok(Decrypter::NoOp),
        }
    }

    /// Parse a PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| CryptoError::KeyParse(e.to_string()))?;
        Ok(Decrypter::Rsa(key))
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let Decrypter::Rsa(key) = self else {
            return Ok(ciphertext.to_vec());
        };

        let stride = key.size();
        let mut plaintext = Vec::with_capacity(ciphertext.len());
        for block in ciphertext.chunks(stride) {
            let decrypted = key.decrypt(Oaep::new::<Sha512>(), block)?;
            plaintext.extend_from_slice(&decrypted);
        }
        Ok(plaintext)
    }
}

impl fmt::Debug for Decrypter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decrypter::NoOp => f.write_str("Decrypter::NoOp"),
            Decrypter::Rsa(key) => write!(f, "Decrypter::Rsa({} bits)", key.size() * 8),
        }
    }
}

fn plaintext_block_len(key_bytes: usize) -> Result<usize, CryptoError> {
    let hash_bytes = <Sha512 as Digest>::output_size();
    key_bytes
        .checked_sub(2 * hash_bytes + 2)
        .filter(|step| *step > 0)
        .ok_or_else(|| {
            CryptoError::KeyParse(format!(
                "{}-bit key is too small for OAEP with SHA-512",
                key_bytes * 8
            ))
        })
}

fn read_key_file(path: &Path) -> Result<Option<String>, CryptoError> {
    if path.as_os_str().is_empty() {
        return Ok(None);
    }
    std::fs::read_to_string(path)
        .map(Some)
        .map_err(|source| CryptoError::KeyFile {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_PEM: &str = include_str!("../testdata/private.pem");
    const PUBLIC_PEM: &str = include_str!("../testdata/public.pem");

    fn pair() -> (Encrypter, Decrypter) {
        (
            Encrypter::from_pem(PUBLIC_PEM).unwrap(),
            Decrypter::from_pem(PRIVATE_PEM).unwrap(),
        )
    }

    #[test]
    fn block_len_for_2048_bit_key() {
        assert_eq!(plaintext_block_len(256).unwrap(), 126);
        assert!(plaintext_block_len(128).is_err());
    }

    #[test]
    fn noop_is_identity() {
        let data = b"[{\"id\":\"a\"}]";
        assert_eq!(Encrypter::NoOp.encrypt(data).unwrap(), data);
        assert_eq!(Decrypter::NoOp.decrypt(data).unwrap(), data);
    }

    #[test]
    fn empty_path_selects_noop() {
        assert!(matches!(Encrypter::from_pem_file("").unwrap(), Encrypter::NoOp));
        assert!(matches!(Decrypter::from_pem_file("").unwrap(), Decrypter::NoOp));
    }

    #[test]
    fn missing_key_file_is_error() {
        let err = Encrypter::from_pem_file("/nonexistent/key.pem").unwrap_err();
        assert!(matches!(err, CryptoError::KeyFile { .. }));
    }

    #[test]
    fn garbage_pem_is_error() {
        assert!(matches!(
            Decrypter::from_pem("not a key"),
            Err(CryptoError::KeyParse(_))
        ));
    }

    #[test]
    fn keys_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public.pem");
        let private = dir.path().join("private.pem");
        std::fs::write(&public, PUBLIC_PEM).unwrap();
        std::fs::write(&private, PRIVATE_PEM).unwrap();

        let enc = Encrypter::from_pem_file(&public).unwrap();
        let dec = Decrypter::from_pem_file(&private).unwrap();
        let ciphertext = enc.encrypt(b"hello").unwrap();
        assert_eq!(dec.decrypt(&ciphertext).unwrap(), b"hello");
    }

    #[test]
    fn round_trip_across_block_boundaries() {
        let (enc, dec) = pair();
        for len in [0usize, 1, 125, 126, 127, 252, 1000, 4096] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let ciphertext = enc.encrypt(&plaintext).unwrap();
            assert_eq!(ciphertext.len(), len.div_ceil(126) * 256, "len {len}");
            assert_eq!(dec.decrypt(&ciphertext).unwrap(), plaintext, "len {len}");
        }
    }

    #[test]
    fn truncated_ciphertext_fails_whole_operation() {
        let (enc, dec) = pair();
        let mut ciphertext = enc.encrypt(&[7u8; 300]).unwrap();
        ciphertext.truncate(ciphertext.len() - 10);
        assert!(dec.decrypt(&ciphertext).is_err());
    }
}
