//! RSA Operations
//!
//! Key generation, PKCS#1 v1.5 signing and decryption, and the raw private-key
//! transform used when signing with a hand-built padding block.

use log::debug;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPrivateKey};
use sha1::Sha1;
use thiserror::Error;

/// RSA operation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RsaError {
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("message representative is not below the modulus")]
    MessageOutOfRange,
}

/// RSA Operations
pub struct RsaOperations;

impl RsaOperations {
    /// Generate a new RSA key pair with public exponent 65537
    pub fn generate_keypair(bits: usize) -> Result<RsaPrivateKey, RsaError> {
        debug!("Generating RSA-{} keypair", bits);
        RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| RsaError::KeyGenerationFailed(e.to_string()))
    }

    /// Modulus as big-endian bytes, left-padded to `size`
    pub fn modulus(key: &RsaPrivateKey, size: usize) -> Result<Vec<u8>, RsaError> {
        Self::left_pad(key.n().to_bytes_be(), size)
            .ok_or_else(|| RsaError::InvalidKey(format!("modulus exceeds {} bytes", size)))
    }

    /// Sign with the library's SHA-1 + PKCS#1 v1.5 signature primitive
    ///
    /// `message` is the raw data; hashing happens inside the primitive.
    pub fn sign_sha1_pkcs1v15(private_key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>, RsaError> {
        let signing_key = SigningKey::<Sha1>::new(private_key.clone());
        let signature = signing_key
            .try_sign(message)
            .map_err(|e| RsaError::SigningFailed(e.to_string()))?;
        Ok(signature.to_vec())
    }

    /// Raw RSA private-key transform `m^d mod n` over an already padded block
    ///
    /// The output is left-padded to the key size.
    pub fn raw_private_transform(private_key: &RsaPrivateKey, block: &[u8]) -> Result<Vec<u8>, RsaError> {
        let n = private_key.n();
        let m = BigUint::from_bytes_be(block);
        if &m >= n {
            return Err(RsaError::MessageOutOfRange);
        }

        let s = m.modpow(private_key.d(), n);
        let key_size = private_key.size();
        Self::left_pad(s.to_bytes_be(), key_size)
            .ok_or_else(|| RsaError::SigningFailed(format!("result exceeds {} bytes", key_size)))
    }

    /// Decrypt PKCS#1 v1.5 padded ciphertext
    pub fn decrypt(private_key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, RsaError> {
        private_key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| RsaError::DecryptionFailed(e.to_string()))
    }

    /// Encode a private key as PKCS#1 DER for storage
    pub fn encode_private_key(private_key: &RsaPrivateKey) -> Result<Vec<u8>, RsaError> {
        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| RsaError::InvalidKey(e.to_string()))?;
        Ok(der.as_bytes().to_vec())
    }

    /// Decode a private key from PKCS#1 DER
    pub fn decode_private_key(der: &[u8]) -> Result<RsaPrivateKey, RsaError> {
        RsaPrivateKey::from_pkcs1_der(der).map_err(|e| RsaError::InvalidKey(e.to_string()))
    }

    fn left_pad(mut bytes: Vec<u8>, size: usize) -> Option<Vec<u8>> {
        if bytes.len() > size {
            return None;
        }
        let pad = size - bytes.len();
        bytes.splice(0..0, std::iter::repeat(0u8).take(pad));
        Some(bytes)
    }
}
