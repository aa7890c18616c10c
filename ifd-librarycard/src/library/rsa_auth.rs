//! RSA challenge-response authenticator
//!
//! The card generates one RSA-1024 keypair in its life. Terminals read the
//! public half, authenticate the card by having it sign random challenges, and
//! deliver key material encrypted to it.

use std::fmt;

use log::{info, warn};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};

use super::error::{CardError, CardResult, SignError};
use super::signing::{SigningProfile, MODULUS_LENGTH};
use crate::apdu::Response;
use crate::card::state::{base64_array, base64_key};
use crate::crypto::RsaOperations;

pub const KEY_BITS: usize = MODULUS_LENGTH * 8;
pub const PUBLIC_EXPONENT: [u8; 3] = [0x01, 0x00, 0x01];
pub const CHALLENGE_LENGTH: usize = 16;

/// Keypair state; `Uninitialized -> KeyGenerated`, one way
#[derive(Clone, Serialize, Deserialize)]
pub struct RsaAuthManager {
    generated: bool,
    #[serde(with = "base64_array")]
    modulus: [u8; MODULUS_LENGTH],
    #[serde(with = "base64_array")]
    public_exponent: [u8; 3],
    #[serde(default, with = "base64_key")]
    private_key: Option<RsaPrivateKey>,
}

impl RsaAuthManager {
    pub fn new() -> Self {
        Self {
            generated: false,
            modulus: [0u8; MODULUS_LENGTH],
            public_exponent: PUBLIC_EXPONENT,
            private_key: None,
        }
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// GENERATE KEYPAIR, answers `modulus(128) || exponent(3)`
    pub fn generate(&mut self) -> CardResult {
        if self.generated {
            warn!("Keypair already generated");
            return Err(CardError::CommandNotAllowed);
        }

        let key = RsaOperations::generate_keypair(KEY_BITS).map_err(|e| {
            warn!("{}", e);
            CardError::Unknown
        })?;
        self.install_key(key)?;
        info!("RSA-{} keypair generated", KEY_BITS);
        Ok(Response::success(self.public_key_bytes()))
    }

    /// GET PUBLIC KEY
    pub fn public_key(&self) -> CardResult {
        if !self.generated {
            return Err(CardError::ConditionsNotSatisfied);
        }
        Ok(Response::success(self.public_key_bytes()))
    }

    /// SIGN CHALLENGE: `challenge(16)`, answers a 128-byte signature
    pub fn sign_challenge(&self, profile: &SigningProfile, data: &[u8]) -> CardResult {
        if !self.generated {
            return Err(SignError::KeyPairNotGenerated.into());
        }
        let key = self
            .private_key
            .as_ref()
            .ok_or(SignError::PrivateKeyUninitialized)?;
        if data.len() != CHALLENGE_LENGTH {
            return Err(CardError::WrongLength);
        }

        let signature = profile.sign(key, data)?;
        Ok(Response::success(signature))
    }

    /// RSA DECRYPT: `ciphertext(128)`, PKCS#1 v1.5 padded
    pub fn decrypt(&self, data: &[u8]) -> CardResult {
        let key = match (&self.private_key, self.generated) {
            (Some(key), true) => key,
            _ => return Err(CardError::KeyPairNotGenerated),
        };
        if data.len() != MODULUS_LENGTH {
            return Err(CardError::WrongLength);
        }

        let plaintext = RsaOperations::decrypt(key, data).map_err(|e| {
            warn!("{}", e);
            CardError::DecryptFailed
        })?;
        Ok(Response::success(plaintext))
    }

    fn public_key_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MODULUS_LENGTH + PUBLIC_EXPONENT.len());
        out.extend_from_slice(&self.modulus);
        out.extend_from_slice(&self.public_exponent);
        out
    }

    pub(crate) fn install_key(&mut self, key: RsaPrivateKey) -> Result<(), CardError> {
        let modulus = RsaOperations::modulus(&key, MODULUS_LENGTH).map_err(|e| {
            warn!("{}", e);
            CardError::Unknown
        })?;
        self.modulus.copy_from_slice(&modulus);
        self.public_exponent = PUBLIC_EXPONENT;
        self.private_key = Some(key);
        self.generated = true;
        Ok(())
    }
}

impl Default for RsaAuthManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RsaAuthManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaAuthManager")
            .field("generated", &self.generated)
            .field("has_private_key", &self.private_key.is_some())
            .finish_non_exhaustive()
    }
}
