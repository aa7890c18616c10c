//! Challenge signing strategies
//!
//! A challenge is signed with SHA-1 and PKCS#1 v1.5 padding. Cards differ in
//! what they offer for that: some expose a complete signature primitive, others
//! only a raw RSA cipher onto which the padding has to be laid by hand. A
//! [`SigningProfile`] lists the strategies a card offers, in the order they are
//! tried.

use std::fmt;

use log::{debug, warn};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;

use super::error::SignError;
use crate::crypto::hash::SHA1_OUTPUT_SIZE;
use crate::crypto::rsa::RsaError;
use crate::crypto::{HashOperations, RsaOperations};

/// Modulus and signature length in bytes (RSA-1024)
pub const MODULUS_LENGTH: usize = 128;

/// Inputs shared by every strategy
pub struct SigningRequest<'a> {
    /// The raw challenge bytes
    pub challenge: &'a [u8],
    /// EMSA-PKCS1-v1_5 encoding of the challenge digest
    pub block: &'a [u8; MODULUS_LENGTH],
}

/// A way of producing a PKCS#1 v1.5 SHA-1 signature
pub trait SigningStrategy {
    fn kind(&self) -> StrategyKind;

    fn sign(&self, key: &RsaPrivateKey, request: &SigningRequest<'_>) -> Result<Vec<u8>, SignError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Library-provided SHA-1 + PKCS#1 v1.5 signature over the raw challenge
    SignaturePrimitive,
    /// Hand-built padding block pushed through the raw private-key transform
    RawTransform,
}

impl StrategyKind {
    fn strategy(self) -> &'static dyn SigningStrategy {
        match self {
            StrategyKind::SignaturePrimitive => &SignaturePrimitive,
            StrategyKind::RawTransform => &RawTransform,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::SignaturePrimitive => write!(f, "signature primitive"),
            StrategyKind::RawTransform => write!(f, "raw transform"),
        }
    }
}

pub struct SignaturePrimitive;

impl SigningStrategy for SignaturePrimitive {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SignaturePrimitive
    }

    fn sign(&self, key: &RsaPrivateKey, request: &SigningRequest<'_>) -> Result<Vec<u8>, SignError> {
        RsaOperations::sign_sha1_pkcs1v15(key, request.challenge).map_err(|e| {
            debug!("{}: {}", self.kind(), e);
            SignError::SignFailed
        })
    }
}

pub struct RawTransform;

impl SigningStrategy for RawTransform {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RawTransform
    }

    fn sign(&self, key: &RsaPrivateKey, request: &SigningRequest<'_>) -> Result<Vec<u8>, SignError> {
        if key.size() != MODULUS_LENGTH {
            return Err(SignError::CipherInitFailed);
        }
        RsaOperations::raw_private_transform(key, request.block).map_err(|e| match e {
            RsaError::MessageOutOfRange => SignError::IllegalValue,
            RsaError::SigningFailed(_) => SignError::OutputOverflow,
            _ => SignError::SignFailed,
        })
    }
}

/// Build `00 01 FF..FF 00 DigestInfo(SHA-1) hash`, exactly one modulus long
pub fn build_padded_block(hash: &[u8; SHA1_OUTPUT_SIZE]) -> Result<[u8; MODULUS_LENGTH], SignError> {
    let t = HashOperations::sha1_digest_info(hash);
    let padding_length = MODULUS_LENGTH
        .checked_sub(3 + t.len())
        .ok_or(SignError::PaddingMismatch)?;

    let mut block = Vec::with_capacity(MODULUS_LENGTH);
    block.push(0x00);
    block.push(0x01);
    block.resize(2 + padding_length, 0xFF);
    block.push(0x00);
    block.extend_from_slice(&t);

    // A leading zero keeps the block below any full-length modulus
    if block.first() != Some(&0x00) {
        return Err(SignError::PaddingMismatch);
    }
    <[u8; MODULUS_LENGTH]>::try_from(block).map_err(|_| SignError::PaddingMismatch)
}

/// Ordered list of the strategies a card offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningProfile {
    strategies: Vec<StrategyKind>,
}

impl SigningProfile {
    pub fn new(strategies: Vec<StrategyKind>) -> Self {
        Self { strategies }
    }

    /// Signature primitive first, raw transform as fallback
    pub fn full() -> Self {
        Self::new(vec![StrategyKind::SignaturePrimitive, StrategyKind::RawTransform])
    }

    pub fn signature_only() -> Self {
        Self::new(vec![StrategyKind::SignaturePrimitive])
    }

    pub fn raw_only() -> Self {
        Self::new(vec![StrategyKind::RawTransform])
    }

    pub fn strategies(&self) -> &[StrategyKind] {
        &self.strategies
    }

    /// Sign a challenge, trying each strategy in turn
    ///
    /// A fatal error stops the chain; otherwise the last failure is reported.
    /// Whatever strategy succeeds must produce exactly one modulus of output.
    pub fn sign(&self, key: &RsaPrivateKey, challenge: &[u8]) -> Result<Vec<u8>, SignError> {
        let hash = HashOperations::sha1(challenge);
        let block = build_padded_block(&hash)?;
        let request = SigningRequest { challenge, block: &block };

        let mut last_error = SignError::AlgorithmUnsupported;
        for kind in &self.strategies {
            let strategy = kind.strategy();
            debug!("Signing challenge with {}", strategy.kind());
            match strategy.sign(key, &request) {
                Ok(signature) if signature.len() == MODULUS_LENGTH => return Ok(signature),
                Ok(signature) => {
                    warn!("{} produced {} bytes", kind, signature.len());
                    return Err(SignError::SignatureLengthMismatch);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("{} failed: {}", kind, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

impl Default for SigningProfile {
    fn default() -> Self {
        Self::full()
    }
}
