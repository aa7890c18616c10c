//! Error outcomes of the library card commands
//!
//! Every abort maps to exactly one status word. Soft outcomes (a wrong PIN on
//! verify) are not errors and are answered with data instead.

use thiserror::Error;

use crate::apdu::{Response, SW};

/// Diagnostic failures of the challenge-signing path
///
/// Each variant carries its own private `6Axx` status word so a host can tell
/// which stage of the strategy chain broke.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SignError {
    #[error("keypair not generated")]
    KeyPairNotGenerated,

    #[error("no signing algorithm available")]
    AlgorithmUnsupported,

    #[error("private key not initialized")]
    PrivateKeyUninitialized,

    #[error("raw cipher could not be initialized for this key")]
    CipherInitFailed,

    #[error("padded block has the wrong length or leading byte")]
    PaddingMismatch,

    #[error("signing primitive failed")]
    SignFailed,

    #[error("transform output does not fit the modulus length")]
    OutputOverflow,

    #[error("signature length does not match the modulus length")]
    SignatureLengthMismatch,

    #[error("padded block is not below the modulus")]
    IllegalValue,
}

impl SignError {
    pub fn status_word(&self) -> u16 {
        match self {
            SignError::KeyPairNotGenerated => 0x6A00,
            SignError::AlgorithmUnsupported => 0x6A0C,
            SignError::PrivateKeyUninitialized => 0x6A0E,
            SignError::CipherInitFailed => 0x6A0F,
            SignError::PaddingMismatch => 0x6A11,
            SignError::SignFailed => 0x6A13,
            SignError::OutputOverflow => 0x6A14,
            SignError::SignatureLengthMismatch => 0x6A16,
            SignError::IllegalValue => 0x6A2A,
        }
    }

    /// Fatal errors stop the strategy chain instead of falling through
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SignError::PrivateKeyUninitialized | SignError::SignatureLengthMismatch
        )
    }
}

/// Command aborts
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CardError {
    #[error("wrong length")]
    WrongLength,

    #[error("command not allowed")]
    CommandNotAllowed,

    #[error("security status not satisfied")]
    SecurityStatusNotSatisfied,

    #[error("conditions of use not satisfied")]
    ConditionsNotSatisfied,

    #[error("record not found")]
    NotFound,

    #[error("file full")]
    FileFull,

    #[error("incorrect P1/P2")]
    WrongP1P2,

    #[error("instruction {0:#04X} not supported")]
    InsNotSupported(u8),

    #[error("keypair not generated")]
    KeyPairNotGenerated,

    #[error("decryption failed")]
    DecryptFailed,

    #[error("unexpected failure")]
    Unknown,

    #[error("signing failed: {0}")]
    Sign(#[from] SignError),
}

impl CardError {
    pub fn status_word(&self) -> u16 {
        match self {
            CardError::WrongLength => SW::WRONG_LENGTH,
            CardError::CommandNotAllowed => SW::COMMAND_NOT_ALLOWED,
            CardError::SecurityStatusNotSatisfied => SW::SECURITY_STATUS_NOT_SATISFIED,
            CardError::ConditionsNotSatisfied => SW::CONDITIONS_NOT_SATISFIED,
            CardError::NotFound => SW::FILE_NOT_FOUND,
            CardError::FileFull => SW::FILE_FULL,
            CardError::WrongP1P2 => SW::WRONG_P1_P2,
            CardError::InsNotSupported(_) => SW::INS_NOT_SUPPORTED,
            CardError::KeyPairNotGenerated => SignError::KeyPairNotGenerated.status_word(),
            CardError::DecryptFailed => SignError::SignFailed.status_word(),
            CardError::Unknown => SW::UNKNOWN,
            CardError::Sign(e) => e.status_word(),
        }
    }
}

impl From<CardError> for Response {
    fn from(err: CardError) -> Self {
        Response::error(err.status_word())
    }
}

/// Result of a command handler
pub type CardResult = Result<Response, CardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_status_words() {
        assert_eq!(CardError::WrongLength.status_word(), 0x6700);
        assert_eq!(CardError::CommandNotAllowed.status_word(), 0x6900);
        assert_eq!(CardError::SecurityStatusNotSatisfied.status_word(), 0x6982);
        assert_eq!(CardError::ConditionsNotSatisfied.status_word(), 0x6985);
        assert_eq!(CardError::NotFound.status_word(), 0x6A82);
        assert_eq!(CardError::FileFull.status_word(), 0x6A84);
        assert_eq!(CardError::InsNotSupported(0xEE).status_word(), 0x6D00);
        assert_eq!(CardError::Unknown.status_word(), 0x6F00);
    }

    #[test]
    fn test_signing_codes_are_distinct_diagnostics() {
        let all = [
            SignError::KeyPairNotGenerated,
            SignError::AlgorithmUnsupported,
            SignError::PrivateKeyUninitialized,
            SignError::CipherInitFailed,
            SignError::PaddingMismatch,
            SignError::SignFailed,
            SignError::OutputOverflow,
            SignError::SignatureLengthMismatch,
            SignError::IllegalValue,
        ];
        let mut codes: Vec<u16> = all.iter().map(SignError::status_word).collect();
        assert!(codes.iter().all(|&sw| SW::is_signing_diagnostic(sw)));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn test_sign_error_passes_through() {
        let err: CardError = SignError::SignatureLengthMismatch.into();
        assert_eq!(err.status_word(), 0x6A16);
        let resp: Response = err.into();
        assert!(resp.data.is_empty());
        assert_eq!(resp.to_bytes(), vec![0x6A, 0x16]);
    }

    #[test]
    fn test_fatal_errors() {
        assert!(SignError::PrivateKeyUninitialized.is_fatal());
        assert!(SignError::SignatureLengthMismatch.is_fatal());
        assert!(!SignError::SignFailed.is_fatal());
        assert!(!SignError::IllegalValue.is_fatal());
    }
}
