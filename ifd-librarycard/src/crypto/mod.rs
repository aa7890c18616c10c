//! Cryptographic Operations
//!
//! Provides the SHA-1 and RSA primitives behind the library card's
//! challenge-response authentication.

pub mod hash;
pub mod rsa;

pub use self::hash::HashOperations;
pub use self::rsa::{RsaError, RsaOperations};
