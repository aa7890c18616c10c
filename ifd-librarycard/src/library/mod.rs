//! Library membership card applet
//!
//! Implements the on-card logic of a library membership credential: a PIN
//! with retry lockout, the holder's identity record, a bounded list of
//! borrowed books, and RSA challenge-response authentication.

pub mod applet;
mod books;
mod card_info;
mod error;
mod key_material;
mod pin_manager;
mod reader;
mod rsa_auth;
mod session;
pub mod signing;

pub use applet::{LibraryCardApplet, LIBRARY_AID};
pub use books::{BookManager, BOOK_ID_LENGTH, MAX_BOOKS};
pub use card_info::{CardInfoManager, CARD_ID_LENGTH, EXPIRY_LENGTH, NAME_MAX_LENGTH};
pub use error::{CardError, CardResult, SignError};
pub use key_material::{KeyMaterialManager, SYMMETRIC_KEY_LENGTH};
pub use pin_manager::{PinManager, ADMIN_RESET_KEY, PIN_MAX_LENGTH, PIN_MIN_LENGTH, PIN_TRY_LIMIT};
pub use rsa_auth::{RsaAuthManager, CHALLENGE_LENGTH, KEY_BITS, PUBLIC_EXPONENT};
pub use session::SecurityState;
pub use signing::{SigningProfile, StrategyKind, MODULUS_LENGTH};
