//! PIN Manager for the library card
//!
//! Owner-PIN semantics: every check spends a try before comparing, a successful
//! check restores the counter, and once the counter reaches zero no check can
//! succeed until an update (change or admin reset) unblocks the PIN.
//!
//! Only a SHA-256 digest of the PIN and its length are kept.

use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::error::{CardError, CardResult};
use super::reader::Reader;
use super::session::SecurityState;
use crate::apdu::Response;
use crate::card::state::base64_array;
use crate::crypto::hash::SHA256_OUTPUT_SIZE;
use crate::crypto::HashOperations;

/// Consecutive wrong PINs before the card blocks
pub const PIN_TRY_LIMIT: u8 = 3;
pub const PIN_MIN_LENGTH: usize = 4;
pub const PIN_MAX_LENGTH: usize = 32;

/// Break-glass administrator key for `RESET PIN` ("ADMI")
///
/// A fixed, publicly known value kept for wire compatibility with deployed
/// terminals. It is not a security boundary.
pub const ADMIN_RESET_KEY: [u8; 4] = *b"ADMI";

/// Verify answer byte for a matching PIN
const VERIFY_OK: u8 = 0x01;
/// Verify answer byte for a mismatch, followed by the remaining tries
const VERIFY_FAILED: u8 = 0x00;

/// PIN state and the commands operating on it
#[derive(Clone, Serialize, Deserialize)]
pub struct PinManager {
    #[serde(with = "base64_array")]
    pin_hash: [u8; SHA256_OUTPUT_SIZE],
    stored_length: u8,
    tries_remaining: u8,
    max_tries: u8,
}

impl PinManager {
    pub fn new() -> Self {
        Self {
            pin_hash: [0u8; SHA256_OUTPUT_SIZE],
            stored_length: 0,
            tries_remaining: PIN_TRY_LIMIT,
            max_tries: PIN_TRY_LIMIT,
        }
    }

    /// Whether a PIN has been created
    pub fn is_set(&self) -> bool {
        self.stored_length > 0
    }

    pub fn tries_remaining(&self) -> u8 {
        self.tries_remaining
    }

    pub fn is_blocked(&self) -> bool {
        self.tries_remaining == 0
    }

    /// CREATE PIN: `len || pin`, allowed once per card life
    pub fn create(&mut self, session: &mut SecurityState, data: &[u8]) -> CardResult {
        if session.is_validated() || self.is_set() {
            warn!("Create PIN refused: a PIN already exists");
            return Err(CardError::CommandNotAllowed);
        }

        let pin = Reader::new(data).read_length_prefixed()?;
        Self::check_length(pin)?;

        self.update(session, pin);
        info!("PIN created");
        Ok(Response::ok())
    }

    /// VERIFY PIN: `len || pin`
    ///
    /// A mismatch is answered with data, never with an error status.
    pub fn verify(&mut self, session: &mut SecurityState, data: &[u8]) -> CardResult {
        let pin = Reader::new(data).read_length_prefixed()?;

        if self.check(session, pin) {
            debug!("PIN verified");
            Ok(Response::byte(VERIFY_OK))
        } else {
            if self.is_blocked() {
                warn!("PIN is blocked");
            } else {
                debug!("Wrong PIN, {} tries left", self.tries_remaining);
            }
            Ok(Response::success(vec![VERIFY_FAILED, self.tries_remaining]))
        }
    }

    /// CHANGE PIN: `oldLen || old || newLen || new`
    ///
    /// Both fields are validated before the old PIN is checked, so a malformed
    /// command never spends a try. Success logs the session out.
    pub fn change(&mut self, session: &mut SecurityState, data: &[u8]) -> CardResult {
        let mut reader = Reader::new(data);
        let old_pin = reader.read_length_prefixed()?;
        let new_pin = reader.read_length_prefixed()?;
        Self::check_length(new_pin)?;

        if !self.check(session, old_pin) {
            warn!("Change PIN refused: old PIN wrong, {} tries left", self.tries_remaining);
            return Err(CardError::SecurityStatusNotSatisfied);
        }

        self.update(session, new_pin);
        info!("PIN changed");
        Ok(Response::ok())
    }

    /// GET PIN TRIES, answerable even while blocked
    pub fn tries_response(&self) -> Response {
        Response::byte(self.tries_remaining)
    }

    /// RESET PIN: `adminKey(4) || newLen || new`
    pub fn reset(&mut self, session: &mut SecurityState, data: &[u8]) -> CardResult {
        let mut reader = Reader::new(data);
        let key = reader.read_bytes(ADMIN_RESET_KEY.len())?;
        if !bool::from(key.ct_eq(&ADMIN_RESET_KEY[..])) {
            warn!("Reset PIN refused: wrong administrator key");
            return Err(CardError::SecurityStatusNotSatisfied);
        }

        let new_pin = reader.read_length_prefixed()?;
        Self::check_length(new_pin)?;

        self.update(session, new_pin);
        info!("PIN reset by administrator");
        Ok(Response::ok())
    }

    fn check_length(pin: &[u8]) -> Result<(), CardError> {
        if (PIN_MIN_LENGTH..=PIN_MAX_LENGTH).contains(&pin.len()) {
            Ok(())
        } else {
            Err(CardError::WrongLength)
        }
    }

    /// Compare a candidate against the stored PIN, spending a try first
    fn check(&mut self, session: &mut SecurityState, candidate: &[u8]) -> bool {
        session.clear();
        if self.tries_remaining == 0 {
            return false;
        }
        self.tries_remaining -= 1;

        let mut candidate_hash = HashOperations::sha256(candidate);
        let matched = self.is_set()
            && candidate.len() == self.stored_length as usize
            && bool::from(candidate_hash.ct_eq(&self.pin_hash));
        candidate_hash.zeroize();

        if matched {
            self.tries_remaining = self.max_tries;
            session.set_validated();
        }
        matched
    }

    /// Install a new PIN, restore the try counter and end the session
    fn update(&mut self, session: &mut SecurityState, pin: &[u8]) {
        self.pin_hash = HashOperations::sha256(pin);
        self.stored_length = pin.len() as u8;
        self.tries_remaining = self.max_tries;
        session.clear();
    }
}

impl Default for PinManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PinManager {
    fn drop(&mut self) {
        self.pin_hash.zeroize();
    }
}

impl fmt::Debug for PinManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinManager")
            .field("set", &self.is_set())
            .field("tries_remaining", &self.tries_remaining)
            .field("max_tries", &self.max_tries)
            .finish_non_exhaustive()
    }
}
