//! Library card applet
//!
//! Routes each command to exactly one manager by its INS byte and turns the
//! manager's result into a response. Commands that touch persistent state are
//! followed by a save of the card storage, whatever their outcome.

use log::{debug, info, warn};

use super::error::{CardError, CardResult};
use super::session::SecurityState;
use super::signing::SigningProfile;
use crate::apdu::{ins, Response, APDU, SW};
use crate::card::{CardDataStore, CardState};

/// Library applet identifier ("LIBRARY")
pub const LIBRARY_AID: &[u8] = &[0x4C, 0x49, 0x42, 0x52, 0x41, 0x52, 0x59];

/// Library Card Applet
pub struct LibraryCardApplet {
    store: CardDataStore,
    session: SecurityState,
    signing: SigningProfile,
}

impl LibraryCardApplet {
    /// Create a new applet over already loaded storage
    pub fn new(store: CardDataStore, signing: SigningProfile) -> Self {
        Self {
            store,
            session: SecurityState::new(),
            signing,
        }
    }

    /// Process an APDU command and return the response
    pub fn process_apdu(&mut self, cmd: &APDU) -> Response {
        debug!(
            "Library applet: INS={:02X} P1={:02X} P2={:02X} Lc={}",
            cmd.ins,
            cmd.p1,
            cmd.p2,
            cmd.data.len()
        );

        let result = self.dispatch(cmd);

        if Self::persists(cmd.ins) {
            self.store.save();
        }

        result.unwrap_or_else(|e| {
            let sw = e.status_word();
            if SW::is_signing_diagnostic(sw) {
                warn!("INS {:02X} failed with {:04X}: {}", cmd.ins, sw, e);
            } else {
                debug!("INS {:02X} refused with {:04X}: {}", cmd.ins, sw, e);
            }
            e.into()
        })
    }

    fn dispatch(&mut self, cmd: &APDU) -> CardResult {
        if cmd.ins == ins::SELECT {
            return self.handle_select(cmd);
        }

        let session = &mut self.session;
        let state = self.store.get_state_mut();
        let data = cmd.data.as_slice();

        match cmd.ins {
            ins::CREATE_PIN => state.pin.create(session, data),
            ins::VERIFY_PIN => state.pin.verify(session, data),
            ins::CHANGE_PIN => state.pin.change(session, data),
            ins::GET_PIN_TRIES => Ok(state.pin.tries_response()),
            ins::RESET_PIN => state.pin.reset(session, data),

            ins::SET_CARD_INFO => state.card_info.set(session, data),
            ins::GET_CARD_INFO => Ok(state.card_info.response(state.books.count())),

            ins::ADD_BORROWED_BOOK => state.books.add(session, data),
            ins::GET_BORROWED_BOOKS => Ok(state.books.response()),
            ins::RETURN_BOOK => state.books.return_book(session, data),

            ins::GENERATE_KEYPAIR => state.rsa.generate(),
            ins::GET_PUBLIC_KEY => state.rsa.public_key(),
            ins::SIGN_CHALLENGE => state.rsa.sign_challenge(&self.signing, data),
            ins::RSA_DECRYPT => state.rsa.decrypt(data),

            ins::SET_SYMMETRIC_KEY => state.key_material.set_key(session, data),
            ins::SYMMETRIC_ENCRYPT => state.key_material.encrypt(data),
            ins::SYMMETRIC_DECRYPT => state.key_material.decrypt(data),

            other => {
                warn!("Unsupported INS {:02X}", other);
                Err(CardError::InsNotSupported(other))
            }
        }
    }

    /// SELECT by AID; a fresh selection starts an unauthenticated session
    fn handle_select(&mut self, cmd: &APDU) -> CardResult {
        if cmd.p1 != 0x04 {
            return Err(CardError::WrongP1P2);
        }
        if !cmd.data.starts_with(LIBRARY_AID) {
            return Err(CardError::NotFound);
        }

        self.session.clear();
        info!("Library applet selected");
        Ok(Response::ok())
    }

    /// Whether an instruction can change what the card stores
    fn persists(code: u8) -> bool {
        matches!(
            code,
            ins::CREATE_PIN
                | ins::VERIFY_PIN
                | ins::CHANGE_PIN
                | ins::RESET_PIN
                | ins::SET_CARD_INFO
                | ins::ADD_BORROWED_BOOK
                | ins::RETURN_BOOK
                | ins::GENERATE_KEYPAIR
                | ins::SET_SYMMETRIC_KEY
        )
    }

    /// End the PIN session (deselect, power loss, reset)
    pub fn deselect(&mut self) {
        self.session.clear();
    }

    /// Whether the holder's PIN has been verified in this session
    pub fn is_pin_validated(&self) -> bool {
        self.session.is_validated()
    }

    /// Read-only view of the stored card data
    pub fn state(&self) -> &CardState {
        self.store.get_state()
    }

    /// Wipe the credential back to a blank card
    pub fn reissue(&mut self) {
        self.session.clear();
        self.store.reset_to_factory();
    }
}
