//! Symmetric key slot
//!
//! Holds a 16-byte key delivered by an authenticated administrator. Bulk
//! encryption happens off-card, so the encrypt and decrypt commands only
//! validate their framing and answer a single `0x00`.

use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::error::{CardError, CardResult};
use super::reader::Reader;
use super::session::SecurityState;
use crate::apdu::Response;
use crate::card::state::base64_array;

pub const SYMMETRIC_KEY_LENGTH: usize = 16;
pub const SYMMETRIC_BLOCK_LENGTH: usize = 16;

const KEY_INSTALLED: u8 = 0x01;
const NOT_PERFORMED: u8 = 0x00;

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct KeyMaterialManager {
    #[serde(with = "base64_array")]
    key: [u8; SYMMETRIC_KEY_LENGTH],
    installed: bool,
}

impl KeyMaterialManager {
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// SET SYMMETRIC KEY: `key(16)`
    pub fn set_key(&mut self, session: &SecurityState, data: &[u8]) -> CardResult {
        session.require_validated()?;
        if data.len() != SYMMETRIC_KEY_LENGTH {
            return Err(CardError::WrongLength);
        }

        self.key.copy_from_slice(data);
        self.installed = true;
        info!("Symmetric key installed");
        Ok(Response::byte(KEY_INSTALLED))
    }

    /// SYMMETRIC ENCRYPT: `len || data`
    pub fn encrypt(&self, data: &[u8]) -> CardResult {
        self.require_key()?;
        let mut reader = Reader::new(data);
        let len = reader.read_u8()? as usize;
        if len == 0 || len > reader.remaining() {
            return Err(CardError::WrongLength);
        }
        Ok(Response::byte(NOT_PERFORMED))
    }

    /// SYMMETRIC DECRYPT: whole blocks of ciphertext
    pub fn decrypt(&self, data: &[u8]) -> CardResult {
        self.require_key()?;
        if data.len() % SYMMETRIC_BLOCK_LENGTH != 0 {
            return Err(CardError::WrongLength);
        }
        Ok(Response::byte(NOT_PERFORMED))
    }

    fn require_key(&self) -> Result<(), CardError> {
        if self.installed {
            Ok(())
        } else {
            Err(CardError::ConditionsNotSatisfied)
        }
    }
}

impl Drop for KeyMaterialManager {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for KeyMaterialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterialManager")
            .field("installed", &self.installed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed() -> KeyMaterialManager {
        let mut session = SecurityState::new();
        session.set_validated();
        let mut km = KeyMaterialManager::default();
        assert_eq!(km.set_key(&session, &[0x11; 16]).unwrap().data, vec![0x01]);
        km
    }

    #[test]
    fn test_set_key_requires_pin_and_length() {
        let mut km = KeyMaterialManager::default();
        assert_eq!(
            km.set_key(&SecurityState::new(), &[0x11; 16]),
            Err(CardError::SecurityStatusNotSatisfied)
        );

        let mut session = SecurityState::new();
        session.set_validated();
        assert_eq!(km.set_key(&session, &[0x11; 15]), Err(CardError::WrongLength));
        assert!(!km.is_installed());
    }

    #[test]
    fn test_stubs_need_key() {
        let km = KeyMaterialManager::default();
        assert_eq!(km.encrypt(&[0x01, 0xAA]), Err(CardError::ConditionsNotSatisfied));
        assert_eq!(km.decrypt(&[0u8; 16]), Err(CardError::ConditionsNotSatisfied));
    }

    #[test]
    fn test_encrypt_framing() {
        let km = installed();
        assert_eq!(km.encrypt(&[0x02, 0xAA, 0xBB]).unwrap().data, vec![0x00]);
        assert_eq!(km.encrypt(&[0x00]), Err(CardError::WrongLength));
        assert_eq!(km.encrypt(&[0x03, 0xAA]), Err(CardError::WrongLength));
        assert_eq!(km.encrypt(&[]), Err(CardError::WrongLength));
    }

    #[test]
    fn test_decrypt_framing() {
        let km = installed();
        assert_eq!(km.decrypt(&[0u8; 32]).unwrap().data, vec![0x00]);
        assert_eq!(km.decrypt(&[0u8; 17]), Err(CardError::WrongLength));
        assert_eq!(km.decrypt(&[]).unwrap().data, vec![0x00]);
    }

    #[test]
    fn test_debug_hides_key() {
        let km = installed();
        assert!(!format!("{:?}", km).contains("17"));
    }
}
