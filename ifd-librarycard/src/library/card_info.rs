//! Card holder identity record

use log::info;
use serde::{Deserialize, Serialize};

use super::error::{CardError, CardResult};
use super::reader::Reader;
use super::session::SecurityState;
use crate::apdu::Response;
use crate::card::state::base64_array;

pub const CARD_ID_LENGTH: usize = 10;
pub const NAME_MAX_LENGTH: usize = 50;
/// DDMMYYYY as ASCII digits
pub const EXPIRY_LENGTH: usize = 8;

/// Card id, holder name and expiry date, always replaced together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInfoManager {
    #[serde(with = "base64_array")]
    card_id: [u8; CARD_ID_LENGTH],
    #[serde(with = "base64_array")]
    holder_name: [u8; NAME_MAX_LENGTH],
    holder_name_length: u8,
    #[serde(with = "base64_array")]
    expiry_date: [u8; EXPIRY_LENGTH],
}

impl CardInfoManager {
    pub fn new() -> Self {
        Self {
            card_id: [0u8; CARD_ID_LENGTH],
            holder_name: [0u8; NAME_MAX_LENGTH],
            holder_name_length: 0,
            expiry_date: [0u8; EXPIRY_LENGTH],
        }
    }

    pub fn card_id(&self) -> &[u8] {
        &self.card_id
    }

    pub fn holder_name(&self) -> &[u8] {
        let len = (self.holder_name_length as usize).min(NAME_MAX_LENGTH);
        &self.holder_name[..len]
    }

    pub fn expiry_date(&self) -> &[u8] {
        &self.expiry_date
    }

    /// SET CARD INFO: `id(10) || nameLen || name || expiry(8)`
    ///
    /// The whole payload is parsed before the record is touched.
    pub fn set(&mut self, session: &SecurityState, data: &[u8]) -> CardResult {
        session.require_validated()?;

        let mut reader = Reader::new(data);
        let card_id = reader.read_array::<CARD_ID_LENGTH>()?;
        let name_length = reader.read_u8()? as usize;
        if name_length > NAME_MAX_LENGTH {
            return Err(CardError::WrongLength);
        }
        let name = reader.read_bytes(name_length)?;
        let expiry_date = reader.read_array::<EXPIRY_LENGTH>()?;

        self.card_id = card_id;
        self.holder_name = [0u8; NAME_MAX_LENGTH];
        self.holder_name[..name_length].copy_from_slice(name);
        self.holder_name_length = name_length as u8;
        self.expiry_date = expiry_date;

        info!("Card info updated");
        Ok(Response::ok())
    }

    /// GET CARD INFO: `id(10) || nameLen || name || expiry(8) || bookCount`
    pub fn response(&self, book_count: u8) -> Response {
        let name = self.holder_name();
        let mut data = Vec::with_capacity(CARD_ID_LENGTH + 1 + name.len() + EXPIRY_LENGTH + 1);
        data.extend_from_slice(&self.card_id);
        data.push(name.len() as u8);
        data.extend_from_slice(name);
        data.extend_from_slice(&self.expiry_date);
        data.push(book_count);
        Response::success(data)
    }
}

impl Default for CardInfoManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validated() -> SecurityState {
        let mut session = SecurityState::new();
        session.set_validated();
        session
    }

    fn payload(id: &[u8; 10], name: &[u8], expiry: &[u8; 8]) -> Vec<u8> {
        let mut data = id.to_vec();
        data.push(name.len() as u8);
        data.extend_from_slice(name);
        data.extend_from_slice(expiry);
        data
    }

    #[test]
    fn test_set_then_get() {
        let mut info = CardInfoManager::new();
        let data = payload(b"LIB0000042", b"Nguyen Van A", b"31122026");
        assert!(info.set(&validated(), &data).unwrap().is_okay());

        let resp = info.response(3);
        let mut expected = data.clone();
        expected.push(3);
        assert_eq!(resp.data, expected);
        assert_eq!(info.holder_name(), b"Nguyen Van A");
    }

    #[test]
    fn test_requires_pin() {
        let mut info = CardInfoManager::new();
        let data = payload(b"LIB0000042", b"A", b"31122026");
        assert_eq!(
            info.set(&SecurityState::new(), &data),
            Err(CardError::SecurityStatusNotSatisfied)
        );
    }

    #[test]
    fn test_name_too_long() {
        let mut info = CardInfoManager::new();
        let data = payload(b"LIB0000042", &[b'x'; 51], b"31122026");
        assert_eq!(info.set(&validated(), &data), Err(CardError::WrongLength));
    }

    #[test]
    fn test_truncated_payload_leaves_record() {
        let mut info = CardInfoManager::new();
        let session = validated();
        info.set(&session, &payload(b"LIB0000001", b"First", b"01012025")).unwrap();

        let mut data = payload(b"LIB0000002", b"Second", b"02022026");
        data.truncate(data.len() - 3);
        assert_eq!(info.set(&session, &data), Err(CardError::WrongLength));
        assert_eq!(info.card_id(), b"LIB0000001");
        assert_eq!(info.holder_name(), b"First");
    }

    #[test]
    fn test_shorter_name_replaces_longer() {
        let mut info = CardInfoManager::new();
        let session = validated();
        info.set(&session, &payload(b"LIB0000001", b"Long Holder Name", b"01012025")).unwrap();
        info.set(&session, &payload(b"LIB0000001", b"Bo", b"01012025")).unwrap();
        assert_eq!(info.holder_name(), b"Bo");
        assert_eq!(info.response(0).data.len(), 10 + 1 + 2 + 8 + 1);
    }

    #[test]
    fn test_empty_record() {
        let info = CardInfoManager::new();
        let resp = info.response(0);
        assert_eq!(resp.data.len(), 10 + 1 + 8 + 1);
        assert_eq!(resp.data[10], 0);
    }
}
