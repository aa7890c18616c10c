//! Borrowed-book list
//!
//! A fixed arena of ten 8-byte slots with a live count. Slots `[0, count)` are
//! contiguous and in borrow order; removal shifts the tail left.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::error::{CardError, CardResult};
use super::session::SecurityState;
use crate::apdu::Response;
use crate::card::state::base64_array;

pub const MAX_BOOKS: usize = 10;
pub const BOOK_ID_LENGTH: usize = 8;

const SLOTS_LENGTH: usize = MAX_BOOKS * BOOK_ID_LENGTH;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookManager {
    #[serde(with = "base64_array")]
    entries: [u8; SLOTS_LENGTH],
    count: u8,
}

impl BookManager {
    pub fn new() -> Self {
        Self {
            entries: [0u8; SLOTS_LENGTH],
            count: 0,
        }
    }

    pub fn count(&self) -> u8 {
        self.len() as u8
    }

    fn len(&self) -> usize {
        (self.count as usize).min(MAX_BOOKS)
    }

    /// Live book ids in borrow order
    pub fn ids(&self) -> impl Iterator<Item = &[u8]> {
        self.entries[..self.len() * BOOK_ID_LENGTH].chunks_exact(BOOK_ID_LENGTH)
    }

    /// ADD BORROWED BOOK: `id(8)`
    pub fn add(&mut self, session: &SecurityState, data: &[u8]) -> CardResult {
        session.require_validated()?;
        let len = self.len();
        if len == MAX_BOOKS {
            warn!("Borrowed-book list is full");
            return Err(CardError::FileFull);
        }
        let id = Self::book_id(data)?;

        let offset = len * BOOK_ID_LENGTH;
        self.entries[offset..offset + BOOK_ID_LENGTH].copy_from_slice(id);
        self.count = (len + 1) as u8;
        debug!("Book added, {} borrowed", self.count);
        Ok(Response::ok())
    }

    /// GET BORROWED BOOKS: `count || id(8) * count`
    pub fn response(&self) -> Response {
        let live = &self.entries[..self.len() * BOOK_ID_LENGTH];
        let mut data = Vec::with_capacity(1 + live.len());
        data.push(self.count());
        data.extend_from_slice(live);
        Response::success(data)
    }

    /// RETURN BOOK: `id(8)`, removes the first matching entry
    pub fn return_book(&mut self, session: &SecurityState, data: &[u8]) -> CardResult {
        session.require_validated()?;
        let id = Self::book_id(data)?;

        let len = self.len();
        let index = self
            .ids()
            .position(|entry| entry == id)
            .ok_or(CardError::NotFound)?;

        let start = index * BOOK_ID_LENGTH;
        let end = len * BOOK_ID_LENGTH;
        self.entries.copy_within(start + BOOK_ID_LENGTH..end, start);
        self.entries[end - BOOK_ID_LENGTH..end].fill(0);
        self.count = (len - 1) as u8;
        debug!("Book returned, {} borrowed", self.count);
        Ok(Response::ok())
    }

    fn book_id(data: &[u8]) -> Result<&[u8], CardError> {
        if data.len() == BOOK_ID_LENGTH {
            Ok(data)
        } else {
            Err(CardError::WrongLength)
        }
    }
}

impl Default for BookManager {
    fn default() -> Self {
        Self::new()
    }
}
