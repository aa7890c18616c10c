//! APDU (Application Protocol Data Unit) handling
//!
//! Commands arrive as `[CLA][INS][P1][P2][LC][DATA...]` and leave as
//! `[DATA...][SW1][SW2]`. The parser accepts the four ISO 7816-4 cases in both
//! short and extended form; the library applet itself only ever needs short
//! commands, but PC/SC middleware happily sends extended Le.
//!
//! # Example
//! ```
//! use ifd_librarycard::apdu::{ins, parse_apdu};
//!
//! let apdu = parse_apdu(&[0x00, 0x20, 0x00, 0x00, 0x05, 0x04, b'1', b'2', b'3', b'4']).unwrap();
//! assert_eq!(apdu.ins, ins::VERIFY_PIN);
//! assert_eq!(apdu.data, vec![0x04, b'1', b'2', b'3', b'4']);
//! ```

mod response;
mod status;

pub use response::Response;
pub use status::SW;

use thiserror::Error;

/// Errors that can occur during APDU parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum APDUError {
    #[error("APDU too short: expected at least 4 bytes, got {0}")]
    TooShort(usize),

    #[error("Lc/Le do not match the APDU length")]
    InvalidLength,

    #[error("Invalid extended APDU format")]
    InvalidExtendedFormat,
}

/// A parsed APDU command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct APDU {
    /// Class byte (CLA)
    pub cla: u8,
    /// Instruction byte (INS), the operation selector
    pub ins: u8,
    /// Parameter 1 (P1)
    pub p1: u8,
    /// Parameter 2 (P2)
    pub p2: u8,
    /// Command data (may be empty)
    pub data: Vec<u8>,
    /// Expected response length (Le), None if not specified
    pub le: Option<u32>,
}

impl APDU {
    /// Create a new APDU with just the header (CLA, INS, P1, P2)
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self::with_data(cla, ins, p1, p2, Vec::new())
    }

    /// Create a new APDU with data
    pub fn with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self { cla, ins, p1, p2, data, le: None }
    }

    /// Encode as a short APDU (`CLA INS P1 P2 [Lc Data]`), the form host tools send
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.cla, self.ins, self.p1, self.p2];
        if !self.data.is_empty() {
            out.push(self.data.len() as u8);
            out.extend_from_slice(&self.data);
        }
        if let Some(le) = self.le {
            out.push(if le >= 256 { 0x00 } else { le as u8 });
        }
        out
    }

    fn with_body(header: [u8; 4], data: &[u8], le: Option<u32>) -> Self {
        let [cla, ins, p1, p2] = header;
        Self { cla, ins, p1, p2, data: data.to_vec(), le }
    }
}

/// Parse raw bytes into an APDU
///
/// - Short: `CLA INS P1 P2 [Lc Data] [Le]`
/// - Extended: `CLA INS P1 P2 00 Lc1 Lc2 Data [Le1 Le2]` or `CLA INS P1 P2 00 Le1 Le2`
pub fn parse_apdu(raw: &[u8]) -> Result<APDU, APDUError> {
    if raw.len() < 4 {
        return Err(APDUError::TooShort(raw.len()));
    }

    let header = [raw[0], raw[1], raw[2], raw[3]];
    let body = &raw[4..];

    // Case 1
    if body.is_empty() {
        return Ok(APDU::with_body(header, &[], None));
    }

    if body.len() >= 3 && body[0] == 0x00 {
        return parse_extended(header, &body[1..]);
    }

    parse_short(header, body)
}

fn short_le(byte: u8) -> u32 {
    if byte == 0 {
        256
    } else {
        byte as u32
    }
}

fn extended_le(hi: u8, lo: u8) -> u32 {
    match u16::from_be_bytes([hi, lo]) {
        0 => 65536,
        le => le as u32,
    }
}

fn parse_short(header: [u8; 4], body: &[u8]) -> Result<APDU, APDUError> {
    // Case 2S
    if body.len() == 1 {
        return Ok(APDU::with_body(header, &[], Some(short_le(body[0]))));
    }

    let lc = body[0] as usize;
    let data = body.get(1..1 + lc).ok_or(APDUError::InvalidLength)?;
    match body.len() - 1 - lc {
        // Case 3S
        0 => Ok(APDU::with_body(header, data, None)),
        // Case 4S
        1 => Ok(APDU::with_body(header, data, Some(short_le(body[1 + lc])))),
        _ => Err(APDUError::InvalidLength),
    }
}

fn parse_extended(header: [u8; 4], ext: &[u8]) -> Result<APDU, APDUError> {
    // Case 2E
    if ext.len() == 2 {
        return Ok(APDU::with_body(header, &[], Some(extended_le(ext[0], ext[1]))));
    }

    let lc = u16::from_be_bytes([ext[0], ext[1]]) as usize;
    let rest = ext.len() - 2;
    if rest == lc {
        // Case 3E
        return Ok(APDU::with_body(header, &ext[2..], None));
    }
    if rest == lc + 2 {
        // Case 4E
        let le = extended_le(ext[2 + lc], ext[3 + lc]);
        return Ok(APDU::with_body(header, &ext[2..2 + lc], Some(le)));
    }

    // T=1 readers may prefix a short APDU with a lone 00
    parse_short(header, ext).map_err(|_| APDUError::InvalidExtendedFormat)
}

/// Library card instruction bytes
pub mod ins {
    pub const SELECT: u8 = 0xA4;

    // PIN management
    pub const CREATE_PIN: u8 = 0x10;
    pub const VERIFY_PIN: u8 = 0x20;
    pub const CHANGE_PIN: u8 = 0x30;
    pub const GET_PIN_TRIES: u8 = 0x90;
    pub const RESET_PIN: u8 = 0xA0;

    // Card identity
    pub const SET_CARD_INFO: u8 = 0x40;
    pub const GET_CARD_INFO: u8 = 0x50;

    // Borrowed books
    pub const ADD_BORROWED_BOOK: u8 = 0x60;
    pub const GET_BORROWED_BOOKS: u8 = 0x70;
    pub const RETURN_BOOK: u8 = 0x80;

    // RSA challenge-response
    pub const GENERATE_KEYPAIR: u8 = 0xB0;
    pub const GET_PUBLIC_KEY: u8 = 0xB1;
    pub const SIGN_CHALLENGE: u8 = 0xB2;
    pub const RSA_DECRYPT: u8 = 0xB3;

    // Symmetric key material
    pub const SET_SYMMETRIC_KEY: u8 = 0xD0;
    pub const SYMMETRIC_ENCRYPT: u8 = 0xD1;
    pub const SYMMETRIC_DECRYPT: u8 = 0xD2;
}
