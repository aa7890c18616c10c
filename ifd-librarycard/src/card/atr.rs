//! ATR (Answer To Reset) handling
//!
//! The virtual library card answers reset as a T=1 card whose historical bytes
//! carry the "LIBRARY" application identity.

use crate::library::LIBRARY_AID;

/// Build an ATR with specific historical bytes
pub fn build_atr(historical_bytes: &[u8]) -> Vec<u8> {
    let hist_len = historical_bytes.len().min(15);
    let mut atr = Vec::with_capacity(hist_len + 4);

    // TS: direct convention
    atr.push(0x3B);
    // T0: TD1 present, K historical bytes
    atr.push(0x80 | hist_len as u8);
    // TD1: T=1, no further interface bytes
    atr.push(0x01);
    atr.extend_from_slice(&historical_bytes[..hist_len]);

    // TCK is required for T=1: XOR of T0 through the last historical byte
    let tck = atr[1..].iter().fold(0u8, |acc, &b| acc ^ b);
    atr.push(tck);
    atr
}

/// ATR of the library card
pub fn library_atr() -> Vec<u8> {
    // Category indicator 0x80 (compact TLV), then the application identifier
    // object: tag 4 in the high nibble, length in the low nibble
    let mut historical = vec![0x80, 0x40 | LIBRARY_AID.len() as u8];
    historical.extend_from_slice(LIBRARY_AID);
    build_atr(&historical)
}
