//! APDU Response handling
//!
//! A Response is the data the applet wrote into the command buffer plus the
//! two status bytes that terminate every answer.

use super::status::SW;

/// A smartcard response: `[DATA...][SW1][SW2]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data (without status words)
    pub data: Vec<u8>,
    /// Status word 1 (SW1)
    pub sw1: u8,
    /// Status word 2 (SW2)
    pub sw2: u8,
}

impl Response {
    /// Create a new response with data and status word
    pub fn new(data: Vec<u8>, sw: u16) -> Self {
        let [sw1, sw2] = SW::to_bytes(sw);
        Self { data, sw1, sw2 }
    }

    /// Create a success response (0x9000) with data
    pub fn success(data: Vec<u8>) -> Self {
        Self::new(data, SW::SUCCESS)
    }

    /// Create an empty success response (0x9000)
    pub fn ok() -> Self {
        Self::success(Vec::new())
    }

    /// Create a single-byte success response
    pub fn byte(value: u8) -> Self {
        Self::success(vec![value])
    }

    /// Create an error response (no data)
    pub fn error(sw: u16) -> Self {
        Self::new(Vec::new(), sw)
    }

    /// Check if the response is 0x9000
    pub fn is_okay(&self) -> bool {
        SW::is_success(self.sw())
    }

    /// Get the combined status word as u16
    pub fn sw(&self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    /// Convert to raw bytes for transmission (data + SW1 + SW2)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.data.len() + 2);
        result.extend_from_slice(&self.data);
        result.push(self.sw1);
        result.push(self.sw2);
        result
    }

    /// Parse raw response bytes (as seen by a host) back into a Response
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        let split = raw.len().checked_sub(2)?;
        Some(Self {
            data: raw[..split].to_vec(),
            sw1: raw[split],
            sw2: raw[split + 1],
        })
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

impl From<u16> for Response {
    /// Create an error response from a status word
    fn from(sw: u16) -> Self {
        Self::error(sw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response() {
        let resp = Response::success(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(resp.is_okay());
        assert_eq!(resp.sw(), 0x9000);
        assert_eq!(resp.to_bytes(), vec![0xDE, 0xAD, 0xBE, 0xEF, 0x90, 0x00]);
    }

    #[test]
    fn test_byte_response() {
        let resp = Response::byte(0x01);
        assert_eq!(resp.to_bytes(), vec![0x01, 0x90, 0x00]);
    }

    #[test]
    fn test_error_response() {
        let resp = Response::error(SW::SECURITY_STATUS_NOT_SATISFIED);
        assert!(!resp.is_okay());
        assert!(resp.data.is_empty());
        assert_eq!(resp.to_bytes(), vec![0x69, 0x82]);
    }

    #[test]
    fn test_from_bytes() {
        let resp = Response::from_bytes(&[0x00, 0x02, 0x90, 0x00]).unwrap();
        assert_eq!(resp.data, vec![0x00, 0x02]);
        assert!(resp.is_okay());
        assert!(Response::from_bytes(&[0x90]).is_none());
    }

    #[test]
    fn test_from_sw() {
        let resp: Response = 0x6A82.into();
        assert_eq!(resp.sw(), SW::FILE_NOT_FOUND);
    }
}
