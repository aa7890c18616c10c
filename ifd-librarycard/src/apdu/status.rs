//! Status words returned by the library card
//!
//! Only the ISO 7816-4 codes the applet actually emits are listed here. The
//! private `6Axx` diagnostic range of the signing path lives with
//! [`SignError`](crate::library::SignError).

/// Status Word constants
pub struct SW;

impl SW {
    pub const SUCCESS: u16 = 0x9000;

    pub const WRONG_LENGTH: u16 = 0x6700;

    pub const COMMAND_NOT_ALLOWED: u16 = 0x6900;
    pub const SECURITY_STATUS_NOT_SATISFIED: u16 = 0x6982;
    pub const CONDITIONS_NOT_SATISFIED: u16 = 0x6985;

    pub const FILE_NOT_FOUND: u16 = 0x6A82;
    /// ISO "not enough memory in the file", which Java Card names `SW_FILE_FULL`
    pub const FILE_FULL: u16 = 0x6A84;

    pub const WRONG_P1_P2: u16 = 0x6B00;
    pub const INS_NOT_SUPPORTED: u16 = 0x6D00;
    pub const UNKNOWN: u16 = 0x6F00;

    /// Split a status word into its SW1/SW2 bytes
    #[inline]
    pub fn to_bytes(sw: u16) -> [u8; 2] {
        sw.to_be_bytes()
    }

    /// Check if a status word indicates success
    #[inline]
    pub fn is_success(sw: u16) -> bool {
        sw == Self::SUCCESS
    }

    /// Check if a status word belongs to the private signing diagnostic range
    #[inline]
    pub fn is_signing_diagnostic(sw: u16) -> bool {
        (sw & 0xFF00) == 0x6A00 && (sw & 0x00FF) < 0x30
            && !matches!(sw, Self::FILE_NOT_FOUND | Self::FILE_FULL)
    }
}
