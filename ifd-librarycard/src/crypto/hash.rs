//! Hash Operations
//!
//! SHA-1 digests and the ASN.1 DigestInfo prefix that PKCS#1 v1.5 embeds in
//! front of them, plus SHA-256 for PINs at rest.

use digest::Digest;
use sha1::Sha1;
use sha2::Sha256;

/// Length of a SHA-1 digest in bytes
pub const SHA1_OUTPUT_SIZE: usize = 20;
/// Length of a SHA-256 digest in bytes
pub const SHA256_OUTPUT_SIZE: usize = 32;

/// DigestInfo prefix for SHA-1: `SEQUENCE { AlgorithmIdentifier(1.3.14.3.2.26, NULL), OCTET STRING(20) }`
pub const SHA1_DIGEST_INFO: [u8; 15] = [
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x1A, 0x05, 0x00, 0x04, 0x14,
];

/// Hash Operations
pub struct HashOperations;

impl HashOperations {
    /// Compute SHA-1 hash
    pub fn sha1(data: &[u8]) -> [u8; SHA1_OUTPUT_SIZE] {
        let mut hasher = Sha1::new();
        hasher.update(data);
        let mut out = [0u8; SHA1_OUTPUT_SIZE];
        out.copy_from_slice(&hasher.finalize());
        out
    }

    /// Compute SHA-256 hash
    pub fn sha256(data: &[u8]) -> [u8; SHA256_OUTPUT_SIZE] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let mut out = [0u8; SHA256_OUTPUT_SIZE];
        out.copy_from_slice(&hasher.finalize());
        out
    }

    /// DigestInfo(SHA-1) || hash, the `T` value of EMSA-PKCS1-v1_5
    pub fn sha1_digest_info(hash: &[u8; SHA1_OUTPUT_SIZE]) -> [u8; 35] {
        let mut t = [0u8; 35];
        t[..SHA1_DIGEST_INFO.len()].copy_from_slice(&SHA1_DIGEST_INFO);
        t[SHA1_DIGEST_INFO.len()..].copy_from_slice(hash);
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_known_value() {
        // SHA-1("abc") = a9993e364706816aba3e25717850c26c9cd0d89d
        let hash = HashOperations::sha1(b"abc");
        assert_eq!(hex::encode(hash), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_sha256_known_value() {
        let hash = HashOperations::sha256(b"abc");
        assert_eq!(
            hex::encode(hash),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_info_layout() {
        let hash = HashOperations::sha1(b"");
        let t = HashOperations::sha1_digest_info(&hash);
        assert_eq!(&t[..15], &SHA1_DIGEST_INFO);
        assert_eq!(&t[15..], &hash);
        // The DigestInfo announces a 20-byte octet string
        assert_eq!(SHA1_DIGEST_INFO[14] as usize, SHA1_OUTPUT_SIZE);
    }
}
