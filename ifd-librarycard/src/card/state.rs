//! Card state data structures
//!
//! Everything the card keeps across power cycles. The PIN session flag is not
//! part of it.

use serde::{Deserialize, Serialize};

use crate::library::{BookManager, CardInfoManager, KeyMaterialManager, PinManager, RsaAuthManager};

/// Custom serde module for base64 encoding of fixed-size buffers
pub(crate) mod base64_array {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let bytes = STANDARD.decode(&s).map_err(de::Error::custom)?;
        <[u8; N]>::try_from(bytes.as_slice())
            .map_err(|_| de::Error::invalid_length(bytes.len(), &"a fixed-size buffer"))
    }
}

/// Custom serde module for an optional RSA private key stored as base64 PKCS#1 DER
pub(crate) mod base64_key {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use rsa::RsaPrivateKey;
    use serde::{de, ser, Deserialize, Deserializer, Serializer};

    use crate::crypto::RsaOperations;

    pub fn serialize<S>(key: &Option<RsaPrivateKey>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match key {
            Some(key) => {
                let der = RsaOperations::encode_private_key(key).map_err(ser::Error::custom)?;
                serializer.serialize_some(&STANDARD.encode(der))
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<RsaPrivateKey>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Deserialize::deserialize(deserializer)?;
        encoded
            .map(|s| {
                let der = STANDARD.decode(&s).map_err(de::Error::custom)?;
                RsaOperations::decode_private_key(&der).map_err(de::Error::custom)
            })
            .transpose()
    }
}

/// Complete persistent card state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CardState {
    pub pin: PinManager,
    pub card_info: CardInfoManager,
    pub books: BookManager,
    pub rsa: RsaAuthManager,
    pub key_material: KeyMaterialManager,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Buffers {
        #[serde(with = "base64_array")]
        small: [u8; 3],
        #[serde(with = "base64_array")]
        large: [u8; 40],
    }

    #[test]
    fn test_base64_array_encoding() {
        let value = Buffers { small: [0x01, 0x00, 0x01], large: [0xAB; 40] };
        let json = serde_json::to_string(&value).unwrap();
        assert!(json.contains("\"small\":\"AQAB\""));
        let back: Buffers = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_base64_array_rejects_wrong_size() {
        let json = r#"{"small":"AQABAQ==","large":""}"#;
        assert!(serde_json::from_str::<Buffers>(json).is_err());
    }

    #[test]
    fn test_missing_sections_default() {
        let state: CardState = serde_json::from_str("{}").unwrap();
        assert!(!state.pin.is_set());
        assert_eq!(state.books.count(), 0);
        assert!(!state.rsa.is_generated());
    }
}
