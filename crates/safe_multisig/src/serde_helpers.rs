//! Serde helpers for the loosely typed numbers the transaction service emits.
//!
//! Depending on the endpoint and service version, integers arrive either as JSON
//! numbers or as decimal strings, and empty calldata arrives as `null`.

/// `U256` encoded as a decimal string, decoded from a string (decimal or `0x` hex)
/// or a JSON number.
///
/// Use with `#[serde(with = "crate::serde_helpers::u256_dec")]`.
pub mod u256_dec {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(U256::from(n)),
            NumberOrString::String(s) => U256::from_str(s.trim()).map_err(serde::de::Error::custom),
        }
    }
}

/// `u64` decoded from a string or a JSON number.
pub mod u64_loose {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Hex bytes where `null` or a missing field means empty calldata.
pub mod nullable_bytes {
    use alloy_primitives::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_empty() {
            serializer.serialize_none()
        } else {
            serializer.serialize_str(&value.to_string())
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Bytes>::deserialize(deserializer)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, U256};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Numbers {
        #[serde(with = "u256_dec")]
        value: U256,
        #[serde(deserialize_with = "u64_loose::deserialize")]
        nonce: u64,
        #[serde(with = "nullable_bytes", default)]
        data: Bytes,
    }

    #[test]
    fn accepts_strings_and_numbers() {
        let a: Numbers =
            serde_json::from_str(r#"{"value": "1000000000000000000", "nonce": "7", "data": null}"#)
                .unwrap();
        let b: Numbers =
            serde_json::from_str(r#"{"value": 1000000000000000000, "nonce": 7}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.value, U256::from(10u64).pow(U256::from(18)));
        assert!(a.data.is_empty());
    }

    #[test]
    fn accepts_hex_strings() {
        let n: Numbers =
            serde_json::from_str(r#"{"value": "0x10", "nonce": 1, "data": "0x1234"}"#).unwrap();
        assert_eq!(n.value, U256::from(16));
        assert_eq!(n.data, Bytes::from(vec![0x12, 0x34]));
    }

    #[test]
    fn serializes_value_as_decimal_string() {
        let n = Numbers { value: U256::from(42), nonce: 1, data: Bytes::new() };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["value"], "42");
        assert!(json["data"].is_null());
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Numbers>(r#"{"value": "ten", "nonce": 1}"#).is_err());
    }
}
