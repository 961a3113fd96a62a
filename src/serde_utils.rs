//! Shared serialization utilities for the settlement engine.

/// Serialize a `U256` as a base-10 string and deserialize it back.
///
/// On-chain amounts are persisted the way the contract emits them
/// (decimal strings), not as hex. Use with `#[serde(with = "u256_decimal")]`.
pub mod u256_decimal {
    use alloy::primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

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
        let raw = String::deserialize(deserializer)?;
        raw.parse::<U256>()
            .map_err(|e| de::Error::custom(format!("invalid decimal U256 \"{raw}\": {e}")))
    }
}
