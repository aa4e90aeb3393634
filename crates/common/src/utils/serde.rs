//! Serialization utilities for common data types

use serde::{Deserialize, Deserializer, Serializer};

/// Custom serialization module for raw bytes as standard base64 text
///
/// Response bodies are opaque bytes but the persisted cache blob is JSON, so
/// bodies are stored as base64 strings.
///
/// # Usage
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use tether_common::base64_bytes;
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "base64_bytes")]
///     body: Vec<u8>,
/// }
/// ```
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    use super::*;

    /// Serde serialization result type
    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Serialize bytes as a base64 string
    pub fn serialize<S>(bytes: &[u8], serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    /// Deserialize a base64 string into bytes
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}
