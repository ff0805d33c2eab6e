//! Entry codec: values travel to both tiers as JSON text.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value into the text blob stored in L1 and L2.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// Decodes a stored blob.
pub fn decode<T: DeserializeOwned>(blob: &str) -> serde_json::Result<T> {
    serde_json::from_str(blob)
}
