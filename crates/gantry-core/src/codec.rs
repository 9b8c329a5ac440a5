//! JSON encoding and decoding.
//!
//! Every structured body in Gantry goes through [`JsonCodec`], so a single
//! place decides formatting and error mapping.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use thiserror::Error;

/// Serialization failure.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be serialized.
    #[error("failed to encode JSON: {0}")]
    Encode(#[source] serde_json::Error),

    /// The input was not valid JSON for the target type.
    #[error("failed to decode JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

/// The JSON codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Encodes a value as compact JSON.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(CodecError::Encode)
    }

    /// Encodes a value as tab-indented JSON.
    pub fn encode_pretty<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(128);
        let mut ser =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"\t"));
        value.serialize(&mut ser).map_err(CodecError::Encode)?;
        Ok(out)
    }

    /// Decodes a value from JSON bytes.
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }

    /// Decodes a value from a JSON string.
    pub fn decode_str<T: DeserializeOwned>(s: &str) -> Result<T, CodecError> {
        serde_json::from_str(s).map_err(CodecError::Decode)
    }
}

/// A string-keyed JSON object.
///
/// Handy for ad-hoc payloads where defining a struct is overkill.
///
/// ```
/// use gantry_core::JsonMap;
///
/// let mut m = JsonMap::new();
/// assert_eq!(m.to_json(false), "{}");
///
/// m.insert("ok", true);
/// assert_eq!(m.to_json(false), r#"{"ok":true}"#);
/// assert_eq!(m.to_json(true), "{\n\t\"ok\": true\n}");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct JsonMap(Map<String, Value>);

impl JsonMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Removes and returns the value for `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders the map as JSON, tab-indented when `indent` is set.
    ///
    /// An empty map always renders as `{}`.
    #[must_use]
    pub fn to_json(&self, indent: bool) -> String {
        if self.0.is_empty() {
            return "{}".to_string();
        }
        let encoded = if indent {
            JsonCodec::encode_pretty(&self.0)
        } else {
            JsonCodec::encode(&self.0)
        };
        // A map of `Value`s with string keys always serializes.
        encoded
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| "{}".to_string())
    }
}

impl From<Map<String, Value>> for JsonMap {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for JsonMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
