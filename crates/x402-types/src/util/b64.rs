//! Base64 encoding and decoding utilities.
//!
//! Both x402 payment headers are base64 encoded JSON documents. [`Base64Bytes`]
//! wraps the encoded form and knows how to go to and from JSON.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::fmt::Display;

/// A wrapper for base64-encoded byte data.
///
/// # Example
///
/// ```rust
/// use x402_types::util::Base64Bytes;
///
/// let encoded = Base64Bytes::encode(b"hello world");
/// assert_eq!(encoded.to_string(), "aGVsbG8gd29ybGQ=");
///
/// let decoded = encoded.decode().unwrap();
/// assert_eq!(decoded, b"hello world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes<'a>(pub Cow<'a, [u8]>);

/// Failure to read a base64 JSON document.
#[derive(Debug, thiserror::Error)]
pub enum Base64JsonError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Base64Bytes<'_> {
    /// Decodes the base64 string bytes to raw binary data.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Encodes raw binary data into base64 string bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Base64Bytes<'static> {
        let encoded = b64.encode(input.as_ref());
        Base64Bytes(Cow::Owned(encoded.into_bytes()))
    }

    /// Serializes `value` to JSON, then base64 encodes it.
    pub fn encode_json<T: Serialize>(value: &T) -> Result<Base64Bytes<'static>, serde_json::Error> {
        let json = serde_json::to_vec(value)?;
        Ok(Self::encode(json))
    }

    /// Reverse of [`Base64Bytes::encode_json`].
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, Base64JsonError> {
        let bytes = self.decode()?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl AsRef<[u8]> for Base64Bytes<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<'a> From<&'a [u8]> for Base64Bytes<'a> {
    fn from(slice: &'a [u8]) -> Self {
        Base64Bytes(Cow::Borrowed(slice))
    }
}

impl<'a> From<&'a str> for Base64Bytes<'a> {
    fn from(value: &'a str) -> Self {
        Base64Bytes(Cow::Borrowed(value.trim().as_bytes()))
    }
}

impl Display for Base64Bytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.0.as_ref()))
    }
}
