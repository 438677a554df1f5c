//! Codec for encoding and decoding EchoChat envelopes.
//!
//! Envelopes travel as UTF-8 JSON text, one envelope per transport message.

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

use crate::envelope::{Request, Response, Status};

/// Maximum envelope size (1 MiB).
pub const MAX_ENVELOPE_SIZE: usize = 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Envelope exceeds maximum size.
    #[error("Envelope size {size} exceeds maximum {max}")]
    EnvelopeTooLarge { size: usize, max: usize },

    /// Payload is not well-formed JSON of the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response lacks the `status` field.
    #[error("Envelope has no status field")]
    MissingStatus,

    /// `data` does not match the shape documented for its operation.
    #[error("Invalid envelope data: {0}")]
    InvalidData(String),
}

/// Response as it arrives, before the status requirement is checked.
#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

fn check_size(size: usize, max: usize) -> Result<(), ProtocolError> {
    if size > max {
        return Err(ProtocolError::EnvelopeTooLarge { size, max });
    }
    Ok(())
}

/// Encode a request to bytes.
///
/// # Errors
///
/// Returns an error if the envelope is too large or encoding fails.
pub fn encode(request: &Request) -> Result<Bytes, ProtocolError> {
    EnvelopeCodec::default().encode(request)
}

/// Decode a response from bytes.
///
/// # Errors
///
/// Returns an error if the payload is not a JSON object, has no `status`, or
/// is too large.
pub fn decode(data: &[u8]) -> Result<Response, ProtocolError> {
    EnvelopeCodec::default().decode(data)
}

/// Encode a response, as a server would.
///
/// # Errors
///
/// Returns an error if the envelope is too large or encoding fails.
pub fn encode_response(response: &Response) -> Result<Bytes, ProtocolError> {
    let payload = serde_json::to_vec(response)?;
    check_size(payload.len(), MAX_ENVELOPE_SIZE)?;
    Ok(Bytes::from(payload))
}

/// Decode a request, as a server would.
///
/// # Errors
///
/// Returns an error if the payload is not a valid request envelope.
pub fn decode_request(data: &[u8]) -> Result<Request, ProtocolError> {
    check_size(data.len(), MAX_ENVELOPE_SIZE)?;
    Ok(serde_json::from_slice(data)?)
}

/// Envelope codec with a configurable size limit.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    max_size: usize,
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self {
            max_size: MAX_ENVELOPE_SIZE,
        }
    }
}

impl EnvelopeCodec {
    /// Create a new codec instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with a custom size limit.
    #[must_use]
    pub fn with_max_size(max_size: usize) -> Self {
        Self { max_size }
    }

    /// The size limit in bytes.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Encode a request to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope is too large or encoding fails.
    pub fn encode(&self, request: &Request) -> Result<Bytes, ProtocolError> {
        let payload = serde_json::to_vec(request)?;
        check_size(payload.len(), self.max_size)?;
        Ok(Bytes::from(payload))
    }

    /// Decode a response from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode(&self, data: &[u8]) -> Result<Response, ProtocolError> {
        check_size(data.len(), self.max_size)?;

        let raw: RawResponse = serde_json::from_slice(data)?;
        let status = raw.status.ok_or(ProtocolError::MissingStatus)?;

        Ok(Response {
            id: raw.id.as_ref().and_then(serde_json::Value::as_u64),
            status: Status::from(status),
            function: raw.function,
            data: raw.data,
            // The reference server sends `"error": ""` on success.
            error: raw.error.filter(|e| !e.is_empty()),
        })
    }
}
