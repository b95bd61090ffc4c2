// src/types/response.rs
//! Uniform response envelope returned by every analysis service endpoint

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `{ success, data, message?, error? }` where `data` is present iff `success`.
///
/// Fields are private so the invariant holds for every value in the
/// program, including ones deserialized from the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope<T>")]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Envelope as it appears on the wire, before the invariant is checked
#[derive(Debug, Deserialize)]
struct RawEnvelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("envelope reports success but carries no data")]
    MissingData,

    #[error("envelope reports failure but carries data")]
    UnexpectedData,
}

impl<T> TryFrom<RawEnvelope<T>> for Envelope<T> {
    type Error = EnvelopeError;

    fn try_from(raw: RawEnvelope<T>) -> Result<Self, Self::Error> {
        match (raw.success, raw.data.is_some()) {
            (true, false) => Err(EnvelopeError::MissingData),
            (false, true) => Err(EnvelopeError::UnexpectedData),
            _ => Ok(Self {
                success: raw.success,
                data: raw.data,
                message: raw.message,
                error: raw.error,
            }),
        }
    }
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Transform the payload, keeping success and text fields
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            success: self.success,
            data: self.data.map(f),
            message: self.message,
            error: self.error,
        }
    }
}
