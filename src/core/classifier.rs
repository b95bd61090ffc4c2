// src/core/classifier.rs
//! Raw transport failures and their mapping onto user-facing error kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Failure raised by the transport client before any interpretation
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportError {
    /// The request never produced an HTTP response (refused, DNS, reset, timeout)
    #[error("Failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },

    /// The service answered with a non-2xx status
    #[error("HTTP error! status: {status}")]
    Status { status: u16, url: String },

    /// The service answered 2xx but the body is not a valid envelope
    #[error("Unexpected response from {url}: {reason}")]
    Protocol {
        url: String,
        reason: String,
        body: Option<String>,
    },

    /// The request could not be built or sent for another reason
    #[error("{message}")]
    Other { message: String },
}

impl TransportError {
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn status(status: u16, url: impl Into<String>) -> Self {
        Self::Status {
            status,
            url: url.into(),
        }
    }

    pub fn protocol(url: impl Into<String>, reason: impl Into<String>, body: Option<String>) -> Self {
        Self::Protocol {
            url: url.into(),
            reason: reason.into(),
            body,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::from_reqwest(&e)
    }
}

impl TransportError {
    pub(crate) fn from_reqwest(e: &reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();

        if e.is_connect() || e.is_timeout() || e.is_request() {
            Self::network(url, e.to_string())
        } else if let Some(status) = e.status() {
            Self::status(status.as_u16(), url)
        } else if e.is_decode() {
            Self::protocol(url, e.to_string(), None)
        } else {
            Self::other(e.to_string())
        }
    }
}

// ===== Classified errors =====

/// Closed set of error kinds shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NetworkError,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    FileTooLarge,
    InvalidFileFormat,
    RateLimited,
    ServerError,
    ServiceUnavailable,
    HttpError,
    UnknownError,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::InvalidFileFormat => "INVALID_FILE_FORMAT",
            Self::RateLimited => "RATE_LIMITED",
            Self::ServerError => "SERVER_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::HttpError => "HTTP_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct ClassifiedError {
    pub message: String,
    pub kind: ErrorKind,
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<TransportError>,
}

impl ClassifiedError {
    fn new(kind: ErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            status,
            details: None,
        }
    }

    /// Failures worth an automatic retry: the request may succeed unchanged
    pub fn is_transient(&self) -> bool {
        match self.kind {
            ErrorKind::NetworkError
            | ErrorKind::RateLimited
            | ErrorKind::ServerError
            | ErrorKind::ServiceUnavailable => true,
            ErrorKind::HttpError => self.status.is_some_and(|s| s >= 500),
            _ => false,
        }
    }
}

impl From<TransportError> for ClassifiedError {
    fn from(raw: TransportError) -> Self {
        classify(&raw)
    }
}

const NETWORK_MESSAGE: &str =
    "Unable to connect to the backend server. Please ensure the server is running.";
const FALLBACK_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Map a raw failure onto the closed error taxonomy. Never fails.
pub fn classify(raw: &TransportError) -> ClassifiedError {
    let unreachable = match raw {
        TransportError::Network { .. } => true,
        TransportError::Other { message } => is_network_failure_message(message),
        _ => false,
    };
    if unreachable {
        return ClassifiedError::new(ErrorKind::NetworkError, Some(0), NETWORK_MESSAGE);
    }

    if let Some(status) = raw.status_code() {
        return classify_status(status);
    }

    let message = raw.to_string();
    let message = if message.trim().is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        message
    };

    ClassifiedError {
        message,
        kind: ErrorKind::UnknownError,
        status: None,
        details: Some(raw.clone()),
    }
}

fn classify_status(status: u16) -> ClassifiedError {
    let (kind, message) = match status {
        400 => (
            ErrorKind::BadRequest,
            "Invalid request. Please check your input and try again.",
        ),
        401 => (
            ErrorKind::Unauthorized,
            "Authentication required. Please log in and try again.",
        ),
        403 => (
            ErrorKind::Forbidden,
            "Access denied. You do not have permission to perform this action.",
        ),
        404 => (ErrorKind::NotFound, "The requested resource was not found."),
        413 => (
            ErrorKind::FileTooLarge,
            "File size too large. Please upload a smaller file (max 5MB).",
        ),
        422 => (
            ErrorKind::InvalidFileFormat,
            "Invalid file format. Please upload a PDF or DOCX file.",
        ),
        429 => (
            ErrorKind::RateLimited,
            "Too many requests. Please wait a moment before trying again.",
        ),
        500 => (ErrorKind::ServerError, "Server error. Please try again later."),
        503 => (
            ErrorKind::ServiceUnavailable,
            "Service temporarily unavailable. Please try again later.",
        ),
        other => {
            return ClassifiedError::new(
                ErrorKind::HttpError,
                Some(other),
                format!("Request failed with status {}", other),
            )
        }
    };

    ClassifiedError::new(kind, Some(status), message)
}

/// Classify any error by searching its source chain for a transport failure
pub fn classify_error(error: &(dyn std::error::Error + 'static)) -> ClassifiedError {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);

    while let Some(e) = current {
        if let Some(raw) = e.downcast_ref::<TransportError>() {
            return classify(raw);
        }
        if let Some(classified) = e.downcast_ref::<ClassifiedError>() {
            return classified.clone();
        }
        if let Some(req) = e.downcast_ref::<reqwest::Error>() {
            return classify(&TransportError::from_reqwest(req));
        }
        if let Some(io) = e.downcast_ref::<io::Error>() {
            if is_network_io_kind(io.kind()) {
                return classify(&TransportError::network(String::new(), io.to_string()));
            }
        }
        current = e.source();
    }

    classify(&TransportError::other(error.to_string()))
}

/// Whether a status-less failure message reads like a request that never
/// reached the service
pub fn is_network_failure_message(message: &str) -> bool {
    let message = message.to_lowercase();
    NETWORK_SIGNATURES.iter().any(|sig| message.contains(sig))
}

const NETWORK_SIGNATURES: &[&str] = &["fetch", "connection refused"];

fn is_network_io_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::TimedOut
    )
}

/// The human-readable message for a raw failure
pub fn user_message(raw: &TransportError) -> String {
    classify(raw).message
}
