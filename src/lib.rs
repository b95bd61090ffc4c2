//! Client for a résumé/ATS analysis service: typed operations over a
//! pluggable transport, error classification, a caching request
//! orchestrator and connectivity diagnostics.

pub mod cli;
pub mod config;
pub mod core;
pub mod types;
pub mod utils;

pub use config::ClientConfig;
pub use crate::core::{
    classify, AnalysisSession, ClassifiedError, ConnectionProber, ConnectionTestResult, Endpoint,
    ErrorKind, HttpTransport, ResumeAnalysisApi, ServiceClient, Transport, TransportError,
};
pub use types::{AnalysisResult, Envelope, HealthStatus, HistoryEntry, ResumeFile, UploadReceipt};
