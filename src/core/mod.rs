// src/core/mod.rs
//! Core services: transport, error classification, typed operations and the
//! request orchestrator built on them

pub mod classifier;
pub mod operations;
pub mod orchestrator;
pub mod prober;
pub mod service_client;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{classify, classify_error, ClassifiedError, ErrorKind, TransportError};
pub use operations::{Endpoint, ResumeAnalysisApi};
pub use orchestrator::{Mutation, OperationState, Outcome, Phase, Query, QueryPolicy};
pub use prober::{ConnectionProber, ConnectionTestResult};
pub use service_client::ServiceClient;
pub use session::{AnalysisSession, HealthIndicator, HealthSnapshot, SessionPolicies};
pub use transport::{ApiRequest, HttpTransport, Method, RequestBody, Transport, TransportResponse};
