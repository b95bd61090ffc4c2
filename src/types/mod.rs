// src/types/mod.rs
pub mod analysis;
pub mod response;

pub use analysis::{
    AnalysisRequest, AnalysisResult, DetailedAnalysis, HealthStatus, HistoryEntry, ResumeFile,
    UploadReceipt,
};
pub use response::{Envelope, EnvelopeError};
