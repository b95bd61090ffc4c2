// src/core/operations.rs
//! Typed résumé analysis operations on top of the transport client

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::core::classifier::TransportError;
use crate::core::service_client::ServiceClient;
use crate::core::transport::{FormField, HttpTransport, Method, RequestBody, Transport};
use crate::types::{
    AnalysisResult, Envelope, HealthStatus, HistoryEntry, ResumeFile, UploadReceipt,
};
use crate::utils;

const ANALYZE_ENDPOINT: &str = "/analyze";
const UPLOAD_ENDPOINT: &str = "/upload";
const HISTORY_ENDPOINT: &str = "/history";
const HEALTH_ENDPOINT: &str = "/health";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Health,
    Analyze,
    Upload,
    History,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Health => HEALTH_ENDPOINT,
            Self::Analyze => ANALYZE_ENDPOINT,
            Self::Upload => UPLOAD_ENDPOINT,
            Self::History => HISTORY_ENDPOINT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Analyze => "analyze",
            Self::Upload => "upload",
            Self::History => "history",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The four service operations. Inputs are not validated here; the service
/// rejects bad input and the rejection is classified like any other failure.
pub struct ResumeAnalysisApi<T = HttpTransport> {
    client: Arc<ServiceClient<T>>,
}

impl<T> Clone for ResumeAnalysisApi<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<T: Transport> ResumeAnalysisApi<T> {
    pub fn new(client: ServiceClient<T>) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn from_shared(client: Arc<ServiceClient<T>>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient<T> {
        &self.client
    }

    /// POST `job_description` + `resume` as multipart to `/analyze`
    pub async fn analyze(
        &self,
        job_description: impl Into<String>,
        resume_file: ResumeFile,
    ) -> Result<Envelope<AnalysisResult>, TransportError> {
        info!(
            "Requesting analysis of {} ({} bytes)",
            resume_file.file_name,
            resume_file.size()
        );

        let body = RequestBody::Multipart(vec![
            FormField::text("job_description", job_description),
            FormField::file("resume", resume_file),
        ]);

        let envelope: Envelope<AnalysisResult> = self
            .client
            .call(ANALYZE_ENDPOINT, Method::Post, body)
            .await?;

        if let Some(result) = envelope.data() {
            result.validate().map_err(|reason| {
                TransportError::protocol(
                    utils::join_url(self.client.base_url(), ANALYZE_ENDPOINT),
                    reason,
                    None,
                )
            })?;
        }

        Ok(envelope)
    }

    /// POST `file` as multipart to `/upload`
    pub async fn upload(
        &self,
        file: ResumeFile,
    ) -> Result<Envelope<UploadReceipt>, TransportError> {
        info!("Uploading {} ({} bytes)", file.file_name, file.size());

        let body = RequestBody::Multipart(vec![FormField::file("file", file)]);
        self.client.call(UPLOAD_ENDPOINT, Method::Post, body).await
    }

    pub async fn history(&self) -> Result<Envelope<Vec<HistoryEntry>>, TransportError> {
        self.client
            .call(HISTORY_ENDPOINT, Method::Get, RequestBody::Empty)
            .await
    }

    pub async fn check_health(&self) -> Result<Envelope<HealthStatus>, TransportError> {
        self.client
            .call(HEALTH_ENDPOINT, Method::Get, RequestBody::Empty)
            .await
    }

    /// Non-mutating existence check; returns the HTTP status of the answer
    pub async fn preflight(&self, endpoint: Endpoint) -> Result<u16, TransportError> {
        self.client.preflight(endpoint.path()).await
    }
}
