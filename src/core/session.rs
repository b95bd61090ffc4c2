// src/core/session.rs
//! One consumer session: the four service operations bound to their
//! orchestrator slots

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Duration;

use crate::config::ClientConfig;
use crate::core::classifier::ClassifiedError;
use crate::core::operations::ResumeAnalysisApi;
use crate::core::orchestrator::{Mutation, Outcome, Phase, Query, QueryPolicy};
use crate::core::transport::{HttpTransport, Transport};
use crate::types::{
    AnalysisRequest, AnalysisResult, HealthStatus, HistoryEntry, ResumeFile, UploadReceipt,
};

pub const HEALTH_QUERY_KEY: &str = "backendHealth";
pub const HISTORY_QUERY_KEY: &str = "analysisHistory";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicies {
    pub health: QueryPolicy,
    pub history: QueryPolicy,
}

impl Default for SessionPolicies {
    fn default() -> Self {
        Self {
            health: QueryPolicy::new(Duration::from_secs(30)).with_retry(1, Duration::from_secs(1)),
            history: QueryPolicy::new(Duration::from_secs(5 * 60)),
        }
    }
}

impl SessionPolicies {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            health: QueryPolicy::new(config.health_stale_time())
                .with_retry(config.health_retries, config.retry_delay()),
            history: QueryPolicy::new(config.history_stale_time()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub success: bool,
    pub last_checked_at: DateTime<Utc>,
}

/// Persistent backend status, as opposed to one-shot mutation failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthIndicator {
    Unknown,
    Checking,
    Online,
    Offline(String),
}

pub struct AnalysisSession<T = HttpTransport> {
    api: ResumeAnalysisApi<T>,
    health: Query<HealthStatus>,
    history: Query<Vec<HistoryEntry>>,
    analyze: Mutation<AnalysisRequest, AnalysisResult>,
    upload: Mutation<ResumeFile, UploadReceipt>,
}

impl<T: Transport> AnalysisSession<T> {
    pub fn new(api: ResumeAnalysisApi<T>, policies: SessionPolicies) -> Self {
        let health = {
            let api = api.clone();
            Query::new(HEALTH_QUERY_KEY, policies.health, move || {
                let api = api.clone();
                async move { api.check_health().await }
            })
        };

        let history = {
            let api = api.clone();
            Query::new(HISTORY_QUERY_KEY, policies.history, move || {
                let api = api.clone();
                async move { api.history().await }
            })
        };

        let analyze = {
            let api = api.clone();
            Mutation::new("analyze", move |request: AnalysisRequest| {
                let api = api.clone();
                async move {
                    api.analyze(request.job_description, request.resume_file)
                        .await
                }
            })
        };

        let upload = {
            let api = api.clone();
            Mutation::new("upload", move |file: ResumeFile| {
                let api = api.clone();
                async move { api.upload(file).await }
            })
        };

        Self {
            api,
            health,
            history,
            analyze,
            upload,
        }
    }

    pub fn api(&self) -> &ResumeAnalysisApi<T> {
        &self.api
    }

    pub fn health_query(&self) -> &Query<HealthStatus> {
        &self.health
    }

    pub fn history_query(&self) -> &Query<Vec<HistoryEntry>> {
        &self.history
    }

    pub fn analyze_mutation(&self) -> &Mutation<AnalysisRequest, AnalysisResult> {
        &self.analyze
    }

    pub fn upload_mutation(&self) -> &Mutation<ResumeFile, UploadReceipt> {
        &self.upload
    }

    pub async fn check_health(&self) -> Outcome<HealthStatus> {
        self.health.fetch().await
    }

    pub async fn history(&self) -> Outcome<Vec<HistoryEntry>> {
        self.history.fetch().await
    }

    pub async fn analyze(
        &self,
        job_description: impl Into<String>,
        resume_file: ResumeFile,
    ) -> Outcome<AnalysisResult> {
        self.analyze
            .mutate(AnalysisRequest::new(job_description, resume_file))
            .await
    }

    pub async fn upload(&self, file: ResumeFile) -> Outcome<UploadReceipt> {
        self.upload.mutate(file).await
    }

    /// Health as last observed, without touching the network
    pub fn health_snapshot(&self) -> Option<HealthSnapshot> {
        let state = self.health.state();
        let last_checked_at = state.updated_at?;

        let success = state.phase != Phase::Error
            && state.data.as_ref().is_some_and(|e| e.is_success());

        Some(HealthSnapshot {
            success,
            last_checked_at,
        })
    }

    /// Health snapshot, re-checking the backend once the cached one expired
    pub async fn current_health(&self) -> Result<HealthSnapshot, ClassifiedError> {
        let envelope = self.health.fetch().await?;

        Ok(self.health_snapshot().unwrap_or_else(|| HealthSnapshot {
            success: envelope.is_success(),
            last_checked_at: Utc::now(),
        }))
    }

    pub fn health_indicator(&self) -> HealthIndicator {
        let state = self.health.state();

        match state.phase {
            Phase::Idle => HealthIndicator::Unknown,
            Phase::Pending => match state.data {
                Some(envelope) if envelope.is_success() => HealthIndicator::Online,
                _ => HealthIndicator::Checking,
            },
            Phase::Success => match state.data {
                Some(envelope) if envelope.is_success() => HealthIndicator::Online,
                Some(envelope) => HealthIndicator::Offline(
                    envelope
                        .error()
                        .or(envelope.message())
                        .unwrap_or("Backend reported an unhealthy status")
                        .to_string(),
                ),
                None => HealthIndicator::Unknown,
            },
            Phase::Error => HealthIndicator::Offline(
                state
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "Backend unreachable".to_string()),
            ),
        }
    }
}

impl AnalysisSession<HttpTransport> {
    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let client = crate::core::ServiceClient::from_config(config)?;
        Ok(Self::new(
            ResumeAnalysisApi::new(client),
            SessionPolicies::from_config(config),
        ))
    }
}
