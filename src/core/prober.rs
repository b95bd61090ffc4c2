// src/core/prober.rs
//! Connectivity diagnostics: probe every endpoint independently and explain
//! why the backend cannot be reached

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use crate::core::classifier::{classify, ClassifiedError, ErrorKind, TransportError};
use crate::core::operations::{Endpoint, ResumeAnalysisApi};
use crate::core::transport::{HttpTransport, Transport};
use crate::utils;

// Statuses meaning the server got the preflight but will not answer OPTIONS
const PREFLIGHT_REJECTED: &[u16] = &[405, 501];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub backend_reachable: bool,
    pub health_check: bool,
    pub api_endpoints: BTreeMap<Endpoint, bool>,
    /// Endpoints that answered but refused the preflight itself
    pub inconclusive: Vec<Endpoint>,
    pub error_messages: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ConnectionTestResult {
    fn new() -> Self {
        let api_endpoints = [Endpoint::Health, Endpoint::Analyze, Endpoint::Upload]
            .into_iter()
            .map(|e| (e, false))
            .collect();

        Self {
            backend_reachable: false,
            health_check: false,
            api_endpoints,
            inconclusive: Vec::new(),
            error_messages: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn endpoint(&self, endpoint: Endpoint) -> bool {
        self.api_endpoints.get(&endpoint).copied().unwrap_or(false)
    }

    pub fn log_report(&self) {
        let mark = |ok: bool| if ok { "✅" } else { "❌" };

        info!("🌐 Backend Reachable: {}", mark(self.backend_reachable));
        info!("❤️ Health Check: {}", mark(self.health_check));
        info!("📊 Analyze Endpoint: {}", mark(self.endpoint(Endpoint::Analyze)));
        info!("📁 Upload Endpoint: {}", mark(self.endpoint(Endpoint::Upload)));

        for endpoint in &self.inconclusive {
            warn!("{} endpoint rejected the preflight; reachability is inconclusive", endpoint);
        }
        for message in &self.error_messages {
            error!("{}", message);
        }
        for suggestion in &self.suggestions {
            warn!("💡 {}", suggestion);
        }
    }
}

pub struct ConnectionProber<T = HttpTransport> {
    api: ResumeAnalysisApi<T>,
}

impl<T: Transport> ConnectionProber<T> {
    pub fn new(api: ResumeAnalysisApi<T>) -> Self {
        Self { api }
    }

    /// Probe health, analyze and upload in that order. Never fails: every
    /// probe's failure is recorded and the next probe still runs.
    pub async fn probe(&self) -> ConnectionTestResult {
        info!("🔍 Testing backend connection...");
        let mut result = ConnectionTestResult::new();

        match self.api.check_health().await {
            Ok(envelope) => {
                result.backend_reachable = true;
                result.health_check = envelope.is_success();
                result.api_endpoints.insert(Endpoint::Health, true);
            }
            Err(raw) => {
                let classified = classify(&raw);
                result.backend_reachable = false;
                result
                    .error_messages
                    .push(format!("Health check failed: {}", classified.message));
                result.suggestions.extend(self.suggestions_for(&raw, &classified));
            }
        }

        for endpoint in [Endpoint::Analyze, Endpoint::Upload] {
            self.probe_endpoint(endpoint, &mut result).await;
        }

        if !result.backend_reachable {
            result.suggestions.push(
                "Run the backend setup script, then start the analysis service".to_string(),
            );
            result.suggestions.push(
                "Check the backend integration guide for detailed setup instructions".to_string(),
            );
        }

        result
    }

    async fn probe_endpoint(&self, endpoint: Endpoint, result: &mut ConnectionTestResult) {
        match self.api.preflight(endpoint).await {
            Ok(status) => {
                if PREFLIGHT_REJECTED.contains(&status) {
                    debug!("{} preflight rejected with status {}", endpoint, status);
                    result.inconclusive.push(endpoint);
                }
                result.api_endpoints.insert(endpoint, true);
            }
            Err(raw) => {
                result.api_endpoints.insert(endpoint, false);
                result.error_messages.push(format!(
                    "{} endpoint probe failed: {}",
                    capitalize(endpoint.name()),
                    classify(&raw).message
                ));
            }
        }
    }

    fn suggestions_for(&self, raw: &TransportError, classified: &ClassifiedError) -> Vec<String> {
        let text = raw.to_string().to_lowercase();
        let base_url = self.api.client().base_url();
        let mut suggestions = Vec::new();

        if classified.kind == ErrorKind::NetworkError {
            suggestions.push(format!(
                "Backend server is not running. Start the backend and make sure it is running at {}",
                base_url
            ));
            if let Some(port) = utils::url_port(base_url) {
                suggestions.push(format!("Check if backend is running on port {}", port));
            }
        } else if text.contains("cors") || text.contains("cross-origin") {
            suggestions.push("CORS issue detected. Check backend CORS configuration".to_string());
        }

        suggestions
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
