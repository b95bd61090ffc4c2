// src/core/service_client.rs
//! Transport client for the analysis service - every call yields exactly one
//! `Envelope` or a raw `TransportError`

use anyhow::Result;
use serde::de::DeserializeOwned;
use tracing::{error, info_span, trace, Instrument};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::core::classifier::TransportError;
use crate::core::transport::{ApiRequest, HttpTransport, Method, RequestBody, Transport};
use crate::types::Envelope;
use crate::utils;

const ACCEPT_JSON: (&str, &str) = ("Accept", "application/json");

// Bodies echoed into protocol errors are cut to this many characters
const BODY_EXCERPT_LEN: usize = 512;

pub struct ServiceClient<T = HttpTransport> {
    transport: T,
    base_url: String,
    default_headers: Vec<(String, String)>,
}

impl ServiceClient<HttpTransport> {
    /// Create a reqwest-backed client from configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout())?;
        Ok(Self::new(transport, config.base_url.clone()))
    }
}

impl<T: Transport> ServiceClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_headers: Vec::new(),
        }
    }

    /// Header sent with every request after `Accept`
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn call<R>(
        &self,
        endpoint: &str,
        method: Method,
        body: RequestBody,
    ) -> Result<Envelope<R>, TransportError>
    where
        R: DeserializeOwned,
    {
        self.call_with_headers(endpoint, method, body, &[]).await
    }

    /// Issue a request and parse the envelope. Non-2xx statuses fail before
    /// the body is looked at; the envelope is returned as the service sent it.
    pub async fn call_with_headers<R>(
        &self,
        endpoint: &str,
        method: Method,
        body: RequestBody,
        headers: &[(&str, &str)],
    ) -> Result<Envelope<R>, TransportError>
    where
        R: DeserializeOwned,
    {
        let request = self.build_request(endpoint, method, body, headers);
        let url = request.url.clone();
        let span = info_span!("api_call", request_id = %Uuid::new_v4(), %method, endpoint);

        async move {
            trace!("Calling analysis service: {}", url);

            let response = self.transport.send(request).await.map_err(|e| {
                error!("API request failed: {}", e);
                e
            })?;

            trace!("Response status: {}", response.status);

            if !response.is_success() {
                let err = TransportError::status(response.status, &url);
                error!("API request failed: {}", err);
                return Err(err);
            }

            serde_json::from_str::<Envelope<R>>(&response.body).map_err(|e| {
                let err = TransportError::protocol(
                    &url,
                    format!("response is not a valid envelope: {}", e),
                    Some(excerpt(&response.body)),
                );
                error!("API request failed: {}", err);
                err
            })
        }
        .instrument(span)
        .await
    }

    /// Send a body-less OPTIONS request and report the status. Any HTTP
    /// answer counts as `Ok`; only a missing response is an error.
    pub async fn preflight(&self, endpoint: &str) -> Result<u16, TransportError> {
        let request = self.build_request(endpoint, Method::Options, RequestBody::Empty, &[]);
        let span = info_span!("api_preflight", request_id = %Uuid::new_v4(), endpoint);

        async move {
            let response = self.transport.send(request).await.map_err(|e| {
                error!("Preflight request failed: {}", e);
                e
            })?;
            trace!("Preflight status: {}", response.status);
            Ok(response.status)
        }
        .instrument(span)
        .await
    }

    fn build_request(
        &self,
        endpoint: &str,
        method: Method,
        body: RequestBody,
        headers: &[(&str, &str)],
    ) -> ApiRequest {
        let mut all_headers = vec![(ACCEPT_JSON.0.to_string(), ACCEPT_JSON.1.to_string())];
        all_headers.extend(self.default_headers.iter().cloned());
        all_headers.extend(headers.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        ApiRequest {
            method,
            url: utils::join_url(&self.base_url, endpoint),
            headers: all_headers,
            body,
        }
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_LEN).collect()
}
