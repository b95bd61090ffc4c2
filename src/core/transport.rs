// src/core/transport.rs
//! HTTP transport seam. `HttpTransport` talks to the network through
//! reqwest; tests substitute their own implementation.

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::core::classifier::TransportError;
use crate::types::ResumeFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Options,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Options => "OPTIONS",
        };
        f.write_str(name)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    File(ResumeFile),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub value: FieldValue,
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
        }
    }

    pub fn file(name: impl Into<String>, file: ResumeFile) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::File(file),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormField>),
}

/// A fully resolved request, ready for a transport to send
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and reports what came back. Implementations return
/// `Err` only when no HTTP response was received at all; any status code,
/// including errors, is a successful send.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    fn build_form(fields: Vec<FormField>) -> Result<Form, TransportError> {
        let mut form = Form::new();

        for field in fields {
            form = match field.value {
                FieldValue::Text(text) => form.text(field.name, text),
                FieldValue::File(file) => {
                    let part = Part::bytes(file.bytes)
                        .file_name(file.file_name)
                        .mime_str(&file.media_type)
                        .map_err(|e| {
                            TransportError::other(format!("Failed to create multipart: {}", e))
                        })?;
                    form.part(field.name, part)
                }
            };
        }

        Ok(form)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self.client.request(request.method.into(), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(fields) => builder.multipart(Self::build_form(fields)?),
        };

        let response = builder.send().await.map_err(TransportError::from)?;
        let status = response.status().as_u16();

        let body = if response.status().is_success() {
            response.text().await.map_err(|e| {
                TransportError::protocol(&request.url, format!("Failed to read body: {}", e), None)
            })?
        } else {
            response.text().await.unwrap_or_default()
        };

        Ok(TransportResponse { status, body })
    }
}
