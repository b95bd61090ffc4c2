// src/core/testing.rs
//! Scripted transport for unit tests

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::core::classifier::TransportError;
use crate::core::transport::{ApiRequest, Method, Transport, TransportResponse};

#[derive(Debug, Clone)]
enum Scripted {
    Response(TransportResponse),
    Failure(TransportError),
}

struct Route {
    method: Option<Method>,
    path: String,
    outcomes: VecDeque<Scripted>,
}

/// Answers requests from per-route queues. The last outcome queued for a
/// route repeats once the earlier ones are used up.
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep this long before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_json(self, path: &str, status: u16, body: serde_json::Value) -> Self {
        self.with_raw(path, status, &body.to_string())
    }

    pub fn with_raw(self, path: &str, status: u16, body: &str) -> Self {
        self.script(None, path, Self::response(status, body))
    }

    pub fn with_network_failure(self, path: &str, reason: &str) -> Self {
        let failure = Scripted::Failure(TransportError::network(path, reason));
        self.script(None, path, failure)
    }

    pub fn with_method_raw(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.script(Some(method), path, Self::response(status, body))
    }

    pub fn with_method_failure(self, method: Method, path: &str, error: TransportError) -> Self {
        self.script(Some(method), path, Scripted::Failure(error))
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests whose URL ends with `path`
    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.ends_with(path))
            .count()
    }

    fn response(status: u16, body: &str) -> Scripted {
        Scripted::Response(TransportResponse {
            status,
            body: body.to_string(),
        })
    }

    fn script(self, method: Option<Method>, path: &str, outcome: Scripted) -> Self {
        {
            let mut routes = self.routes.lock();
            match routes
                .iter_mut()
                .find(|r| r.method == method && r.path == path)
            {
                Some(route) => route.outcomes.push_back(outcome),
                None => routes.push(Route {
                    method,
                    path: path.to_string(),
                    outcomes: VecDeque::from([outcome]),
                }),
            }
        }
        self
    }

    fn next_outcome(&self, request: &ApiRequest) -> Scripted {
        let mut routes = self.routes.lock();

        let exact = routes
            .iter()
            .position(|r| r.method == Some(request.method) && request.url.ends_with(&r.path));
        let any = || {
            routes
                .iter()
                .position(|r| r.method.is_none() && request.url.ends_with(&r.path))
        };

        let Some(index) = exact.or_else(any) else {
            return Self::response(404, "");
        };

        let route = &mut routes[index];
        if route.outcomes.len() > 1 {
            route.outcomes.pop_front().unwrap_or_else(|| Self::response(404, ""))
        } else {
            route
                .outcomes
                .front()
                .cloned()
                .unwrap_or_else(|| Self::response(404, ""))
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_outcome(&request) {
            Scripted::Response(response) => Ok(response),
            Scripted::Failure(error) => Err(error),
        }
    }
}
