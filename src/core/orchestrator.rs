// src/core/orchestrator.rs
//! Lifecycle, caching and retry around single service operations.
//!
//! A [`Query`] is a cached read bound to one key: fresh data is served from
//! memory, concurrent callers share one in-flight request, and transient
//! failures are retried a bounded number of times. A [`Mutation`] is a
//! user-initiated write: every call hits the network once and nothing is
//! cached. Both publish an [`OperationState`] that consumers can poll with
//! `state()` or follow with `subscribe()`.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::core::classifier::{classify, ClassifiedError, TransportError};
use crate::types::Envelope;

pub type Outcome<T> = Result<Envelope<T>, ClassifiedError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Pending,
    Success,
    Error,
}

/// Snapshot of one operation slot
#[derive(Debug, Clone, PartialEq)]
pub struct OperationState<T> {
    pub phase: Phase,
    /// Last envelope received; kept when a later call fails
    pub data: Option<Envelope<T>>,
    pub error: Option<ClassifiedError>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            data: None,
            error: None,
            updated_at: None,
        }
    }
}

impl<T> OperationState<T> {
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn is_pending(&self) -> bool {
        self.phase == Phase::Pending
    }

    pub fn is_success(&self) -> bool {
        self.phase == Phase::Success
    }

    pub fn is_error(&self) -> bool {
        self.phase == Phase::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    /// How long a successful result is served without a new request
    pub stale_time: Duration,
    /// Automatic retries after the first attempt
    pub retry: u32,
    pub retry_delay: Duration,
}

impl QueryPolicy {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            stale_time,
            retry: 0,
            retry_delay: Duration::ZERO,
        }
    }

    pub fn with_retry(mut self, retry: u32, retry_delay: Duration) -> Self {
        self.retry = retry;
        self.retry_delay = retry_delay;
        self
    }
}

// ===== Query =====

type Fetcher<T> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Envelope<T>, TransportError>> + Send + Sync>;
type InFlight<T> = Shared<BoxFuture<'static, Outcome<T>>>;

struct QueryCache<T> {
    fetched_at: Option<Instant>,
    invalidated: bool,
    in_flight: Option<(u64, InFlight<T>)>,
    /// Generation of the most recently started request
    started: u64,
    /// Generation of the newest request whose outcome was applied
    settled: u64,
    /// Requests at or below this generation were started before the last
    /// `invalidate` and never reach the slot
    detached_up_to: u64,
}

struct QueryInner<T> {
    key: String,
    policy: QueryPolicy,
    fetcher: Fetcher<T>,
    cache: Mutex<QueryCache<T>>,
    state: watch::Sender<OperationState<T>>,
}

pub struct Query<T> {
    inner: Arc<QueryInner<T>>,
}

impl<T> Query<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(key: impl Into<String>, policy: QueryPolicy, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope<T>, TransportError>> + Send + 'static,
    {
        let (state, _) = watch::channel(OperationState::default());

        Self {
            inner: Arc::new(QueryInner {
                key: key.into(),
                policy,
                fetcher: Arc::new(move || fetch().boxed()),
                cache: Mutex::new(QueryCache {
                    fetched_at: None,
                    invalidated: false,
                    in_flight: None,
                    started: 0,
                    settled: 0,
                    detached_up_to: 0,
                }),
                state,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn policy(&self) -> QueryPolicy {
        self.inner.policy
    }

    pub fn state(&self) -> OperationState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationState<T>> {
        self.inner.state.subscribe()
    }

    /// Cached envelope, if still inside the freshness window
    pub fn cached(&self) -> Option<Envelope<T>> {
        let cache = self.inner.cache.lock();
        self.inner.fresh_data(&cache)
    }

    pub fn is_fresh(&self) -> bool {
        self.cached().is_some()
    }

    /// Return fresh cached data, join the request in flight, or start one.
    ///
    /// The request runs on its own task and settles the slot itself, so a
    /// caller that stops waiting does not leave the slot pending.
    pub async fn fetch(&self) -> Outcome<T> {
        let request = {
            let mut cache = self.inner.cache.lock();

            if let Some(hit) = self.inner.fresh_data(&cache) {
                debug!(query = %self.inner.key, "Serving cached result");
                return Ok(hit);
            }

            match cache.in_flight.as_ref().map(|(_, r)| r.clone()) {
                Some(joined) => {
                    debug!(query = %self.inner.key, "Joining request in flight");
                    joined
                }
                None => {
                    cache.started += 1;
                    let generation = cache.started;
                    let request = QueryInner::start(&self.inner, generation);
                    cache.in_flight = Some((generation, request.clone()));
                    self.inner.state.send_modify(|s| s.phase = Phase::Pending);
                    tokio::spawn(request.clone());
                    request
                }
            }
        };

        request.await
    }

    /// Mark cached data stale and detach the request in flight. The next
    /// `fetch` starts a new request; whatever the detached one returns goes
    /// only to its own callers.
    pub fn invalidate(&self) {
        let mut cache = self.inner.cache.lock();
        cache.invalidated = true;
        cache.in_flight = None;
        cache.detached_up_to = cache.started;
    }

    pub async fn refetch(&self) -> Outcome<T> {
        self.invalidate();
        self.fetch().await
    }
}

impl<T> QueryInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn start(inner: &Arc<Self>, generation: u64) -> InFlight<T> {
        let inner = Arc::clone(inner);

        async move {
            let outcome = inner.run_with_retry().await;
            inner.settle(generation, &outcome);
            outcome
        }
        .boxed()
        .shared()
    }

    fn fresh_data(&self, cache: &QueryCache<T>) -> Option<Envelope<T>> {
        if cache.invalidated {
            return None;
        }
        let fetched_at = cache.fetched_at?;
        if fetched_at.elapsed() >= self.policy.stale_time {
            return None;
        }
        self.state.borrow().data.clone()
    }

    async fn run_with_retry(&self) -> Outcome<T> {
        let mut attempt = 0;
        loop {
            let raw = match (self.fetcher)().await {
                Ok(envelope) => return Ok(envelope),
                Err(raw) => raw,
            };

            let classified = classify(&raw);
            if attempt >= self.policy.retry || !classified.is_transient() {
                return Err(classified);
            }

            attempt += 1;
            warn!(
                query = %self.key,
                attempt,
                "Query failed ({}), retrying in {:?}",
                classified.kind,
                self.policy.retry_delay
            );
            tokio::time::sleep(self.policy.retry_delay).await;
        }
    }

    fn settle(&self, generation: u64, outcome: &Outcome<T>) {
        let mut cache = self.cache.lock();

        if matches!(&cache.in_flight, Some((g, _)) if *g == generation) {
            cache.in_flight = None;
        }
        let newer_pending = cache.in_flight.is_some();

        if generation <= cache.detached_up_to || generation <= cache.settled {
            debug!(query = %self.key, generation, "Discarding stale response");
            if !newer_pending {
                self.state.send_if_modified(|s| {
                    if s.phase != Phase::Pending {
                        return false;
                    }
                    s.phase = if s.error.is_some() {
                        Phase::Error
                    } else if s.data.is_some() {
                        Phase::Success
                    } else {
                        Phase::Idle
                    };
                    true
                });
            }
            return;
        }
        cache.settled = generation;

        // A newer request may still be running after an invalidation
        let phase_after = |done: Phase| if newer_pending { Phase::Pending } else { done };

        match outcome {
            Ok(envelope) => {
                cache.fetched_at = Some(Instant::now());
                cache.invalidated = false;
                let phase = phase_after(Phase::Success);
                self.state.send_modify(|s| {
                    s.phase = phase;
                    s.data = Some(envelope.clone());
                    s.error = None;
                    s.updated_at = Some(Utc::now());
                });
            }
            Err(e) => {
                error!(query = %self.key, kind = %e.kind, "Query failed: {}", e.message);
                let phase = phase_after(Phase::Error);
                self.state.send_modify(|s| {
                    s.phase = phase;
                    s.error = Some(e.clone());
                    s.updated_at = Some(Utc::now());
                });
            }
        }
    }
}

// ===== Mutation =====

type Runner<I, T> =
    Arc<dyn Fn(I) -> BoxFuture<'static, Result<Envelope<T>, TransportError>> + Send + Sync>;

pub struct Mutation<I, T> {
    name: String,
    runner: Runner<I, T>,
    latest_call: AtomicU64,
    state: watch::Sender<OperationState<T>>,
}

impl<I, T> Mutation<I, T>
where
    I: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope<T>, TransportError>> + Send + 'static,
    {
        let (state, _) = watch::channel(OperationState::default());

        Self {
            name: name.into(),
            runner: Arc::new(move |input| run(input).boxed()),
            latest_call: AtomicU64::new(0),
            state,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> OperationState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationState<T>> {
        self.state.subscribe()
    }

    /// Run once, with no retry. Only the most recently started call may
    /// write the slot's state.
    pub async fn mutate(&self, input: I) -> Outcome<T> {
        let call = self.latest_call.fetch_add(1, Ordering::SeqCst) + 1;

        self.state.send_modify(|s| {
            s.phase = Phase::Pending;
            s.data = None;
            s.error = None;
        });

        let outcome = (self.runner)(input).await.map_err(|raw| classify(&raw));

        if let Err(e) = &outcome {
            error!(mutation = %self.name, kind = %e.kind, "Mutation failed: {}", e.message);
        }

        if self.latest_call.load(Ordering::SeqCst) != call {
            debug!(mutation = %self.name, call, "Superseded by a newer call");
            return outcome;
        }

        self.state.send_modify(|s| {
            match &outcome {
                Ok(envelope) => {
                    s.phase = Phase::Success;
                    s.data = Some(envelope.clone());
                }
                Err(e) => {
                    s.phase = Phase::Error;
                    s.error = Some(e.clone());
                }
            }
            s.updated_at = Some(Utc::now());
        });

        outcome
    }

    pub fn reset(&self) {
        self.state.send_replace(OperationState::default());
    }
}
