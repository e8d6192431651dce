//! # Request Executor
//!
//! Runs backend calls through the cache, a per-attempt deadline and bounded
//! retry, and hands back exactly one [`RequestOutcome`] per call.
//!
//! ## Pipeline
//!
//! ```text
//! execute(request, options)
//!   │
//!   ├─ GET + use_cache + live entry ──────────────► Success { from_cache: true }
//!   │
//!   └─ attempt 1..=max_attempts
//!        ├─ timeout(send) elapsed ─► Timeout            (retryable)
//!        ├─ transport error ───────► NetworkUnreachable (retryable)
//!        ├─ 5xx / unexpected ──────► ServerError        (retryable)
//!        ├─ 4xx ───────────────────► ClientError        (terminal, 401 drops credential)
//!        ├─ body does not parse ───► DecodeError        (terminal)
//!        └─ 2xx ─► write cache, apply invalidation ───► Success { from_cache: false }
//! ```
//!
//! Between retries the executor sleeps `base_delay × 2^(n-1)`. Concurrent
//! misses for the same key each go to the network; there is no in-flight
//! de-duplication.

mod request;
mod retry;
mod transport;


pub use request::{
    ApiRequest, CacheInvalidation, Method, RequestFailure, RequestOptions, RequestOutcome,
    DEFAULT_CACHE_TTL, DEFAULT_TIMEOUT,
};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, RawResponse, ReqwestTransport, TransportError};

use std::sync::Arc;
use std::time::Duration;

use lib_core::{classify_http_status, FailureKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cache::TimeBoxedCache;
use crate::collaborators::{Notifier, SecureStore, Severity};

/// Name under which the bearer credential is stored unless configured otherwise.
pub const DEFAULT_AUTH_TOKEN_KEY: &str = "auth_token";

/// Why a single attempt did not produce a value.
#[derive(Debug, Clone, Copy)]
struct AttemptFailure {
    kind: FailureKind,
    status: Option<u16>,
}

impl AttemptFailure {
    fn new(kind: FailureKind, status: Option<u16>) -> Self {
        Self { kind, status }
    }
}

/// Request/cache/retry pipeline shared by all application code.
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<TimeBoxedCache>,
    secure_store: Option<Arc<dyn SecureStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    auth_token_key: String,
    defaults: RequestOptions,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>, cache: Arc<TimeBoxedCache>) -> Self {
        Self {
            transport,
            cache,
            secure_store: None,
            notifier: None,
            auth_token_key: DEFAULT_AUTH_TOKEN_KEY.to_string(),
            defaults: RequestOptions::default(),
        }
    }

    /// Attach the credential store; the value under `auth_token_key` is sent as a bearer token.
    pub fn with_secure_store(
        mut self,
        store: Arc<dyn SecureStore>,
        auth_token_key: impl Into<String>,
    ) -> Self {
        self.secure_store = Some(store);
        self.auth_token_key = auth_token_key.into();
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Options that [`RequestExecutor::options`] starts from.
    pub fn with_defaults(mut self, defaults: RequestOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// A fresh copy of the configured default options.
    pub fn options(&self) -> RequestOptions {
        self.defaults.clone()
    }

    pub fn cache(&self) -> &Arc<TimeBoxedCache> {
        &self.cache
    }

    /// Run `request` to completion and decode a 2xx body as `T`.
    ///
    /// Never returns an error: every failure is folded into
    /// [`RequestOutcome::Failure`] with a fixed user message.
    pub async fn execute<T>(
        &self,
        request: ApiRequest,
        options: RequestOptions,
    ) -> RequestOutcome<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let span = info_span!(
            "request",
            request_id = %Uuid::new_v4(),
            method = %request.method,
            path = %request.path,
        );
        self.run(&request, &options).instrument(span).await
    }

    async fn run<T>(&self, request: &ApiRequest, options: &RequestOptions) -> RequestOutcome<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let caching = options.use_cache && !request.method.is_mutating();
        let key = options.key_for(request);

        if caching {
            match self.cache.get::<T>(key).await {
                Ok(Some(value)) => {
                    debug!(key = %key, "Served from cache");
                    return RequestOutcome::Success {
                        value,
                        from_cache: true,
                    };
                }
                Ok(None) => debug!(key = %key, "Cache miss"),
                Err(e) => warn!(key = %key, error = %e, "Cache read failed, treating as miss"),
            }
        }

        let bearer = self.load_credential().await;
        let mut attempts = 0u32;

        let failure = loop {
            attempts += 1;

            match self.attempt::<T>(request, bearer.as_deref(), options.timeout).await {
                Ok(value) => {
                    info!(attempts, "Request succeeded");
                    if caching {
                        if let Err(e) = self.cache.set(key, &value, options.ttl).await {
                            warn!(
                                key = %key,
                                error = %e,
                                "Cache write failed, returning network result"
                            );
                        }
                    }
                    if let Some(invalidation) = &options.clear_cache_on_success {
                        self.invalidate(invalidation).await;
                    }
                    return RequestOutcome::Success {
                        value,
                        from_cache: false,
                    };
                }
                Err(failed) => {
                    if failed.status == Some(401) {
                        self.drop_credential().await;
                    }

                    if !options.retry.should_retry(failed.kind, attempts) {
                        break RequestFailure::new(failed.kind, attempts, failed.status);
                    }

                    let delay = options.retry.delay_for_retry(attempts);
                    warn!(
                        kind = %failed.kind,
                        status = ?failed.status,
                        attempt = attempts,
                        max_attempts = options.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };

        error!(
            kind = %failure.kind,
            status = ?failure.status,
            attempts = failure.attempts,
            "Request failed"
        );

        if options.notify_on_failure {
            if let Some(notifier) = &self.notifier {
                notifier.notify(failure.user_message, Severity::Error);
            }
        }

        RequestOutcome::Failure(failure)
    }

    /// One bounded exchange. The send future is dropped if the deadline passes.
    async fn attempt<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<T, AttemptFailure> {
        let send = self.transport.send(request, bearer);
        let response = match tokio::time::timeout(timeout, send).await {
            Err(_) => return Err(AttemptFailure::new(FailureKind::Timeout, None)),
            Ok(Err(e)) => {
                debug!(error = %e, "Transport failure");
                return Err(AttemptFailure::new(e.kind(), None));
            }
            Ok(Ok(response)) => response,
        };

        if let Some(kind) = classify_http_status(response.status) {
            return Err(AttemptFailure::new(kind, Some(response.status)));
        }

        // 204 and friends carry no body.
        let body = if response.body.trim().is_empty() {
            "null"
        } else {
            response.body.as_str()
        };

        serde_json::from_str(body).map_err(|e| {
            warn!(status = response.status, error = %e, "Response body did not decode");
            AttemptFailure::new(FailureKind::DecodeError, Some(response.status))
        })
    }

    async fn invalidate(&self, invalidation: &CacheInvalidation) {
        let result = match invalidation {
            CacheInvalidation::Key(key) => self.cache.remove(key).await,
            CacheInvalidation::All => self.cache.clear().await,
        };
        match result {
            Ok(()) => debug!(invalidation = ?invalidation, "Cache invalidated"),
            Err(e) => warn!(invalidation = ?invalidation, error = %e, "Cache invalidation failed"),
        }
    }

    async fn load_credential(&self) -> Option<String> {
        let store = self.secure_store.as_ref()?;
        match store.get(&self.auth_token_key).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not read credential, sending request without it");
                None
            }
        }
    }

    async fn drop_credential(&self) {
        let Some(store) = &self.secure_store else {
            return;
        };
        match store.delete(&self.auth_token_key).await {
            Ok(()) => info!("Credential rejected by server, removed from secure store"),
            Err(e) => warn!(error = %e, "Could not remove rejected credential"),
        }
    }
}
