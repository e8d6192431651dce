//! Request descriptions, per-call options and outcomes.

use std::fmt;
use std::time::Duration;

use lib_core::{user_message, FailureKind};
use serde_json::Value;
use thiserror::Error;

use super::retry::RetryPolicy;

/// Default lifetime of cached responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default per-attempt deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Everything except GET changes server state.
    pub fn is_mutating(self) -> bool {
        !matches!(self, Method::Get)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    pub(crate) fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend call: method, path relative to the API base URL, optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path, Some(body))
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, path, Some(body))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }
}

/// Which cache entries a successful call drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheInvalidation {
    Key(String),
    All,
}

/// Per-call knobs for [`RequestExecutor::execute`](super::RequestExecutor::execute).
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Serve from and populate the cache. Ignored for mutating methods.
    pub use_cache: bool,
    /// Cache key; the request path when `None`.
    pub cache_key: Option<String>,
    pub ttl: Duration,
    pub retry: RetryPolicy,
    /// Deadline for each individual attempt.
    pub timeout: Duration,
    /// Applied only when the call succeeds.
    pub clear_cache_on_success: Option<CacheInvalidation>,
    /// Report a terminal failure to the notifier.
    pub notify_on_failure: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            use_cache: false,
            cache_key: None,
            ttl: DEFAULT_CACHE_TTL,
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            clear_cache_on_success: None,
            notify_on_failure: false,
        }
    }
}

impl RequestOptions {
    /// Enable caching with the given TTL.
    pub fn cached(mut self, ttl: Duration) -> Self {
        self.use_cache = true;
        self.ttl = ttl;
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn invalidate(mut self, invalidation: CacheInvalidation) -> Self {
        self.clear_cache_on_success = Some(invalidation);
        self
    }

    pub fn notify_on_failure(mut self) -> Self {
        self.notify_on_failure = true;
        self
    }

    pub(crate) fn key_for<'a>(&'a self, request: &'a ApiRequest) -> &'a str {
        self.cache_key.as_deref().unwrap_or(&request.path)
    }
}

/// Terminal failure of a call, already classified for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} after {attempts} attempt(s): {user_message}")]
pub struct RequestFailure {
    pub kind: FailureKind,
    pub user_message: &'static str,
    pub attempts: u32,
    /// HTTP status, when the server answered.
    pub status: Option<u16>,
}

impl RequestFailure {
    pub fn new(kind: FailureKind, attempts: u32, status: Option<u16>) -> Self {
        Self {
            kind,
            user_message: user_message(kind, status),
            attempts,
            status,
        }
    }
}

/// Exactly one of these is produced per `execute` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome<T> {
    Success { value: T, from_cache: bool },
    Failure(RequestFailure),
}

impl<T> RequestOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success { .. })
    }

    pub fn is_from_cache(&self) -> bool {
        matches!(self, RequestOutcome::Success { from_cache: true, .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            RequestOutcome::Success { value, .. } => Some(value),
            RequestOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&RequestFailure> {
        match self {
            RequestOutcome::Success { .. } => None,
            RequestOutcome::Failure(failure) => Some(failure),
        }
    }

    pub fn into_result(self) -> Result<T, RequestFailure> {
        match self {
            RequestOutcome::Success { value, .. } => Ok(value),
            RequestOutcome::Failure(failure) => Err(failure),
        }
    }
}
