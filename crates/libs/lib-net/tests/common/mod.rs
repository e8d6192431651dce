//! Shared fixtures for lib-net integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lib_net::{ApiRequest, HttpTransport, RawResponse, TransportError};
use parking_lot::Mutex;

/// Transport that replays canned responses and counts calls.
#[derive(Default)]
pub struct CannedTransport {
    responses: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    calls: AtomicUsize,
}

impl CannedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, status: u16, body: &str) {
        self.responses
            .lock()
            .push_back(Ok(RawResponse::new(status, body)));
    }

    pub fn fail(&self, err: TransportError) {
        self.responses.lock().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for CannedTransport {
    async fn send(
        &self,
        _request: &ApiRequest,
        _bearer: Option<&str>,
    ) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().pop_front();
        next.unwrap_or_else(|| Ok(RawResponse::new(503, "")))
    }
}

pub fn scratch_dir(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("lib-net-{label}-{}", uuid::Uuid::new_v4()))
}
