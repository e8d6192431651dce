//! # Service Composition
//!
//! Builds the one cache, executor and channel manager the whole app shares.
//! Nothing here is global; callers hold a [`Services`] and pass pieces down.

use std::sync::Arc;
use std::time::Duration;

use lib_core::{AppError, Config};
use lib_net::{
    CacheStore, ChannelManager, FileStore, LogNotifier, MemorySecureStore, MemoryStore,
    ReconnectPolicy, RequestExecutor, RequestOptions, ReqwestTransport, RetryPolicy,
    TimeBoxedCache, TungsteniteConnector,
};
use lib_utils::SystemClock;
use tracing::{info, warn};

/// How long the predictions list stays fresh.
pub const PREDICTIONS_TTL: Duration = Duration::from_secs(1800);

/// Shared network services.
pub struct Services {
    pub config: Config,
    pub cache: Arc<TimeBoxedCache>,
    pub secure_store: Arc<MemorySecureStore>,
    pub executor: Arc<RequestExecutor>,
    pub channel: ChannelManager,
}

impl Services {
    /// Wire every component from `config`. Does not open the channel.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let store: Arc<dyn CacheStore> = match &config.cache_dir {
            Some(dir) => {
                info!(dir = %dir.display(), "Using file-backed cache");
                Arc::new(FileStore::open(dir).await?)
            }
            None => {
                info!("Using in-memory cache");
                Arc::new(MemoryStore::new())
            }
        };
        let cache = Arc::new(TimeBoxedCache::new(store, Arc::new(SystemClock)));

        // Entries persisted by an earlier run may have expired meanwhile.
        match cache.clean_expired().await {
            Ok(evicted) => info!(evicted, "Startup cache sweep complete"),
            Err(e) => warn!(error = %e, "Startup cache sweep failed"),
        }

        let secure_store = Arc::new(MemorySecureStore::new());
        let transport = Arc::new(ReqwestTransport::new(
            config.api_base_url.clone(),
            config.request_timeout,
        ));
        let defaults = RequestOptions::default()
            .with_timeout(config.request_timeout)
            .with_retry(RetryPolicy::new(config.max_attempts, config.retry_base_delay));
        let executor = Arc::new(
            RequestExecutor::new(transport, cache.clone())
                .with_secure_store(secure_store.clone(), config.auth_token_key.clone())
                .with_notifier(Arc::new(LogNotifier))
                .with_defaults(defaults),
        );

        let connector = TungsteniteConnector::new(config.ws_url.clone(), config.request_timeout);
        let channel = ChannelManager::new(
            Arc::new(connector),
            ReconnectPolicy::new(config.reconnect_interval, config.max_reconnect_attempts),
        );

        info!(
            api = %config.api_base_url,
            ws = %config.ws_url,
            max_attempts = config.max_attempts,
            max_reconnect_attempts = config.max_reconnect_attempts,
            "Services ready"
        );

        Ok(Self {
            config,
            cache,
            secure_store,
            executor,
            channel,
        })
    }

    /// Options for the cached predictions call.
    pub fn predictions_options(&self) -> RequestOptions {
        self.executor
            .options()
            .cached(PREDICTIONS_TTL)
            .notify_on_failure()
    }

    /// Close the channel and drop its subscribers.
    pub fn shutdown(&self) {
        self.channel.teardown();
        info!("Services shut down");
    }
}
