//! # External Collaborators
//!
//! Narrow interfaces to capabilities the network layer consumes but does not
//! own: the platform's secure key-value store (credentials) and the host UI's
//! toast/alert surface.

use std::collections::HashMap;

use async_trait::async_trait;
use lib_core::StorageError;
use parking_lot::RwLock;
use tracing::{error, info, warn};

const NOTIFY_TARGET: &str = "companion::notify";

/// Secure key-value storage for secrets such as the bearer credential.
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, name: &str, value: &str) -> Result<(), StorageError>;

    /// Deleting an absent name is not an error.
    async fn delete(&self, name: &str) -> Result<(), StorageError>;
}

/// Process-local secure store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySecureStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn get(&self, name: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.read().get(name).cloned())
    }

    async fn set(&self, name: &str, value: &str) -> Result<(), StorageError> {
        self.values.write().insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.values.write().remove(name);
        Ok(())
    }
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Toast/alert surface for presenting messages to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Notifier that writes to the log instead of a UI surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => {
                info!(target: NOTIFY_TARGET, text = %message, "User notification")
            }
            Severity::Warning => {
                warn!(target: NOTIFY_TARGET, text = %message, "User notification")
            }
            Severity::Error => {
                error!(target: NOTIFY_TARGET, text = %message, "User notification")
            }
        }
    }
}
