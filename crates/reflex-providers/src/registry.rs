//! Provider registry.
//!
//! The registry maps provider names to live [`StreamingProvider`] instances.
//! It is assembled by the application, handed to the reactive engine at
//! configuration time, and from then on treated as read-only shared plumbing:
//! every action context carries an `Arc` to the same registry.
//!
//! Internally the registry is backed by [`DashMap`] so it can be shared
//! across tasks without a global `RwLock`.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::{ProviderError, Result};
use crate::provider::StreamingProvider;

/// A name-keyed collection of streaming providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, Arc<dyn StreamingProvider>>,
}

impl ProviderRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own [`StreamingProvider::name`].
    ///
    /// Registering a second provider with the same name replaces the first.
    pub fn register(&self, provider: Arc<dyn StreamingProvider>) {
        let name = provider.name().to_owned();
        debug!(provider = %name, "registering provider");
        self.providers.insert(name, provider);
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn StreamingProvider>> {
        self.providers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up a provider by name, failing with
    /// [`ProviderError::UnknownProvider`] when absent.
    pub fn require(&self, name: &str) -> Result<Arc<dyn StreamingProvider>> {
        self.get(name).ok_or_else(|| ProviderError::UnknownProvider {
            name: name.to_owned(),
        })
    }

    /// Return the names of all registered providers.
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Return the number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry holds no providers.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
