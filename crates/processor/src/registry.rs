//! Service registry implementation.

use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;

use routir_core::{traits::Processor, types::Role, Error, Result};

/// Directory of processors keyed by (service name, role).
///
/// Registration is first-writer-wins: a second `register` for the same key is
/// a no-op, so discovered relays never replace locally configured engines.
/// There is no deregistration.
pub struct ServiceRegistry {
    processors: DashMap<(String, Role), Arc<dyn Processor>>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            processors: DashMap::new(),
        }
    }

    /// Insert `processor` unless the key is taken. Returns whether it inserted.
    pub fn register(&self, name: &str, role: Role, processor: Arc<dyn Processor>) -> bool {
        match self.processors.entry((name.to_string(), role)) {
            Entry::Occupied(_) => {
                tracing::debug!(service = %name, role = %role, "Service already registered, keeping existing");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(processor);
                tracing::info!(service = %name, role = %role, "Registered service");
                true
            }
        }
    }

    pub fn has_service(&self, name: &str, role: Role) -> bool {
        self.processors.contains_key(&(name.to_string(), role))
    }

    /// Resolve a processor or fail with `ServiceNotFound`.
    pub fn get(&self, name: &str, role: Role) -> Result<Arc<dyn Processor>> {
        self.processors
            .get(&(name.to_string(), role))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::service_not_found(name, role))
    }

    /// Sorted names of the services offering `role`.
    pub fn services(&self, role: Role) -> Vec<String> {
        let mut names: Vec<String> = self
            .processors
            .iter()
            .filter(|entry| entry.key().1 == role)
            .map(|entry| entry.key().0.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of (name, role) entries.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Stop every running processor once, even when registered under several roles.
    pub async fn stop_all(&self) {
        let mut distinct: Vec<Arc<dyn Processor>> = Vec::new();
        for entry in self.processors.iter() {
            if !distinct.iter().any(|p| Arc::ptr_eq(p, entry.value())) {
                distinct.push(entry.value().clone());
            }
        }

        for processor in distinct {
            if !processor.is_running() {
                continue;
            }
            if let Err(e) = processor.stop().await {
                tracing::warn!(service = %processor.name(), error = %e, "Failed to stop processor");
            }
        }
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
