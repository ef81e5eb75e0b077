//! Context registry
//!
//! Maps a tensor name to its synchronization context, creating contexts
//! lazily and exactly once. The write lock is scoped strictly to the
//! insert-if-absent operation and is never held across anything
//! asynchronous.

use crate::context::{ContextRef, TensorSyncContext};
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use volley_types::{Result, SyncError, TensorDescriptor, TensorName};

/// Process-lifetime map of tensor name to context
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: RwLock<HashMap<TensorName, ContextRef>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the context for `name`, creating it if absent. Under a race
    /// on the same name, the loser observes the winner's context. Fails
    /// with [`SyncError::NameConflict`] if an existing context was created
    /// with a different descriptor.
    pub fn get_or_create(
        &self,
        name: &TensorName,
        descriptor: &TensorDescriptor,
    ) -> Result<ContextRef> {
        if let Some(existing) = self.contexts.read().get(name) {
            check_match(existing, descriptor)?;
            return Ok(Arc::clone(existing));
        }

        let mut contexts = self.contexts.write();
        match contexts.entry(name.clone()) {
            Entry::Occupied(entry) => {
                check_match(entry.get(), descriptor)?;
                Ok(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                info!("creating synchronization context for {} ({})", name, descriptor);
                let context = Arc::new(TensorSyncContext::new(name.clone(), *descriptor));
                entry.insert(Arc::clone(&context));
                Ok(context)
            }
        }
    }

    /// Look up an existing context without creating one
    pub fn try_get(&self, name: &TensorName) -> Option<ContextRef> {
        self.contexts.read().get(name).cloned()
    }

    /// Whether `name` is registered and ready with exactly this descriptor.
    /// A descriptor mismatch is a caller error and fails loudly instead of
    /// reporting `false` and silently reinitializing.
    pub fn is_initialized(
        &self,
        name: &TensorName,
        descriptor: &TensorDescriptor,
    ) -> Result<bool> {
        match self.contexts.read().get(name) {
            None => Ok(false),
            Some(context) => {
                check_match(context, descriptor)?;
                Ok(context.is_ready())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }
}

fn check_match(context: &ContextRef, descriptor: &TensorDescriptor) -> Result<()> {
    if context.matches(descriptor) {
        Ok(())
    } else {
        Err(SyncError::name_conflict(format!(
            "{} already registered as {}, requested {}",
            context.name(),
            context.descriptor(),
            descriptor
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volley_types::{DataType, Device};

    fn descriptor() -> TensorDescriptor {
        TensorDescriptor::new(256, Device::Cpu, DataType::F32)
    }

    #[test]
    fn test_get_or_create_returns_same_context() {
        let registry = ContextRegistry::new();
        let name = TensorName::new("volley.w");
        let a = registry.get_or_create(&name, &descriptor()).unwrap();
        let b = registry.get_or_create(&name, &descriptor()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_create_yields_one_context() {
        let registry = Arc::new(ContextRegistry::new());
        let name = TensorName::new("volley.shared");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let name = name.clone();
                std::thread::spawn(move || registry.get_or_create(&name, &descriptor()).unwrap())
            })
            .collect();

        let contexts: Vec<ContextRef> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        for ctx in &contexts[1..] {
            assert!(Arc::ptr_eq(&contexts[0], ctx));
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_descriptor_mismatch_fails_loudly() {
        let registry = ContextRegistry::new();
        let name = TensorName::new("volley.w");
        registry.get_or_create(&name, &descriptor()).unwrap();

        let other = TensorDescriptor::new(512, Device::Cpu, DataType::F32);
        assert!(matches!(
            registry.get_or_create(&name, &other),
            Err(SyncError::NameConflict { .. })
        ));
        assert!(matches!(
            registry.is_initialized(&name, &other),
            Err(SyncError::NameConflict { .. })
        ));
    }

    #[test]
    fn test_is_initialized_tracks_readiness() {
        let registry = ContextRegistry::new();
        let name = TensorName::new("volley.w");
        assert!(!registry.is_initialized(&name, &descriptor()).unwrap());

        let context = registry.get_or_create(&name, &descriptor()).unwrap();
        assert!(!registry.is_initialized(&name, &descriptor()).unwrap());

        context.begin_initializing();
        context.mark_ready();
        assert!(registry.is_initialized(&name, &descriptor()).unwrap());
    }

    #[test]
    fn test_try_get() {
        let registry = ContextRegistry::new();
        let name = TensorName::new("volley.w");
        assert!(registry.try_get(&name).is_none());
        registry.get_or_create(&name, &descriptor()).unwrap();
        assert!(registry.try_get(&name).is_some());
    }
}
