//! Storage context resolution.
//!
//! # Responsibility
//! - Map an entity descriptor to the storage driver that owns it.
//!
//! # Invariants
//! - Named resolution never falls back to an undeclared context.
//! - For entities declared under several contexts, the first declared name
//!   that is registered wins.
//! - Context names are unique after trimming.

use crate::db::StorageDriver;
use crate::error::{PersistError, PersistResult};
use crate::model::descriptor::EntityDescriptor;
use log::error;
use std::collections::BTreeMap;
use std::sync::Arc;

pub trait ContextResolver: Send + Sync {
    /// Returns the driver that serves `descriptor`'s entity.
    fn resolve(&self, descriptor: &EntityDescriptor) -> PersistResult<Arc<dyn StorageDriver>>;

    fn has_context(&self, descriptor: &EntityDescriptor) -> bool;
}

/// Single-context deployment: every entity lives in one store.
pub struct SingleContextResolver {
    driver: Arc<dyn StorageDriver>,
}

impl SingleContextResolver {
    pub fn new(driver: Arc<dyn StorageDriver>) -> Self {
        Self { driver }
    }
}

impl ContextResolver for SingleContextResolver {
    fn resolve(&self, _descriptor: &EntityDescriptor) -> PersistResult<Arc<dyn StorageDriver>> {
        Ok(Arc::clone(&self.driver))
    }

    fn has_context(&self, _descriptor: &EntityDescriptor) -> bool {
        true
    }
}

/// Multi-context deployment keyed by context name.
#[derive(Default)]
pub struct NamedContextResolver {
    contexts: BTreeMap<String, Arc<dyn StorageDriver>>,
}

impl std::fmt::Debug for NamedContextResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedContextResolver")
            .field("contexts", &self.contexts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NamedContextResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one named context.
    ///
    /// # Errors
    /// - `Configuration` for blank, malformed or duplicate names.
    pub fn register(
        &mut self,
        name: &str,
        driver: Arc<dyn StorageDriver>,
    ) -> PersistResult<()> {
        let name = name.trim();
        if !is_valid_context_name(name) {
            return Err(PersistError::configuration(format!(
                "context name is invalid: `{name}`"
            )));
        }
        if self.contexts.contains_key(name) {
            return Err(PersistError::configuration(format!(
                "context already registered: `{name}`"
            )));
        }
        self.contexts.insert(name.to_string(), driver);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Sorted registered context names.
    pub fn context_names(&self) -> Vec<String> {
        self.contexts.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StorageDriver>> {
        self.contexts.get(name.trim()).cloned()
    }

    fn primary_name<'d>(&self, descriptor: &'d EntityDescriptor) -> Option<&'d str> {
        descriptor
            .contexts()
            .iter()
            .map(String::as_str)
            .find(|name| self.contexts.contains_key(*name))
    }
}

impl ContextResolver for NamedContextResolver {
    fn resolve(&self, descriptor: &EntityDescriptor) -> PersistResult<Arc<dyn StorageDriver>> {
        match self.primary_name(descriptor).and_then(|name| self.get(name)) {
            Some(driver) => Ok(driver),
            None => {
                error!(
                    "event=context_resolve module=context status=error entity={} declared={} registered={}",
                    descriptor.entity_name(),
                    descriptor.contexts().join("|"),
                    self.context_names().join("|")
                );
                Err(PersistError::ContextNotFound {
                    entity: descriptor.entity_name().to_string(),
                    declared: descriptor.contexts().to_vec(),
                })
            }
        }
    }

    fn has_context(&self, descriptor: &EntityDescriptor) -> bool {
        self.primary_name(descriptor).is_some()
    }
}

fn is_valid_context_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}
