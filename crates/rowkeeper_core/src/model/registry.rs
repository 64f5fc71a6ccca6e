//! Process-wide descriptor resolution cache.
//!
//! # Responsibility
//! - Resolve each entity type's declaration exactly once.
//! - Share the resulting descriptor across all handlers and threads.
//!
//! # Invariants
//! - Only successful resolutions are cached; a failing declaration fails
//!   again on every call.
//! - Resolution is deterministic for a given declaration.

use crate::error::PersistResult;
use crate::model::descriptor::EntityDescriptor;
use crate::model::entity::Entity;
use log::{debug, error};
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

static DESCRIPTORS: Lazy<RwLock<HashMap<TypeId, Arc<EntityDescriptor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Resolves (and caches) the descriptor for entity type `E`.
///
/// # Errors
/// - `Configuration` when the declaration is invalid.
pub fn resolve<E: Entity>() -> PersistResult<Arc<EntityDescriptor>> {
    let type_id = TypeId::of::<E>();
    if let Some(descriptor) = DESCRIPTORS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&type_id)
    {
        return Ok(Arc::clone(descriptor));
    }

    let entity_name = short_type_name::<E>();
    let descriptor = match E::describe().build(entity_name) {
        Ok(descriptor) => Arc::new(descriptor),
        Err(err) => {
            error!(
                "event=descriptor_resolve module=model status=error entity={} error_code={} error={}",
                entity_name,
                err.code(),
                err
            );
            return Err(err);
        }
    };

    debug!(
        "event=descriptor_resolve module=model status=ok entity={} table={} columns={} soft_delete={}",
        entity_name,
        descriptor.table_name(),
        descriptor.columns().len(),
        descriptor.supports_soft_delete()
    );

    let mut cache = DESCRIPTORS.write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(cache.entry(type_id).or_insert(descriptor)))
}

/// Last path segment of the type name, without generic arguments.
pub fn short_type_name<E: ?Sized>() -> &'static str {
    let full = std::any::type_name::<E>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}
