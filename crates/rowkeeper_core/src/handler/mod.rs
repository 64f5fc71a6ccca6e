//! Persistence handlers: one request type per canonical operation.
//!
//! # Responsibility
//! - Orchestrate context resolution, statement generation, audit stamping
//!   and execution for one unit of work.
//! - Turn every outcome into a typed `PersistResult`.
//!
//! # Invariants
//! - Handlers are stateless between calls and never spawn work.
//! - Unexpected failures, panics included, surface as `Internal`.
//! - Audit stamps are applied to handler-owned copies and only returned to
//!   the caller after the write succeeded.
//! - `NotFound` is logged at debug level, never as an error.

use crate::audit::{ActingUser, Clock, SystemClock};
use crate::cancel::CancellationSignal;
use crate::config::StoreConfig;
use crate::context::ContextResolver;
use crate::db::StorageDriver;
use crate::error::{PersistError, PersistResult};
use crate::logging::payload_summary;
use crate::model::descriptor::EntityDescriptor;
use crate::model::entity::Entity;
use crate::model::registry::{resolve, short_type_name};
use chrono::{DateTime, SubsecRound, Utc};
use log::{debug, error, info, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

mod create;
mod delete;
mod read;
mod update;

pub use create::{CreateEntity, Created};
pub use delete::{DeleteEntity, SoftDeleteEntity};
pub use read::{GetAllEntities, GetEntityById, GetPagedEntities};
pub use update::UpdateEntity;

/// Entry point used by the request dispatcher.
pub trait RequestHandler<R> {
    type Output;

    fn handle(&self, request: R, cancel: &CancellationSignal) -> PersistResult<Self::Output>;
}

/// Handler set shared by every entity type.
pub struct PersistenceHandlers {
    contexts: Arc<dyn ContextResolver>,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
}

impl PersistenceHandlers {
    pub fn new(contexts: Arc<dyn ContextResolver>) -> Self {
        Self {
            contexts,
            clock: Arc::new(SystemClock),
            config: StoreConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Applies handler policy from `config`.
    ///
    /// # Errors
    /// - `Configuration` when the config does not validate.
    pub fn with_config(mut self, config: StoreConfig) -> PersistResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Whether a storage context is configured for `E`.
    pub fn has_context<E: Entity>(&self) -> PersistResult<bool> {
        let descriptor = resolve::<E>()?;
        Ok(self.contexts.has_context(&descriptor))
    }

    fn prepare<E: Entity>(&self) -> PersistResult<(Arc<EntityDescriptor>, Arc<dyn StorageDriver>)> {
        let descriptor = resolve::<E>()?;
        let driver = self.contexts.resolve(&descriptor)?;
        Ok((descriptor, driver))
    }

    fn actor(&self, requested: Option<&str>) -> ActingUser {
        ActingUser::resolve(requested, &self.config.system_actor)
    }

    /// Storage keeps microseconds; stamps match what a reload returns.
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    fn run<E: Entity, T>(
        &self,
        operation: &'static str,
        work: impl FnOnce() -> PersistResult<T>,
    ) -> PersistResult<T> {
        let started_at = Instant::now();
        let entity = short_type_name::<E>();
        let result = catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
            Err(PersistError::internal(payload_summary(payload.as_ref()), "panic"))
        });
        let duration_ms = started_at.elapsed().as_millis();

        match &result {
            Ok(_) => info!(
                "event=entity_{} module=handler status=ok entity={} duration_ms={}",
                operation, entity, duration_ms
            ),
            Err(PersistError::NotFound { key, .. }) => debug!(
                "event=entity_{} module=handler status=not_found entity={} duration_ms={} key={}",
                operation, entity, duration_ms, key
            ),
            Err(PersistError::Cancelled) => info!(
                "event=entity_{} module=handler status=cancelled entity={} duration_ms={}",
                operation, entity, duration_ms
            ),
            Err(err @ PersistError::Internal { .. }) => error!(
                "event=entity_{} module=handler status=error entity={} duration_ms={} error_code={} error={}",
                operation,
                entity,
                duration_ms,
                err.code(),
                err
            ),
            Err(err) => warn!(
                "event=entity_{} module=handler status=error entity={} duration_ms={} error_code={} error={}",
                operation,
                entity,
                duration_ms,
                err.code(),
                err
            ),
        }
        result
    }
}

fn not_found(descriptor: &EntityDescriptor, key: &impl std::fmt::Display) -> PersistError {
    PersistError::not_found(descriptor.entity_name(), key)
}
