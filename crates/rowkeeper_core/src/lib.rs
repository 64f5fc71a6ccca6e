//! Generic entity persistence for rowkeeper.
//!
//! Entity types describe their storage mapping once; handlers then provide
//! create, read, paged read, update, delete and soft delete for every type
//! against any configured storage context.

pub mod audit;
pub mod cancel;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod handler;
pub mod logging;
pub mod model;
pub mod repo;
pub mod sql;

pub use audit::{ActingUser, AuditFields, Clock, FixedClock, SystemClock, SYSTEM_ACTOR};
pub use cancel::CancellationSignal;
pub use config::{ContextConfig, StoreConfig, UpdateStrategy};
pub use context::{ContextResolver, NamedContextResolver, SingleContextResolver};
pub use db::{open_contexts, SqliteDriver, StorageDriver};
pub use error::{PersistError, PersistResult};
pub use handler::{
    CreateEntity, Created, DeleteEntity, GetAllEntities, GetEntityById, GetPagedEntities,
    PersistenceHandlers, RequestHandler, SoftDeleteEntity, UpdateEntity,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::descriptor::{ColumnDescriptor, ColumnSpec, DescriptorBuilder, EntityDescriptor};
pub use model::entity::{Entity, EntityKey, IntId};
pub use model::paged::{PageRequest, PagedResult};
pub use model::value::{Row, Value, ValueMap};
pub use sql::{DialectKind, OperationKind, QueryOptions, StatementTemplate};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
