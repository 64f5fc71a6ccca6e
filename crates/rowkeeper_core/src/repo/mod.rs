//! Repository layer over storage drivers.
//!
//! # Responsibility
//! - Execute generated statements for any entity type.
//! - Isolate binding and row mapping from handler orchestration.
//!
//! # Invariants
//! - Repositories return raw outcomes (row counts, `Option`); deciding what
//!   counts as `NotFound` is the handlers' job.

pub mod entity_repo;

pub use entity_repo::EntityRepository;
