//! Entity metadata and data shapes shared by every persistence component.
//!
//! # Responsibility
//! - Declare entity mappings and resolve them into cached descriptors.
//! - Define driver-agnostic values, rows and paging envelopes.
//!
//! # Invariants
//! - Every descriptor has exactly one primary-key column.
//! - Soft-delete support is a descriptor flag decided at resolution time.

pub mod descriptor;
pub mod entity;
pub mod paged;
pub mod registry;
pub mod value;
