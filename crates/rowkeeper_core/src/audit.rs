//! Audit field stamping.
//!
//! # Responsibility
//! - Maintain creation/modification/deletion actor and timestamp fields.
//! - Resolve the acting user explicitly passed by callers.
//!
//! # Invariants
//! - Create: created_* == last_modified_*; deletion fields reset.
//! - Update: only last_modified_* change.
//! - Soft delete: deletion fields set and last_modified_* refreshed.
//! - A missing actor falls back to the system actor and never fails.

use crate::error::{PersistError, PersistResult};
use crate::model::descriptor::{audit_property, EntityDescriptor};
use crate::model::entity::Entity;
use crate::model::value::{Row, Value, ValueMap};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Sentinel actor used when no authenticated actor is available.
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// Audit metadata carried by entities that opt in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub last_modified_by: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

impl AuditFields {
    /// Writes the fields the descriptor maps to columns.
    pub(crate) fn write_values(&self, descriptor: &EntityDescriptor, values: &mut ValueMap) {
        if descriptor.is_auditable() {
            values.insert(audit_property::CREATED_AT.into(), self.created_at.into());
            values.insert(audit_property::CREATED_BY.into(), self.created_by.clone().into());
            values.insert(
                audit_property::LAST_MODIFIED_AT.into(),
                self.last_modified_at.into(),
            );
            values.insert(
                audit_property::LAST_MODIFIED_BY.into(),
                self.last_modified_by.clone().into(),
            );
        }
        if descriptor.supports_soft_delete() {
            values.insert(audit_property::IS_DELETED.into(), Value::Bool(self.is_deleted));
            values.insert(audit_property::DELETED_AT.into(), self.deleted_at.into());
            values.insert(audit_property::DELETED_BY.into(), self.deleted_by.clone().into());
        }
    }

    /// Reads the fields the descriptor maps to columns.
    pub(crate) fn from_row(row: &Row, descriptor: &EntityDescriptor) -> PersistResult<Self> {
        let mut fields = Self::default();
        if descriptor.is_auditable() {
            fields.created_at = row.get_opt_timestamp(audit_property::CREATED_AT)?;
            fields.created_by = row.get_opt_text(audit_property::CREATED_BY)?;
            fields.last_modified_at = row.get_opt_timestamp(audit_property::LAST_MODIFIED_AT)?;
            fields.last_modified_by = row.get_opt_text(audit_property::LAST_MODIFIED_BY)?;
        }
        if descriptor.supports_soft_delete() {
            fields.is_deleted = row.get_bool(audit_property::IS_DELETED)?;
            fields.deleted_at = row.get_opt_timestamp(audit_property::DELETED_AT)?;
            fields.deleted_by = row.get_opt_text(audit_property::DELETED_BY)?;
        }
        Ok(fields)
    }

    /// Keeps creation and deletion state from a stored copy.
    pub(crate) fn carry_over_from(&mut self, stored: &AuditFields) {
        self.created_at = stored.created_at;
        self.created_by = stored.created_by.clone();
        self.is_deleted = stored.is_deleted;
        self.deleted_at = stored.deleted_at;
        self.deleted_by = stored.deleted_by.clone();
    }
}

/// Identity recorded in audit fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser(String);

impl ActingUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Uses `requested` when present and non-blank, else `system_actor`.
    ///
    /// # Side effects
    /// - Emits `event=actor_fallback` when the system actor is used.
    pub fn resolve(requested: Option<&str>, system_actor: &str) -> Self {
        match requested.map(str::trim) {
            Some(name) if !name.is_empty() => Self(name.to_string()),
            _ => {
                warn!(
                    "event=actor_fallback module=audit status=fallback actor={}",
                    system_actor
                );
                Self(system_actor.to_string())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ActingUser {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of "now" for audit timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn stamp_for_create<E: Entity>(
    entity: &mut E,
    descriptor: &EntityDescriptor,
    actor: &ActingUser,
    now: DateTime<Utc>,
) -> PersistResult<()> {
    let Some(fields) = audit_fields_mut(entity, descriptor)? else {
        return Ok(());
    };
    if descriptor.is_auditable() {
        fields.created_at = Some(now);
        fields.created_by = Some(actor.to_string());
        fields.last_modified_at = Some(now);
        fields.last_modified_by = Some(actor.to_string());
    }
    if descriptor.supports_soft_delete() {
        fields.is_deleted = false;
        fields.deleted_at = None;
        fields.deleted_by = None;
    }
    Ok(())
}

pub fn stamp_for_update<E: Entity>(
    entity: &mut E,
    descriptor: &EntityDescriptor,
    actor: &ActingUser,
    now: DateTime<Utc>,
) -> PersistResult<()> {
    let Some(fields) = audit_fields_mut(entity, descriptor)? else {
        return Ok(());
    };
    if descriptor.is_auditable() {
        fields.last_modified_at = Some(now);
        fields.last_modified_by = Some(actor.to_string());
    }
    Ok(())
}

/// # Errors
/// - `UnsupportedOperation` when the type has no soft-delete capability.
pub fn stamp_for_soft_delete<E: Entity>(
    entity: &mut E,
    descriptor: &EntityDescriptor,
    actor: &ActingUser,
    now: DateTime<Utc>,
) -> PersistResult<()> {
    descriptor.require_soft_delete()?;
    let Some(fields) = audit_fields_mut(entity, descriptor)? else {
        return Ok(());
    };
    fields.is_deleted = true;
    fields.deleted_at = Some(now);
    fields.deleted_by = Some(actor.to_string());
    if descriptor.is_auditable() {
        fields.last_modified_at = Some(now);
        fields.last_modified_by = Some(actor.to_string());
    }
    Ok(())
}

/// `None` when the descriptor maps no audit columns.
fn audit_fields_mut<'e, E: Entity>(
    entity: &'e mut E,
    descriptor: &EntityDescriptor,
) -> PersistResult<Option<&'e mut AuditFields>> {
    if !descriptor.is_auditable() && !descriptor.supports_soft_delete() {
        return Ok(None);
    }
    entity.audit_mut().map(Some).ok_or_else(|| {
        PersistError::configuration(format!(
            "{} declares audit columns but exposes no audit fields",
            descriptor.entity_name()
        ))
    })
}
