//! Store configuration.
//!
//! # Responsibility
//! - Describe handler policy (system actor, paging ceiling, update mode).
//! - Describe the storage contexts to open.
//!
//! # Invariants
//! - `system_actor` is never blank.
//! - `1 <= max_page_size <= MAX_PAGE_SIZE`.
//! - Context names are unique.

use crate::audit::SYSTEM_ACTOR;
use crate::error::{PersistError, PersistResult};
use crate::model::paged::MAX_PAGE_SIZE;
use crate::sql::dialect::DialectKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How Update handlers reach storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStrategy {
    /// Issue the UPDATE directly; zero affected rows means not found.
    #[default]
    Direct,
    /// Load the stored row first, apply caller values onto it, then write.
    Tracked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub system_actor: String,
    pub max_page_size: u32,
    pub update_strategy: UpdateStrategy,
    pub contexts: Vec<ContextConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            system_actor: SYSTEM_ACTOR.to_string(),
            max_page_size: MAX_PAGE_SIZE,
            update_strategy: UpdateStrategy::default(),
            contexts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    pub name: String,
    pub dialect: DialectKind,
    /// File path, or `:memory:` for a private in-memory database.
    pub database: String,
}

impl StoreConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> PersistResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| PersistError::configuration(format!("invalid store config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PersistResult<()> {
        if self.system_actor.trim().is_empty() {
            return Err(PersistError::configuration("system_actor cannot be empty"));
        }
        if self.max_page_size == 0 || self.max_page_size > MAX_PAGE_SIZE {
            return Err(PersistError::configuration(format!(
                "max_page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.max_page_size
            )));
        }

        let mut names = BTreeSet::new();
        for context in &self.contexts {
            let name = context.name.trim();
            if name.is_empty() {
                return Err(PersistError::configuration("context name cannot be empty"));
            }
            if context.database.trim().is_empty() {
                return Err(PersistError::configuration(format!(
                    "context `{name}` has no database"
                )));
            }
            if !names.insert(name) {
                return Err(PersistError::configuration(format!(
                    "duplicate context `{name}`"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreConfig, UpdateStrategy};
    use crate::error::PersistError;
    use crate::sql::dialect::DialectKind;

    #[test]
    fn empty_document_uses_defaults() {
        let config = StoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.system_actor, "SYSTEM");
        assert_eq!(config.max_page_size, 1000);
    }

    #[test]
    fn parses_contexts_and_strategy() {
        let config = StoreConfig::from_json_str(
            r#"{
                "update_strategy": "tracked",
                "contexts": [
                    {"name": "main", "dialect": "sqlite", "database": ":memory:"},
                    {"name": "reporting", "dialect": "postgres", "database": "postgres://report"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.update_strategy, UpdateStrategy::Tracked);
        assert_eq!(config.contexts[1].dialect, DialectKind::Postgres);
    }

    #[test]
    fn rejects_duplicates_and_bad_limits() {
        let duplicate = StoreConfig::from_json_str(
            r#"{"contexts": [
                {"name": "main", "dialect": "sqlite", "database": "a.db"},
                {"name": " main ", "dialect": "sqlite", "database": "b.db"}
            ]}"#,
        )
        .unwrap_err();
        assert!(duplicate.to_string().contains("duplicate context"));

        let limit = StoreConfig::from_json_str(r#"{"max_page_size": 5000}"#).unwrap_err();
        assert!(matches!(limit, PersistError::Configuration(_)));

        let unknown = StoreConfig::from_json_str(r#"{"pool_size": 4}"#).unwrap_err();
        assert!(unknown.to_string().contains("invalid store config"));
    }
}
