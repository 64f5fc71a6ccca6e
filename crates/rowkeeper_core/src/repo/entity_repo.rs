//! Generic entity repository over one storage driver.
//!
//! # Responsibility
//! - Generate statements for an entity type and bind entity values to them.
//! - Map driver rows back into entity instances, audit fields included.
//!
//! # Invariants
//! - Every placeholder of a generated statement is bound, or binding fails
//!   with `Configuration`; nothing is silently sent as NULL.
//! - Audit columns are only read and written through `AuditFields`.

use crate::audit::AuditFields;
use crate::cancel::CancellationSignal;
use crate::db::{BoundStatement, StorageDriver};
use crate::error::{PersistError, PersistResult};
use crate::model::descriptor::EntityDescriptor;
use crate::model::entity::{Entity, EntityKey};
use crate::model::paged::PageRequest;
use crate::model::value::{Row, Value, ValueMap};
use crate::sql::dialect::{IdentityRetrieval, SKIP_PARAM, TAKE_PARAM};
use crate::sql::generator::{generate, OperationKind, QueryOptions, StatementTemplate};
use std::marker::PhantomData;

pub struct EntityRepository<'a, E: Entity> {
    driver: &'a dyn StorageDriver,
    descriptor: &'a EntityDescriptor,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> EntityRepository<'a, E> {
    pub fn new(driver: &'a dyn StorageDriver, descriptor: &'a EntityDescriptor) -> Self {
        Self {
            driver,
            descriptor,
            _entity: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        self.descriptor
    }

    /// Inserts `entity` and returns its key.
    ///
    /// The key comes from the identity retrieval when the identity column is
    /// the primary key, otherwise from `entity.key()`.
    ///
    /// # Errors
    /// - `CreateFailed` when the key source yields nothing.
    pub fn insert(&self, entity: &E, cancel: &CancellationSignal) -> PersistResult<E::Id> {
        let template = self.template(OperationKind::Insert, &QueryOptions::default())?;
        let key_is_generated = self
            .descriptor
            .identity_column()
            .is_some_and(|column| column.is_primary_key);
        let assigned_key = entity.key();
        if !key_is_generated && assigned_key.is_none() {
            return Err(PersistError::CreateFailed(format!(
                "{} needs a caller-assigned key",
                self.descriptor.entity_name()
            )));
        }

        let statement = self.bind(&template, &self.entity_values(entity)?)?;
        if !key_is_generated {
            // A RETURNING clause still yields a row; its value is not the key.
            match &template.identity {
                Some(IdentityRetrieval::Returning(_)) => {
                    self.driver.query_single(&statement, cancel)?;
                }
                _ => {
                    self.driver.execute(&statement, cancel)?;
                }
            }
            return assigned_key.ok_or_else(|| self.missing_key());
        }

        let value = match &template.identity {
            Some(IdentityRetrieval::Returning(_)) => self.driver.query_single(&statement, cancel)?,
            Some(IdentityRetrieval::FollowUp(follow_up)) => {
                self.driver
                    .execute_with_follow_up(&statement, follow_up, cancel)?
                    .1
            }
            None => {
                self.driver.execute(&statement, cancel)?;
                None
            }
        };
        self.decode_key(value)
    }

    pub fn find_by_id(
        &self,
        id: &E::Id,
        options: &QueryOptions,
        cancel: &CancellationSignal,
    ) -> PersistResult<Option<E>> {
        let template = self.template(OperationKind::SelectById, options)?;
        let statement = self.bind(&template, &self.key_values(id))?;
        let rows = self.driver.query(&statement, cancel)?;
        rows.first().map(|row| self.map_row(row)).transpose()
    }

    pub fn find_all(
        &self,
        options: &QueryOptions,
        cancel: &CancellationSignal,
    ) -> PersistResult<Vec<E>> {
        let template = self.template(OperationKind::SelectAll, options)?;
        let statement = self.bind(&template, &ValueMap::new())?;
        self.map_rows(self.driver.query(&statement, cancel)?)
    }

    pub fn count(&self, options: &QueryOptions, cancel: &CancellationSignal) -> PersistResult<u64> {
        let template = self.template(OperationKind::Count, options)?;
        let statement = self.bind(&template, &ValueMap::new())?;
        match self.driver.query_single(&statement, cancel)? {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Integer(count)) if count >= 0 => Ok(count as u64),
            Some(other) => Err(PersistError::internal(
                format!("unexpected count value `{other}`"),
                "RowDecode",
            )),
        }
    }

    pub fn find_page(
        &self,
        page: PageRequest,
        options: &QueryOptions,
        cancel: &CancellationSignal,
    ) -> PersistResult<Vec<E>> {
        let template = self.template(OperationKind::SelectPaged, options)?;
        let mut values = ValueMap::new();
        values.insert(SKIP_PARAM.to_string(), Value::Integer(page.skip() as i64));
        values.insert(TAKE_PARAM.to_string(), Value::Integer(page.take() as i64));
        let statement = self.bind(&template, &values)?;
        self.map_rows(self.driver.query(&statement, cancel)?)
    }

    /// Returns the number of rows updated.
    pub fn update(
        &self,
        entity: &E,
        options: &QueryOptions,
        cancel: &CancellationSignal,
    ) -> PersistResult<u64> {
        let template = self.template(OperationKind::Update, options)?;
        let statement = self.bind(&template, &self.entity_values(entity)?)?;
        Ok(self.driver.execute(&statement, cancel)?)
    }

    /// Returns the number of rows removed.
    pub fn delete(&self, id: &E::Id, cancel: &CancellationSignal) -> PersistResult<u64> {
        let template = self.template(OperationKind::Delete, &QueryOptions::default())?;
        let statement = self.bind(&template, &self.key_values(id))?;
        Ok(self.driver.execute(&statement, cancel)?)
    }

    /// Persists the deletion fields already stamped on `entity`.
    pub fn soft_delete(&self, entity: &E, cancel: &CancellationSignal) -> PersistResult<u64> {
        let template = self.template(OperationKind::SoftDelete, &QueryOptions::default())?;
        let statement = self.bind(&template, &self.entity_values(entity)?)?;
        Ok(self.driver.execute(&statement, cancel)?)
    }

    fn template(
        &self,
        kind: OperationKind,
        options: &QueryOptions,
    ) -> PersistResult<StatementTemplate> {
        generate(self.descriptor, kind, options, self.driver.dialect())
    }

    fn bind(&self, template: &StatementTemplate, values: &ValueMap) -> PersistResult<BoundStatement> {
        let mut statement = BoundStatement::new(template.text.as_str());
        for name in &template.parameters {
            if statement.params.iter().any(|(bound, _)| bound == name) {
                continue;
            }
            let value = values.get(name).ok_or_else(|| {
                PersistError::configuration(format!(
                    "{} supplied no value for `{name}`",
                    self.descriptor.entity_name()
                ))
            })?;
            statement.params.push((name.clone(), value.clone()));
        }
        Ok(statement)
    }

    fn key_values(&self, id: &E::Id) -> ValueMap {
        let mut values = ValueMap::new();
        values.insert(
            self.descriptor.primary_key_column().property_name.clone(),
            id.to_value(),
        );
        values
    }

    fn entity_values(&self, entity: &E) -> PersistResult<ValueMap> {
        let mut values = ValueMap::new();
        entity.write_values(&mut values);
        if let Some(key) = entity.key() {
            values.insert(
                self.descriptor.primary_key_column().property_name.clone(),
                key.to_value(),
            );
        }
        if self.has_audit_columns() {
            entity
                .audit()
                .ok_or_else(|| self.missing_audit_fields())?
                .write_values(self.descriptor, &mut values);
        }
        Ok(values)
    }

    fn map_rows(&self, rows: Vec<Row>) -> PersistResult<Vec<E>> {
        rows.iter().map(|row| self.map_row(row)).collect()
    }

    fn map_row(&self, row: &Row) -> PersistResult<E> {
        let mut entity = E::from_row(row)?;
        if self.has_audit_columns() {
            let fields = AuditFields::from_row(row, self.descriptor)?;
            *entity
                .audit_mut()
                .ok_or_else(|| self.missing_audit_fields())? = fields;
        }
        Ok(entity)
    }

    fn decode_key(&self, value: Option<Value>) -> PersistResult<E::Id> {
        value
            .as_ref()
            .and_then(<E::Id as EntityKey>::from_value)
            .ok_or_else(|| self.missing_key())
    }

    fn has_audit_columns(&self) -> bool {
        self.descriptor.is_auditable() || self.descriptor.supports_soft_delete()
    }

    fn missing_key(&self) -> PersistError {
        PersistError::CreateFailed(format!(
            "{} insert yielded no key",
            self.descriptor.entity_name()
        ))
    }

    fn missing_audit_fields(&self) -> PersistError {
        PersistError::configuration(format!(
            "{} declares audit columns but exposes no audit fields",
            self.descriptor.entity_name()
        ))
    }
}
