use super::{not_found, PersistenceHandlers, RequestHandler};
use crate::audit::stamp_for_update;
use crate::cancel::CancellationSignal;
use crate::config::UpdateStrategy;
use crate::error::{PersistError, PersistResult};
use crate::model::entity::Entity;
use crate::repo::EntityRepository;
use crate::sql::generator::QueryOptions;

/// Replaces the stored values of an existing, non-deleted entity.
///
/// Returns the written entity. Creation and deletion audit columns are never
/// part of the UPDATE: under `UpdateStrategy::Direct` the returned entity keeps
/// whatever the caller supplied for them, under `Tracked` they are copied
/// from the stored row. Reload the entity when the stored values matter.
#[derive(Debug, Clone)]
pub struct UpdateEntity<E: Entity> {
    pub entity: E,
    pub acting_user: Option<String>,
}

impl<E: Entity> UpdateEntity<E> {
    pub fn new(entity: E) -> Self {
        Self {
            entity,
            acting_user: None,
        }
    }

    pub fn acting_user(mut self, name: impl Into<String>) -> Self {
        self.acting_user = Some(name.into());
        self
    }
}

impl<E: Entity> RequestHandler<UpdateEntity<E>> for PersistenceHandlers {
    type Output = E;

    fn handle(&self, request: UpdateEntity<E>, cancel: &CancellationSignal) -> PersistResult<E> {
        self.run::<E, _>("update", || {
            let mut entity = request.entity;
            let key = entity
                .key()
                .ok_or_else(|| PersistError::validation("update requires an entity key"))?;
            let (descriptor, driver) = self.prepare::<E>()?;
            let repo = EntityRepository::<E>::new(driver.as_ref(), &descriptor);
            let options = QueryOptions::default();

            if self.config.update_strategy == UpdateStrategy::Tracked {
                let stored = repo
                    .find_by_id(&key, &options, cancel)?
                    .ok_or_else(|| not_found(&descriptor, &key))?;
                cancel.check()?;
                if let (Some(fields), Some(stored_fields)) = (entity.audit_mut(), stored.audit()) {
                    fields.carry_over_from(stored_fields);
                }
            }

            let actor = self.actor(request.acting_user.as_deref());
            stamp_for_update(&mut entity, &descriptor, &actor, self.now())?;

            if repo.update(&entity, &options, cancel)? == 0 {
                return Err(not_found(&descriptor, &key));
            }
            Ok(entity)
        })
    }
}
