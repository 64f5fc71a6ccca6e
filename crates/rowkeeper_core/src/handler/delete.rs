use super::{not_found, PersistenceHandlers, RequestHandler};
use crate::audit::stamp_for_soft_delete;
use crate::cancel::CancellationSignal;
use crate::error::PersistResult;
use crate::model::entity::Entity;
use crate::repo::EntityRepository;
use crate::sql::generator::QueryOptions;

/// Removes a row permanently, whatever its soft-delete state.
#[derive(Debug, Clone)]
pub struct DeleteEntity<E: Entity> {
    pub id: E::Id,
}

impl<E: Entity> DeleteEntity<E> {
    pub fn new(id: E::Id) -> Self {
        Self { id }
    }
}

/// Marks a visible row as deleted.
#[derive(Debug, Clone)]
pub struct SoftDeleteEntity<E: Entity> {
    pub id: E::Id,
    pub acting_user: Option<String>,
}

impl<E: Entity> SoftDeleteEntity<E> {
    pub fn new(id: E::Id) -> Self {
        Self {
            id,
            acting_user: None,
        }
    }

    pub fn acting_user(mut self, name: impl Into<String>) -> Self {
        self.acting_user = Some(name.into());
        self
    }
}

impl<E: Entity> RequestHandler<DeleteEntity<E>> for PersistenceHandlers {
    type Output = ();

    fn handle(&self, request: DeleteEntity<E>, cancel: &CancellationSignal) -> PersistResult<()> {
        self.run::<E, _>("delete", || {
            let (descriptor, driver) = self.prepare::<E>()?;
            let repo = EntityRepository::<E>::new(driver.as_ref(), &descriptor);
            if repo.delete(&request.id, cancel)? == 0 {
                return Err(not_found(&descriptor, &request.id));
            }
            Ok(())
        })
    }
}

impl<E: Entity> RequestHandler<SoftDeleteEntity<E>> for PersistenceHandlers {
    type Output = E;

    fn handle(
        &self,
        request: SoftDeleteEntity<E>,
        cancel: &CancellationSignal,
    ) -> PersistResult<E> {
        self.run::<E, _>("soft_delete", || {
            let (descriptor, driver) = self.prepare::<E>()?;
            descriptor.require_soft_delete()?;
            let repo = EntityRepository::<E>::new(driver.as_ref(), &descriptor);

            // Already-deleted rows are not candidates.
            let mut entity = repo
                .find_by_id(&request.id, &QueryOptions::default(), cancel)?
                .ok_or_else(|| not_found(&descriptor, &request.id))?;
            cancel.check()?;

            let actor = self.actor(request.acting_user.as_deref());
            stamp_for_soft_delete(&mut entity, &descriptor, &actor, self.now())?;

            if repo.soft_delete(&entity, cancel)? == 0 {
                return Err(not_found(&descriptor, &request.id));
            }
            Ok(entity)
        })
    }
}
