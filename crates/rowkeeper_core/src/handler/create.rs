use super::{PersistenceHandlers, RequestHandler};
use crate::audit::stamp_for_create;
use crate::cancel::CancellationSignal;
use crate::error::PersistResult;
use crate::model::entity::Entity;
use crate::repo::EntityRepository;

/// Inserts a new entity.
#[derive(Debug, Clone)]
pub struct CreateEntity<E: Entity> {
    pub entity: E,
    pub acting_user: Option<String>,
}

impl<E: Entity> CreateEntity<E> {
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

/// Key and persisted state of a created entity.
#[derive(Debug, Clone)]
pub struct Created<E: Entity> {
    pub id: E::Id,
    pub entity: E,
}

impl<E: Entity> RequestHandler<CreateEntity<E>> for PersistenceHandlers {
    type Output = Created<E>;

    fn handle(
        &self,
        request: CreateEntity<E>,
        cancel: &CancellationSignal,
    ) -> PersistResult<Created<E>> {
        self.run::<E, _>("create", || {
            let (descriptor, driver) = self.prepare::<E>()?;
            cancel.check()?;

            let actor = self.actor(request.acting_user.as_deref());
            let mut entity = request.entity;
            stamp_for_create(&mut entity, &descriptor, &actor, self.now())?;

            let repo = EntityRepository::<E>::new(driver.as_ref(), &descriptor);
            let id = repo.insert(&entity, cancel)?;
            entity.set_key(id.clone());
            Ok(Created { id, entity })
        })
    }
}
