use super::{not_found, PersistenceHandlers, RequestHandler};
use crate::cancel::CancellationSignal;
use crate::error::PersistResult;
use crate::model::entity::Entity;
use crate::model::paged::{PageRequest, PagedResult};
use crate::repo::EntityRepository;
use crate::sql::generator::QueryOptions;
use std::marker::PhantomData;

/// Fetches one entity by key; soft-deleted rows are hidden unless requested.
#[derive(Debug, Clone)]
pub struct GetEntityById<E: Entity> {
    pub id: E::Id,
    pub include_deleted: bool,
}

impl<E: Entity> GetEntityById<E> {
    pub fn new(id: E::Id) -> Self {
        Self {
            id,
            include_deleted: false,
        }
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

/// Fetches every visible row. No implicit limit.
#[derive(Debug, Clone)]
pub struct GetAllEntities<E: Entity> {
    pub options: QueryOptions,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> GetAllEntities<E> {
    pub fn new() -> Self {
        Self::with_options(QueryOptions::default())
    }

    pub fn with_options(options: QueryOptions) -> Self {
        Self {
            options,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Default for GetAllEntities<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetches one page plus the total count. Raw page input is validated by
/// the handler before any I/O.
#[derive(Debug, Clone)]
pub struct GetPagedEntities<E: Entity> {
    pub page_number: i64,
    pub page_size: i64,
    pub options: QueryOptions,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> GetPagedEntities<E> {
    pub fn new(page_number: i64, page_size: i64) -> Self {
        Self {
            page_number,
            page_size,
            options: QueryOptions::default(),
            _entity: PhantomData,
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

impl<E: Entity> RequestHandler<GetEntityById<E>> for PersistenceHandlers {
    type Output = E;

    fn handle(&self, request: GetEntityById<E>, cancel: &CancellationSignal) -> PersistResult<E> {
        self.run::<E, _>("get_by_id", || {
            let (descriptor, driver) = self.prepare::<E>()?;
            let options = QueryOptions {
                include_deleted: request.include_deleted,
                ..QueryOptions::default()
            };
            let repo = EntityRepository::<E>::new(driver.as_ref(), &descriptor);
            repo.find_by_id(&request.id, &options, cancel)?
                .ok_or_else(|| not_found(&descriptor, &request.id))
        })
    }
}

impl<E: Entity> RequestHandler<GetAllEntities<E>> for PersistenceHandlers {
    type Output = Vec<E>;

    fn handle(
        &self,
        request: GetAllEntities<E>,
        cancel: &CancellationSignal,
    ) -> PersistResult<Vec<E>> {
        self.run::<E, _>("get_all", || {
            let (descriptor, driver) = self.prepare::<E>()?;
            EntityRepository::<E>::new(driver.as_ref(), &descriptor)
                .find_all(&request.options, cancel)
        })
    }
}

impl<E: Entity> RequestHandler<GetPagedEntities<E>> for PersistenceHandlers {
    type Output = PagedResult<E>;

    fn handle(
        &self,
        request: GetPagedEntities<E>,
        cancel: &CancellationSignal,
    ) -> PersistResult<PagedResult<E>> {
        self.run::<E, _>("get_paged", || {
            let page = PageRequest::with_limit(
                request.page_number,
                request.page_size,
                self.config.max_page_size,
            )?;
            let (descriptor, driver) = self.prepare::<E>()?;
            let repo = EntityRepository::<E>::new(driver.as_ref(), &descriptor);

            let total_count = repo.count(&request.options, cancel)?;
            cancel.check()?;
            let items = repo.find_page(page, &request.options, cancel)?;
            Ok(PagedResult::new(items, total_count, page))
        })
    }
}
