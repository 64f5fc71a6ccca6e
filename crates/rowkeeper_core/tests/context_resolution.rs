mod common;

use common::{handlers_over, Tag, User, TAGS_SCHEMA, USERS_SCHEMA};
use rowkeeper_core::{
    open_contexts, CancellationSignal, ColumnSpec, ContextConfig, CreateEntity, DescriptorBuilder,
    DialectKind, Entity, EntityDescriptor, GetAllEntities, NamedContextResolver, PersistError,
    PersistResult, PersistenceHandlers, RequestHandler, Row, SqliteDriver, StoreConfig, ValueMap,
};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Orphan {
    id: i64,
}

impl Entity for Orphan {
    type Id = i64;

    fn describe() -> DescriptorBuilder {
        EntityDescriptor::builder("orphans").column(ColumnSpec::new("Id").identity())
    }

    fn key(&self) -> Option<i64> {
        (self.id > 0).then_some(self.id)
    }

    fn set_key(&mut self, key: i64) {
        self.id = key;
    }

    fn write_values(&self, _values: &mut ValueMap) {}

    fn from_row(row: &Row) -> PersistResult<Self> {
        Ok(Self {
            id: row.get_i64("Id")?,
        })
    }
}

fn context(name: &str, dialect: DialectKind, database: &str) -> ContextConfig {
    ContextConfig {
        name: name.to_string(),
        dialect,
        database: database.to_string(),
    }
}

#[test]
fn first_declared_registered_context_wins() {
    let temp = tempfile::tempdir().unwrap();
    let catalog_path = temp.path().join("catalog.db");
    let catalog_db = catalog_path.to_str().unwrap();
    SqliteDriver::open(&catalog_path)
        .unwrap()
        .execute_batch(TAGS_SCHEMA)
        .unwrap();

    let config = StoreConfig {
        contexts: vec![
            context("main", DialectKind::Sqlite, ":memory:"),
            context("catalog", DialectKind::Sqlite, catalog_db),
        ],
        ..StoreConfig::default()
    };
    let resolver = open_contexts(&config).unwrap();
    assert_eq!(resolver.context_names(), ["catalog", "main"]);

    // `main` has no tables; the insert only succeeds against `catalog`.
    let handlers = PersistenceHandlers::new(Arc::new(resolver));
    handlers
        .handle(
            CreateEntity::new(Tag::new("db", "Databases")),
            &CancellationSignal::none(),
        )
        .unwrap();

    let reopened = handlers_over(Arc::new(SqliteDriver::open(&catalog_path).unwrap()));
    let tags: Vec<Tag> = reopened
        .handle(GetAllEntities::<Tag>::new(), &CancellationSignal::none())
        .unwrap();
    assert_eq!(tags, [Tag::new("db", "Databases")]);
}

#[test]
fn later_declared_context_is_used_when_earlier_is_absent() {
    let main = SqliteDriver::open_in_memory().unwrap();
    main.execute_batch(TAGS_SCHEMA).unwrap();
    let mut resolver = NamedContextResolver::new();
    resolver.register("main", Arc::new(main)).unwrap();

    let handlers = PersistenceHandlers::new(Arc::new(resolver));
    assert!(handlers.has_context::<Tag>().unwrap());
    let created = handlers
        .handle(
            CreateEntity::new(Tag::new("ops", "Operations")),
            &CancellationSignal::none(),
        )
        .unwrap();
    assert_eq!(created.id, "ops");
}

#[test]
fn undeclared_or_unregistered_context_is_not_found() {
    let catalog = SqliteDriver::open_in_memory().unwrap();
    catalog.execute_batch(USERS_SCHEMA).unwrap();
    let mut resolver = NamedContextResolver::new();
    resolver.register("catalog", Arc::new(catalog)).unwrap();
    let handlers = PersistenceHandlers::new(Arc::new(resolver));
    let cancel = CancellationSignal::none();

    assert!(!handlers.has_context::<User>().unwrap());
    let err = handlers
        .handle(GetAllEntities::<User>::new(), &cancel)
        .unwrap_err();
    match err {
        PersistError::ContextNotFound { entity, declared } => {
            assert_eq!(entity, "User");
            assert_eq!(declared, ["main"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = handlers
        .handle(GetAllEntities::<Orphan>::new(), &cancel)
        .unwrap_err();
    assert!(matches!(err, PersistError::ContextNotFound { .. }));
}

#[test]
fn duplicate_or_invalid_context_names_are_rejected() {
    let mut resolver = NamedContextResolver::new();
    resolver
        .register("main", Arc::new(SqliteDriver::open_in_memory().unwrap()))
        .unwrap();

    let err = resolver
        .register(" main ", Arc::new(SqliteDriver::open_in_memory().unwrap()))
        .unwrap_err();
    assert!(matches!(err, PersistError::Configuration(_)));
    let err = resolver
        .register("", Arc::new(SqliteDriver::open_in_memory().unwrap()))
        .unwrap_err();
    assert!(matches!(err, PersistError::Configuration(_)));
    assert_eq!(resolver.len(), 1);
}

#[test]
fn contexts_without_bundled_driver_are_configuration_errors() {
    let config = StoreConfig::from_json_str(
        r#"{
            "contexts": [
                { "name": "main", "dialect": "postgres", "database": "postgres://localhost/app" }
            ]
        }"#,
    )
    .unwrap();
    let err = open_contexts(&config).unwrap_err();
    assert!(matches!(err, PersistError::Configuration(_)));
}
