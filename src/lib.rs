//! # pgbulk
//!
//! Compiled entity mappings for PostgreSQL-style binary `COPY` bulk loading.
//!
//! Declare once, per type, how an entity maps onto a table: renames, explicit
//! wire types, generated identifiers, one-to-many / one-to-one relations. The
//! [`EntityBuilder`] compiles that declaration into an immutable plan of
//! specialized write steps, a process-wide [`PlanCache`] keeps one plan per
//! type, and [`BulkLoader::bulk_insert`] streams arbitrarily large sequences
//! through the store's binary load protocol, recursing into relations with
//! foreign keys populated from each owner's primary key.
//!
//! The wire protocol itself is a collaborator behind the [`CopyConnection`] /
//! [`BinaryCopyWriter`] traits; [`MemoryConnection`] is the bundled reference
//! implementation.
//!
//! ```
//! use pgbulk::{
//!     BulkLoader, CancellationToken, Entity, EntityBuilder, FieldAccessor, MemoryConnection,
//!     Value,
//! };
//! use uuid::Uuid;
//!
//! struct Author {
//!     id: Uuid,
//!     name: String,
//!     books: Vec<Book>,
//! }
//!
//! struct Book {
//!     id: Uuid,
//!     author_id: Uuid,
//!     title: String,
//! }
//!
//! impl Entity for Author {
//!     fn entity_name() -> &'static str {
//!         "Author"
//!     }
//!     fn fields() -> Vec<FieldAccessor<Self>> {
//!         vec![
//!             FieldAccessor::new(
//!                 "id",
//!                 |a: &Author| Value::Uuid(a.id),
//!                 |a: &mut Author, v| {
//!                     if let Value::Uuid(u) = v {
//!                         a.id = u;
//!                     }
//!                 },
//!             ),
//!             FieldAccessor::new(
//!                 "name",
//!                 |a: &Author| Value::from(a.name.as_str()),
//!                 |a: &mut Author, v| {
//!                     if let Value::Text(s) = v {
//!                         a.name = s;
//!                     }
//!                 },
//!             ),
//!         ]
//!     }
//! }
//!
//! impl Entity for Book {
//!     fn entity_name() -> &'static str {
//!         "Book"
//!     }
//!     fn fields() -> Vec<FieldAccessor<Self>> {
//!         vec![
//!             FieldAccessor::new(
//!                 "id",
//!                 |b: &Book| Value::Uuid(b.id),
//!                 |b: &mut Book, v| {
//!                     if let Value::Uuid(u) = v {
//!                         b.id = u;
//!                     }
//!                 },
//!             ),
//!             FieldAccessor::new(
//!                 "author_id",
//!                 |b: &Book| Value::Uuid(b.author_id),
//!                 |b: &mut Book, v| {
//!                     if let Value::Uuid(u) = v {
//!                         b.author_id = u;
//!                     }
//!                 },
//!             ),
//!             FieldAccessor::new(
//!                 "title",
//!                 |b: &Book| Value::from(b.title.as_str()),
//!                 |b: &mut Book, v| {
//!                     if let Value::Text(s) = v {
//!                         b.title = s;
//!                     }
//!                 },
//!             ),
//!         ]
//!     }
//! }
//!
//! fn author_books(a: &mut Author) -> Option<&mut Vec<Book>> {
//!     Some(&mut a.books)
//! }
//!
//! let loader = BulkLoader::new();
//!
//! EntityBuilder::<Author>::new()
//!     .map_uuid_generator("id")
//!     .map_one_to_many(
//!         "books",
//!         author_books,
//!         |a: &Author| Value::Uuid(a.id),
//!         |b: &mut Book, key: &Value| {
//!             if let Value::Uuid(u) = key {
//!                 b.author_id = *u;
//!             }
//!         },
//!     )
//!     .build(loader.cache())
//!     .unwrap();
//!
//! EntityBuilder::<Book>::new()
//!     .map_uuid_generator("id")
//!     .build(loader.cache())
//!     .unwrap();
//!
//! let conn = MemoryConnection::new();
//! let mut authors = vec![Author {
//!     id: Uuid::nil(),
//!     name: "N. K. Jemisin".into(),
//!     books: vec![
//!         Book {
//!             id: Uuid::nil(),
//!             author_id: Uuid::nil(),
//!             title: "The Fifth Season".into(),
//!         },
//!         Book {
//!             id: Uuid::nil(),
//!             author_id: Uuid::nil(),
//!             title: "The Obelisk Gate".into(),
//!         },
//!     ],
//! }];
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let total = rt
//!     .block_on(loader.bulk_insert(&conn, &mut authors, &CancellationToken::new()))
//!     .unwrap();
//!
//! assert_eq!(total, 3);
//! assert!(!authors[0].id.is_nil());
//! assert_eq!(authors[0].books[0].author_id, authors[0].id);
//! assert_eq!(conn.row_count("Books"), 2);
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod entity;
pub mod loader;
pub mod plan;
pub mod protocol;

pub use builder::naming::{NamingConvention, SnakeCasePlural};
pub use builder::EntityBuilder;
pub use config::{Configurator, EntityConfiguration};
pub use crate::core::{BulkError, Result, Value, WireType};
pub use entity::{Entity, FieldAccessor};
pub use loader::{
    bulk_insert, loader, register_configuration, BulkLoader, DEFAULT_MAX_DEPTH,
};
pub use plan::{EntityPlan, PlanCache};
pub use protocol::{BinaryCopyWriter, CopyConnection, MemoryConnection, MemoryTable};

// The cancellation type threaded through every load, re-exported so callers
// don't need a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
