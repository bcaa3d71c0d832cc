//! # book-catalog
//!
//! A book catalog that keeps a relational database, the system of record, and a key/value cache consistent with
//! each other.
//!
//! # The Basics
//!
//! Calling code sees a single [`BookRepository`] and never talks to either store directly. The repository is
//! implemented by [`Catalog`], which combines:
//!
//! - a [`RelationalStore`](traits::RelationalStore), the authority on what exists. The bundled implementation is
//!   [`SeaBookStore`](relational::SeaBookStore) on top of [SeaORM](https://crates.io/crates/sea-orm), with the table
//!   and column names taken from a [`TableSchema`](relational::TableSchema);
//! - a [`CacheStore`](traits::CacheStore) holding serialized books under their id with a 24 hour lifetime. Two are
//!   bundled: [`RedisCacheStore`](cache_store::RedisCacheStore) and the in-process
//!   [`MemoryCacheStore`](cache_store::MemoryCacheStore) on top of [moka](https://crates.io/crates/moka).
//!
//! Writes go through a relational transaction and only then refresh or evict the cache. Reads by id are served from
//! the cache when possible and repopulate it on a miss. List queries always go to the database. The exact ordering
//! and what it guarantees are described in the [`orchestrator`] module.
//!
//! Every operation takes a [`RequestContext`] carrying an optional deadline. When the deadline passes the operation
//! fails with [`CatalogError::Timeout`] and whatever transaction it had open is rolled back.
//!
//! ```ignore
//! use book_catalog::prelude::*;
//!
//! let catalog = CatalogConfig::load()?.connect().await?;
//! let ctx = RequestContext::with_timeout(Duration::from_secs(5));
//!
//! let dune = catalog.create(&ctx, NewBook::new("Dune", "Frank Herbert", 1965)).await?;
//! let dune = catalog.update(&ctx, &dune.id, BookPatch::default().year(1966)).await?;
//! assert_eq!(catalog.get_by_id(&ctx, &dune.id).await?.year, 1966);
//! ```
//!
//! # Features
//!
//! - `pg`, `sqlite`, `mysql`: SeaORM database backends. `pg` and `sqlite` also enable the matching
//!   [drivers](relational::driver).
//! - `tracing`: [`telemetry::setup_tracing()`] for applications that want a ready-made subscriber.
//! - `test`: the [`test`] module with fault-injecting store wrappers.

pub mod cache_store;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod relational;
pub mod service;
pub mod telemetry;
pub mod test;
pub mod traits;
pub mod types;

#[doc(inline)]
pub use config::CatalogConfig;
#[doc(inline)]
pub use context::RequestContext;
#[doc(inline)]
pub use error::CatalogError;
#[doc(inline)]
pub use orchestrator::Catalog;
#[doc(inline)]
pub use service::BookService;
#[doc(inline)]
pub use traits::BookRepository;

pub mod prelude {
    pub use crate::cache_store::MemoryCacheStore;
    pub use crate::cache_store::RedisCacheStore;
    pub use crate::config::CatalogConfig;
    pub use crate::context::RequestContext;
    pub use crate::error::CacheError;
    pub use crate::error::CatalogError;
    pub use crate::orchestrator::Catalog;
    pub use crate::relational::SeaBookStore;
    pub use crate::relational::TableSchema;
    pub use crate::service::BookService;
    pub use crate::traits::BookRepository;
    pub use crate::traits::CacheStore;
    pub use crate::traits::RelationalStore;
    pub use crate::types::*;
}
