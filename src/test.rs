#![cfg(any(test, feature = "test"))]
//! Test support: store wrappers with fault injection and call accounting, plus ready-made catalogs on an in-memory
//! SQLite database.

pub mod store;

pub use self::cache::FlakyCache;
pub use self::store::InstrumentedStore;
pub use self::store::Interleave;
pub use self::store::StoreProbe;

#[cfg(feature = "sqlite")]
pub use self::sqlite::*;

#[cfg(feature = "sqlite")]
mod sqlite {
    use std::sync::Arc;

    use super::FlakyCache;
    use super::InstrumentedStore;
    use crate::error::config_err;
    use crate::error::Result;
    use crate::relational::driver::sqlite::Sqlite;
    use crate::relational::driver::DatabaseDriver;
    use crate::relational::SeaBookStore;
    use crate::relational::TableSchema;
    use crate::Catalog;

    pub type TestCatalog = Catalog<InstrumentedStore<SeaBookStore>, FlakyCache>;

    /// A fresh in-memory database with the book table in place.
    pub async fn sqlite_store(schema: TableSchema) -> Result<SeaBookStore> {
        let db = Sqlite::connect_memory().await?;
        db.configure().await?;
        let store = SeaBookStore::new(db.connection(), schema);
        store.create_table_if_missing().await?;
        Ok(store)
    }

    /// A catalog over an instrumented in-memory SQLite store and a flaky in-process cache. The store and cache
    /// handles are returned for inspection and fault injection.
    pub async fn sqlite_catalog() -> Result<(TestCatalog, Arc<InstrumentedStore<SeaBookStore>>, Arc<FlakyCache>)> {
        sqlite_catalog_with(TableSchema::default()).await
    }

    pub async fn sqlite_catalog_with(
        schema: TableSchema,
    ) -> Result<(TestCatalog, Arc<InstrumentedStore<SeaBookStore>>, Arc<FlakyCache>)> {
        let store = Arc::new(InstrumentedStore::new(sqlite_store(schema).await?));
        let cache = Arc::new(FlakyCache::new()?);
        let catalog = Catalog::builder()
            .relational(store.clone())
            .cache(cache.clone())
            .name("test")
            .build()
            .map_err(|err| config_err!("test catalog: {err}"))?;
        Ok((catalog, store, cache))
    }
}
