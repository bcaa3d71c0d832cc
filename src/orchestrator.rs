//! The consistency layer between the relational system of record and the cache.
//!
//! # Write ordering
//!
//! The relational commit is authoritative, the cache is strictly best-effort:
//!
//! - **create** inserts inside a transaction, writes the cache entry, then commits. A failed cache write is logged
//!   and the create still succeeds; later reads simply miss and repopulate. If the commit itself fails, the entry
//!   just written is evicted so it cannot outlive a row that never became durable.
//! - **update** patches and re-reads the row inside a transaction, commits, then overwrites the cache entry with the
//!   re-read row.
//! - **delete** deletes inside a transaction, commits, then evicts the cache entry.
//! - **get by id** is cache-aside with read-through: a hit never touches the database, a miss (or any cache failure,
//!   which is treated as a miss) reads the row, writes it back to the cache, then confirms the row is unchanged.
//!
//! Any error before a commit rolls the transaction back. A transaction that is dropped instead, because the
//! operation deadline passed, the caller cancelled, or a panic unwound, is rolled back by the store.
//!
//! # Consistency window
//!
//! Concurrent writers of the same book can interleave between their commits and their cache refreshes, so the cache
//! may briefly hold the value of the writer that committed first. The entry converges on one of the written values
//! at the latest when it is next refreshed by a write, evicted, or expires after [`CACHE_TTL`].
//!
//! A read-through races with writers too: the row it read may be updated or deleted before its cache write lands.
//! To keep such a write from reviving a deleted book for the whole TTL, a read-through that reached the cache re-reads
//! the row and evicts the entry when the row is gone or differs. The remaining window is the span between the cache
//! write and that check, during which concurrent readers may see the stale entry. If the check itself cannot reach the
//! database the entry is dropped as well. Only a failing eviction can leave a stale entry in place until it expires.
//!
//! Reads are not linearizable with respect to writes; callers that need the committed state must not rely on the
//! cache.

use async_trait::async_trait;
use fieldx::fxstruct;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::cache_store::book_key;
use crate::cache_store::CACHE_TTL;
use crate::context::RequestContext;
use crate::error::CatalogError;
use crate::error::Result;
use crate::traits::BookRepository;
use crate::traits::CacheStore;
use crate::traits::RelationalStore;
use crate::traits::RelationalTransaction;
use crate::types::Book;
use crate::types::BookFilter;
use crate::types::BookId;
use crate::types::BookPatch;
use crate::types::NewBook;
use crate::types::Pagination;
use crate::types::SearchQuery;

/// Upper bound of a single operation when the caller sets no tighter deadline.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(30);

/// Book repository over a relational store `R` and a cache store `C`.
///
/// The catalog holds no mutable state of its own and needs no locking; share it behind an `Arc` and call it from as
/// many tasks as needed. See the [module documentation](self) for the write ordering and its consistency window.
///
/// ```ignore
/// let catalog = Catalog::builder()
///     .relational(SeaBookStore::new(connection, TableSchema::default()))
///     .cache(RedisCacheStore::connect_to("localhost", 6379).await?)
///     .name("books")
///     .build()?;
/// ```
#[fxstruct(sync, no_new, default(off), builder)]
pub struct Catalog<R, C>
where
    R: RelationalStore,
    C: CacheStore,
{
    #[fieldx(get(clone), builder(required, into))]
    relational: Arc<R>,

    #[fieldx(get(clone), builder(required, into))]
    cache: Arc<C>,

    /// Name used in tracing spans. Most useful when more than one catalog runs in a process.
    #[fieldx(get(clone), builder(into), default("catalog".to_string()))]
    name: String,

    #[fieldx(get(copy), default(CACHE_TTL))]
    cache_ttl: Duration,

    #[fieldx(get(copy), default(DEFAULT_OP_TIMEOUT))]
    op_timeout: Duration,
}

impl<R, C> Catalog<R, C>
where
    R: RelationalStore,
    C: CacheStore,
{
    // Roll back and hand the original error back. A failing rollback is only logged: the store discards the
    // transaction either way once the handle is gone.
    async fn abort(&self, tx: R::Transaction, err: CatalogError) -> CatalogError {
        if let Err(rb_err) = tx.rollback().await {
            warn!(catalog = %self.name, "rollback failed after '{err}': {rb_err}");
        }
        err
    }

    // Best-effort cache write. Returns whether the entry is now in the cache.
    async fn cache_put(&self, book: &Book) -> bool {
        match self.cache.put(&book_key(&book.id), book, self.cache_ttl).await {
            Ok(()) => true,
            Err(err) => {
                warn!(catalog = %self.name, id = %book.id, "book not cached: {err}");
                false
            }
        }
    }

    // Best-effort eviction.
    async fn cache_evict(&self, id: &BookId) {
        match self.cache.delete(&book_key(id)).await {
            Ok(true) => debug!(catalog = %self.name, %id, "cache entry evicted"),
            Ok(false) => info!(catalog = %self.name, %id, "no cache entry to evict"),
            Err(err) => warn!(catalog = %self.name, %id, "cache entry not evicted, it expires on its own: {err}"),
        }
    }

    async fn create_book(&self, new_book: NewBook) -> Result<Book> {
        let book = Book::new(BookId::generate(), new_book);
        let tx = self.relational.begin().await?;

        match tx.insert(&book).await {
            Ok(0) => return Err(self.abort(tx, CatalogError::NotPersisted { id: book.id }).await),
            Ok(_) => (),
            Err(err) => return Err(self.abort(tx, err.into()).await),
        }

        let cached = self.cache_put(&book).await;

        if let Err(err) = tx.commit().await {
            if cached {
                self.cache_evict(&book.id).await;
            }
            return Err(err.into());
        }

        info!(catalog = %self.name, id = %book.id, cached, "book created");
        Ok(book)
    }

    async fn update_book(&self, id: &BookId, patch: BookPatch) -> Result<Book> {
        let tx = self.relational.begin().await?;

        match tx.update(id, &patch).await {
            Ok(0) => return Err(self.abort(tx, CatalogError::not_found(id)).await),
            Ok(_) => (),
            Err(err) => return Err(self.abort(tx, err.into()).await),
        }

        // The cache is refreshed from the row as stored, never from the patch.
        let book = match tx.select_by_id(id).await {
            Ok(Some(book)) => book,
            Ok(None) => return Err(self.abort(tx, CatalogError::not_found(id)).await),
            Err(err) => return Err(self.abort(tx, err.into()).await),
        };

        tx.commit().await?;

        let cached = self.cache_put(&book).await;
        info!(catalog = %self.name, %id, cached, "book updated");
        Ok(book)
    }

    async fn fetch_book(&self, id: &BookId) -> Result<Book> {
        match self.cache.get(&book_key(id)).await {
            Ok(Some(book)) => {
                debug!(catalog = %self.name, %id, "cache hit");
                return Ok(book);
            }
            Ok(None) => debug!(catalog = %self.name, %id, "cache miss"),
            Err(err) => warn!(catalog = %self.name, %id, "cache read failed, falling back to the database: {err}"),
        }

        let book = self
            .relational
            .select_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::not_found(id))?;

        if self.cache_put(&book).await {
            self.confirm_write_back(&book).await;
        }
        Ok(book)
    }

    // A write that committed between our read and our cache write has already refreshed or evicted the entry, so
    // ours may have resurrected a stale row. Re-read after the cache write: anything that committed before it is
    // visible now, anything committing later touches the cache after us.
    async fn confirm_write_back(&self, book: &Book) {
        match self.relational.select_by_id(&book.id).await {
            Ok(Some(current)) if current == *book => (),
            Ok(current) => {
                debug!(
                    catalog = %self.name,
                    id = %book.id,
                    deleted = current.is_none(),
                    "row changed during read-through"
                );
                self.cache_evict(&book.id).await;
            }
            Err(err) => {
                warn!(catalog = %self.name, id = %book.id, "cannot confirm read-through, dropping the entry: {err}");
                self.cache_evict(&book.id).await;
            }
        }
    }

    async fn delete_book(&self, id: &BookId) -> Result<()> {
        let tx = self.relational.begin().await?;

        match tx.delete(id).await {
            Ok(0) => return Err(self.abort(tx, CatalogError::not_found(id)).await),
            Ok(_) => (),
            Err(err) => return Err(self.abort(tx, err.into()).await),
        }

        tx.commit().await?;

        self.cache_evict(id).await;
        info!(catalog = %self.name, %id, "book deleted");
        Ok(())
    }

    async fn list_books(&self, filter: BookFilter) -> Result<Vec<Book>> {
        Ok(self.relational.select_by_filter(&filter).await?)
    }
}

#[async_trait]
impl<R, C> BookRepository for Catalog<R, C>
where
    R: RelationalStore,
    C: CacheStore,
{
    #[instrument(level = "debug", skip(self, ctx), fields(catalog = %self.name))]
    async fn create(&self, ctx: &RequestContext, new_book: NewBook) -> Result<Book> {
        ctx.run(self.op_timeout, self.create_book(new_book)).await
    }

    #[instrument(level = "debug", skip(self, ctx), fields(catalog = %self.name))]
    async fn update(&self, ctx: &RequestContext, id: &BookId, patch: BookPatch) -> Result<Book> {
        ctx.run(self.op_timeout, self.update_book(id, patch)).await
    }

    #[instrument(level = "debug", skip(self, ctx), fields(catalog = %self.name))]
    async fn get_by_id(&self, ctx: &RequestContext, id: &BookId) -> Result<Book> {
        ctx.run(self.op_timeout, self.fetch_book(id)).await
    }

    #[instrument(level = "debug", skip(self, ctx), fields(catalog = %self.name))]
    async fn get_all(&self, ctx: &RequestContext, pagination: Pagination) -> Result<Vec<Book>> {
        ctx.run(self.op_timeout, async {
            Ok(self.relational.select_all(pagination).await?)
        })
        .await
    }

    #[instrument(level = "debug", skip(self, ctx), fields(catalog = %self.name))]
    async fn get_by_author(&self, ctx: &RequestContext, author: &str) -> Result<Vec<Book>> {
        ctx.run(self.op_timeout, self.list_books(BookFilter::Author(author.to_string())))
            .await
    }

    #[instrument(level = "debug", skip(self, ctx), fields(catalog = %self.name))]
    async fn get_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Vec<Book>> {
        ctx.run(self.op_timeout, self.list_books(BookFilter::Title(name.to_string())))
            .await
    }

    #[instrument(level = "debug", skip(self, _ctx), fields(catalog = %self.name))]
    async fn search(&self, _ctx: &RequestContext, _query: &SearchQuery) -> Result<Vec<Book>> {
        Err(CatalogError::NotImplemented("book search"))
    }

    #[instrument(level = "debug", skip(self, ctx), fields(catalog = %self.name))]
    async fn delete_by_id(&self, ctx: &RequestContext, id: &BookId) -> Result<()> {
        ctx.run(self.op_timeout, self.delete_book(id)).await
    }
}

impl<R, C> Debug for Catalog<R, C>
where
    R: RelationalStore,
    C: CacheStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("name", &self.name)
            .field("relational", &self.relational)
            .field("cache", &self.cache)
            .field("cache_ttl", &self.cache_ttl)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

