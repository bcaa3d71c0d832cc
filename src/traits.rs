use async_trait::async_trait;
use sea_orm::DbErr;
use std::fmt::Debug;
use std::time::Duration;

use crate::context::RequestContext;
use crate::error::CacheError;
use crate::error::Result;
use crate::types::Book;
use crate::types::BookFilter;
use crate::types::BookId;
use crate::types::BookPatch;
use crate::types::NewBook;
use crate::types::Pagination;
use crate::types::SearchQuery;

/// The operation set calling code depends on. Neither backing store is visible through it.
#[async_trait]
pub trait BookRepository: Send + Sync + 'static {
    async fn create(&self, ctx: &RequestContext, new_book: NewBook) -> Result<Book>;
    async fn update(&self, ctx: &RequestContext, id: &BookId, patch: BookPatch) -> Result<Book>;
    async fn get_by_id(&self, ctx: &RequestContext, id: &BookId) -> Result<Book>;
    async fn get_all(&self, ctx: &RequestContext, pagination: Pagination) -> Result<Vec<Book>>;
    async fn get_by_author(&self, ctx: &RequestContext, author: &str) -> Result<Vec<Book>>;
    async fn get_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Vec<Book>>;
    async fn search(&self, ctx: &RequestContext, query: &SearchQuery) -> Result<Vec<Book>>;
    async fn delete_by_id(&self, ctx: &RequestContext, id: &BookId) -> Result<()>;
}

/// Volatile key/value store of serialized books.
#[async_trait]
pub trait CacheStore: Debug + Send + Sync + 'static {
    async fn put(&self, key: &str, book: &Book, ttl: Duration) -> Result<(), CacheError>;

    /// `Ok(None)` is a miss. `Err` means the store could not answer.
    async fn get(&self, key: &str) -> Result<Option<Book>, CacheError>;

    /// Returns whether the key existed. A missing key is not an error.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;
}

/// Mutating side of the relational store. Implementations must roll back when dropped without a commit.
#[async_trait]
pub trait RelationalTransaction: Sized + Send + Sync {
    /// Returns the number of affected rows.
    async fn insert(&self, book: &Book) -> Result<u64, DbErr>;
    /// Applies the participating fields of `patch`. Returns the number of affected rows.
    async fn update(&self, id: &BookId, patch: &BookPatch) -> Result<u64, DbErr>;
    async fn select_by_id(&self, id: &BookId) -> Result<Option<Book>, DbErr>;
    /// Returns the number of affected rows.
    async fn delete(&self, id: &BookId) -> Result<u64, DbErr>;
    async fn commit(self) -> Result<(), DbErr>;
    async fn rollback(self) -> Result<(), DbErr>;
}

/// The system of record.
#[async_trait]
pub trait RelationalStore: Debug + Send + Sync + 'static {
    type Transaction: RelationalTransaction;

    async fn begin(&self) -> Result<Self::Transaction, DbErr>;
    async fn select_by_id(&self, id: &BookId) -> Result<Option<Book>, DbErr>;
    async fn select_all(&self, pagination: Pagination) -> Result<Vec<Book>, DbErr>;
    async fn select_by_filter(&self, filter: &BookFilter) -> Result<Vec<Book>, DbErr>;
}
