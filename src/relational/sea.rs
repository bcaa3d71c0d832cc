use async_trait::async_trait;
use fieldx::fxstruct;
use sea_orm::sea_query::SelectStatement;
use sea_orm::ConnectionTrait;
use sea_orm::DatabaseConnection;
use sea_orm::DatabaseTransaction;
use sea_orm::DbErr;
use sea_orm::StatementBuilder;
use sea_orm::TransactionTrait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::instrument;

use super::TableSchema;
use crate::traits::RelationalStore;
use crate::traits::RelationalTransaction;
use crate::types::Book;
use crate::types::BookFilter;
use crate::types::BookId;
use crate::types::BookPatch;
use crate::types::Pagination;

// The statement helpers are generic over the connection so the same code runs against the pool and inside a
// transaction.

async fn exec<C, S>(conn: &C, stmt: &S) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    let backend = conn.get_database_backend();
    Ok(conn.execute(backend.build(stmt)).await?.rows_affected())
}

async fn fetch_one<C>(conn: &C, schema: &TableSchema, id: &BookId) -> Result<Option<Book>, DbErr>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    conn.query_one(backend.build(&schema.select_by_id(id)))
        .await?
        .map(|row| schema.book_from_row(&row))
        .transpose()
}

async fn fetch_all<C>(conn: &C, schema: &TableSchema, stmt: &SelectStatement) -> Result<Vec<Book>, DbErr>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    conn.query_all(backend.build(stmt))
        .await?
        .iter()
        .map(|row| schema.book_from_row(row))
        .collect()
}

/// Relational store on a SeaORM connection pool.
#[fxstruct(sync, no_new)]
pub struct SeaBookStore {
    #[fieldx(get)]
    connection: DatabaseConnection,

    #[fieldx(get(clone))]
    schema: Arc<TableSchema>,
}

impl SeaBookStore {
    pub fn new(connection: DatabaseConnection, schema: TableSchema) -> Self {
        Self {
            connection,
            schema: Arc::new(schema),
        }
    }

    /// Create the book table unless it already exists.
    pub async fn create_table_if_missing(&self) -> Result<(), DbErr> {
        exec(self.connection(), &self.schema().create_table()).await?;
        Ok(())
    }
}

impl Debug for SeaBookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeaBookStore")
            .field("backend", &self.connection.get_database_backend())
            .field("schema", &self.schema)
            .finish()
    }
}

#[async_trait]
impl RelationalStore for SeaBookStore {
    type Transaction = SeaTransaction;

    async fn begin(&self) -> Result<SeaTransaction, DbErr> {
        Ok(SeaTransaction {
            transaction: self.connection().begin().await?,
            schema:      self.schema(),
        })
    }

    #[instrument(level = "trace", skip(self))]
    async fn select_by_id(&self, id: &BookId) -> Result<Option<Book>, DbErr> {
        fetch_one(self.connection(), &self.schema, id).await
    }

    #[instrument(level = "trace", skip(self))]
    async fn select_all(&self, pagination: Pagination) -> Result<Vec<Book>, DbErr> {
        fetch_all(self.connection(), &self.schema, &self.schema.select_all(pagination)).await
    }

    #[instrument(level = "trace", skip(self))]
    async fn select_by_filter(&self, filter: &BookFilter) -> Result<Vec<Book>, DbErr> {
        fetch_all(self.connection(), &self.schema, &self.schema.select_by_filter(filter)).await
    }
}

/// A scoped transaction. SeaORM rolls a [`DatabaseTransaction`] back when it is dropped uncommitted, which is what
/// makes timeouts and cancellation safe for the orchestrator.
pub struct SeaTransaction {
    transaction: DatabaseTransaction,
    schema:      Arc<TableSchema>,
}

#[async_trait]
impl RelationalTransaction for SeaTransaction {
    #[instrument(level = "trace", skip(self, book), fields(id = %book.id))]
    async fn insert(&self, book: &Book) -> Result<u64, DbErr> {
        exec(&self.transaction, &self.schema.insert(book)).await
    }

    #[instrument(level = "trace", skip(self))]
    async fn update(&self, id: &BookId, patch: &BookPatch) -> Result<u64, DbErr> {
        match self.schema.update(id, patch) {
            Some(stmt) => exec(&self.transaction, &stmt).await,
            // Nothing to SET. Still report whether the row is there so a missing id surfaces the same way.
            None => Ok(fetch_one(&self.transaction, &self.schema, id).await?.map_or(0, |_| 1)),
        }
    }

    #[instrument(level = "trace", skip(self))]
    async fn select_by_id(&self, id: &BookId) -> Result<Option<Book>, DbErr> {
        fetch_one(&self.transaction, &self.schema, id).await
    }

    #[instrument(level = "trace", skip(self))]
    async fn delete(&self, id: &BookId) -> Result<u64, DbErr> {
        exec(&self.transaction, &self.schema.delete(id)).await
    }

    async fn commit(self) -> Result<(), DbErr> {
        self.transaction.commit().await
    }

    async fn rollback(self) -> Result<(), DbErr> {
        self.transaction.rollback().await
    }
}
