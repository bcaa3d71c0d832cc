use std::fmt::Debug;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::DbErr;

use crate::traits::RelationalStore;
use crate::traits::RelationalTransaction;
use crate::types::Book;
use crate::types::BookFilter;
use crate::types::BookId;
use crate::types::BookPatch;
use crate::types::Pagination;

/// Counters and fault switches shared by an [`InstrumentedStore`] and every transaction it opens.
#[derive(Debug, Default)]
pub struct StoreProbe {
    pub transactions: AtomicUsize,
    pub commits:      AtomicUsize,
    pub rollbacks:    AtomicUsize,
    /// Lookups by id outside of a transaction.
    pub point_reads:  AtomicUsize,
    /// Paginated and filtered list queries.
    pub list_reads:   AtomicUsize,

    /// Commit fails after the statements ran. The transaction is dropped, so nothing is persisted.
    pub fail_commit:  AtomicBool,
    /// Inserts run nothing and report zero affected rows.
    pub skip_inserts: AtomicBool,
    /// Milliseconds to sleep inside a transaction right after any statement.
    pub stall_millis: AtomicU64,
    /// Committed right after the next successful lookup by id, before the lookup returns.
    pub interleave:   Mutex<Option<Interleave>>,
}

/// A write that another client commits in the middle of a read.
#[derive(Clone, Debug)]
pub enum Interleave {
    Delete,
    Update(BookPatch),
}

impl StoreProbe {
    fn count(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    async fn stall(&self) {
        let millis = self.stall_millis.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}

/// Wraps a relational store to count what reaches it and to inject faults.
pub struct InstrumentedStore<R: RelationalStore> {
    inner: R,
    probe: Arc<StoreProbe>,
}

impl<R: RelationalStore> InstrumentedStore<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            probe: Arc::new(StoreProbe::default()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn probe(&self) -> &StoreProbe {
        &self.probe
    }

    pub fn point_reads(&self) -> usize {
        self.probe.point_reads.load(Ordering::SeqCst)
    }

    pub fn list_reads(&self) -> usize {
        self.probe.list_reads.load(Ordering::SeqCst)
    }

    pub fn transactions(&self) -> usize {
        self.probe.transactions.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.probe.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.probe.rollbacks.load(Ordering::SeqCst)
    }

    pub fn fail_commit(&self, fail: bool) {
        self.probe.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn skip_inserts(&self, skip: bool) {
        self.probe.skip_inserts.store(skip, Ordering::SeqCst);
    }

    pub fn stall(&self, delay: Duration) {
        self.probe.stall_millis.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Have the next lookup by id that finds a row race with `write`.
    pub fn interleave(&self, write: Interleave) {
        if let Ok(mut slot) = self.probe.interleave.lock() {
            *slot = Some(write);
        }
    }

    async fn commit_interleaved(&self, id: &BookId, write: Interleave) -> Result<(), DbErr> {
        let tx = self.inner.begin().await?;
        match write {
            Interleave::Delete => tx.delete(id).await?,
            Interleave::Update(patch) => tx.update(id, &patch).await?,
        };
        tx.commit().await
    }
}

impl<R: RelationalStore> Debug for InstrumentedStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedStore")
            .field("inner", &self.inner)
            .field("probe", &self.probe)
            .finish()
    }
}

#[async_trait]
impl<R: RelationalStore> RelationalStore for InstrumentedStore<R> {
    type Transaction = InstrumentedTransaction<R::Transaction>;

    async fn begin(&self) -> Result<Self::Transaction, DbErr> {
        StoreProbe::count(&self.probe.transactions);
        Ok(InstrumentedTransaction {
            inner: self.inner.begin().await?,
            probe: self.probe.clone(),
        })
    }

    async fn select_by_id(&self, id: &BookId) -> Result<Option<Book>, DbErr> {
        StoreProbe::count(&self.probe.point_reads);
        let row = self.inner.select_by_id(id).await?;
        if row.is_some() {
            let pending = self.probe.interleave.lock().ok().and_then(|mut slot| slot.take());
            if let Some(write) = pending {
                self.commit_interleaved(id, write).await?;
            }
        }
        Ok(row)
    }

    async fn select_all(&self, pagination: Pagination) -> Result<Vec<Book>, DbErr> {
        StoreProbe::count(&self.probe.list_reads);
        self.inner.select_all(pagination).await
    }

    async fn select_by_filter(&self, filter: &BookFilter) -> Result<Vec<Book>, DbErr> {
        StoreProbe::count(&self.probe.list_reads);
        self.inner.select_by_filter(filter).await
    }
}

pub struct InstrumentedTransaction<T: RelationalTransaction> {
    inner: T,
    probe: Arc<StoreProbe>,
}

#[async_trait]
impl<T: RelationalTransaction> RelationalTransaction for InstrumentedTransaction<T> {
    async fn insert(&self, book: &Book) -> Result<u64, DbErr> {
        if self.probe.skip_inserts.load(Ordering::SeqCst) {
            return Ok(0);
        }
        let rows = self.inner.insert(book).await?;
        self.probe.stall().await;
        Ok(rows)
    }

    async fn update(&self, id: &BookId, patch: &BookPatch) -> Result<u64, DbErr> {
        let rows = self.inner.update(id, patch).await?;
        self.probe.stall().await;
        Ok(rows)
    }

    async fn select_by_id(&self, id: &BookId) -> Result<Option<Book>, DbErr> {
        self.inner.select_by_id(id).await
    }

    async fn delete(&self, id: &BookId) -> Result<u64, DbErr> {
        let rows = self.inner.delete(id).await?;
        self.probe.stall().await;
        Ok(rows)
    }

    async fn commit(self) -> Result<(), DbErr> {
        if self.probe.fail_commit.load(Ordering::SeqCst) {
            // Dropping the inner transaction discards its statements.
            return Err(DbErr::Custom("injected commit failure".to_string()));
        }
        StoreProbe::count(&self.probe.commits);
        self.inner.commit().await
    }

    async fn rollback(self) -> Result<(), DbErr> {
        StoreProbe::count(&self.probe.rollbacks);
        self.inner.rollback().await
    }
}
