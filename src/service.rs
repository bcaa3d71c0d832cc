use std::sync::Arc;

use tracing::instrument;

use crate::context::RequestContext;
use crate::error::CatalogError;
use crate::error::Result;
use crate::traits::BookRepository;
use crate::types::Book;
use crate::types::BookId;
use crate::types::BookList;
use crate::types::BookPatch;
use crate::types::NewBook;
use crate::types::Pagination;
use crate::types::SearchQuery;

/// Request-level entry point for a transport layer.
///
/// Checks what a request must carry before it reaches the repository and shapes list results. It knows nothing
/// about either store.
#[derive(Clone)]
pub struct BookService {
    repository: Arc<dyn BookRepository>,
}

impl BookService {
    pub fn new(repository: Arc<dyn BookRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> Arc<dyn BookRepository> {
        self.repository.clone()
    }

    fn require(value: &str, what: &str) -> Result<()> {
        if value.trim().is_empty() {
            Err(CatalogError::InvalidInput(format!("{what} is required")))
        }
        else {
            Ok(())
        }
    }

    #[instrument(level = "debug", skip(self, ctx))]
    pub async fn create_book(&self, ctx: &RequestContext, new_book: NewBook) -> Result<Book> {
        self.repository.create(ctx, new_book).await
    }

    #[instrument(level = "debug", skip(self, ctx))]
    pub async fn update_book(&self, ctx: &RequestContext, id: &BookId, patch: BookPatch) -> Result<Book> {
        Self::require(id.as_str(), "book id")?;
        self.repository.update(ctx, id, patch).await
    }

    #[instrument(level = "debug", skip(self, ctx))]
    pub async fn get_book(&self, ctx: &RequestContext, id: &BookId) -> Result<Book> {
        Self::require(id.as_str(), "book id")?;
        self.repository.get_by_id(ctx, id).await
    }

    /// `None` for either argument selects the default (page 1, 10 per page).
    #[instrument(level = "debug", skip(self, ctx))]
    pub async fn list_books(&self, ctx: &RequestContext, page: Option<u64>, limit: Option<u64>) -> Result<BookList> {
        let defaults = Pagination::default();
        let pagination = Pagination::new(page.unwrap_or(defaults.page), limit.unwrap_or(defaults.limit));
        Ok(self.repository.get_all(ctx, pagination).await?.into())
    }

    #[instrument(level = "debug", skip(self, ctx))]
    pub async fn books_by_author(&self, ctx: &RequestContext, author: &str) -> Result<BookList> {
        Self::require(author, "author")?;
        Ok(self.repository.get_by_author(ctx, author).await?.into())
    }

    #[instrument(level = "debug", skip(self, ctx))]
    pub async fn books_by_name(&self, ctx: &RequestContext, name: &str) -> Result<BookList> {
        Self::require(name, "name")?;
        Ok(self.repository.get_by_name(ctx, name).await?.into())
    }

    #[instrument(level = "debug", skip(self, ctx))]
    pub async fn search_books(&self, ctx: &RequestContext, query: &SearchQuery) -> Result<BookList> {
        Ok(self.repository.search(ctx, query).await?.into())
    }

    #[instrument(level = "debug", skip(self, ctx))]
    pub async fn delete_book(&self, ctx: &RequestContext, id: &BookId) -> Result<()> {
        Self::require(id.as_str(), "book id")?;
        self.repository.delete_by_id(ctx, id).await
    }
}
