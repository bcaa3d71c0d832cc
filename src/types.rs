use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use uuid::Uuid;

/// Default page number when the caller does not supply one.
pub const DEFAULT_PAGE: u64 = 1;
/// Default page size when the caller does not supply one, or supplies zero.
pub const DEFAULT_LIMIT: u64 = 10;

/// Stable reference to a book. Doubles as the relational primary key and, through
/// [`book_key()`](crate::cache_store::book_key), as the cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    /// A fresh, globally unique identifier. Identifiers are never reused.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BookId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for BookId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for BookId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A book record. These four fields fully define it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    #[serde(rename = "book_id")]
    pub id:     BookId,
    pub title:  String,
    pub author: String,
    #[serde(rename = "published_year")]
    pub year:   i32,
}

impl Book {
    pub fn new(id: BookId, new_book: NewBook) -> Self {
        Self {
            id,
            title: new_book.title,
            author: new_book.author,
            year: new_book.year,
        }
    }
}

/// Input of the create operation. The identifier is always generated server-side.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub title:  String,
    pub author: String,
    #[serde(rename = "published_year")]
    pub year:   i32,
}

impl NewBook {
    pub fn new<T: Into<String>, A: Into<String>>(title: T, author: A, year: i32) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            year,
        }
    }
}

/// Sparse patch for the update operation.
///
/// Only fields that are set *and* carry a non-default value take part in the update: an empty string or a zero
/// year is indistinguishable from an omitted field. Consequently a patch can never reset a title or author to an empty
/// string, nor a year to zero. This is a known limitation of the update contract, not something to work around at
/// call sites.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title:  Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, rename = "published_year", skip_serializing_if = "Option::is_none")]
    pub year:   Option<i32>,
}

impl BookPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title<T: Into<String>>(mut self, title: T) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn author<A: Into<String>>(mut self, author: A) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn effective_title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.is_empty())
    }

    pub fn effective_author(&self) -> Option<&str> {
        self.author.as_deref().filter(|a| !a.is_empty())
    }

    pub fn effective_year(&self) -> Option<i32> {
        self.year.filter(|y| *y != 0)
    }

    /// True when no field would take part in an update.
    pub fn is_empty(&self) -> bool {
        self.effective_title().is_none() && self.effective_author().is_none() && self.effective_year().is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page:  u64,
    pub limit: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit }.normalized()
    }

    /// Pages are 1-based; page 0 is read as the first page and a zero limit falls back to [`DEFAULT_LIMIT`].
    pub fn normalized(self) -> Self {
        Self {
            page:  self.page.max(1),
            limit: if self.limit == 0 { DEFAULT_LIMIT } else { self.limit },
        }
    }

    pub fn offset(&self) -> u64 {
        let norm = self.normalized();
        (norm.page - 1).saturating_mul(norm.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page:  DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Row filter of list queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookFilter {
    /// Exact match on the author column.
    Author(String),
    /// Case-insensitive (ASCII) substring match on the title column. `%` and `_` match themselves.
    Title(String),
}

impl Display for BookFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookFilter::Author(author) => write!(f, "author = {author:?}"),
            BookFilter::Title(title) => write!(f, "title ~ {title:?}"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookList {
    pub books: Vec<Book>,
}

impl From<Vec<Book>> for BookList {
    fn from(books: Vec<Book>) -> Self {
        Self { books }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub search: String,
}
