//! The relational system of record.
//!
//! Statements are composed at run time with SeaQuery from a [`TableSchema`], so the same catalog code can target
//! differently named tables and columns. Every value goes to the database as a bound parameter.

pub mod driver;
pub mod sea;

use sea_orm::sea_query::Alias;
use sea_orm::sea_query::ColumnDef;
use sea_orm::sea_query::DeleteStatement;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::Func;
use sea_orm::sea_query::InsertStatement;
use sea_orm::sea_query::LikeExpr;
use sea_orm::sea_query::Order;
use sea_orm::sea_query::Query;
use sea_orm::sea_query::SelectStatement;
use sea_orm::sea_query::Table;
use sea_orm::sea_query::TableCreateStatement;
use sea_orm::sea_query::UpdateStatement;
use sea_orm::DbErr;
use sea_orm::QueryResult;
use serde::Deserialize;
use serde::Serialize;

use crate::types::Book;
use crate::types::BookFilter;
use crate::types::BookId;
use crate::types::BookPatch;
use crate::types::Pagination;

pub use self::sea::SeaBookStore;
pub use self::sea::SeaTransaction;

const LIKE_ESCAPE: char = '\\';

// `LIKE` pattern matching `text` anywhere in a lowercased column. Wildcards in `text` match literally. Lowercasing
// is ASCII only since SQLite's `LOWER()` leaves other characters alone.
fn substring_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars().map(|c| c.to_ascii_lowercase()) {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Names of the book table and its columns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table:         String,
    pub id_column:     String,
    pub title_column:  String,
    pub author_column: String,
    pub year_column:   String,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            table:         "books".into(),
            id_column:     "book_id".into(),
            title_column:  "title".into(),
            author_column: "author".into(),
            year_column:   "published_year".into(),
        }
    }
}

impl TableSchema {
    fn table(&self) -> Alias {
        Alias::new(&self.table)
    }

    fn id(&self) -> Alias {
        Alias::new(&self.id_column)
    }

    fn title(&self) -> Alias {
        Alias::new(&self.title_column)
    }

    fn author(&self) -> Alias {
        Alias::new(&self.author_column)
    }

    fn year(&self) -> Alias {
        Alias::new(&self.year_column)
    }

    fn columns(&self) -> [Alias; 4] {
        [self.id(), self.title(), self.author(), self.year()]
    }

    pub fn insert(&self, book: &Book) -> InsertStatement {
        Query::insert()
            .into_table(self.table())
            .columns(self.columns())
            .values_panic([
                book.id.as_str().into(),
                book.title.as_str().into(),
                book.author.as_str().into(),
                book.year.into(),
            ])
            .to_owned()
    }

    /// `None` when no field of the patch participates; there is nothing to SET then.
    pub fn update(&self, id: &BookId, patch: &BookPatch) -> Option<UpdateStatement> {
        if patch.is_empty() {
            return None;
        }

        let mut stmt = Query::update();
        stmt.table(self.table());
        if let Some(title) = patch.effective_title() {
            stmt.value(self.title(), title);
        }
        if let Some(author) = patch.effective_author() {
            stmt.value(self.author(), author);
        }
        if let Some(year) = patch.effective_year() {
            stmt.value(self.year(), year);
        }
        stmt.and_where(Expr::col(self.id()).eq(id.as_str()));

        Some(stmt)
    }

    pub fn select_by_id(&self, id: &BookId) -> SelectStatement {
        self.select()
            .and_where(Expr::col(self.id()).eq(id.as_str()))
            .to_owned()
    }

    pub fn select_all(&self, pagination: Pagination) -> SelectStatement {
        let pagination = pagination.normalized();
        self.select()
            .order_by(self.id(), Order::Asc)
            .limit(pagination.limit)
            .offset(pagination.offset())
            .to_owned()
    }

    pub fn select_by_filter(&self, filter: &BookFilter) -> SelectStatement {
        let condition = match filter {
            BookFilter::Author(author) => Expr::col(self.author()).eq(author.as_str()),
            BookFilter::Title(name) => Expr::expr(Func::lower(Expr::col(self.title())))
                .like(LikeExpr::new(substring_pattern(name)).escape(LIKE_ESCAPE)),
        };
        self.select()
            .and_where(condition)
            .order_by(self.id(), Order::Asc)
            .to_owned()
    }

    pub fn delete(&self, id: &BookId) -> DeleteStatement {
        Query::delete()
            .from_table(self.table())
            .and_where(Expr::col(self.id()).eq(id.as_str()))
            .to_owned()
    }

    /// Idempotent table bootstrap. This is not a migration facility: an existing table is left as is.
    pub fn create_table(&self) -> TableCreateStatement {
        Table::create()
            .table(self.table())
            .if_not_exists()
            .col(ColumnDef::new(self.id()).string().not_null().primary_key())
            .col(ColumnDef::new(self.title()).string().not_null())
            .col(ColumnDef::new(self.author()).string().not_null())
            .col(ColumnDef::new(self.year()).integer().not_null())
            .to_owned()
    }

    fn select(&self) -> SelectStatement {
        Query::select().columns(self.columns()).from(self.table()).to_owned()
    }

    pub(crate) fn book_from_row(&self, row: &QueryResult) -> Result<Book, DbErr> {
        Ok(Book {
            id:     BookId::from(row.try_get::<String>("", &self.id_column)?),
            title:  row.try_get("", &self.title_column)?,
            author: row.try_get("", &self.author_column)?,
            year:   row.try_get("", &self.year_column)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewBook;
    use sea_orm::sea_query::PostgresQueryBuilder;
    use sea_orm::sea_query::SqliteQueryBuilder;

    fn remapped() -> TableSchema {
        TableSchema {
            table:         "library".into(),
            id_column:     "uid".into(),
            title_column:  "name".into(),
            author_column: "writer".into(),
            year_column:   "pub_year".into(),
        }
    }

    #[test]
    fn test_insert_uses_configured_names() {
        let book = Book::new(BookId::from("x"), NewBook::new("Dune", "Herbert", 1965));
        let (sql, values) = remapped().insert(&book).build(PostgresQueryBuilder);
        assert_eq!(
            sql,
            r#"INSERT INTO "library" ("uid", "name", "writer", "pub_year") VALUES ($1, $2, $3, $4)"#
        );
        assert_eq!(values.0.len(), 4);
    }

    #[test]
    fn test_sparse_update() {
        let schema = TableSchema::default();
        let id = BookId::from("x");

        let (sql, values) = schema
            .update(&id, &BookPatch::new().year(1966).title(""))
            .expect("year participates")
            .build(PostgresQueryBuilder);
        assert_eq!(sql, r#"UPDATE "books" SET "published_year" = $1 WHERE "book_id" = $2"#);
        assert_eq!(values.0.len(), 2);

        assert!(schema.update(&id, &BookPatch::new().author("").year(0)).is_none());
    }

    #[test]
    fn test_filters() {
        let schema = TableSchema::default();

        let (sql, _) = schema
            .select_by_filter(&BookFilter::Author("Herbert".into()))
            .build(SqliteQueryBuilder);
        assert!(sql.contains(r#"WHERE "author" = ?"#), "{sql}");

        let (sql, values) = schema
            .select_by_filter(&BookFilter::Title("Un".into()))
            .build(SqliteQueryBuilder);
        assert!(sql.contains(r#"WHERE LOWER("title") LIKE ? ESCAPE"#), "{sql}");
        assert_eq!(values.0[0], sea_orm::Value::from("%un%"));
    }

    #[test]
    fn test_title_pattern_escapes_wildcards() {
        assert_eq!(substring_pattern("Dune"), "%dune%");
        assert_eq!(substring_pattern("100%"), r"%100\%%");
        assert_eq!(substring_pattern("snake_case"), r"%snake\_case%");
        assert_eq!(substring_pattern(r"a\b"), r"%a\\b%");
        assert_eq!(substring_pattern(""), "%%");
    }

    #[test]
    fn test_pagination_clause() {
        let (sql, _) = TableSchema::default()
            .select_all(Pagination::new(3, 5))
            .build(PostgresQueryBuilder);
        assert!(sql.ends_with(r#"ORDER BY "book_id" ASC LIMIT $1 OFFSET $2"#), "{sql}");
    }
}
