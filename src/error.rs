use sea_orm::DbErr;
use std::time::Duration;
use thiserror::Error;

use crate::types::BookId;

/// Failures of the cache store. None of these is ever promoted to an operation failure by
/// [`Catalog`](crate::Catalog); they only reach the caller from bootstrap code.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(#[from] redis::RedisError),
    #[error("malformed cache payload: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("cache backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("book '{id}' does not exist")]
    NotFound { id: BookId },

    #[error("book '{id}' was not persisted: insert affected no rows")]
    NotPersisted { id: BookId },

    #[error("relational store error: {0}")]
    Relational(#[from] DbErr),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    pub fn not_found(id: &BookId) -> Self {
        Self::NotFound { id: id.clone() }
    }

    /// Errors caused by the request rather than by the service. Never worth retrying.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidInput(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_store_unavailable(&self) -> bool {
        match self {
            Self::Relational(err) => matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_)),
            Self::Cache(CacheError::Unavailable(_)) => true,
            _ => false,
        }
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

/// Shortcut for configuration errors with `format!` arguments.
macro_rules! config_err {
    ($($arg:tt)+) => {
        $crate::error::CatalogError::Config(format!($($arg)+))
    };
}

pub(crate) use config_err;

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;

    #[test]
    fn test_classification() {
        let nf = CatalogError::not_found(&BookId::from("x"));
        assert!(nf.is_client_error());
        assert!(nf.is_not_found());
        assert!(!nf.is_store_unavailable());

        let conn = CatalogError::from(DbErr::Conn(RuntimeErr::Internal("refused".into())));
        assert!(conn.is_store_unavailable());
        assert!(!conn.is_client_error());

        assert!(!CatalogError::NotImplemented("search").is_client_error());
    }
}
