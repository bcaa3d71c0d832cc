//! Cache store implementations and the helpers every one of them shares.
//!
//! All code that touches the cache derives keys with [`book_key()`]. Writing under one key and evicting under
//! another leaves entries that are never evicted, so no call site is allowed to build a key on its own.

pub mod memory;
pub mod redis_store;

use std::time::Duration;

use crate::error::CacheError;
use crate::types::Book;
use crate::types::BookId;

pub use self::memory::MemoryCacheStore;
pub use self::redis_store::RedisCacheStore;

/// Lifetime of a cache entry, counted from the moment it is written.
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The canonical cache key of a book: the identifier itself, unprefixed.
#[inline]
pub fn book_key(id: &BookId) -> String {
    id.as_str().to_string()
}

pub(crate) fn encode_book(book: &Book) -> Result<String, CacheError> {
    Ok(serde_json::to_string(book)?)
}

pub(crate) fn decode_book(payload: &str) -> Result<Book, CacheError> {
    Ok(serde_json::from_str(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewBook;

    #[test]
    fn test_key_is_bare_identifier() {
        let id = BookId::from("0b8a8e0e-54f3-4c5b-9d0b-3f6a7e0e2b11");
        assert_eq!(book_key(&id), "0b8a8e0e-54f3-4c5b-9d0b-3f6a7e0e2b11");
    }

    #[test]
    fn test_codec() {
        let book = Book::new(BookId::from("k"), NewBook::new("Dune", "Herbert", 1965));
        let payload = encode_book(&book).unwrap();
        assert_eq!(decode_book(&payload).unwrap(), book);
        assert!(matches!(decode_book("{not json"), Err(CacheError::Codec(_))));
    }
}
