use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::CatalogError;
use crate::error::Result;

/// Per-call context handed to every repository operation.
///
/// The only thing it carries is an optional deadline. [`Catalog`](crate::Catalog) caps it with its own default
/// operation timeout, so no operation runs unbounded even when the caller passes [`RequestContext::background()`].
/// When the deadline passes, the operation future is dropped: an open transaction rolls back and its pooled
/// connection is released. Dropping the future from the caller side has the same effect.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    /// No caller deadline; the catalog default applies.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The earlier of the caller deadline and `now + cap`.
    pub fn effective_deadline(&self, cap: Duration) -> Instant {
        let capped = Instant::now() + cap;
        self.deadline.map_or(capped, |d| d.min(capped))
    }

    /// Run `fut` to completion or until the effective deadline, whichever comes first.
    pub async fn run<T, F>(&self, cap: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let deadline = self.effective_deadline(cap);
        match tokio::time::timeout_at(deadline, fut).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CatalogError::Timeout(deadline.saturating_duration_since(started))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_is_capped() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(3600));
        let cap = Duration::from_millis(10);
        assert!(ctx.effective_deadline(cap) <= Instant::now() + cap);

        let outcome = ctx
            .run(cap, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(outcome, Err(CatalogError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let ctx = RequestContext::background();
        let value = ctx.run(Duration::from_secs(5), async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
    }
}
