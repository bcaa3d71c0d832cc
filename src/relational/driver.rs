#[cfg(feature = "pg")]
pub mod pg;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::fmt::Debug;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use sea_orm::DbErr;

/// Backend-specific connection bootstrap.
#[async_trait]
pub trait DatabaseDriver: Debug + Sync + Send + 'static {
    fn connection(&self) -> DatabaseConnection;
    /// Session-level tuning applied once after connecting.
    async fn configure(&self) -> Result<(), DbErr>;
}
