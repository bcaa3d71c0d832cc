use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use fieldx::fxstruct;
use sea_orm::ConnectOptions;
use sea_orm::ConnectionTrait;
use sea_orm::DatabaseConnection;
use sea_orm::DbErr;
use tracing::error;

use super::DatabaseDriver;

#[derive(Debug)]
#[fxstruct(sync, no_new)]
pub struct Sqlite {
    connection: DatabaseConnection,
    in_memory:  bool,
}

impl Sqlite {
    pub async fn connect(db_dir: &Path, db_name: &str) -> Result<Self, DbErr> {
        let db_path = db_dir.join(db_name);

        let schema = format!("sqlite://{}?mode=rwc", db_path.display());
        let db = sea_orm::Database::connect(&schema)
            .await
            .inspect_err(|e| error!("Error connecting to database {schema}: {e}"))?;

        Ok(Self {
            connection: db,
            in_memory:  false,
        })
    }

    /// A private in-memory database. The pool is pinned to one long-lived connection, since every
    /// SQLite memory connection is a database of its own.
    pub async fn connect_memory() -> Result<Self, DbErr> {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(24 * 60 * 60))
            .max_lifetime(Duration::from_secs(24 * 60 * 60))
            .sqlx_logging(false);
        let db = sea_orm::Database::connect(opts)
            .await
            .inspect_err(|e| error!("Error opening in-memory database: {e}"))?;

        Ok(Self {
            connection: db,
            in_memory:  true,
        })
    }
}

#[async_trait]
impl DatabaseDriver for Sqlite {
    fn connection(&self) -> DatabaseConnection {
        self.connection.clone()
    }

    async fn configure(&self) -> Result<(), DbErr> {
        let db = &self.connection;

        db.execute_unprepared("PRAGMA foreign_keys=ON;").await?;
        if !self.in_memory {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
            db.execute_unprepared("PRAGMA synchronous=NORMAL;").await?;
        }

        Ok(())
    }
}
