use std::time::Duration;

use async_trait::async_trait;
use fieldx::fxstruct;
use sea_orm::ConnectOptions;
use sea_orm::ConnectionTrait;
use sea_orm::DatabaseConnection;
use sea_orm::DbBackend;
use sea_orm::DbErr;
use sea_orm::Statement;
use tracing::debug;
use tracing::error;

use super::DatabaseDriver;

#[derive(Debug)]
#[fxstruct(sync, rc, no_new, builder)]
pub struct Pg {
    #[fieldx(builder(into))]
    host:              String,
    #[fieldx(default(5432))]
    port:              u16,
    #[fieldx(builder(into))]
    user:              String,
    #[fieldx(builder(into))]
    password:          String,
    #[fieldx(builder(into))]
    database:          String,
    #[fieldx(default(20))]
    max_connections:   u32,
    /// Server-side cap on a single statement. Complements the per-operation deadline of the catalog.
    #[fieldx(default(Duration::from_secs(30)))]
    statement_timeout: Duration,
    #[fieldx(inner_mut, get(off), set, builder(off))]
    connection:        DatabaseConnection,
}

impl Pg {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }

    /// Server settings applied to every session the pool opens.
    pub fn session_options(&self) -> Vec<(&'static str, String)> {
        vec![("statement_timeout", self.statement_timeout.as_millis().to_string())]
    }

    pub async fn connect(&self) -> Result<(), DbErr> {
        let session_options = self.session_options();
        let mut opts = ConnectOptions::new(self.url());
        opts.max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(20))
            .max_lifetime(Duration::from_secs(60))
            .test_before_acquire(true)
            .sqlx_logging(false)
            .map_sqlx_postgres_opts(move |pg_opts| pg_opts.options(session_options.clone()));

        self.set_connection(sea_orm::Database::connect(opts).await.inspect_err(|e| {
            error!(host = %self.host, port = self.port, database = %self.database, "error connecting to database: {e}")
        })?);

        Ok(())
    }
}

#[async_trait]
impl DatabaseDriver for Pg {
    fn connection(&self) -> DatabaseConnection {
        self.connection.read().clone()
    }

    // Session settings travel with every pooled connection's startup packet; here we only report them.
    async fn configure(&self) -> Result<(), DbErr> {
        let row = self
            .connection()
            .query_one(Statement::from_string(DbBackend::Postgres, "SHOW statement_timeout"))
            .await?;
        if let Some(row) = row {
            let timeout: String = row.try_get("", "statement_timeout")?;
            debug!(host = %self.host, database = %self.database, statement_timeout = %timeout, "postgres session");
        }

        Ok(())
    }
}
