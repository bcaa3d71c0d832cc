use clap::Parser;
use fieldx::fxstruct;
use garde::Validate;
use sea_orm::ConnectOptions;
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tracing::info;
use tracing::instrument;

use crate::cache_store::RedisCacheStore;
use crate::error::config_err;
use crate::error::Result;
use crate::orchestrator::Catalog;
#[cfg(feature = "pg")]
use crate::relational::driver::pg::Pg;
#[cfg(feature = "pg")]
use crate::relational::driver::DatabaseDriver;
use crate::relational::SeaBookStore;
use crate::relational::TableSchema;

/// Catalog configuration. Every option can come from the command line or from the environment.
///
/// There is no ambient configuration: build one of these, then hand it to [`CatalogConfig::connect()`] or pick the
/// pieces you need for a custom [`Catalog`].
#[derive(Debug, Clone, clap::Parser, Validate)]
#[fxstruct(no_new, get(copy))]
#[clap(about, version, name = "book-catalog")]
pub struct CatalogConfig {
    /// Full database URL. Overrides the individual `--db-*` options when set.
    #[clap(long, env = "DATABASE_URL", hide_env_values = true)]
    #[fieldx(get("database_url_override", clone))]
    #[garde(skip)]
    database_url: Option<String>,

    #[clap(long, env = "DB_HOST", default_value = "localhost")]
    #[fieldx(get(clone))]
    #[garde(length(min = 1))]
    db_host: String,

    #[clap(long, env = "DB_PORT", default_value_t = 5432)]
    #[garde(range(min = 1))]
    db_port: u16,

    #[clap(long, env = "DB_USER", default_value = "postgres")]
    #[fieldx(get(clone))]
    #[garde(length(min = 1))]
    db_user: String,

    #[clap(long, env = "DB_PASSWORD", hide_env_values = true, default_value = "")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    db_password: String,

    #[clap(long, env = "DB_NAME", default_value = "books")]
    #[fieldx(get(clone))]
    #[garde(length(min = 1))]
    db_name: String,

    /// Size of the relational connection pool.
    #[clap(long, env = "CATALOG_MAX_CONNECTIONS", default_value_t = 20)]
    #[garde(range(min = 1))]
    max_connections: u32,

    #[clap(long, env = "REDIS_HOST", default_value = "localhost")]
    #[fieldx(get(clone))]
    #[garde(length(min = 1))]
    redis_host: String,

    #[clap(long, env = "REDIS_PORT", default_value_t = 6379)]
    #[garde(range(min = 1))]
    redis_port: u16,

    /// Table holding book rows.
    #[clap(long, env = "TABLE_NAME", default_value = "books")]
    #[fieldx(get(clone))]
    #[garde(length(min = 1))]
    table_name: String,

    #[clap(long, env = "BOOK_ID", default_value = "book_id")]
    #[fieldx(get(clone))]
    #[garde(length(min = 1))]
    id_column: String,

    #[clap(long, env = "TITLE", default_value = "title")]
    #[fieldx(get(clone))]
    #[garde(length(min = 1))]
    title_column: String,

    #[clap(long, env = "AUTHOR", default_value = "author")]
    #[fieldx(get(clone))]
    #[garde(length(min = 1))]
    author_column: String,

    #[clap(long, env = "PUB_YEAR", default_value = "published_year")]
    #[fieldx(get(clone))]
    #[garde(length(min = 1))]
    year_column: String,

    /// Default upper bound of a single catalog operation, in seconds.
    #[clap(long, env = "CATALOG_OP_TIMEOUT", default_value_t = 30)]
    #[garde(range(min = 1))]
    op_timeout: u64,

    /// Create the book table at startup if it does not exist.
    #[clap(long, env = "CATALOG_CREATE_TABLE", default_value_t = false)]
    #[garde(skip)]
    create_table: bool,
}

impl CatalogConfig {
    /// Parse from the process arguments and environment, then validate.
    pub fn load() -> Result<Self> {
        let config = Self::try_parse().map_err(|err| config_err!("{err}"))?;
        config.validated()
    }

    pub fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Self::try_parse_from(args).map_err(|err| config_err!("{err}"))?;
        config.validated()
    }

    fn validated(self) -> Result<Self> {
        self.validate().map_err(|report| config_err!("{report}"))?;
        Ok(self)
    }

    pub fn table_schema(&self) -> TableSchema {
        TableSchema {
            table:         self.table_name(),
            id_column:     self.id_column(),
            title_column:  self.title_column(),
            author_column: self.author_column(),
            year_column:   self.year_column(),
        }
    }

    pub fn database_url(&self) -> String {
        self.database_url.clone().unwrap_or_else(|| {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
            )
        })
    }

    pub fn redis_url(&self) -> String {
        RedisCacheStore::url_for(&self.redis_host, self.redis_port)
    }

    pub fn op_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.op_timeout)
    }

    /// A PostgreSQL driver for the `--db-*` options.
    #[cfg(feature = "pg")]
    pub fn pg_driver(&self) -> Result<std::sync::Arc<Pg>> {
        Pg::builder()
            .host(self.db_host())
            .port(self.db_port)
            .user(self.db_user())
            .password(self.db_password())
            .database(self.db_name())
            .max_connections(self.max_connections)
            .build()
            .map_err(|err| config_err!("postgres driver: {err}"))
    }

    // With the `pg` feature and no URL override the driver applies its session settings. Any other setup connects
    // by URL, which lets SeaORM pick the backend.
    async fn relational_connection(&self) -> Result<DatabaseConnection> {
        #[cfg(feature = "pg")]
        {
            if self.database_url.is_none() {
                let pg = self.pg_driver()?;
                pg.connect().await?;
                pg.configure().await?;
                return Ok(pg.connection());
            }
        }

        let mut opts = ConnectOptions::new(self.database_url());
        opts.max_connections(self.max_connections)
            .acquire_timeout(self.op_timeout_duration())
            .sqlx_logging(false);
        Ok(sea_orm::Database::connect(opts).await?)
    }

    /// Connect both stores and assemble a catalog.
    #[instrument(level = "debug", skip(self))]
    pub async fn connect(&self) -> Result<Catalog<SeaBookStore, RedisCacheStore>> {
        let connection = self.relational_connection().await?;

        let relational = SeaBookStore::new(connection, self.table_schema());
        if self.create_table {
            relational.create_table_if_missing().await?;
        }

        let cache = RedisCacheStore::connect(&self.redis_url()).await?;

        info!(table = %self.table_name, redis = %self.redis_url(), "catalog stores connected");

        Catalog::builder()
            .relational(relational)
            .cache(cache)
            .name(self.table_name())
            .op_timeout(self.op_timeout_duration())
            .build()
            .map_err(|err| config_err!("catalog: {err}"))
    }
}
