use crate::log_info;
use crate::shared::errors::AppError;
use crate::shared::utils::logger::LogContext;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Busy timeout of reader connections
const READER_BUSY_TIMEOUT_MS: u32 = 10_000;
/// Busy timeout of the writer connection
pub const WRITER_BUSY_TIMEOUT_MS: u32 = 15_000;

/// Applies per-connection pragmas every time the pool hands a reader out.
#[derive(Debug)]
struct ReaderPragmas;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ReaderPragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {};",
            READER_BUSY_TIMEOUT_MS
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

/// SQLite cache store: a pool of reader connections plus the means to open
/// the single writer connection.
#[derive(Debug)]
pub struct Database {
    pool: DbPool,
    path: PathBuf,
}

impl Database {
    /// One-time store initialization: journal mode, schema migrations and the
    /// reader pool. Must not be called from read or write paths.
    pub fn initialize(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let database_url = path.to_string_lossy().to_string();
        log_info!("Initializing cache database at: {}", database_url);

        let mut conn = SqliteConnection::establish(&database_url)?;
        // journal_mode cannot change inside a transaction, so it runs before migrations
        conn.batch_execute(&format!(
            "PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; PRAGMA busy_timeout = {};",
            WRITER_BUSY_TIMEOUT_MS
        ))?;
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            AppError::DatabaseError(format!("Failed to run cache migrations: {}", e))
        })?;

        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool_size = Self::reader_pool_size();
        let pool = r2d2::Pool::builder()
            .max_size(pool_size)
            .connection_timeout(Duration::from_secs(10))
            .connection_customizer(Box::new(ReaderPragmas))
            .build(manager)
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to create connection pool: {}", e))
            })?;

        log_info!(
            "Cache database ready (WAL, reader pool max_size: {})",
            pool.max_size()
        );

        Ok(Self { pool, path })
    }

    /// Reader pool sized to the machine, capped for a single-job worker
    fn reader_pool_size() -> u32 {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        std::cmp::min(cpu_count * 2, 16) as u32
    }

    /// Open the dedicated connection owned by the cache writer thread.
    pub fn open_writer_connection(&self) -> Result<SqliteConnection, AppError> {
        let mut conn = SqliteConnection::establish(&self.path.to_string_lossy())?;
        conn.batch_execute(&format!(
            "PRAGMA synchronous = NORMAL; PRAGMA busy_timeout = {};",
            WRITER_BUSY_TIMEOUT_MS
        ))?;
        Ok(conn)
    }

    pub fn get_connection(&self) -> Result<DbConnection, AppError> {
        let start = std::time::Instant::now();

        match self.pool.get() {
            Ok(conn) => {
                let duration = start.elapsed().as_millis() as u64;
                if duration > 100 {
                    LogContext::performance_metric("db_connection_acquire", duration, Some("slow"));
                }
                Ok(conn)
            }
            Err(e) => {
                LogContext::error_with_context(
                    &e,
                    "Failed to acquire database connection from pool",
                );
                Err(AppError::from(e))
            }
        }
    }

    /// Get pool statistics for monitoring
    pub fn pool_status(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            connections: state.connections,
            idle_connections: state.idle_connections,
            max_size: self.pool.max_size(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug)]
pub struct PoolStatus {
    pub connections: u32,
    pub idle_connections: u32,
    pub max_size: u32,
}
