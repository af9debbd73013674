//! Database module for persistent storage.
//!
//! Provides async SQLite access using SQLx for chat accounts: credentials,
//! privilege levels and the admin bootstrap. The rest of the server only sees
//! the [`CredentialStore`] trait.

mod accounts;

pub use accounts::{Account, AccountRepository, PasswordHasher};

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Name of the reserved super-admin account created at bootstrap.
pub const BOOTSTRAP_ADMIN: &str = "admin";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("migration error: {0}")]
    Migration(sqlx::migrate::MigrateError),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("account already exists: {0}")]
    AccountExists(String),
    #[error("invalid password")]
    InvalidPassword,
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Account privilege level. Stored as 0 (user) or 1 (admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Privilege {
    #[default]
    User,
    Admin,
}

impl Privilege {
    /// Parse a stored or user-supplied level.
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Self::User),
            1 => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn level(self) -> i64 {
        match self {
            Self::User => 0,
            Self::Admin => 1,
        }
    }

    #[inline]
    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
        }
    }
}

/// Account operations the chat core depends on.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Verify a username/password pair.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Account, DbError>;

    /// Create a new account.
    async fn create_account(
        &self,
        username: &str,
        password: &str,
        privilege: Privilege,
    ) -> Result<Account, DbError>;

    async fn update_password(&self, username: &str, password: &str) -> Result<(), DbError>;

    async fn update_privilege(&self, username: &str, privilege: Privilege) -> Result<(), DbError>;

    async fn delete_account(&self, username: &str) -> Result<(), DbError>;

    /// All accounts, admins first, then by username.
    async fn list_accounts(&self) -> Result<Vec<Account>, DbError>;
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    hasher: PasswordHasher,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a new database connection, running migrations if needed.
    pub async fn new(path: &str, cost: HashCost) -> Result<Self, DbError> {
        let hasher = PasswordHasher::new(cost)?;

        let pool = if path == ":memory:" {
            // Uniquely named shared-cache memory database per call.
            // `file::memory:` is global-ish and will collide across parallel tests.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:slchatd-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        Self::run_migrations(&pool).await?;

        // WAL lets readers proceed while a write is in progress
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&pool)
            .await?;

        let integrity_result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await?;

        if integrity_result != "ok" {
            tracing::error!(
                integrity_check = %integrity_result,
                "Database integrity check FAILED - corruption detected!"
            );
            return Err(DbError::Sqlx(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Database integrity check failed: {}", integrity_result),
            ))));
        }

        Ok(Self { pool, hasher })
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(DbError::Migration)?;

        info!("Database migrations checked/applied");
        Ok(())
    }

    /// Get account repository.
    pub fn accounts(&self) -> AccountRepository<'_> {
        AccountRepository::new(&self.pool, &self.hasher)
    }

    /// Make sure at least one admin account exists.
    ///
    /// Creates `admin` with the given password when no account holds admin
    /// privilege. Returns `true` when an account was created or promoted.
    pub async fn ensure_admin(&self, password: &str) -> Result<bool, DbError> {
        let repo = self.accounts();
        if repo.count_admins().await? > 0 {
            return Ok(false);
        }

        warn!(
            username = BOOTSTRAP_ADMIN,
            "No admin account found, creating default admin account"
        );
        match repo
            .create(BOOTSTRAP_ADMIN, password, Privilege::Admin)
            .await
        {
            Ok(_) => Ok(true),
            Err(DbError::AccountExists(_)) => {
                repo.set_privilege(BOOTSTRAP_ADMIN, Privilege::Admin).await?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CredentialStore for Database {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Account, DbError> {
        self.accounts().identify(username, password).await
    }

    async fn create_account(
        &self,
        username: &str,
        password: &str,
        privilege: Privilege,
    ) -> Result<Account, DbError> {
        self.accounts().create(username, password, privilege).await
    }

    async fn update_password(&self, username: &str, password: &str) -> Result<(), DbError> {
        self.accounts().set_password(username, password).await
    }

    async fn update_privilege(&self, username: &str, privilege: Privilege) -> Result<(), DbError> {
        self.accounts().set_privilege(username, privilege).await
    }

    async fn delete_account(&self, username: &str) -> Result<(), DbError> {
        self.accounts().delete(username).await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, DbError> {
        self.accounts().list().await
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err)
    }
}
