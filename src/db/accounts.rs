//! Account repository for chat logins.
//!
//! Handles account creation, authentication, password and privilege updates.

use super::{DbError, HashCost, Privilege};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;
use sqlx::SqlitePool;

/// A persisted chat account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub privilege: Privilege,
    pub created_at: i64,
}

type AccountRow = (i64, String, i64, i64);

fn account_from_row((id, username, privilege, created_at): AccountRow) -> Account {
    Account {
        id,
        username,
        // Unknown levels from hand-edited rows degrade to a regular user.
        privilege: Privilege::from_level(privilege).unwrap_or_default(),
        created_at,
    }
}

/// Argon2id hasher with configured cost.
///
/// Also carries a hash of a throwaway secret so lookups for unknown accounts
/// spend the same work as a wrong password.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(cost: HashCost) -> Result<Self, DbError> {
        let params = Params::new(cost.memory_kib, cost.iterations, 1, None)
            .map_err(|e| DbError::Hash(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let dummy_hash = argon2
            .hash_password(b"timing-oracle-dummy", &salt)
            .map_err(|e| DbError::Hash(e.to_string()))?
            .to_string();

        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a password into a PHC string.
    pub fn hash(&self, password: &str) -> Result<String, DbError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| DbError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored PHC string.
    ///
    /// Cost parameters come from the stored hash, so accounts hashed under an
    /// older configuration still verify.
    pub fn verify(&self, password: &str, hash: &str) -> Result<(), DbError> {
        let parsed = PasswordHash::new(hash).map_err(|_| DbError::InvalidPassword)?;
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| DbError::InvalidPassword)
    }

    /// Burn one verification for an account that doesn't exist.
    pub fn dummy_verify(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

/// Repository for account operations.
pub struct AccountRepository<'a> {
    pool: &'a SqlitePool,
    hasher: &'a PasswordHasher,
}

impl<'a> AccountRepository<'a> {
    /// Create a new account repository.
    pub fn new(pool: &'a SqlitePool, hasher: &'a PasswordHasher) -> Self {
        Self { pool, hasher }
    }

    /// Create a new account with the given privilege.
    pub async fn create(
        &self,
        username: &str,
        password: &str,
        privilege: Privilege,
    ) -> Result<Account, DbError> {
        let password_hash = self.hasher.hash(password)?;
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO accounts (username, password_hash, privilege, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(&password_hash)
        .bind(privilege.level())
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return DbError::AccountExists(username.to_string());
            }
            DbError::from(e)
        })?;

        Ok(Account {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            privilege,
            created_at: now,
        })
    }

    /// Verify password and return the account if valid.
    ///
    /// Unknown usernames still pay for one hash verification so response time
    /// doesn't reveal whether the account exists.
    pub async fn identify(&self, username: &str, password: &str) -> Result<Account, DbError> {
        let row = sqlx::query_as::<_, (i64, String, String, i64, i64)>(
            r#"
            SELECT id, username, password_hash, privilege, created_at
            FROM accounts
            WHERE username = ? COLLATE NOCASE
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        let Some((id, username, password_hash, privilege, created_at)) = row else {
            self.hasher.dummy_verify(password);
            return Err(DbError::AccountNotFound(username.to_string()));
        };

        self.hasher.verify(password, &password_hash)?;

        Ok(account_from_row((id, username, privilege, created_at)))
    }

    /// Find account by username.
    pub async fn find_by_name(&self, username: &str) -> Result<Option<Account>, DbError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, username, privilege, created_at
            FROM accounts
            WHERE username = ? COLLATE NOCASE
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(account_from_row))
    }

    /// Replace an account's password.
    pub async fn set_password(&self, username: &str, password: &str) -> Result<(), DbError> {
        let password_hash = self.hasher.hash(password)?;
        let result =
            sqlx::query("UPDATE accounts SET password_hash = ? WHERE username = ? COLLATE NOCASE")
                .bind(password_hash)
                .bind(username)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::AccountNotFound(username.to_string()));
        }
        Ok(())
    }

    /// Change an account's stored privilege.
    pub async fn set_privilege(&self, username: &str, privilege: Privilege) -> Result<(), DbError> {
        let result =
            sqlx::query("UPDATE accounts SET privilege = ? WHERE username = ? COLLATE NOCASE")
                .bind(privilege.level())
                .bind(username)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::AccountNotFound(username.to_string()));
        }
        Ok(())
    }

    /// Delete an account.
    pub async fn delete(&self, username: &str) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM accounts WHERE username = ? COLLATE NOCASE")
            .bind(username)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::AccountNotFound(username.to_string()));
        }
        Ok(())
    }

    /// All accounts, ordered by privilege (admins first) then username.
    pub async fn list(&self) -> Result<Vec<Account>, DbError> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, username, privilege, created_at
            FROM accounts
            ORDER BY privilege DESC, username
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(account_from_row).collect())
    }

    /// Number of accounts holding admin privilege.
    pub async fn count_admins(&self) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts WHERE privilege = ?")
            .bind(Privilege::Admin.level())
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
