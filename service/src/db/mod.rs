//! The user store: `users(id, email UNIQUE, password)` (spec.md §6),
//! mirroring `sign/db/helpers.py`. Dual sqlite/postgres backend via
//! `sqlx`'s driver-erased `Any` pool, matching the original's
//! `db_url`-prefix dispatch in `create_database_engine`.

use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{Any, Pool, Row};

use crate::config::Settings;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("user not found")]
    UserNotFound,
    #[error("user already exists")]
    UserExists,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub pool_size: u32,
    pub idle: usize,
    pub in_use: u32,
}

pub struct Db {
    pool: Pool<Any>,
}

impl Db {
    /// Connects with pool sizing pulled from `Settings` (spec.md §6,
    /// `SPEC_FULL.md` §C.4), matching the pre-ping/recycle/overflow
    /// knobs of the original's SQLAlchemy engine.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(settings.db_pool_size + settings.db_max_overflow)
            .min_connections(if settings.db_pool_pre_ping { 1 } else { 0 })
            .idle_timeout(std::time::Duration::from_secs(settings.db_pool_recycle.max(0) as u64))
            .connect(&settings.db_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self, migrations_dir: &std::path::Path) -> Result<()> {
        sqlx::migrate::Migrator::new(migrations_dir)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    pub async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                email TEXT NOT NULL UNIQUE, \
                password TEXT NOT NULL\
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn drop_tables(&self) -> Result<()> {
        sqlx::query("DROP TABLE IF EXISTS users").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn create_user(&self, email: &str, password_hash: &str) -> Result<i64> {
        if self.user_exists(email).await? {
            return Err(Error::UserExists);
        }
        let row: AnyRow = sqlx::query("INSERT INTO users (email, password) VALUES (?, ?) RETURNING id")
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("id")?)
    }

    pub async fn user_exists(&self, email: &str) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn get_user(&self, email: &str) -> Result<User> {
        let row = sqlx::query("SELECT id, email, password FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::UserNotFound)?;
        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password: row.try_get("password")?,
        })
    }

    pub async fn update_password(&self, email: &str, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password = ? WHERE email = ?")
            .bind(password_hash)
            .bind(email)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound);
        }
        Ok(())
    }

    pub async fn delete_user(&self, email: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE email = ?").bind(email).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound);
        }
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    pub fn pool_stats(&self) -> PoolStats {
        let size = self.pool.size();
        let idle = self.pool.num_idle();
        PoolStats { pool_size: size, idle, in_use: size.saturating_sub(idle as u32) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SigningBackendKind;
    use std::path::PathBuf;

    /// Pinned to a single pool connection: an in-memory sqlite
    /// database is private to the connection that opened it, so a
    /// second pooled connection would see an empty database.
    fn in_memory_settings() -> Settings {
        Settings {
            gpg_binary: PathBuf::from("/usr/bin/gpg2"),
            keyring: PathBuf::from("/tmp/keyring"),
            locks_dir: PathBuf::from("/tmp/locks"),
            max_upload_bytes: 100_000_000,
            pass_db_dev_mode: true,
            pass_db_dev_pass: "dev".into(),
            tmp_dir: PathBuf::from("/tmp"),
            pgp_keys: Vec::new(),
            db_url: "sqlite::memory:".into(),
            db_pool_size: 1,
            db_max_overflow: 0,
            db_pool_recycle: 60,
            db_pool_pre_ping: false,
            db_echo: false,
            jwt_secret_key: "test-secret".into(),
            jwt_expire_minutes: 30,
            jwt_algorithm: "HS256".into(),
            root_url: String::new(),
            service: "signd-test".into(),
            signing_backend: SigningBackendKind::Gpg,
            kms_region: None,
            kms_signing_algorithm: "RSASSA_PKCS1_V1_5_SHA_256".into(),
            kms_max_workers: 1,
            kms_keys: Vec::new(),
            bind_addr: "127.0.0.1:0".into(),
        }
    }

    #[tokio::test]
    async fn create_user_then_get_user_roundtrips() {
        let db = Db::connect(&in_memory_settings()).await.unwrap();
        db.create_tables().await.unwrap();

        db.create_user("test@test.ru", "hashed-password").await.unwrap();
        let user = db.get_user("test@test.ru").await.unwrap();
        assert_eq!(user.email, "test@test.ru");
        assert_eq!(user.password, "hashed-password");
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() {
        let db = Db::connect(&in_memory_settings()).await.unwrap();
        db.create_tables().await.unwrap();

        db.create_user("dup@test.ru", "a").await.unwrap();
        let err = db.create_user("dup@test.ru", "b").await.unwrap_err();
        assert!(matches!(err, Error::UserExists));
    }

    #[tokio::test]
    async fn get_user_missing_returns_not_found() {
        let db = Db::connect(&in_memory_settings()).await.unwrap();
        db.create_tables().await.unwrap();

        let err = db.get_user("ghost@test.ru").await.unwrap_err();
        assert!(matches!(err, Error::UserNotFound));
    }

    #[tokio::test]
    async fn update_password_changes_stored_hash() {
        let db = Db::connect(&in_memory_settings()).await.unwrap();
        db.create_tables().await.unwrap();
        db.create_user("test@test.ru", "old-hash").await.unwrap();

        db.update_password("test@test.ru", "new-hash").await.unwrap();
        let user = db.get_user("test@test.ru").await.unwrap();
        assert_eq!(user.password, "new-hash");
    }

    #[tokio::test]
    async fn delete_user_removes_the_row() {
        let db = Db::connect(&in_memory_settings()).await.unwrap();
        db.create_tables().await.unwrap();
        db.create_user("test@test.ru", "hash").await.unwrap();

        db.delete_user("test@test.ru").await.unwrap();
        assert!(matches!(db.get_user("test@test.ru").await, Err(Error::UserNotFound)));
    }

    #[tokio::test]
    async fn is_connected_reports_true_for_a_live_pool() {
        let db = Db::connect(&in_memory_settings()).await.unwrap();
        assert!(db.is_connected().await);
    }
}
