//! Database-backed identity storage implementation

use super::{
    normalize, IdentityError, IdentityResult, NewUser, Role, RoleDirectory, UserAccount,
    UserDirectory,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, error, info};

/// User and role directory stored in SQLite
#[derive(Debug, Clone)]
pub struct SqliteIdentityStore {
    pool: SqlitePool,
}

impl SqliteIdentityStore {
    /// Connect to `database_url` and create the identity tables if missing.
    pub async fn connect(database_url: &str) -> IdentityResult<Self> {
        info!("Connecting identity store: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(storage_error("parse database url"))?
            .create_if_missing(true);

        let pool = pool_options(database_url)
            .connect_with(options)
            .await
            .map_err(storage_error("connect"))?;

        Self::new(pool).await
    }

    /// Use an existing pool
    pub async fn new(pool: SqlitePool) -> IdentityResult<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_tables(&self) -> IdentityResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                user_name TEXT NOT NULL,
                email TEXT NOT NULL,
                normalized_email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                email_confirmed BOOLEAN NOT NULL DEFAULT FALSE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS roles (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                normalized_name TEXT UNIQUE NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS user_roles (
                user_id TEXT NOT NULL REFERENCES users(id),
                role_id TEXT NOT NULL REFERENCES roles(id),
                PRIMARY KEY (user_id, role_id)
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(storage_error("create tables"))?;
        }

        debug!("Identity tables ready");
        Ok(())
    }

    async fn load_user(&self, row: Option<SqliteRow>) -> IdentityResult<Option<UserAccount>> {
        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.try_get("id").map_err(storage_error("read user"))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(storage_error("read user"))?;

        let roles = sqlx::query(
            r#"
            SELECT r.name FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = ?
            "#,
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("read user roles"))?
        .iter()
        .map(|r| r.try_get::<String, _>("name"))
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(storage_error("read user roles"))?;

        Ok(Some(UserAccount {
            id,
            user_name: row.try_get("user_name").map_err(storage_error("read user"))?,
            email: row.try_get("email").map_err(storage_error("read user"))?,
            password_hash: row
                .try_get("password_hash")
                .map_err(storage_error("read user"))?,
            email_confirmed: row
                .try_get("email_confirmed")
                .map_err(storage_error("read user"))?,
            is_active: row.try_get("is_active").map_err(storage_error("read user"))?,
            roles,
            created_at: parse_timestamp(&created_at)?,
        }))
    }

    async fn role_id(&self, name: &str) -> IdentityResult<Option<String>> {
        let row = sqlx::query("SELECT id FROM roles WHERE normalized_name = ?")
            .bind(normalize(name))
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("find role"))?;

        row.map(|r| r.try_get::<String, _>("id"))
            .transpose()
            .map_err(storage_error("find role"))
    }
}

#[async_trait]
impl UserDirectory for SqliteIdentityStore {
    async fn find_by_email(&self, email: &str) -> IdentityResult<Option<UserAccount>> {
        let row = sqlx::query("SELECT * FROM users WHERE normalized_email = ?")
            .bind(normalize(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("find user by email"))?;

        self.load_user(row).await
    }

    async fn find_by_id(&self, id: &str) -> IdentityResult<Option<UserAccount>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("find user by id"))?;

        self.load_user(row).await
    }

    async fn create(&self, user: NewUser) -> IdentityResult<UserAccount> {
        if self.find_by_email(&user.email).await?.is_some() {
            return Err(IdentityError::DuplicateEmail(user.email));
        }

        let account = UserAccount::new(user)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, user_name, email, normalized_email, password_hash,
                               email_confirmed, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.user_name)
        .bind(&account.email)
        .bind(normalize(&account.email))
        .bind(&account.password_hash)
        .bind(account.email_confirmed)
        .bind(account.is_active)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                IdentityError::DuplicateEmail(account.email.clone())
            } else {
                error!("Failed to insert user: {}", e);
                IdentityError::Storage(format!("insert user: {}", e))
            }
        })?;

        info!("Created user: {}", account.email);
        Ok(account)
    }

    async fn add_to_role(&self, user_id: &str, role: &str) -> IdentityResult<()> {
        let role_id = self
            .role_id(role)
            .await?
            .ok_or_else(|| IdentityError::RoleNotFound(role.to_string()))?;

        if self.find_by_id(user_id).await?.is_none() {
            return Err(IdentityError::UserNotFound(user_id.to_string()));
        }

        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error("add user to role"))?;

        Ok(())
    }

    async fn is_in_role(&self, user_id: &str, role: &str) -> IdentityResult<bool> {
        let user = self
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| IdentityError::UserNotFound(user_id.to_string()))?;
        Ok(user.has_role(role))
    }

    async fn count(&self) -> IdentityResult<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error("count users"))?;

        let count: i64 = row.try_get("count").map_err(storage_error("count users"))?;
        Ok(count.max(0) as usize)
    }
}

#[async_trait]
impl RoleDirectory for SqliteIdentityStore {
    async fn role_exists(&self, name: &str) -> IdentityResult<bool> {
        Ok(self.role_id(name).await?.is_some())
    }

    async fn create_role(&self, name: &str) -> IdentityResult<Role> {
        if normalize(name).is_empty() {
            return Err(IdentityError::InvalidRoleName(name.to_string()));
        }

        let role = Role::new(name);

        sqlx::query(
            "INSERT INTO roles (id, name, normalized_name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&role.id)
        .bind(&role.name)
        .bind(normalize(&role.name))
        .bind(role.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                IdentityError::DuplicateRole(name.to_string())
            } else {
                IdentityError::Storage(format!("insert role: {}", e))
            }
        })?;

        info!("Created role: {}", role.name);
        Ok(role)
    }

    async fn roles(&self) -> IdentityResult<Vec<Role>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error("list roles"))?;

        rows.iter()
            .map(|row| -> IdentityResult<Role> {
                let created_at: String =
                    row.try_get("created_at").map_err(storage_error("list roles"))?;
                Ok(Role {
                    id: row.try_get("id").map_err(storage_error("list roles"))?,
                    name: row.try_get("name").map_err(storage_error("list roles"))?,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }
}

fn storage_error(operation: &'static str) -> impl Fn(sqlx::Error) -> IdentityError {
    move |e| {
        error!("Identity store failed to {}: {}", operation, e);
        IdentityError::Storage(format!("{}: {}", operation, e))
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// An in-memory database lives only as long as its connection, so its pool
/// holds exactly one connection that is never reaped.
fn pool_options(database_url: &str) -> SqlitePoolOptions {
    if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    }
}

fn parse_timestamp(value: &str) -> IdentityResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| IdentityError::Storage(format!("invalid timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentitySeed;
    use asc_core::ApplicationSettings;

    async fn store() -> SqliteIdentityStore {
        SqliteIdentityStore::connect("sqlite::memory:").await.unwrap()
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            user_name: "Admin".to_string(),
            email: email.to_string(),
            password: "Admin@123".to_string(),
            email_confirmed: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let store = store().await;
        let created = store.create(new_user("admin@example.com")).await.unwrap();

        let found = store
            .find_by_email("ADMIN@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert!(found.email_confirmed);
        assert!(found.verify_password("Admin@123"));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = store().await;
        store.create(new_user("admin@example.com")).await.unwrap();

        let err = store
            .create(new_user("Admin@Example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateEmail(_)));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_roles_and_membership() {
        let store = store().await;
        store.create_role("Admin").await.unwrap();
        assert!(store.role_exists("admin").await.unwrap());
        assert!(matches!(
            store.create_role("ADMIN").await.unwrap_err(),
            IdentityError::DuplicateRole(_)
        ));

        let user = store.create(new_user("admin@example.com")).await.unwrap();
        store.add_to_role(&user.id, "Admin").await.unwrap();
        store.add_to_role(&user.id, "admin").await.unwrap();

        assert!(store.is_in_role(&user.id, "Admin").await.unwrap());
        let reloaded = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.roles.len(), 1);

        assert!(matches!(
            store.add_to_role(&user.id, "Ghost").await.unwrap_err(),
            IdentityError::RoleNotFound(_)
        ));
    }

    #[test]
    fn test_memory_pool_keeps_its_connection() {
        let options = pool_options("sqlite::memory:");
        assert_eq!(options.get_max_connections(), 1);
        assert_eq!(options.get_min_connections(), 1);
        assert!(options.get_idle_timeout().is_none());
        assert!(options.get_max_lifetime().is_none());

        let options = pool_options("sqlite://asc.db");
        assert_eq!(options.get_max_connections(), 5);
    }

    #[tokio::test]
    async fn test_memory_store_survives_idle_time() {
        let store = store().await;
        store.create_role("Admin").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(store.pool().size(), 1);
        assert!(store.role_exists("Admin").await.unwrap());
    }

    #[tokio::test]
    async fn test_seed_twice_across_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("identity.db").display());
        let settings = ApplicationSettings::default();

        let first = {
            let store = SqliteIdentityStore::connect(&url).await.unwrap();
            let outcome = IdentitySeed::new()
                .seed(&store, &store, &settings)
                .await
                .unwrap();
            store.pool().close().await;
            outcome
        };
        assert_eq!(first.roles_created.len(), 3);
        assert_eq!(first.users_created, vec!["admin@example.com".to_string()]);

        let store = SqliteIdentityStore::connect(&url).await.unwrap();
        let second = IdentitySeed::new()
            .seed(&store, &store, &settings)
            .await
            .unwrap();

        assert!(second.is_noop());
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.roles().await.unwrap().len(), 3);

        let admin = store
            .find_by_email("admin@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(store.is_in_role(&admin.id, "Admin").await.unwrap());
    }
}
