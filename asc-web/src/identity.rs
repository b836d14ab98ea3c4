//! User and role directories backing the identity seed and login

pub mod memory;
pub mod seed;

#[cfg(feature = "sqlite")]
pub mod database;


use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use memory::MemoryIdentityStore;
pub use seed::{IdentitySeed, SeedOutcome};

#[cfg(feature = "sqlite")]
pub use database::SqliteIdentityStore;

pub type IdentityResult<T> = Result<T, IdentityError>;

/// Identity directory errors
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("A user with email '{0}' already exists")]
    DuplicateEmail(String),
    #[error("Role '{0}' already exists")]
    DuplicateRole(String),
    #[error("User '{0}' not found")]
    UserNotFound(String),
    #[error("Role '{0}' not found")]
    RoleNotFound(String),
    #[error("Invalid role name '{0}'")]
    InvalidRoleName(String),
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error("Identity storage error: {0}")]
    Storage(String),
}

/// Stored user account
#[derive(Debug, Clone, Serialize)]
pub struct UserAccount {
    pub id: String,
    pub user_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_confirmed: bool,
    pub is_active: bool,
    pub roles: BTreeSet<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl UserAccount {
    /// Build a new account, hashing the password
    pub fn new(user: NewUser) -> IdentityResult<Self> {
        if user.email.trim().is_empty() || user.password.is_empty() {
            return Err(IdentityError::MissingCredentials);
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_name: user.user_name,
            email: user.email.trim().to_string(),
            password_hash: hash_password(&user.password)?,
            email_confirmed: user.email_confirmed,
            is_active: true,
            roles: BTreeSet::new(),
            created_at: chrono::Utc::now(),
        })
    }

    pub fn verify_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash).unwrap_or(false)
    }

    /// Case-insensitive role membership
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Input for creating a user account
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub user_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub email_confirmed: bool,
}

/// Named role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Role {
    pub fn new(name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            created_at: chrono::Utc::now(),
        }
    }
}

/// Account lookup and creation
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> IdentityResult<Option<UserAccount>>;

    async fn find_by_id(&self, id: &str) -> IdentityResult<Option<UserAccount>>;

    /// Fails with [`IdentityError::DuplicateEmail`] if the email is taken
    async fn create(&self, user: NewUser) -> IdentityResult<UserAccount>;

    /// Fails with [`IdentityError::RoleNotFound`] for unknown roles; adding
    /// an existing membership is a no-op
    async fn add_to_role(&self, user_id: &str, role: &str) -> IdentityResult<()>;

    async fn is_in_role(&self, user_id: &str, role: &str) -> IdentityResult<bool>;

    async fn count(&self) -> IdentityResult<usize>;
}

/// Role lookup and creation
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn role_exists(&self, name: &str) -> IdentityResult<bool>;

    /// Fails with [`IdentityError::DuplicateRole`] if the role exists
    async fn create_role(&self, name: &str) -> IdentityResult<Role>;

    async fn roles(&self) -> IdentityResult<Vec<Role>>;
}

/// Lookup key for emails and role names
/// Lookup key for emails and role names. ASCII case folding, matching
/// [`UserAccount::has_role`] and menu role checks.
pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

/// Hash password using Argon2
fn hash_password(password: &str) -> IdentityResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| IdentityError::PasswordHash(e.to_string()))
}

/// Verify password against hash
fn verify_password(password: &str, hash: &str) -> IdentityResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| IdentityError::PasswordHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
