//! In-memory identity store (development and tests)

use super::{
    normalize, IdentityError, IdentityResult, NewUser, Role, RoleDirectory, UserAccount,
    UserDirectory,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Directory {
    /// user id -> account
    users: HashMap<String, UserAccount>,
    /// normalized email -> user id
    users_by_email: HashMap<String, String>,
    /// normalized name -> role
    roles: HashMap<String, Role>,
}

/// User and role directory held in process memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    inner: Arc<RwLock<Directory>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> IdentityResult<RwLockReadGuard<'_, Directory>> {
        self.inner
            .read()
            .map_err(|_| IdentityError::Storage("identity store lock poisoned".to_string()))
    }

    fn write(&self) -> IdentityResult<RwLockWriteGuard<'_, Directory>> {
        self.inner
            .write()
            .map_err(|_| IdentityError::Storage("identity store lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserDirectory for MemoryIdentityStore {
    async fn find_by_email(&self, email: &str) -> IdentityResult<Option<UserAccount>> {
        let dir = self.read()?;
        Ok(dir
            .users_by_email
            .get(&normalize(email))
            .and_then(|id| dir.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> IdentityResult<Option<UserAccount>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn create(&self, user: NewUser) -> IdentityResult<UserAccount> {
        let key = normalize(&user.email);
        if self.read()?.users_by_email.contains_key(&key) {
            return Err(IdentityError::DuplicateEmail(user.email));
        }

        // Hash outside the lock
        let account = UserAccount::new(user)?;

        let mut dir = self.write()?;
        if dir.users_by_email.contains_key(&key) {
            return Err(IdentityError::DuplicateEmail(account.email));
        }
        dir.users_by_email.insert(key, account.id.clone());
        dir.users.insert(account.id.clone(), account.clone());

        info!("Created user: {}", account.email);
        Ok(account)
    }

    async fn add_to_role(&self, user_id: &str, role: &str) -> IdentityResult<()> {
        let mut dir = self.write()?;
        let role_name = dir
            .roles
            .get(&normalize(role))
            .map(|r| r.name.clone())
            .ok_or_else(|| IdentityError::RoleNotFound(role.to_string()))?;

        let user = dir
            .users
            .get_mut(user_id)
            .ok_or_else(|| IdentityError::UserNotFound(user_id.to_string()))?;

        if user.has_role(&role_name) {
            debug!("User {} already in role {}", user.email, role_name);
            return Ok(());
        }

        user.roles.insert(role_name);
        Ok(())
    }

    async fn is_in_role(&self, user_id: &str, role: &str) -> IdentityResult<bool> {
        let dir = self.read()?;
        let user = dir
            .users
            .get(user_id)
            .ok_or_else(|| IdentityError::UserNotFound(user_id.to_string()))?;
        Ok(user.has_role(role))
    }

    async fn count(&self) -> IdentityResult<usize> {
        Ok(self.read()?.users.len())
    }
}

#[async_trait]
impl RoleDirectory for MemoryIdentityStore {
    async fn role_exists(&self, name: &str) -> IdentityResult<bool> {
        Ok(self.read()?.roles.contains_key(&normalize(name)))
    }

    async fn create_role(&self, name: &str) -> IdentityResult<Role> {
        let key = normalize(name);
        if key.is_empty() {
            return Err(IdentityError::InvalidRoleName(name.to_string()));
        }

        let mut dir = self.write()?;
        if dir.roles.contains_key(&key) {
            return Err(IdentityError::DuplicateRole(name.to_string()));
        }

        let role = Role::new(name);
        dir.roles.insert(key, role.clone());
        info!("Created role: {}", role.name);
        Ok(role)
    }

    async fn roles(&self) -> IdentityResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.read()?.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }
}
