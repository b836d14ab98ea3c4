//! Identity seeding
//!
//! Ensures the configured roles and accounts exist. Runs on every start, so
//! every action is create-if-missing.

use super::{IdentityResult, NewUser, RoleDirectory, UserDirectory};
use asc_core::ApplicationSettings;
use serde::Serialize;
use tracing::{debug, info};

/// What a seed run changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedOutcome {
    pub roles_created: Vec<String>,
    pub users_created: Vec<String>,
    /// `(email, role)` memberships that were added
    pub memberships_added: Vec<(String, String)>,
}

impl SeedOutcome {
    pub fn is_noop(&self) -> bool {
        self.roles_created.is_empty()
            && self.users_created.is_empty()
            && self.memberships_added.is_empty()
    }
}

/// Seeds roles and default accounts from [`ApplicationSettings`]
#[derive(Debug, Clone, Default)]
pub struct IdentitySeed;

impl IdentitySeed {
    pub fn new() -> Self {
        Self
    }

    pub async fn seed(
        &self,
        users: &dyn UserDirectory,
        roles: &dyn RoleDirectory,
        settings: &ApplicationSettings,
    ) -> IdentityResult<SeedOutcome> {
        let mut outcome = SeedOutcome::default();

        for role in settings.role_names() {
            if roles.role_exists(&role).await? {
                debug!("Role already exists: {}", role);
                continue;
            }
            roles.create_role(&role).await?;
            outcome.roles_created.push(role);
        }

        self.ensure_account(
            users,
            &settings.admin_name,
            &settings.admin_email,
            &settings.admin_password,
            &settings.admin_role,
            &mut outcome,
        )
        .await?;

        if let Some((name, email, password)) = settings.engineer_account() {
            self.ensure_account(
                users,
                name,
                email,
                password,
                &settings.engineer_role,
                &mut outcome,
            )
            .await?;
        }

        info!(
            roles_created = outcome.roles_created.len(),
            users_created = outcome.users_created.len(),
            memberships_added = outcome.memberships_added.len(),
            "Identity seed finished"
        );
        Ok(outcome)
    }

    async fn ensure_account(
        &self,
        users: &dyn UserDirectory,
        name: &str,
        email: &str,
        password: &str,
        role: &str,
        outcome: &mut SeedOutcome,
    ) -> IdentityResult<()> {
        let account = match users.find_by_email(email).await? {
            Some(existing) => {
                debug!("Account already exists: {}", email);
                existing
            }
            None => {
                let created = users
                    .create(NewUser {
                        user_name: name.to_string(),
                        email: email.to_string(),
                        password: password.to_string(),
                        email_confirmed: true,
                    })
                    .await?;
                outcome.users_created.push(created.email.clone());
                created
            }
        };

        if !users.is_in_role(&account.id, role).await? {
            users.add_to_role(&account.id, role).await?;
            outcome
                .memberships_added
                .push((account.email.clone(), role.to_string()));
        }

        Ok(())
    }
}
