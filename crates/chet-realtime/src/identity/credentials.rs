//! Shared-secret role elevation.

use chet_core::config::SecretsConfig;
use chet_core::error::AppError;

use super::role::Role;

/// Grants roles by comparing supplied secrets to the configured ones.
#[derive(Clone)]
pub struct SecretAuthenticator {
    secrets: SecretsConfig,
}

impl std::fmt::Debug for SecretAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretAuthenticator").finish()
    }
}

impl SecretAuthenticator {
    /// Creates a new authenticator.
    pub fn new(secrets: SecretsConfig) -> Self {
        Self { secrets }
    }

    /// Highest role whose secret appears in `supplied`; `Role::None` if none.
    pub fn authenticate(&self, supplied: &[String]) -> Role {
        [
            (Role::Owner, &self.secrets.owner),
            (Role::Admin, &self.secrets.admin),
            (Role::Vip, &self.secrets.vip),
        ]
        .into_iter()
        .find(|(_, secret)| {
            secret
                .as_deref()
                .is_some_and(|secret| !secret.is_empty() && supplied.iter().any(|s| s == secret))
        })
        .map(|(role, _)| role)
        .unwrap_or_default()
    }

    /// Role after presenting `secret` while holding `current`.
    ///
    /// A matching secret never lowers the current role.
    pub fn elevate(&self, current: Role, secret: &str) -> Result<Role, AppError> {
        match self.authenticate(&[secret.to_string()]) {
            Role::None => Err(AppError::authentication("Invalid secret")),
            granted => Ok(granted.max(current)),
        }
    }
}
