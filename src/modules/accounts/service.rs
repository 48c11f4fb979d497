//! Registration, login and administrator provisioning.

use anyhow::{anyhow, Context};
use argon2::password_hash::PasswordHash;
use serde::Deserialize;
use shelf_authz::Identity;
use shelf_db::{CredentialStore, NewAdmin, NewUser, StoreError, UserRecord};
use shelf_kernel::settings::AdminSeed;
use utoipa::ToSchema;

use super::password::{hash_password, verify_password};
use crate::error::{AuthError, ServiceError};

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 6..=128;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Account operations over a [`CredentialStore`].
pub struct AccountService<'a> {
    credentials: &'a dyn CredentialStore,
}

impl<'a> AccountService<'a> {
    pub const fn new(credentials: &'a dyn CredentialStore) -> Self {
        Self { credentials }
    }

    /// Create a user account.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed username, password or email, and
    /// `AuthError::AlreadyExists` when the username or email is taken.
    pub async fn register(&self, registration: Registration) -> Result<UserRecord, ServiceError> {
        validate_username(&registration.username)?;
        validate_password(&registration.password)?;
        validate_email(&registration.email)?;

        let taken = self.credentials.get_user(&registration.username).await?.is_some()
            || self.credentials.get_admin(&registration.username).await?.is_some()
            || self
                .credentials
                .get_user_by_email(&registration.email)
                .await?
                .is_some();
        if taken {
            return Err(AuthError::AlreadyExists.into());
        }

        let password_hash = hash_password(&registration.password)?;

        let user = self
            .credentials
            .add_user(NewUser {
                username: registration.username,
                email: registration.email,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate { .. } => ServiceError::from(AuthError::AlreadyExists),
                other => other.into(),
            })?;

        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Resolve credentials to an identity. Users are looked up before admins.
    ///
    /// # Errors
    ///
    /// `AuthError::NotFound` when no account has the name and
    /// `AuthError::InvalidCredential` when the password does not match.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Identity, ServiceError> {
        if let Some(user) = self.credentials.get_user(username).await? {
            if !verify_password(password, &user.password_hash) {
                return Err(AuthError::InvalidCredential.into());
            }
            return Ok(Identity::user(user.id, user.username));
        }

        if let Some(admin) = self.credentials.get_admin(username).await? {
            if !verify_password(password, &admin.password_hash) {
                return Err(AuthError::InvalidCredential.into());
            }
            return Ok(Identity::admin(admin.id, admin.username));
        }

        Err(AuthError::NotFound.into())
    }

    /// Provision configured administrators. Names that already exist are
    /// left alone, so restarts are harmless.
    pub async fn seed_admins(&self, seeds: &[AdminSeed]) -> anyhow::Result<usize> {
        let mut created = 0;

        for seed in seeds {
            validate_username(&seed.username)
                .map_err(|e| anyhow!("invalid admin seed '{}': {e}", seed.username))?;
            PasswordHash::new(&seed.password_hash).map_err(|e| {
                anyhow!(
                    "admin seed '{}' has an invalid password hash: {e}",
                    seed.username
                )
            })?;

            match self
                .credentials
                .add_admin(NewAdmin {
                    username: seed.username.clone(),
                    password_hash: seed.password_hash.clone(),
                })
                .await
            {
                Ok(admin) => {
                    tracing::info!(admin_id = %admin.id, username = %admin.username, "admin provisioned");
                    created += 1;
                }
                Err(StoreError::Duplicate { .. }) => {
                    tracing::warn!(username = %seed.username, "admin seed skipped; name already taken");
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to seed admin '{}'", seed.username));
                }
            }
        }

        Ok(created)
    }
}

fn validate_username(username: &str) -> Result<(), ServiceError> {
    let len = username.chars().count();
    if !USERNAME_LEN.contains(&len) {
        return Err(ServiceError::validation(
            "username",
            format!(
                "must be between {} and {} characters",
                USERNAME_LEN.start(),
                USERNAME_LEN.end()
            ),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ServiceError::validation(
            "username",
            "may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ServiceError> {
    let len = password.chars().count();
    if !PASSWORD_LEN.contains(&len) {
        return Err(ServiceError::validation(
            "password",
            format!(
                "must be between {} and {} characters",
                PASSWORD_LEN.start(),
                PASSWORD_LEN.end()
            ),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ServiceError> {
    let invalid = || ServiceError::validation("email", "must look like name@example.com");

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let well_formed_domain = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");
    if !well_formed_domain {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_db::MemoryCredentialStore;

    fn alice() -> Registration {
        Registration {
            username: "alice".into(),
            password: "s3cretpw".into(),
            email: "alice@example.com".into(),
        }
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let store = MemoryCredentialStore::new();
        let accounts = AccountService::new(&store);

        let user = accounts.register(alice()).await.unwrap();
        assert_ne!(user.password_hash, "s3cretpw");

        let identity = accounts.authenticate("alice", "s3cretpw").await.unwrap();
        assert_eq!(identity.user_id(), Some(user.id));
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let store = MemoryCredentialStore::new();
        let accounts = AccountService::new(&store);
        accounts.register(alice()).await.unwrap();

        let same_name = accounts.register(alice()).await.unwrap_err();
        assert!(matches!(same_name, ServiceError::Auth(AuthError::AlreadyExists)));

        let same_email = accounts
            .register(Registration {
                username: "alice2".into(),
                ..alice()
            })
            .await
            .unwrap_err();
        assert!(matches!(same_email, ServiceError::Auth(AuthError::AlreadyExists)));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_distinct() {
        let store = MemoryCredentialStore::new();
        let accounts = AccountService::new(&store);
        accounts.register(alice()).await.unwrap();

        let wrong = accounts.authenticate("alice", "nope-nope").await.unwrap_err();
        assert!(matches!(wrong, ServiceError::Auth(AuthError::InvalidCredential)));

        let unknown = accounts.authenticate("bob", "whatever").await.unwrap_err();
        assert!(matches!(unknown, ServiceError::Auth(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn seeded_admin_authenticates_as_admin() {
        let store = MemoryCredentialStore::new();
        let accounts = AccountService::new(&store);
        let seed = AdminSeed {
            username: "root".into(),
            password_hash: hash_password("rootpass").unwrap(),
        };

        assert_eq!(accounts.seed_admins(&[seed.clone()]).await.unwrap(), 1);
        // Second run is a no-op.
        assert_eq!(accounts.seed_admins(&[seed]).await.unwrap(), 0);

        let identity = accounts.authenticate("root", "rootpass").await.unwrap();
        assert!(identity.admin_id().is_some());

        // Admin names are reserved for users too.
        let clash = accounts
            .register(Registration {
                username: "root".into(),
                email: "root@example.com".into(),
                password: "whatever".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(clash, ServiceError::Auth(AuthError::AlreadyExists)));
    }

    #[tokio::test]
    async fn seed_with_plaintext_password_is_refused() {
        let store = MemoryCredentialStore::new();
        let accounts = AccountService::new(&store);
        let seed = AdminSeed {
            username: "root".into(),
            password_hash: "rootpass".into(),
        };
        assert!(accounts.seed_admins(&[seed]).await.is_err());
    }

    #[test]
    fn validation_rules() {
        assert!(validate_username("al").is_err());
        assert!(validate_username("alice smith").is_err());
        assert!(validate_username("alice_smith.99").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice@@example.com").is_err());
        assert!(validate_email("alice @example.com").is_err());
    }
}
