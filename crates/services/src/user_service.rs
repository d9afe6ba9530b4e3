use std::sync::Arc;

use challenge_core::model::{DEFAULT_USER_NAME, Identity, User, UserId};
use storage::repository::{NewUserRecord, UserRepository};

use crate::auth::current_user;
use crate::error::UserServiceError;

/// Identity-provider sign-in and profile lookups.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Insert the user on first sight of the token, otherwise sync name and
    /// email from the identity claims.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::User` for a blank token.
    /// Returns `UserServiceError::Storage` if persistence fails.
    pub async fn store(&self, identity: &Identity) -> Result<UserId, UserServiceError> {
        // Validate before touching storage.
        User::from_identity(UserId::new(0), identity)?;

        let Some(existing) = self
            .users
            .find_user_by_token(&identity.token_identifier)
            .await?
        else {
            let id = self
                .users
                .insert_user(NewUserRecord::from_identity(identity))
                .await?;
            tracing::info!(user = %id, "registered user");
            return Ok(id);
        };

        let name = identity.name.as_deref().unwrap_or(DEFAULT_USER_NAME);
        let email = identity.email.as_deref();
        if existing.name() != name || existing.email() != email {
            self.users
                .update_user_profile(existing.id(), name, email)
                .await?;
        }
        Ok(existing.id())
    }

    /// The caller's profile.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Auth` when the token does not resolve.
    pub async fn current_user_info(&self, token: Option<&str>) -> Result<User, UserServiceError> {
        Ok(current_user(self.users.as_ref(), token).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use storage::repository::InMemoryRepository;

    fn service() -> UserService {
        UserService::new(Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn store_is_idempotent_per_token() {
        let service = service();
        let identity = Identity::new("tok").with_name("Ana");
        let first = service.store(&identity).await.unwrap();
        let second = service.store(&identity).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn store_patches_changed_profile() {
        let service = service();
        service
            .store(&Identity::new("tok").with_name("Ana"))
            .await
            .unwrap();
        service
            .store(
                &Identity::new("tok")
                    .with_name("Ana Maria")
                    .with_email("ana@example.com"),
            )
            .await
            .unwrap();

        let me = service.current_user_info(Some("tok")).await.unwrap();
        assert_eq!(me.name(), "Ana Maria");
        assert_eq!(me.email(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn nameless_identity_gets_default_name() {
        let service = service();
        service.store(&Identity::new("tok")).await.unwrap();
        let me = service.current_user_info(Some("tok")).await.unwrap();
        assert_eq!(me.name(), "No name");
    }

    #[tokio::test]
    async fn info_requires_authentication() {
        let err = service().current_user_info(None).await.unwrap_err();
        assert!(matches!(
            err,
            UserServiceError::Auth(AuthError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn blank_token_is_rejected() {
        let err = service().store(&Identity::new(" ")).await.unwrap_err();
        assert!(matches!(err, UserServiceError::User(_)));
    }
}
