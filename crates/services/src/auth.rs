use challenge_core::model::User;
use storage::repository::UserRepository;

use crate::error::AuthError;

/// Resolves the calling user from the identity token.
///
/// # Errors
///
/// Returns `AuthError::NotAuthenticated` when no token is supplied,
/// `AuthError::UserNotFound` when no user carries it.
pub async fn current_user(
    users: &dyn UserRepository,
    token: Option<&str>,
) -> Result<User, AuthError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::NotAuthenticated)?;
    users
        .find_user_by_token(token)
        .await?
        .ok_or(AuthError::UserNotFound)
}
