use serde::Serialize;
use thiserror::Error;

use crate::model::ids::UserId;

/// Display name used when the identity provider does not supply one.
pub const DEFAULT_USER_NAME: &str = "No name";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("token identifier cannot be empty")]
    EmptyToken,
}

/// Claims handed over by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub token_identifier: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(token_identifier: impl Into<String>) -> Self {
        Self {
            token_identifier: token_identifier.into(),
            name: None,
            email: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: UserId,
    name: String,
    #[serde(skip)]
    token_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

impl User {
    /// Creates a User. A blank name becomes [`DEFAULT_USER_NAME`].
    ///
    /// # Errors
    ///
    /// Returns `UserError::EmptyToken` if the token identifier is blank.
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        token_identifier: impl Into<String>,
        email: Option<String>,
    ) -> Result<Self, UserError> {
        let token_identifier = token_identifier.into();
        if token_identifier.trim().is_empty() {
            return Err(UserError::EmptyToken);
        }
        let name = name.into();
        let name = if name.trim().is_empty() {
            DEFAULT_USER_NAME.to_owned()
        } else {
            name.trim().to_owned()
        };
        Ok(Self {
            id,
            name,
            token_identifier,
            email: email.filter(|e| !e.trim().is_empty()),
        })
    }

    /// Builds a user from identity claims.
    ///
    /// # Errors
    ///
    /// Returns `UserError::EmptyToken` if the token identifier is blank.
    pub fn from_identity(id: UserId, identity: &Identity) -> Result<Self, UserError> {
        Self::new(
            id,
            identity.name.clone().unwrap_or_default(),
            identity.token_identifier.clone(),
            identity.email.clone(),
        )
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn token_identifier(&self) -> &str {
        &self.token_identifier
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Case-insensitive substring match on name or email.
    #[must_use]
    pub fn matches_search(&self, term_lower: &str) -> bool {
        self.name.to_lowercase().contains(term_lower)
            || self
                .email
                .as_deref()
                .is_some_and(|e| e.to_lowercase().contains(term_lower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_defaults() {
        let user = User::new(UserId::new(1), "  ", "tok", None).unwrap();
        assert_eq!(user.name(), DEFAULT_USER_NAME);
    }

    #[test]
    fn empty_token_rejected() {
        assert_eq!(
            User::new(UserId::new(1), "Ana", "", None).unwrap_err(),
            UserError::EmptyToken
        );
    }

    #[test]
    fn search_matches_name_or_email_case_insensitively() {
        let user = User::new(
            UserId::new(1),
            "Ana Lima",
            "tok",
            Some("Ana@Example.com".into()),
        )
        .unwrap();
        assert!(user.matches_search("lima"));
        assert!(user.matches_search("example"));
        assert!(!user.matches_search("bob"));
    }
}
