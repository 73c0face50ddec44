//! Authenticated session context
//!
//! The bearer token is fixed at construction and handed to the HTTP client
//! whole. There is no mutable global header state: a different token means
//! building a different client.

use serde::{Deserialize, Serialize};

/// Account details returned by login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
}

/// Result of a successful login
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    /// Bearer token for subsequent requests
    pub token: String,
    pub user: UserProfile,
}

impl AuthSession {
    /// Build the context used to construct an authenticated client
    pub fn context(&self) -> SessionContext {
        SessionContext::new(self.token.clone())
    }
}

/// Immutable auth material for one API client
#[derive(Debug, Clone)]
pub struct SessionContext {
    token: String,
}

impl SessionContext {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    /// Raw bearer token
    pub fn token(&self) -> &str {
        &self.token
    }
}
