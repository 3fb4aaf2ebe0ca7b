//! Authentication and authorization module
//!
//! Provides JWT-based authentication and role-based access control.

mod cookie;
mod error;
mod guard;
mod jwt;
mod password;

pub use cookie::session_cookie;
pub use error::AuthError;
pub use guard::{require_auth, Authenticator, CredentialSource, CurrentUser, RoleSet, RouteGuard};
pub use jwt::{Claims, TokenCodec, VerifyError};
pub use password::{hash_password, verify_password};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission tiers carried in every token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Elevated tier of the gateway deployment
    Boss,
    /// Elevated tier of the consolidated server
    Admin,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Boss => "boss",
            Role::Admin => "admin",
            Role::Employee => "employee",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Employee
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verified caller of the current request.
///
/// Only [`Authenticator`] can produce one, so anything holding an `Identity`
/// has passed signature and expiry checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    subject: String,
    role: Role,
}

impl Identity {
    fn from_claims(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            role: claims.role,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn role(&self) -> Role {
        self.role
    }
}
