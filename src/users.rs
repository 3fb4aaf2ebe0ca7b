//! User management module
//!
//! Handles user storage and credential checks for signup and login.

use crate::auth::{hash_password, verify_password, Role};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// User model
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    /// Unique sign-in key: the username or the email, depending on deployment
    pub login: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to register a user
#[derive(Debug)]
pub struct NewUser {
    pub login: String,
    pub name: Option<String>,
    pub password: String,
    pub role: Role,
}

/// In-memory user store keyed by login
pub struct UserStore {
    users: RwLock<HashMap<String, User>>,
    bcrypt_cost: u32,
    /// Verified against when the login is unknown; same cost as real hashes
    dummy_hash: String,
}

impl UserStore {
    pub fn new(bcrypt_cost: u32) -> Result<Self, AppError> {
        let dummy_hash = hash_password(&Uuid::new_v4().to_string(), bcrypt_cost)?;

        Ok(Self {
            users: RwLock::new(HashMap::new()),
            bcrypt_cost,
            dummy_hash,
        })
    }

    /// Register a user, hashing the password. `None` when the login is taken.
    pub async fn register(&self, new_user: NewUser) -> Result<Option<User>, AppError> {
        if self.users.read().await.contains_key(&new_user.login) {
            return Ok(None);
        }

        // Hash outside the write lock.
        let password_hash = hash_password(&new_user.password, self.bcrypt_cost)?;

        let mut users = self.users.write().await;
        if users.contains_key(&new_user.login) {
            return Ok(None);
        }

        let user = User {
            id: Uuid::new_v4(),
            login: new_user.login,
            name: new_user.name,
            password_hash,
            role: new_user.role,
            created_at: Utc::now(),
        };
        users.insert(user.login.clone(), user.clone());

        Ok(Some(user))
    }

    /// Return the user only if `password` matches.
    ///
    /// Unknown login and wrong password are indistinguishable to the caller,
    /// in response and in bcrypt work.
    pub async fn check_credentials(&self, login: &str, password: &str) -> Option<User> {
        let user = self.users.read().await.get(login).cloned();
        match user {
            Some(user) => verify_password(password, &user.password_hash).then_some(user),
            None => {
                verify_password(password, &self.dummy_hash);
                None
            }
        }
    }
}
