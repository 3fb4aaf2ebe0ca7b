//! Application state management
//!
//! Contains shared state accessible across all handlers. Everything here is
//! built once at startup; the stores carry their own locks.

use crate::auth::TokenCodec;
use crate::config::{AuthConfig, ServiceMode, Settings};
use crate::customers::CustomerStore;
use crate::error::AppError;
use crate::gateway::UpstreamClient;
use crate::sales::SaleStore;
use crate::users::UserStore;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    pub mode: ServiceMode,

    /// Cookie and hashing parameters
    pub auth: AuthConfig,

    /// Signs and verifies tokens with the configured secret
    pub codec: Arc<TokenCodec>,

    pub users: UserStore,
    pub customers: CustomerStore,
    pub sales: SaleStore,

    /// Backend services, used in gateway mode
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(settings: &Settings) -> Result<Self, AppError> {
        let codec = TokenCodec::new(&settings.auth.jwt_secret, settings.auth.token_ttl);

        Ok(Self {
            mode: settings.mode,
            auth: settings.auth.clone(),
            codec: Arc::new(codec),
            users: UserStore::new(settings.auth.bcrypt_cost)?,
            customers: CustomerStore::new(),
            sales: SaleStore::new(),
            upstream: UpstreamClient::new(settings.upstream.clone())?,
        })
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
