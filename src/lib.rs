pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod sync;

use crate::app::auth::AuthService;
use crate::infra::store::{SharedAccountStore, SharedContentStore};

#[derive(Clone)]
pub struct AppState {
    pub content: SharedContentStore,
    pub accounts: SharedAccountStore,
    pub paseto_access_key: [u8; 32],
    pub paseto_refresh_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
}

impl AppState {
    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.accounts.clone(),
            self.paseto_access_key,
            self.paseto_refresh_key,
            self.access_ttl_minutes,
            self.refresh_ttl_days,
        )
    }
}
