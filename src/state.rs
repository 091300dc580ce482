//! Shared application state handed to every handler.

use crate::{
    config::AppConfig,
    services::{
        auth_service::AuthService, deposit_service::DepositService,
        storage_service::StorageService,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub storage: StorageService,
    pub deposits: DepositService,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, cfg: &AppConfig) -> Self {
        let storage = StorageService::new(db.clone(), cfg.storage_dir.clone());
        let deposits = DepositService::new(db.clone(), storage.clone());
        let auth = AuthService::new(db.clone(), cfg.session_ttl);
        Self {
            db,
            storage,
            deposits,
            auth,
        }
    }
}
