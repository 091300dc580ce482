//! Fixtures shared by the unit tests.

use crate::{
    config::AppConfig,
    models::{deposit::Deposit, user::SCOPE_DEPOSIT_WRITE},
    state::AppState,
};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// Single-connection in-memory database with migrations applied.
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(":memory:")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

pub struct Fixture {
    pub state: AppState,
    pub owner: Uuid,
    pub owner_email: String,
    pub other_email: String,
    pub deposit: Deposit,
    _dir: TempDir,
}

pub const PASSWORD: &str = "tester";

impl Fixture {
    /// Two users and an empty draft deposit owned by the first one.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            storage_dir: dir.path().display().to_string(),
            ..AppConfig::default()
        };
        let state = AppState::new(Arc::new(memory_pool().await), &config);

        let owner = state
            .auth
            .create_user("owner@example.org", PASSWORD)
            .await
            .unwrap();
        state
            .auth
            .create_user("other@example.org", PASSWORD)
            .await
            .unwrap();
        let deposit = state.deposits.create(owner.id).await.unwrap();

        Self {
            state,
            owner: owner.id,
            owner_email: owner.email,
            other_email: "other@example.org".into(),
            deposit,
            _dir: dir,
        }
    }

    /// Session cookie value for `email`.
    pub async fn session(&self, email: &str) -> String {
        self.state.auth.login(email, PASSWORD).await.unwrap().1
    }

    pub async fn write_token(&self) -> String {
        self.state
            .auth
            .issue_token(self.owner, &[SCOPE_DEPOSIT_WRITE])
            .await
            .unwrap()
    }

    /// Attach `content` under `key` and commit, as a fixture would.
    pub async fn attach(&self, key: &str, content: &'static [u8]) {
        let mut deposit = self.state.deposits.resolve(&self.deposit.pid).await.unwrap();
        let chunks = futures::stream::iter(vec![Ok::<_, std::io::Error>(
            bytes::Bytes::from_static(content),
        )]);
        let instance = self
            .state
            .storage
            .store_stream(deposit.bucket_id, chunks)
            .await
            .unwrap();
        deposit
            .files
            .add(crate::models::file_entry::FileEntry::new(key, instance))
            .unwrap();
        self.state.deposits.commit(&mut deposit).await.unwrap();
    }

    pub async fn reload(&self) -> Deposit {
        self.state.deposits.resolve(&self.deposit.pid).await.unwrap()
    }
}
