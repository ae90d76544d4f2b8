/// Common test utilities for record transition tests
///
/// Each context owns a private database (in memory, or a temp file for
/// concurrency tests) with migrations applied and
/// three managers seeded: `m-1` and `m-2` active, `m-off` inactive.

use roster_shared::db::migrations::run_migrations;
use roster_shared::db::pool::{create_pool, DatabaseConfig};
use roster_shared::models::user::User;
use roster_shared::transition::{create_user, NewUser};
use sqlx::SqlitePool;
use std::path::PathBuf;
use uuid::Uuid;

pub struct TestContext {
    pub db: SqlitePool,

    /// Backing file for contexts built with `file_backed`
    path: Option<PathBuf>,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let db = create_pool(DatabaseConfig::in_memory()).await?;
        Self::prepare(db, None).await
    }

    /// Context over a temporary database file with several pooled
    /// connections, so transactions really run side by side
    pub async fn file_backed(max_connections: u32) -> anyhow::Result<Self> {
        let path = std::env::temp_dir().join(format!("roster-tx-{}.db", Uuid::new_v4()));
        let db = create_pool(DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections,
            ..Default::default()
        })
        .await?;
        Self::prepare(db, Some(path)).await
    }

    async fn prepare(db: SqlitePool, path: Option<PathBuf>) -> anyhow::Result<Self> {
        run_migrations(&db).await?;

        for (manager_id, active) in [("m-1", true), ("m-2", true), ("m-off", false)] {
            insert_manager(&db, manager_id, active).await?;
        }

        Ok(Self { db, path })
    }

    /// Creates an active user reporting to `manager_id`
    pub async fn create_user(&self, full_name: &str, mob_num: &str, manager_id: &str) -> User {
        create_user(
            &self.db,
            NewUser {
                full_name: Some(full_name.to_string()),
                mob_num: Some(mob_num.to_string()),
                pan_num: Some("abcde1234f".to_string()),
                manager_id: Some(manager_id.to_string()),
            },
        )
        .await
        .expect("seed user should be valid")
    }

    /// Total number of rows in `users`
    pub async fn row_count(&self) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await
            .unwrap();
        count
    }

    /// Active rows for `user_id`
    pub async fn active_rows(&self, user_id: &str) -> Vec<User> {
        User::history(&self.db, user_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|row| row.is_active)
            .collect()
    }

    pub async fn set_manager_active(&self, manager_id: &str, active: bool) {
        sqlx::query("UPDATE managers SET is_active = ? WHERE manager_id = ?")
            .bind(active)
            .bind(manager_id)
            .execute(&self.db)
            .await
            .unwrap();
    }
}

pub async fn insert_manager(db: &SqlitePool, manager_id: &str, active: bool) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO managers (manager_id, full_name, is_active) VALUES (?, ?, ?)")
        .bind(manager_id)
        .bind(format!("Manager {manager_id}"))
        .bind(active)
        .execute(db)
        .await?;
    Ok(())
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            for suffix in ["", "-wal", "-shm"] {
                let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
            }
        }
    }
}
