/// Manager reference model
///
/// Managers are owned by another system. This service only asks whether a
/// manager exists and is active when a user row referencing it is written.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE managers (
///     manager_id TEXT PRIMARY KEY NOT NULL,
///     full_name  TEXT,
///     is_active  BOOLEAN NOT NULL DEFAULT 1,
///     created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;

/// A row of the `managers` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Manager {
    /// Manager identifier
    pub manager_id: String,

    /// Display name, if the owning system recorded one
    pub full_name: Option<String>,

    /// Whether new users may be assigned to this manager
    pub is_active: bool,
}

impl Manager {
    /// Finds an active manager by ID
    ///
    /// Returns `None` both for unknown IDs and for inactive managers.
    pub async fn find_active<'e, E>(executor: E, manager_id: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Manager>(
            r#"
            SELECT manager_id, full_name, is_active
            FROM managers
            WHERE manager_id = ? AND is_active = 1
            "#,
        )
        .bind(manager_id)
        .fetch_optional(executor)
        .await
    }
}
