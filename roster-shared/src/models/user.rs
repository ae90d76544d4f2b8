/// User row model and database operations
///
/// A user is a chain of rows sharing one `user_id`. Exactly one row of the
/// chain is active at a time; older rows are retired versions and soft-deleted
/// users have no active row at all. The surrogate `id` orders the chain.
///
/// All operations take any SQLite executor, so they run equally against the
/// pool or inside a transaction (`&mut *tx`).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id         INTEGER PRIMARY KEY AUTOINCREMENT,
///     user_id    TEXT    NOT NULL,
///     full_name  TEXT    NOT NULL,
///     mob_num    TEXT    NOT NULL,
///     pan_num    TEXT    NOT NULL,
///     manager_id TEXT    NOT NULL REFERENCES managers(manager_id),
///     created_at TEXT    NOT NULL,
///     updated_at TEXT,
///     is_active  BOOLEAN NOT NULL DEFAULT 1
/// );
///
/// CREATE UNIQUE INDEX idx_users_one_active ON users(user_id) WHERE is_active = 1;
/// ```
///
/// # Example
///
/// ```no_run
/// use roster_shared::models::user::{User, UserFilter};
/// use sqlx::SqlitePool;
///
/// # async fn example(pool: SqlitePool) -> Result<(), sqlx::Error> {
/// let filter = UserFilter {
///     manager_id: Some("m-1".to_string()),
///     ..Default::default()
/// };
///
/// for user in User::search_active(&pool, &filter).await? {
///     println!("{} reports to {}", user.full_name, user.manager_id);
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor};

const USER_COLUMNS: &str =
    "id, user_id, full_name, mob_num, pan_num, manager_id, created_at, updated_at, is_active";

/// One version of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Surrogate row key, increasing with every inserted version
    pub id: i64,

    /// Stable logical identifier shared by every version
    pub user_id: String,

    /// Full name, trimmed
    pub full_name: String,

    /// Ten-digit mobile number without country or trunk prefix
    pub mob_num: String,

    /// Upper-case PAN
    pub pan_num: String,

    /// Manager this version reports to
    pub manager_id: String,

    /// When the user was first created; carried across versions
    pub created_at: DateTime<Utc>,

    /// When this row was last changed
    pub updated_at: Option<DateTime<Utc>>,

    /// Whether this row is the canonical version
    pub is_active: bool,
}

/// Input for inserting a new active version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertUser {
    pub user_id: String,
    pub full_name: String,
    pub mob_num: String,
    pub pan_num: String,
    pub manager_id: String,
    pub created_at: DateTime<Utc>,
}

impl InsertUser {
    /// Successor of `current` reporting to `manager_id`, keeping every other field
    pub fn successor(current: &User, manager_id: &str) -> Self {
        Self {
            user_id: current.user_id.clone(),
            full_name: current.full_name.clone(),
            mob_num: current.mob_num.clone(),
            pan_num: current.pan_num.clone(),
            manager_id: manager_id.to_string(),
            created_at: current.created_at,
        }
    }
}

/// Optional, AND-combined filters for active users
///
/// `mob_num` is compared verbatim; callers strip prefixes first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFilter {
    pub user_id: Option<String>,
    pub mob_num: Option<String>,
    pub manager_id: Option<String>,
}

impl User {
    /// Inserts a new active row
    ///
    /// `updated_at` is `None` for a first version and the transition time for
    /// a successor.
    ///
    /// # Errors
    ///
    /// Fails with a unique violation if `user_id` already has an active row.
    pub async fn insert<'e, E>(
        executor: E,
        data: &InsertUser,
        updated_at: Option<DateTime<Utc>>,
    ) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let query = format!(
            r#"
            INSERT INTO users (user_id, full_name, mob_num, pan_num, manager_id, created_at, updated_at, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(&data.user_id)
            .bind(&data.full_name)
            .bind(&data.mob_num)
            .bind(&data.pan_num)
            .bind(&data.manager_id)
            .bind(data.created_at)
            .bind(updated_at)
            .fetch_one(executor)
            .await
    }

    /// Finds the active row for `user_id`
    pub async fn find_active<'e, E>(executor: E, user_id: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ? AND is_active = 1");

        sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Lists every row, active or not, in insertion order
    pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");

        sqlx::query_as::<_, User>(&query).fetch_all(executor).await
    }

    /// Lists every version of `user_id`, oldest first
    pub async fn history<'e, E>(executor: E, user_id: &str) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ? ORDER BY id");

        sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    /// Lists active rows matching every filter that is set
    pub async fn search_active<'e, E>(executor: E, filter: &UserFilter) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE is_active = 1"));

        if let Some(user_id) = &filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(mob_num) = &filter.mob_num {
            builder.push(" AND mob_num = ").push_bind(mob_num.clone());
        }
        if let Some(manager_id) = &filter.manager_id {
            builder.push(" AND manager_id = ").push_bind(manager_id.clone());
        }
        builder.push(" ORDER BY id");

        builder.build_query_as::<User>().fetch_all(executor).await
    }

    /// Marks row `id` inactive if it is still the active version
    ///
    /// Returns the number of rows changed: 0 means another writer retired it.
    pub async fn retire<'e, E>(executor: E, id: i64, now: DateTime<Utc>) -> Result<u64, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_active = 0, updated_at = ?
            WHERE id = ? AND is_active = 1
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Overwrites name, mobile, and PAN of active row `id`; manager untouched
    pub async fn update_fields<'e, E>(
        executor: E,
        id: i64,
        full_name: &str,
        mob_num: &str,
        pan_num: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET full_name = ?, mob_num = ?, pan_num = ?, updated_at = ?
            WHERE id = ? AND is_active = 1
            "#,
        )
        .bind(full_name)
        .bind(mob_num)
        .bind(pan_num)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Soft-deletes the active row for `user_id`
    pub async fn deactivate_by_user_id<'e, E>(
        executor: E,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_active = 0, updated_at = ?
            WHERE user_id = ? AND is_active = 1
            "#,
        )
        .bind(now)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Soft-deletes every active row with mobile number `mob_num`
    pub async fn deactivate_by_mobile<'e, E>(
        executor: E,
        mob_num: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_active = 0, updated_at = ?
            WHERE mob_num = ? AND is_active = 1
            "#,
        )
        .bind(now)
        .bind(mob_num)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
