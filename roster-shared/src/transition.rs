/// Record transition engine
///
/// Decides how a user record moves between versions and executes the move
/// atomically. Three operations are exposed:
///
/// - `create_user`: validate, then insert the first active version
/// - `delete_user`: soft-delete the active version
/// - `update_users`: in-place update, retire-and-recreate, or bulk manager
///   reassignment, depending on the request shape
///
/// # Version chain
///
/// ```text
/// create ──► v1 (active)
///   │ name/mobile/PAN change ──► v1 mutated in place
///   │ manager change        ──► v1 retired, v2 inserted (same user_id, same created_at)
///   │ delete                ──► active version retired, nothing inserted
/// ```
///
/// # Transactions
///
/// Every write path runs inside a `TxScope`: the transaction begins before the
/// first read, and the scope's `finish` commits on success or rolls back on
/// failure. Dropping the scope without finishing (a panic) also rolls back.
///
/// # Example
///
/// ```no_run
/// use roster_shared::transition::{update_users, ChangeSet};
/// use sqlx::SqlitePool;
///
/// # async fn example(pool: SqlitePool) -> Result<(), roster_shared::error::RecordError> {
/// let changes = ChangeSet {
///     manager_id: Some(Some("m-2".to_string())),
///     ..Default::default()
/// };
///
/// let outcome = update_users(&pool, vec!["u-1".into(), "u-2".into()], changes).await?;
/// println!("{}", outcome.message());
/// # Ok(())
/// # }
/// ```

use crate::error::{RecordError, RecordResult};
use crate::models::user::{InsertUser, User};
use crate::validation::{
    normalize_mobile, normalize_tax_id, require_active_manager, require_non_empty_name,
    strip_mobile_prefix,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fields for a new user, as received
///
/// Values are raw; `create_user` normalizes them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub full_name: Option<String>,
    pub mob_num: Option<String>,
    pub pan_num: Option<String>,
    pub manager_id: Option<String>,
}

/// Requested field changes
///
/// The outer `Option` records whether the key was present; the inner one is
/// `None` when the key was present with a non-text value, which then fails
/// that field's validation.
///
/// Keys outside the four editable fields are kept in `unknown_fields` so
/// they still count toward the request shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub full_name: Option<Option<String>>,
    pub mob_num: Option<Option<String>>,
    pub pan_num: Option<Option<String>>,
    pub manager_id: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_fields: Vec<String>,
}

impl ChangeSet {
    /// Builds a change set from a JSON object
    pub fn from_json(map: &Map<String, Value>) -> Self {
        let mut changes = ChangeSet::default();

        for (key, value) in map {
            match key.as_str() {
                "full_name" => changes.full_name = Some(value.as_str().map(str::to_string)),
                "mob_num" => changes.mob_num = Some(value.as_str().map(str::to_string)),
                "pan_num" => changes.pan_num = Some(value.as_str().map(str::to_string)),
                "manager_id" => changes.manager_id = Some(manager_key(value)),
                other => changes.unknown_fields.push(other.to_string()),
            }
        }

        changes
    }

    /// Number of keys present, unknown ones included
    pub fn len(&self) -> usize {
        let known = [
            self.full_name.is_some(),
            self.mob_num.is_some(),
            self.pan_num.is_some(),
            self.manager_id.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();

        known + self.unknown_fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `manager_id` is the only key present
    pub fn is_manager_only(&self) -> bool {
        self.manager_id.is_some() && self.len() == 1
    }
}

/// Reads a manager identifier from JSON, accepting strings and numbers
pub fn manager_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Which record a delete targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteKey {
    /// By logical identifier
    UserId(String),

    /// By mobile number, already prefix-stripped
    Mobile(String),
}

impl DeleteKey {
    /// Picks the key from the optional request fields
    ///
    /// Empty strings count as absent. `user_id` wins when both are given.
    pub fn from_parts(user_id: Option<String>, mob_num: Option<String>) -> RecordResult<Self> {
        let user_id = user_id.filter(|id| !id.is_empty());
        let mob_num = mob_num.filter(|mob| !mob.is_empty());

        match (user_id, mob_num) {
            (Some(user_id), _) => Ok(DeleteKey::UserId(user_id)),
            (None, Some(mob_num)) => Ok(DeleteKey::Mobile(strip_mobile_prefix(&mob_num).to_string())),
            (None, None) => Err(RecordError::MissingKey(
                "Either user_id or mob_num must be provided",
            )),
        }
    }
}

/// Shape of an update request, decided before touching the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePlan {
    /// Several users, manager change only
    BulkReassign {
        user_ids: Vec<String>,
        manager_id: Option<String>,
    },

    /// One user, any combination of fields
    Single { user_id: String, changes: ChangeSet },
}

impl UpdatePlan {
    /// Classifies a request or rejects its shape
    ///
    /// Shape is decided from key presence alone: several ids with anything
    /// but exactly `{manager_id}` is `UnsupportedBulkUpdate`, even when one
    /// of the keys is unknown. Unknown keys on a single id are `UnknownField`.
    pub fn from_request(mut user_ids: Vec<String>, changes: ChangeSet) -> RecordResult<Self> {
        if user_ids.is_empty() {
            return Err(RecordError::MissingKey(
                "At least one user_id must be provided",
            ));
        }
        if changes.is_empty() {
            return Err(RecordError::EmptyChangeSet);
        }

        if user_ids.len() == 1 {
            if let Some(field) = changes.unknown_fields.first() {
                return Err(RecordError::UnknownField(field.clone()));
            }
            let user_id = user_ids.remove(0);
            return Ok(UpdatePlan::Single { user_id, changes });
        }

        if changes.is_manager_only() {
            Ok(UpdatePlan::BulkReassign {
                user_ids,
                manager_id: changes.manager_id.flatten(),
            })
        } else {
            Err(RecordError::UnsupportedBulkUpdate)
        }
    }
}

/// Result of a successful update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Every listed user got a new version; successors in request order
    BulkReassigned(Vec<User>),

    /// The single user got a new version
    Versioned(User),

    /// The single user's active row was changed in place
    UpdatedInPlace(User),
}

impl UpdateOutcome {
    /// Client-facing confirmation
    pub fn message(&self) -> &'static str {
        match self {
            UpdateOutcome::BulkReassigned(_) => "Bulk manager update successful",
            UpdateOutcome::Versioned(_) | UpdateOutcome::UpdatedInPlace(_) => {
                "User updated successfully"
            }
        }
    }
}

/// Guarded transaction: begin on construction, commit or roll back in `finish`
struct TxScope<'p> {
    tx: Transaction<'p, Sqlite>,
    operation: &'static str,
}

impl<'p> TxScope<'p> {
    async fn begin(pool: &'p SqlitePool, operation: &'static str) -> RecordResult<Self> {
        let tx = pool.begin().await?;
        debug!(operation, "Transaction started");
        Ok(Self { tx, operation })
    }

    fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Commits when `result` is Ok, otherwise rolls back and returns the original error
    async fn finish<T>(self, result: RecordResult<T>) -> RecordResult<T> {
        let operation = self.operation;

        match result {
            Ok(value) => {
                self.tx.commit().await?;
                debug!(operation, "Transaction committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.tx.rollback().await {
                    warn!(operation, error = %rollback_err, "Rollback failed");
                } else {
                    debug!(operation, reason = %err, "Transaction rolled back");
                }
                Err(err)
            }
        }
    }
}

/// Creates a user after validating every field
///
/// Order: name, mobile, PAN, manager. Nothing is written unless all pass.
pub async fn create_user(pool: &SqlitePool, new_user: NewUser) -> RecordResult<User> {
    let full_name = require_non_empty_name(new_user.full_name.as_deref())?;
    let mob_num = normalize_mobile(new_user.mob_num.as_deref().unwrap_or_default())?;
    let pan_num = normalize_tax_id(new_user.pan_num.as_deref().unwrap_or_default())?;
    let manager_id = new_user.manager_id.ok_or(RecordError::ManagerNotActive)?;

    let data = InsertUser {
        user_id: Uuid::new_v4().to_string(),
        full_name,
        mob_num,
        pan_num,
        manager_id,
        created_at: Utc::now(),
    };

    let mut scope = TxScope::begin(pool, "create_user").await?;
    let result = insert_first_version(scope.conn(), &data).await;
    let user = scope.finish(result).await?;

    info!(user_id = %user.user_id, manager_id = %user.manager_id, "User created");
    Ok(user)
}

async fn insert_first_version(conn: &mut SqliteConnection, data: &InsertUser) -> RecordResult<User> {
    require_active_manager(&mut *conn, &data.manager_id).await?;
    Ok(User::insert(&mut *conn, data, None).await?)
}

/// Soft-deletes the active version(s) matching `key`
///
/// Returns the number of rows retired. Fails `UserNotFound` when nothing
/// active matches, so repeating a delete fails.
pub async fn delete_user(pool: &SqlitePool, key: DeleteKey) -> RecordResult<u64> {
    let now = Utc::now();

    let mut scope = TxScope::begin(pool, "delete_user").await?;
    let result = deactivate(scope.conn(), &key, now).await;
    let retired = scope.finish(result).await?;

    info!(key = ?key, retired, "User deleted");
    Ok(retired)
}

async fn deactivate(conn: &mut SqliteConnection, key: &DeleteKey, now: DateTime<Utc>) -> RecordResult<u64> {
    let retired = match key {
        DeleteKey::UserId(user_id) => User::deactivate_by_user_id(&mut *conn, user_id, now)
            .await
            .map_err(|err| write_error(err, user_id))?,
        DeleteKey::Mobile(mob_num) => User::deactivate_by_mobile(&mut *conn, mob_num, now)
            .await
            .map_err(|err| write_error(err, mob_num))?,
    };

    if retired == 0 {
        return Err(RecordError::user_not_found());
    }
    Ok(retired)
}

/// Applies `changes` to the users in `user_ids`
///
/// # Errors
///
/// - `MissingKey` / `EmptyChangeSet` for an empty list or change set
/// - `UnsupportedBulkUpdate` when several users get anything but a manager change
/// - `UserNotFound` when a listed user has no active row
/// - field validation errors, first failure in name, mobile, PAN, manager order
///
/// Any failure leaves the store as it was before the call.
pub async fn update_users(
    pool: &SqlitePool,
    user_ids: Vec<String>,
    changes: ChangeSet,
) -> RecordResult<UpdateOutcome> {
    let plan = UpdatePlan::from_request(user_ids, changes)?;
    let now = Utc::now();

    match plan {
        UpdatePlan::BulkReassign { user_ids, manager_id } => {
            debug!(users = user_ids.len(), "Planning bulk manager reassignment");

            let mut scope = TxScope::begin(pool, "bulk_reassign").await?;
            let result = reassign_all(scope.conn(), &user_ids, manager_id.as_deref(), now).await;
            let successors = scope.finish(result).await?;

            info!(users = successors.len(), "Bulk manager reassignment committed");
            Ok(UpdateOutcome::BulkReassigned(successors))
        }
        UpdatePlan::Single { user_id, changes } => {
            debug!(user_id = %user_id, fields = changes.len(), "Planning single user update");

            let mut scope = TxScope::begin(pool, "update_user").await?;
            let result = apply_changes(scope.conn(), &user_id, &changes, now).await;
            let outcome = scope.finish(result).await?;

            info!(user_id = %user_id, versioned = matches!(outcome, UpdateOutcome::Versioned(_)), "User updated");
            Ok(outcome)
        }
    }
}

async fn reassign_all(
    conn: &mut SqliteConnection,
    user_ids: &[String],
    manager_id: Option<&str>,
    now: DateTime<Utc>,
) -> RecordResult<Vec<User>> {
    let manager_id = manager_id.ok_or(RecordError::ManagerNotActive)?;
    let manager = require_active_manager(&mut *conn, manager_id).await?;

    let mut successors = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        let current = User::find_active(&mut *conn, user_id)
            .await?
            .ok_or_else(|| RecordError::user_not_found_with_id(user_id.as_str()))?;

        let next = InsertUser::successor(&current, &manager.manager_id);
        successors.push(retire_and_recreate(&mut *conn, &current, &next, now).await?);
    }

    Ok(successors)
}

async fn apply_changes(
    conn: &mut SqliteConnection,
    user_id: &str,
    changes: &ChangeSet,
    now: DateTime<Utc>,
) -> RecordResult<UpdateOutcome> {
    let current = User::find_active(&mut *conn, user_id)
        .await?
        .ok_or_else(RecordError::user_not_found)?;

    let full_name = match &changes.full_name {
        Some(raw) => require_non_empty_name(raw.as_deref())?,
        None => current.full_name.clone(),
    };
    let mob_num = match &changes.mob_num {
        Some(raw) => normalize_mobile(raw.as_deref().unwrap_or_default())?,
        None => current.mob_num.clone(),
    };
    let pan_num = match &changes.pan_num {
        Some(raw) => normalize_tax_id(raw.as_deref().unwrap_or_default())?,
        None => current.pan_num.clone(),
    };
    let manager = match &changes.manager_id {
        Some(raw) => {
            let manager_id = raw.as_deref().ok_or(RecordError::ManagerNotActive)?;
            Some(require_active_manager(&mut *conn, manager_id).await?)
        }
        None => None,
    };

    match manager {
        Some(manager) => {
            let next = InsertUser {
                user_id: current.user_id.clone(),
                full_name,
                mob_num,
                pan_num,
                manager_id: manager.manager_id,
                created_at: current.created_at,
            };
            let successor = retire_and_recreate(&mut *conn, &current, &next, now).await?;
            Ok(UpdateOutcome::Versioned(successor))
        }
        None => {
            let changed =
                User::update_fields(&mut *conn, current.id, &full_name, &mob_num, &pan_num, now)
                    .await
                    .map_err(|err| write_error(err, &current.user_id))?;
            if changed == 0 {
                return Err(RecordError::Conflict(current.user_id));
            }

            Ok(UpdateOutcome::UpdatedInPlace(User {
                full_name,
                mob_num,
                pan_num,
                updated_at: Some(now),
                ..current
            }))
        }
    }
}

/// Retires `current` and inserts `next` as the active version
async fn retire_and_recreate(
    conn: &mut SqliteConnection,
    current: &User,
    next: &InsertUser,
    now: DateTime<Utc>,
) -> RecordResult<User> {
    let retired = User::retire(&mut *conn, current.id, now)
        .await
        .map_err(|err| write_error(err, &current.user_id))?;
    if retired == 0 {
        return Err(RecordError::Conflict(current.user_id.clone()));
    }

    User::insert(&mut *conn, next, Some(now))
        .await
        .map_err(|err| write_error(err, &next.user_id))
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// True for `SQLITE_BUSY`/`SQLITE_LOCKED` and their extended codes
/// (`SQLITE_BUSY_SNAPSHOT` is 517)
fn is_lock_contention(code: &str) -> bool {
    code.parse::<i32>()
        .is_ok_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
}

/// Classifies a failed write made on behalf of `user_id`
///
/// Lock contention and a duplicate active row both mean another writer
/// changed the record after this transaction read it.
fn write_error(err: sqlx::Error, user_id: &str) -> RecordError {
    let concurrent = match &err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() || db_err.code().is_some_and(|code| is_lock_contention(&code))
        }
        _ => false,
    };

    if concurrent {
        warn!(user_id, error = %err, "Concurrent write detected");
        RecordError::Conflict(user_id.to_string())
    } else {
        RecordError::Database(err)
    }
}
