/// Database models for Roster
///
/// # Models
///
/// - `user`: Versioned user rows (one active row per `user_id`)
/// - `manager`: Read-only manager reference table
///
/// # Example
///
/// ```no_run
/// use roster_shared::models::user::User;
/// use roster_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// if let Some(user) = User::find_active(&pool, "c9b1...").await? {
///     println!("{} reports to {}", user.full_name, user.manager_id);
/// }
/// # Ok(())
/// # }
/// ```

pub mod manager;
pub mod user;
