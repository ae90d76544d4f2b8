/// API route handlers
///
/// - `health`: Health check endpoint
/// - `users`: User record endpoints (create, list, search, delete, update)

pub mod health;
pub mod users;
