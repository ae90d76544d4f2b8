/// User record endpoints
///
/// Thin HTTP wrappers over `roster_shared::transition`: each handler parses
/// its body, calls one engine operation, and shapes the response.
///
/// # Endpoints
///
/// - `GET  /` - Every row, including retired versions
/// - `POST /create_user` - Create a user
/// - `POST /get_users` - Search active users
/// - `POST /delete_user` - Soft-delete by `user_id` or `mob_num`
/// - `POST /update_user` - Update one user or reassign several

use crate::{app::AppState, error::ApiResult};
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use roster_shared::{
    models::user::{User, UserFilter},
    transition::{self, manager_key, ChangeSet, DeleteKey, NewUser},
    validation::strip_mobile_prefix,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Create user request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub full_name: Option<String>,
    pub mob_num: Option<String>,
    pub pan_num: Option<String>,

    /// String or number
    pub manager_id: Option<Value>,
}

/// Create user response
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserResponse {
    /// Logical user identifier
    pub id: String,
    pub full_name: String,
    pub mobile_number: String,
    pub pan_number: String,
    pub manager_id: String,
    pub message: String,
}

/// Search request; every filter is optional and empty strings are ignored
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GetUsersRequest {
    pub user_id: Option<String>,
    pub mob_num: Option<String>,
    pub manager_id: Option<Value>,
}

impl GetUsersRequest {
    fn into_filter(self) -> UserFilter {
        UserFilter {
            user_id: non_empty(self.user_id),
            mob_num: non_empty(self.mob_num).map(|mob| strip_mobile_prefix(&mob).to_string()),
            manager_id: non_empty(self.manager_id.as_ref().and_then(manager_key)),
        }
    }
}

/// Search response
#[derive(Debug, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

/// Delete request; `user_id` wins when both are given
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteUserRequest {
    pub user_id: Option<String>,
    pub mob_num: Option<String>,
}

/// Update request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub user_ids: Option<Vec<String>>,
    pub update_data: Option<Map<String, Value>>,
}

/// Confirmation body for delete and update
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Lists every row of the users table
///
/// # Endpoint
///
/// ```text
/// GET /
/// ```
pub async fn list_all_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let users = User::list_all(&state.db).await?;
    tracing::debug!(rows = users.len(), "Listed all user rows");
    Ok(Json(users))
}

/// Creates a user
///
/// # Endpoint
///
/// ```text
/// POST /create_user
/// Content-Type: application/json
///
/// {
///   "full_name": "Asha Rao",
///   "mob_num": "+919876543210",
///   "pan_num": "abcde1234f",
///   "manager_id": "m-1"
/// }
/// ```
///
/// # Response (201)
///
/// ```json
/// {
///   "id": "uuid",
///   "full_name": "Asha Rao",
///   "mobile_number": "9876543210",
///   "pan_number": "ABCDE1234F",
///   "manager_id": "m-1",
///   "message": "User created successfully"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: a field failed validation or the manager is not active
/// - `500 Internal Server Error`: Server error
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateUserResponse>)> {
    let Json(req) = payload?;

    let new_user = NewUser {
        full_name: req.full_name,
        mob_num: req.mob_num,
        pan_num: req.pan_num,
        manager_id: req.manager_id.as_ref().and_then(manager_key),
    };

    let user = transition::create_user(&state.db, new_user).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            id: user.user_id,
            full_name: user.full_name,
            mobile_number: user.mob_num,
            pan_number: user.pan_num,
            manager_id: user.manager_id,
            message: "User created successfully".to_string(),
        }),
    ))
}

/// Searches active users
///
/// # Endpoint
///
/// ```text
/// POST /get_users
/// Content-Type: application/json
///
/// { "manager_id": "m-1" }
/// ```
///
/// Returns `{"users": [...]}`, an empty list when nothing matches.
pub async fn get_users(
    State(state): State<AppState>,
    payload: Result<Json<GetUsersRequest>, JsonRejection>,
) -> ApiResult<Json<UsersResponse>> {
    let Json(req) = payload?;
    let filter = req.into_filter();

    let users = User::search_active(&state.db, &filter).await?;
    tracing::debug!(filter = ?filter, matches = users.len(), "Searched active users");

    Ok(Json(UsersResponse { users }))
}

/// Soft-deletes a user
///
/// # Endpoint
///
/// ```text
/// POST /delete_user
/// Content-Type: application/json
///
/// { "user_id": "uuid" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: neither `user_id` nor `mob_num` given
/// - `404 Not Found`: no active user matches
pub async fn delete_user(
    State(state): State<AppState>,
    payload: Result<Json<DeleteUserRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(req) = payload?;
    let key = DeleteKey::from_parts(req.user_id, req.mob_num)?;

    transition::delete_user(&state.db, key).await?;

    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}

/// Updates one user, or reassigns several to a new manager
///
/// # Endpoint
///
/// ```text
/// POST /update_user
/// Content-Type: application/json
///
/// {
///   "user_ids": ["uuid-1", "uuid-2"],
///   "update_data": { "manager_id": "m-2" }
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: bad request shape, unknown field on a single user, or a
///   field failed validation
/// - `404 Not Found`: a listed user has no active row
/// - `409 Conflict`: another request changed the user mid-update
pub async fn update_user(
    State(state): State<AppState>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(req) = payload?;

    let user_ids = req.user_ids.unwrap_or_default();
    let changes = ChangeSet::from_json(&req.update_data.unwrap_or_default());

    let outcome = transition::update_users(&state.db, user_ids, changes).await?;

    Ok(Json(MessageResponse {
        message: outcome.message().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_ignores_empty_strings() {
        let req: GetUsersRequest =
            serde_json::from_value(json!({ "user_id": "", "mob_num": "", "manager_id": "" })).unwrap();
        assert_eq!(req.into_filter(), UserFilter::default());
    }

    #[test]
    fn test_filter_strips_mobile_prefix_and_reads_numeric_manager() {
        let req: GetUsersRequest =
            serde_json::from_value(json!({ "mob_num": "+919876543210", "manager_id": 7 })).unwrap();
        let filter = req.into_filter();

        assert_eq!(filter.mob_num.as_deref(), Some("9876543210"));
        assert_eq!(filter.manager_id.as_deref(), Some("7"));
        assert!(filter.user_id.is_none());
    }

    #[test]
    fn test_update_request_defaults() {
        let req: UpdateUserRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.user_ids.is_none());
        assert!(req.update_data.is_none());
    }
}
