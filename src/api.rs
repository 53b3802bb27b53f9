use crate::board::{BoardError, Command, Role, Task, TaskStatus, User};
use crate::identity::SharedState;
use crate::persist::SaveFileError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Request/response types ─────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
    pub role: Role,
}

fn default_complexity() -> u8 {
    1
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_complexity")]
    pub complexity: u8,
    /// Omitted → auto-assignment picks the least-loaded employee.
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_complexity")]
    pub complexity: u8,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Self {
        MessageResponse {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserRoleResponse {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

// ── Error mapping ──────────────────────────────────────────────

fn reject(err: BoardError) -> (StatusCode, String) {
    tracing::debug!(?err, "request rejected");
    let (status, message) = match err {
        BoardError::Forbidden => (StatusCode::FORBIDDEN, "Insufficient permissions"),
        BoardError::TaskNotFound => (StatusCode::NOT_FOUND, "Task not found"),
        BoardError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
        BoardError::DuplicateUsername => (StatusCode::BAD_REQUEST, "Username already taken"),
        BoardError::NoEligibleAssignee => (StatusCode::BAD_REQUEST, "No available employees"),
        BoardError::InvalidComplexity => {
            (StatusCode::BAD_REQUEST, "Complexity must be between 1 and 5")
        }
    };
    (status, message.to_string())
}

fn internal(err: SaveFileError) -> (StatusCode, String) {
    // Board already mutated; the save file did not keep up. On restart the
    // save file wins, so make the divergence loud.
    tracing::error!("save file flush failed: {err}");
    (StatusCode::INTERNAL_SERVER_ERROR, "Storage failure".to_string())
}

// apply() answered with an event kind the handler cannot respond from.
// Only reachable through a board bug.
fn event_mismatch() -> (StatusCode, String) {
    tracing::error!("event kind does not match the applied command");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
}

// ── User handlers ──────────────────────────────────────────────

// POST /api/users
pub async fn create_user(
    State(state): State<SharedState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), (StatusCode, String)> {
    let caller = state.identity.current_caller();
    let mut board = state.board.write().unwrap();

    let event = board
        .apply(
            Command::CreateUser {
                username: payload.username,
                role: payload.role,
            },
            caller,
        )
        .map_err(reject)?;
    state.save_file.flush(&event).map_err(internal)?;

    let user = event.into_user().ok_or_else(event_mismatch)?;
    Ok((StatusCode::CREATED, Json(user)))
}

// GET /api/users
pub async fn list_users(State(state): State<SharedState>) -> Json<Vec<User>> {
    let board = state.board.read().unwrap();
    Json(board.users_sorted())
}

// GET /api/users/:id/role
pub async fn get_user_role(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserRoleResponse>, (StatusCode, String)> {
    let board = state.board.read().unwrap();

    let user = board
        .user(id)
        .ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))?;

    Ok(Json(UserRoleResponse {
        id: user.id,
        username: user.username.clone(),
        role: user.role,
    }))
}

// GET /api/users/:id/tasks
pub async fn list_tasks_for_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let board = state.board.read().unwrap();

    if board.user(id).is_none() {
        return Err((StatusCode::NOT_FOUND, "User not found".to_string()));
    }

    Ok(Json(board.tasks_for(id)))
}

// PUT /api/users/:id
pub async fn update_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, (StatusCode, String)> {
    let caller = state.identity.current_caller();
    let mut board = state.board.write().unwrap();

    let event = board
        .apply(
            Command::UpdateUser {
                user_id: id,
                username: payload.username,
                role: payload.role,
            },
            caller,
        )
        .map_err(reject)?;
    state.save_file.flush(&event).map_err(internal)?;

    let user = event.into_user().ok_or_else(event_mismatch)?;
    Ok(Json(user))
}

// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let caller = state.identity.current_caller();
    let mut board = state.board.write().unwrap();

    let event = board
        .apply(Command::DeleteUser { user_id: id }, caller)
        .map_err(reject)?;
    state.save_file.flush(&event).map_err(internal)?;

    Ok(Json(MessageResponse::new("User deleted")))
}

// ── Task handlers ──────────────────────────────────────────────

// POST /api/tasks
pub async fn create_task(
    State(state): State<SharedState>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, String)> {
    let caller = state.identity.current_caller();
    let mut board = state.board.write().unwrap();

    let event = board
        .apply(
            Command::CreateTask {
                title: payload.title,
                description: payload.description,
                complexity: payload.complexity,
                assigned_to: payload.assigned_to,
            },
            caller,
        )
        .map_err(reject)?;
    state.save_file.flush(&event).map_err(internal)?;

    let task = event.into_task().ok_or_else(event_mismatch)?;
    Ok((StatusCode::CREATED, Json(task)))
}

// GET /api/tasks
pub async fn list_tasks(State(state): State<SharedState>) -> Json<Vec<Task>> {
    let board = state.board.read().unwrap();
    Json(board.tasks_sorted())
}

// PUT /api/tasks/:id
pub async fn update_task(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let caller = state.identity.current_caller();
    let mut board = state.board.write().unwrap();

    let event = board
        .apply(
            Command::UpdateTask {
                task_id: id,
                title: payload.title,
                description: payload.description,
                complexity: payload.complexity,
            },
            caller,
        )
        .map_err(reject)?;
    state.save_file.flush(&event).map_err(internal)?;

    let task = event.into_task().ok_or_else(event_mismatch)?;
    Ok(Json(task))
}

// DELETE /api/tasks/:id
pub async fn delete_task(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let caller = state.identity.current_caller();
    let mut board = state.board.write().unwrap();

    let event = board
        .apply(Command::DeleteTask { task_id: id }, caller)
        .map_err(reject)?;
    state.save_file.flush(&event).map_err(internal)?;

    Ok(Json(MessageResponse::new("Task deleted")))
}

// PUT /api/tasks/:id/status
pub async fn update_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let caller = state.identity.current_caller();
    let mut board = state.board.write().unwrap();

    let event = board
        .apply(
            Command::UpdateStatus {
                task_id: id,
                status: payload.status,
            },
            caller,
        )
        .map_err(reject)?;
    state.save_file.flush(&event).map_err(internal)?;

    let task = event.into_task().ok_or_else(event_mismatch)?;
    Ok(Json(task))
}

// PUT /api/tasks/:id/status/force
pub async fn force_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let caller = state.identity.current_caller();
    let mut board = state.board.write().unwrap();

    let event = board
        .apply(
            Command::ForceStatus {
                task_id: id,
                status: payload.status,
            },
            caller,
        )
        .map_err(reject)?;
    state.save_file.flush(&event).map_err(internal)?;

    let task = event.into_task().ok_or_else(event_mismatch)?;
    Ok(Json(task))
}

// PUT /api/tasks/:id/assignee
pub async fn reassign_task(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReassignRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let caller = state.identity.current_caller();
    let mut board = state.board.write().unwrap();

    let event = board
        .apply(
            Command::Reassign {
                task_id: id,
                user_id: payload.user_id,
            },
            caller,
        )
        .map_err(reject)?;
    state.save_file.flush(&event).map_err(internal)?;

    Ok(Json(MessageResponse::new("Task reassigned")))
}

// ── Health ─────────────────────────────────────────────────────

// GET /api/health
pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse::new("Application is running"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_maps_each_error_to_its_status() {
        assert_eq!(reject(BoardError::Forbidden).0, StatusCode::FORBIDDEN);
        assert_eq!(reject(BoardError::TaskNotFound).0, StatusCode::NOT_FOUND);
        assert_eq!(reject(BoardError::UserNotFound).0, StatusCode::NOT_FOUND);
        assert_eq!(reject(BoardError::DuplicateUsername).0, StatusCode::BAD_REQUEST);
        assert_eq!(reject(BoardError::NoEligibleAssignee).0, StatusCode::BAD_REQUEST);
        assert_eq!(reject(BoardError::InvalidComplexity).0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn create_task_payload_defaults_complexity_to_one() {
        let payload: CreateTaskRequest =
            serde_json::from_str(r#"{"title": "triage inbox"}"#).unwrap();
        assert_eq!(payload.complexity, 1);
        assert_eq!(payload.description, None);
        assert_eq!(payload.assigned_to, None);
    }

    #[test]
    fn update_task_payload_defaults_complexity_to_one() {
        let payload: UpdateTaskRequest =
            serde_json::from_str(r#"{"title": "triage inbox", "description": "all of it"}"#)
                .unwrap();
        assert_eq!(payload.complexity, 1);
        assert_eq!(payload.description.as_deref(), Some("all of it"));
    }

    #[test]
    fn status_payload_reads_snake_case_statuses() {
        let payload: StatusRequest = serde_json::from_str(r#"{"status": "in_progress"}"#).unwrap();
        assert_eq!(payload.status, TaskStatus::InProgress);
    }
}
