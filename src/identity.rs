use crate::board::{Board, Caller, Role, User};
use crate::persist::SaveFile;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

// ── Identity capability ────────────────────────────────────────

/// Resolves the caller behind a request.
///
/// There is no session layer yet: the shipped provider pins every request
/// to one fixed identity (the seeded manager). Handlers only ever see a
/// `Caller`, so a real session-backed provider slots in here without
/// touching them.
pub trait IdentityProvider: Send + Sync {
    fn current_caller(&self) -> Caller;
}

/// Provider that answers every request with the same caller.
pub struct FixedIdentity {
    caller: Caller,
}

impl FixedIdentity {
    pub fn new(id: Uuid, role: Role) -> Self {
        FixedIdentity {
            caller: Caller { id, role },
        }
    }
}

impl IdentityProvider for FixedIdentity {
    fn current_caller(&self) -> Caller {
        self.caller
    }
}

// ── Shared state ───────────────────────────────────────────────

pub struct AppState {
    pub board: std::sync::RwLock<Board>,
    pub save_file: SaveFile,
    pub identity: Box<dyn IdentityProvider>,
}

pub type SharedState = Arc<AppState>;

// ── Login ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

/// POST /api/auth/login
///
/// Username lookup only — no credential check. Kept so the frontend can
/// pick which account it is "acting as" while identity is still stubbed.
pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<User>, (StatusCode, String)> {
    let board = state.board.read().unwrap();

    let user = board
        .user_by_username(&payload.username)
        .ok_or((StatusCode::UNAUTHORIZED, "Invalid username".to_string()))?;

    Ok(Json(user.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_identity_always_answers_with_the_same_caller() {
        let id = Uuid::new_v4();
        let provider = FixedIdentity::new(id, Role::Manager);

        let first = provider.current_caller();
        let second = provider.current_caller();
        assert_eq!(first.id, id);
        assert_eq!(first.role, Role::Manager);
        assert_eq!(second.id, id);
    }
}
