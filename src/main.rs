mod api;
mod board;
mod identity;
mod persist;
mod settings;

use axum::{
    routing::{get, post, put},
    Router,
};
use board::{Caller, Role};
use identity::{AppState, FixedIdentity, SharedState};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Boot the Board ─────────────────────────────────────────
    let settings = settings::Settings::load().expect("Failed to load settings");

    let save_file =
        persist::SaveFile::open(&settings.save_file).expect("Failed to open save file");

    let mut board = save_file
        .load_board()
        .expect("Failed to load board from save file");

    if save_file
        .ensure_default_manager(&mut board)
        .expect("Failed to seed manager")
    {
        tracing::info!("Created default manager user (username: manager)");
    }

    tracing::info!(
        "Board loaded: {} users, {} tasks, revision {}",
        board.users.len(),
        board.tasks.len(),
        board.revision,
    );

    // ── Fixed identity ─────────────────────────────────────────
    // No session layer yet: every request acts as the seeded manager.
    // A save file whose manager account was renamed or deleted still
    // boots, with a synthetic manager caller.
    let caller = board
        .user_by_username("manager")
        .map(|u| Caller {
            id: u.id,
            role: u.role,
        })
        .unwrap_or(Caller {
            id: Uuid::nil(),
            role: Role::Manager,
        });

    // ── Shared state ───────────────────────────────────────────
    let state: SharedState = Arc::new(AppState {
        board: std::sync::RwLock::new(board),
        save_file,
        identity: Box::new(FixedIdentity::new(caller.id, caller.role)),
    });

    // ── Router ─────────────────────────────────────────────────
    let app = Router::new()
        .route("/api/users", post(api::create_user).get(api::list_users))
        .route(
            "/api/users/:id",
            put(api::update_user).delete(api::delete_user),
        )
        .route("/api/users/:id/role", get(api::get_user_role))
        .route("/api/users/:id/tasks", get(api::list_tasks_for_user))
        .route("/api/auth/login", post(identity::login))
        .route("/api/tasks", post(api::create_task).get(api::list_tasks))
        .route(
            "/api/tasks/:id",
            put(api::update_task).delete(api::delete_task),
        )
        .route("/api/tasks/:id/status", put(api::update_status))
        .route("/api/tasks/:id/status/force", put(api::force_status))
        .route("/api/tasks/:id/assignee", put(api::reassign_task))
        .route("/api/health", get(api::health))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // ── Start ──────────────────────────────────────────────────
    let addr: SocketAddr = format!("{}:{}", settings.bind_address, settings.port)
        .parse()
        .expect("Invalid bind address");
    tracing::info!("Server running on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server failed");
}
