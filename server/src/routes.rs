//! HTTP route handlers for the TodoLists server.
//!
//! This module provides the HTML endpoints:
//!
//! - `GET /` - Redirect to `/lists`
//! - `GET /lists` - All lists
//! - `GET /lists/new` / `POST /lists` - Create a list
//! - `GET /lists/{list_id}` - One list with its todos
//! - `GET /lists/{list_id}/edit` / `POST /lists/{list_id}` - Rename a list
//! - `POST /lists/{list_id}/delete` - Delete a list
//! - `POST /lists/{list_id}/todos` - Add a todo
//! - `POST /lists/{list_id}/todos/{todo_id}` - Set a todo's completion
//! - `POST /lists/{list_id}/todos/{todo_id}/delete` - Delete a todo
//! - `POST /lists/{list_id}/complete_all` - Complete every todo of a list
//! - `GET /health` - Health check endpoint
//!
//! # Architecture
//!
//! Every handler receives the visitor's session as a [`CurrentSession`],
//! applies one operation to it and then either redirects (`303 See Other`)
//! with a success flash or re-renders the originating page with an error
//! flash. Unknown list ids always end in a redirect to `/lists`.
//!
//! # Example
//!
//! ```rust,no_run
//! use todolists_server::routes::{create_router, AppState};
//! use todolists_server::config::Config;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("failed to load config");
//!     let state = AppState::new(config).expect("templates compile");
//!     let app = create_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, TodoError};
use crate::session::{CurrentSession, SessionData, SessionStore};
use crate::views::Views;

// ============================================================================
// Constants
// ============================================================================

/// Header set by asynchronous (script-driven) requests.
const HEADER_REQUESTED_WITH: &str = "x-requested-with";

/// Value of [`HEADER_REQUESTED_WITH`] that marks a programmatic caller.
const XML_HTTP_REQUEST: &str = "XMLHttpRequest";

/// Path of the list index.
const LISTS_PATH: &str = "/lists";

const LIST_CREATED: &str = "The list has been created.";
const LIST_UPDATED: &str = "The list has been updated.";
const LIST_DELETED: &str = "The list has been deleted.";
const TODO_ADDED: &str = "The todo was added.";
const TODO_UPDATED: &str = "The todo has been updated.";
const TODO_DELETED: &str = "The todo has been deleted.";
const TODOS_COMPLETED: &str = "All todos have been completed.";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<Config>,

    /// Per-visitor sessions.
    pub sessions: Arc<SessionStore>,

    /// Compiled page templates.
    pub views: Arc<Views>,

    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Creates a new application state with the given configuration.
    ///
    /// # Errors
    ///
    /// Fails if a page template does not compile.
    pub fn new(config: Config) -> Result<Self> {
        let sessions = SessionStore::new(config.session_store_config());
        Ok(Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            views: Arc::new(Views::new()?),
            start_time: Instant::now(),
        })
    }
}

impl FromRef<AppState> for Arc<SessionStore> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.sessions)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("start_time", &self.start_time)
            .finish()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Creates the application router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_root))
        .route("/lists", get(get_lists).post(post_lists))
        .route("/lists/new", get(get_new_list))
        .route("/lists/{list_id}", get(get_list).post(post_list))
        .route("/lists/{list_id}/edit", get(get_edit_list))
        .route("/lists/{list_id}/delete", post(post_delete_list))
        .route("/lists/{list_id}/todos", post(post_todos))
        .route("/lists/{list_id}/todos/{todo_id}", post(post_todo))
        .route(
            "/lists/{list_id}/todos/{todo_id}/delete",
            post(post_delete_todo),
        )
        .route("/lists/{list_id}/complete_all", post(post_complete_all))
        .route("/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Forms
// ============================================================================

/// Body of the create and rename forms. A missing field reads as empty.
#[derive(Debug, Deserialize)]
struct ListNameForm {
    #[serde(default)]
    list_name: String,
}

/// Body of the add-todo form.
#[derive(Debug, Deserialize)]
struct TodoForm {
    #[serde(default)]
    todo: String,
}

/// Body of the toggle form. Only the literal `"true"` completes a todo.
#[derive(Debug, Deserialize)]
struct CompletedForm {
    completed: Option<String>,
}

impl CompletedForm {
    fn is_completed(&self) -> bool {
        self.completed.as_deref() == Some("true")
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn list_path(id: u64) -> String {
    format!("{LISTS_PATH}/{id}")
}

/// Returns `true` for asynchronous requests that want a bare acknowledgment.
fn is_programmatic(headers: &HeaderMap) -> bool {
    headers
        .get(HEADER_REQUESTED_WITH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == XML_HTTP_REQUEST)
}

fn resolve_list_id(session: &SessionData, requested: &str) -> std::result::Result<u64, TodoError> {
    session.lists.resolve(requested).map(|(_, list)| list.id)
}

/// Short-circuit for an unresolvable list: flash and back to the index.
fn list_not_found(mut session: CurrentSession, err: TodoError) -> Response {
    debug!(error = %err, "List not resolved");
    session.set_error(err.to_string());
    session.respond(Redirect::to(LISTS_PATH))
}

/// Short-circuit for an unresolvable todo: flash and back to its list.
fn todo_not_found(mut session: CurrentSession, list_id: u64, err: TodoError) -> Response {
    debug!(list_id, error = %err, "Todo not resolved");
    session.set_error(err.to_string());
    session.respond(Redirect::to(&list_path(list_id)))
}

fn render_list_page(
    state: &AppState,
    mut session: CurrentSession,
    id: u64,
    todo_text: &str,
) -> Response {
    let (lists, flash) = session.render_parts();
    let page = match lists.find(id) {
        Ok(list) => state.views.list_page(&flash.take(), list, todo_text),
        Err(err) => return list_not_found(session, err),
    };
    session.respond(page)
}

fn render_edit_page(
    state: &AppState,
    mut session: CurrentSession,
    id: u64,
    list_name: Option<&str>,
) -> Response {
    let (lists, flash) = session.render_parts();
    let page = match lists.find(id) {
        Ok(list) => {
            let list_name = list_name.unwrap_or(&list.name);
            state.views.edit_list_page(&flash.take(), list, list_name)
        }
        Err(err) => return list_not_found(session, err),
    };
    session.respond(page)
}

// ============================================================================
// Lists
// ============================================================================

/// GET / - Redirect to the list index.
async fn get_root() -> Redirect {
    Redirect::to(LISTS_PATH)
}

/// GET /lists - Render all lists.
async fn get_lists(State(state): State<AppState>, mut session: CurrentSession) -> Response {
    let (lists, flash) = session.render_parts();
    let page = state.views.lists_page(&flash.take(), lists);
    session.respond(page)
}

/// GET /lists/new - Render the creation form.
async fn get_new_list(State(state): State<AppState>, mut session: CurrentSession) -> Response {
    let page = state.views.new_list_page(&session.take_flash(), "");
    session.respond(page)
}

/// POST /lists - Create a list.
async fn post_lists(
    State(state): State<AppState>,
    mut session: CurrentSession,
    Form(form): Form<ListNameForm>,
) -> Response {
    match session.lists.create(&form.list_name).map(|list| list.id) {
        Ok(id) => {
            info!(list_id = id, "List created");
            session.set_success(LIST_CREATED);
            session.respond(Redirect::to(LISTS_PATH))
        }
        Err(err) => {
            debug!(error = %err, "List name rejected");
            session.set_error(err.to_string());
            let page = state
                .views
                .new_list_page(&session.take_flash(), &form.list_name);
            session.respond(page)
        }
    }
}

/// GET /lists/{list_id} - Render one list.
async fn get_list(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    session: CurrentSession,
) -> Response {
    match resolve_list_id(&session, &list_id) {
        Ok(id) => render_list_page(&state, session, id, ""),
        Err(err) => list_not_found(session, err),
    }
}

/// GET /lists/{list_id}/edit - Render the rename form.
async fn get_edit_list(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    session: CurrentSession,
) -> Response {
    match resolve_list_id(&session, &list_id) {
        Ok(id) => render_edit_page(&state, session, id, None),
        Err(err) => list_not_found(session, err),
    }
}

/// POST /lists/{list_id} - Rename a list.
async fn post_list(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    mut session: CurrentSession,
    Form(form): Form<ListNameForm>,
) -> Response {
    let id = match resolve_list_id(&session, &list_id) {
        Ok(id) => id,
        Err(err) => return list_not_found(session, err),
    };

    match session.lists.rename(id, &form.list_name) {
        Ok(()) => {
            info!(list_id = id, "List renamed");
            session.set_success(LIST_UPDATED);
            session.respond(Redirect::to(&list_path(id)))
        }
        Err(err) => {
            debug!(list_id = id, error = %err, "List name rejected");
            session.set_error(err.to_string());
            render_edit_page(&state, session, id, Some(&form.list_name))
        }
    }
}

/// POST /lists/{list_id}/delete - Delete a list.
///
/// Programmatic callers get `200 OK` with the index path as body instead of
/// a redirect.
async fn post_delete_list(
    Path(list_id): Path<String>,
    headers: HeaderMap,
    mut session: CurrentSession,
) -> Response {
    let result = resolve_list_id(&session, &list_id).and_then(|id| session.lists.delete(id));
    let list = match result {
        Ok(list) => list,
        Err(err) => return list_not_found(session, err),
    };
    info!(list_id = list.id, todos = list.todos_count(), "List deleted");

    if is_programmatic(&headers) {
        return session.respond(LISTS_PATH);
    }
    session.set_success(LIST_DELETED);
    session.respond(Redirect::to(LISTS_PATH))
}

// ============================================================================
// Todos
// ============================================================================

/// POST /lists/{list_id}/todos - Add a todo.
async fn post_todos(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    mut session: CurrentSession,
    Form(form): Form<TodoForm>,
) -> Response {
    let list = match session.lists.resolve_mut(&list_id) {
        Ok(list) => list,
        Err(err) => return list_not_found(session, err),
    };
    let id = list.id;

    match list.add_todo(&form.todo).map(|todo| todo.id) {
        Ok(todo_id) => {
            info!(list_id = id, todo_id, "Todo added");
            session.set_success(TODO_ADDED);
            session.respond(Redirect::to(&list_path(id)))
        }
        Err(err) => {
            debug!(list_id = id, error = %err, "Todo rejected");
            session.set_error(err.to_string());
            render_list_page(&state, session, id, &form.todo)
        }
    }
}

/// POST /lists/{list_id}/todos/{todo_id} - Set a todo's completion flag.
async fn post_todo(
    Path((list_id, todo_id)): Path<(String, String)>,
    mut session: CurrentSession,
    Form(form): Form<CompletedForm>,
) -> Response {
    let list = match session.lists.resolve_mut(&list_id) {
        Ok(list) => list,
        Err(err) => return list_not_found(session, err),
    };
    let id = list.id;
    let completed = form.is_completed();

    let result = list
        .resolve_todo(&todo_id)
        .and_then(|todo_id| list.set_completed(todo_id, completed).map(|()| todo_id));
    match result {
        Ok(todo_id) => {
            debug!(list_id = id, todo_id, completed, "Todo updated");
            session.set_success(TODO_UPDATED);
            session.respond(Redirect::to(&list_path(id)))
        }
        Err(err) => todo_not_found(session, id, err),
    }
}

/// POST /lists/{list_id}/todos/{todo_id}/delete - Delete a todo.
///
/// Programmatic callers get a bare `204 No Content`.
async fn post_delete_todo(
    Path((list_id, todo_id)): Path<(String, String)>,
    headers: HeaderMap,
    mut session: CurrentSession,
) -> Response {
    let list = match session.lists.resolve_mut(&list_id) {
        Ok(list) => list,
        Err(err) => return list_not_found(session, err),
    };
    let id = list.id;

    let result = list
        .resolve_todo(&todo_id)
        .and_then(|todo_id| list.delete_todo(todo_id));
    let todo = match result {
        Ok(todo) => todo,
        Err(err) => return todo_not_found(session, id, err),
    };
    info!(list_id = id, todo_id = todo.id, "Todo deleted");

    if is_programmatic(&headers) {
        return session.respond(StatusCode::NO_CONTENT);
    }
    session.set_success(TODO_DELETED);
    session.respond(Redirect::to(&list_path(id)))
}

/// POST /lists/{list_id}/complete_all - Mark every todo of a list complete.
async fn post_complete_all(Path(list_id): Path<String>, mut session: CurrentSession) -> Response {
    let list = match session.lists.resolve_mut(&list_id) {
        Ok(list) => list,
        Err(err) => return list_not_found(session, err),
    };
    list.complete_all();
    let id = list.id;
    info!(list_id = id, todos = list.todos_count(), "All todos completed");

    session.set_success(TODOS_COMPLETED);
    session.respond(Redirect::to(&list_path(id)))
}

// ============================================================================
// GET /health - Health Check
// ============================================================================

/// Response body for health check endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status (always "ok" if responding).
    pub status: String,

    /// Number of sessions currently held, expired ones included.
    pub sessions: usize,

    /// Server uptime in seconds.
    pub uptime_seconds: u64,
}

/// GET /health - Health check endpoint.
async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.sessions.len(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

// ============================================================================
// Tests
// ============================================================================
