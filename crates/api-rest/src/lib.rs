//! # API REST
//!
//! REST API for the diagnosis grouping workspace.
//!
//! Handles:
//! - HTTP endpoints with axum, one open [`Workspace`] and save queue per user
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! All grouping logic lives in `dxg-core`; handlers only translate between HTTP and workspace
//! operations.
//!
//! The session map lock only covers lookup and insertion. Each session has its own lock, which is
//! never held across storage I/O, so a slow broker stalls only the request waiting on it.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use dxg_core::{
    catalog, config, validation, CoreConfig, DefaultSessionStore, Diagnosis, Group, GroupId,
    GroupingError, GroupingResult, SaveHandle, SaveHint, SaveOutcome, SaveQueue, SuggestionGroup,
    Workspace,
};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

type ApiError = (StatusCode, &'static str);

struct UserSession {
    workspace: Workspace,
    saves: SaveHandle,
}

type SharedSession = Arc<Mutex<UserSession>>;

/// Application state for the REST API server
///
/// Holds the configuration, the session store shared by every user, the raw suggestion catalog
/// and the sessions currently open.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    store: Arc<DefaultSessionStore>,
    catalog: Arc<Vec<SuggestionGroup>>,
    sessions: Arc<Mutex<HashMap<String, SharedSession>>>,
}

impl AppState {
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: Arc<DefaultSessionStore>,
        catalog: Vec<SuggestionGroup>,
    ) -> Self {
        Self {
            cfg,
            store,
            catalog: Arc::new(catalog),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Builds the state described by `cfg`: opens the session store and loads the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the local cache directory cannot be opened, or a catalog source is
    /// configured but cannot be loaded.
    pub async fn from_config(cfg: Arc<CoreConfig>) -> anyhow::Result<Self> {
        let store = Arc::new(DefaultSessionStore::from_config(&cfg)?);

        let suggestions = match cfg.catalog_source() {
            Some(source) => catalog::load_catalog(source).await?,
            None => {
                tracing::warn!("no catalog configured; sessions start without suggestions");
                Vec::new()
            }
        };

        Ok(Self::new(cfg, store, suggestions))
    }
}

/// Resolves [`CoreConfig`] from the `DXG_*` environment variables.
///
/// Intended for binaries only.
pub fn core_config_from_env() -> anyhow::Result<CoreConfig> {
    let broker_url = config::broker_url_from_env_value(std::env::var("DXG_BROKER_URL").ok())?;
    let cache_dir = config::cache_dir_from_env_value(std::env::var("DXG_CACHE_DIR").ok());
    let catalog_source = config::catalog_source_from_env_value(std::env::var("DXG_CATALOG").ok());
    let save_debounce =
        config::save_debounce_from_env_value(std::env::var("DXG_SAVE_DEBOUNCE_MS").ok())?;
    let undo_capacity =
        config::undo_capacity_from_env_value(std::env::var("DXG_UNDO_CAPACITY").ok())?;

    Ok(CoreConfig::new(
        broker_url,
        cache_dir,
        catalog_source,
        save_debounce,
        undo_capacity,
    )?)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        open_session,
        view_session,
        reset_session,
        close_session,
        create_group,
        add_subgroup,
        reorder_subgroups,
        toggle_collapse,
        delete_group,
        move_diagnosis,
        accept_suggestion,
        dismiss_suggestion,
        undo,
        save,
        summary,
    ),
    components(schemas(
        HealthRes,
        DiagnosisView,
        GroupView,
        SuggestionView,
        SessionView,
        CreateGroupReq,
        SubgroupReq,
        SubgroupRes,
        ReorderReq,
        MoveReq,
        AcceptReq,
        SaveRes,
        SummaryRes,
    ))
)]
struct ApiDoc;

/// Builds the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/sessions/:user_id",
            post(open_session).get(view_session).delete(reset_session),
        )
        .route("/sessions/:user_id/close", post(close_session))
        .route("/sessions/:user_id/groups", post(create_group))
        .route(
            "/sessions/:user_id/groups/:group_id",
            delete(delete_group),
        )
        .route(
            "/sessions/:user_id/groups/:group_id/subgroups",
            post(add_subgroup).put(reorder_subgroups),
        )
        .route(
            "/sessions/:user_id/groups/:group_id/collapse",
            post(toggle_collapse),
        )
        .route("/sessions/:user_id/moves", post(move_diagnosis))
        .route("/sessions/:user_id/suggestions/accept", post(accept_suggestion))
        .route("/sessions/:user_id/suggestions/dismiss", post(dismiss_suggestion))
        .route("/sessions/:user_id/undo", post(undo))
        .route("/sessions/:user_id/save", post(save))
        .route("/sessions/:user_id/summary", get(summary))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DiagnosisView {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct GroupView {
    pub id: String,
    pub name: String,
    pub diagnoses: Vec<DiagnosisView>,
    pub subgroups: Vec<GroupView>,
    pub collapsed: bool,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SuggestionView {
    pub id: String,
    pub name: String,
    pub diagnoses: Vec<DiagnosisView>,
    /// Position of this suggestion in the catalog.
    pub index: usize,
    pub total: usize,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SessionView {
    pub user_id: String,
    pub confirmed_groups: Vec<GroupView>,
    pub unsorted_diagnoses: Vec<DiagnosisView>,
    pub current_suggestion: Option<SuggestionView>,
    pub suggestions_remaining: usize,
    pub can_undo: bool,
    /// Result of the most recent write: `remote`, `fallback_cache` or `failed`.
    pub last_save: Option<String>,
    pub warning: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CreateGroupReq {
    pub name: String,
    #[serde(default)]
    pub diagnosis_ids: Vec<String>,
    /// Create an empty group; fails if the name is taken instead of merging.
    #[serde(default)]
    pub empty: bool,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SubgroupReq {
    pub name: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SubgroupRes {
    pub group_id: String,
    pub session: SessionView,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReorderReq {
    pub order: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct MoveReq {
    pub diagnosis_id: String,
    pub target_group_id: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AcceptReq {
    /// New name for the group; the suggestion's name is used when absent or blank.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SaveRes {
    pub outcome: String,
    pub warning: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SummaryRes {
    pub user_id: String,
    pub group_count: usize,
    pub subgroup_count: usize,
    pub confirmed_diagnosis_count: usize,
    pub unsorted_count: usize,
    pub suggestions_remaining: usize,
    pub complete: bool,
    pub generated_at: String,
}

fn diagnosis_view(diagnosis: &Diagnosis) -> DiagnosisView {
    DiagnosisView {
        id: diagnosis.id.clone(),
        name: diagnosis.name.clone(),
        description: diagnosis.description.clone(),
    }
}

fn group_view(group: &Group) -> GroupView {
    GroupView {
        id: group.id.to_string(),
        name: group.name.clone(),
        diagnoses: group.diagnoses.iter().map(diagnosis_view).collect(),
        subgroups: group.subgroups.iter().map(|g| group_view(g)).collect(),
        collapsed: group.collapsed,
    }
}

fn outcome_label(outcome: &SaveOutcome) -> &'static str {
    match outcome {
        SaveOutcome::Remote => "remote",
        SaveOutcome::FallbackCache { .. } => "fallback_cache",
        SaveOutcome::Failed { .. } => "failed",
    }
}

fn session_view(session: &UserSession, warning: Option<String>) -> SessionView {
    let workspace = &session.workspace;
    let suggestions = workspace.suggestions();

    SessionView {
        user_id: workspace.user_id().to_string(),
        confirmed_groups: workspace
            .state()
            .confirmed_groups
            .iter()
            .map(|g| group_view(g))
            .collect(),
        unsorted_diagnoses: workspace
            .state()
            .unsorted_diagnoses
            .iter()
            .map(diagnosis_view)
            .collect(),
        current_suggestion: suggestions.current().map(|s| SuggestionView {
            id: s.id.clone(),
            name: s.name.clone(),
            diagnoses: s.diagnoses.iter().map(diagnosis_view).collect(),
            index: suggestions.current_index(),
            total: suggestions.suggested_groups().len(),
        }),
        suggestions_remaining: suggestions.remaining(),
        can_undo: workspace.can_undo(),
        last_save: session
            .saves
            .last_outcome()
            .map(|o| outcome_label(&o).to_string()),
        warning,
    }
}

fn error_response(e: GroupingError) -> ApiError {
    match e {
        GroupingError::DuplicateName(_) => {
            (StatusCode::CONFLICT, "A group with that name already exists")
        }
        GroupingError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid input"),
        GroupingError::GroupNotFound(_) => (StatusCode::NOT_FOUND, "Group not found"),
        GroupingError::DiagnosisNotFound(_) => (StatusCode::NOT_FOUND, "Diagnosis not found"),
        GroupingError::NoCurrentSuggestion => {
            (StatusCode::CONFLICT, "All suggestions have been processed")
        }
        GroupingError::CatalogRead(_)
        | GroupingError::CatalogParse(_)
        | GroupingError::CatalogFetch(_) => {
            tracing::error!("Catalog error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

fn parse_user_id(raw: &str) -> Result<String, ApiError> {
    validation::validate_user_id(raw)
        .map(str::to_string)
        .map_err(|e| {
            tracing::warn!("Invalid user id: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid user id")
        })
}

fn parse_group_id(raw: &str) -> Result<GroupId, ApiError> {
    GroupId::parse(raw).map_err(|_| (StatusCode::BAD_REQUEST, "Invalid group id"))
}

const SESSION_NOT_OPEN: ApiError = (StatusCode::NOT_FOUND, "Session not open");

async fn open_session_for(state: &AppState, user_id: &str) -> Result<SharedSession, ApiError> {
    let session = state.sessions.lock().await.get(user_id).cloned();
    session.ok_or(SESSION_NOT_OPEN)
}

/// Applies a workspace change for `raw_user_id` and routes the resulting save.
///
/// The session lock is released before an immediate save is awaited.
async fn apply_change<T>(
    state: &AppState,
    raw_user_id: &str,
    change: impl FnOnce(&mut Workspace) -> GroupingResult<(T, SaveHint)>,
) -> Result<(T, SessionView), ApiError> {
    let user_id = parse_user_id(raw_user_id)?;
    let session = open_session_for(state, &user_id).await?;

    let (value, hint, snapshot, saves, mut view) = {
        let mut session = session.lock().await;
        let (value, hint) = change(&mut session.workspace).map_err(|e| {
            tracing::debug!("Rejected change for {}: {}", user_id, e);
            error_response(e)
        })?;
        let snapshot = session.workspace.state().clone();
        let view = session_view(&session, None);
        (value, hint, snapshot, session.saves.clone(), view)
    };

    if let Some(outcome) = saves.apply(hint, &snapshot).await {
        view.last_save = Some(outcome_label(&outcome).to_string());
        view.warning = outcome.warning().map(str::to_string);
    }

    Ok((value, view))
}

async fn apply_hint(
    state: &AppState,
    raw_user_id: &str,
    change: impl FnOnce(&mut Workspace) -> GroupingResult<SaveHint>,
) -> Result<Json<SessionView>, ApiError> {
    let ((), view) = apply_change(state, raw_user_id, |ws| Ok(((), change(ws)?))).await?;
    Ok(Json(view))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "DXG REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/sessions/{user_id}",
    params(("user_id" = String, Path, description = "Computing id of the user")),
    responses(
        (status = 200, description = "Session opened", body = SessionView),
        (status = 400, description = "Invalid user id")
    )
)]
/// Open (load) a user's session
///
/// Loads the stored session from remote storage or the local cache and reconciles it against
/// the catalog. Opening a session that is already open returns it unchanged.
#[axum::debug_handler]
async fn open_session(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
) -> Result<Json<SessionView>, ApiError> {
    let user_id = parse_user_id(&user_id)?;

    if let Ok(session) = open_session_for(&state, &user_id).await {
        let session = session.lock().await;
        return Ok(Json(session_view(&session, None)));
    }

    let loaded = state.store.load(&user_id).await;
    tracing::info!("Opened session for {} from {:?}", user_id, loaded.source);

    if let Err(e) = state.store.remember_user_id(&user_id) {
        tracing::warn!("Failed to remember user id: {}", e);
    }

    let (session, warning) = match state.sessions.lock().await.entry(user_id.clone()) {
        Entry::Occupied(opened) => {
            tracing::debug!("Session for {} was opened concurrently", user_id);
            (opened.get().clone(), None)
        }
        Entry::Vacant(slot) => {
            let saves =
                SaveQueue::spawn(state.store.clone(), user_id.clone(), state.cfg.save_debounce());
            let session = UserSession {
                workspace: Workspace::new(
                    user_id.clone(),
                    loaded.state,
                    state.catalog.as_ref().clone(),
                    state.cfg.undo_capacity(),
                ),
                saves: saves.handle(),
            };
            let session = slot.insert(Arc::new(Mutex::new(session))).clone();
            (session, loaded.warning)
        }
    };

    let session = session.lock().await;
    Ok(Json(session_view(&session, warning)))
}

#[utoipa::path(
    get,
    path = "/sessions/{user_id}",
    params(("user_id" = String, Path, description = "Computing id of the user")),
    responses(
        (status = 200, description = "Current session", body = SessionView),
        (status = 404, description = "Session not open")
    )
)]
#[axum::debug_handler]
async fn view_session(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
) -> Result<Json<SessionView>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let session = open_session_for(&state, &user_id).await?;
    let session = session.lock().await;
    Ok(Json(session_view(&session, None)))
}

#[utoipa::path(
    delete,
    path = "/sessions/{user_id}",
    params(("user_id" = String, Path, description = "Computing id of the user")),
    responses(
        (status = 204, description = "Stored session cleared"),
        (status = 400, description = "Invalid user id")
    )
)]
/// Clear a user's stored data
///
/// Closes the session if it is open, removes every cached copy and overwrites the remote copy
/// with an empty session.
#[axum::debug_handler]
async fn reset_session(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    close_open_session(&state, &user_id).await;

    let outcome = state.store.clear(&user_id).await;
    if let Some(warning) = outcome.warning() {
        tracing::warn!("Reset for {}: {}", user_id, warning);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Removes the session from the open set and flushes its pending save.
///
/// Returns `false` if the session was not open.
async fn close_open_session(state: &AppState, user_id: &str) -> bool {
    let open = state.sessions.lock().await.remove(user_id);
    let Some(session) = open else {
        return false;
    };

    let saves = session.lock().await.saves.clone();
    saves.close().await;
    tracing::info!("Closed session for {}", user_id);
    true
}

#[utoipa::path(
    post,
    path = "/sessions/{user_id}/close",
    params(("user_id" = String, Path, description = "Computing id of the user")),
    responses(
        (status = 204, description = "Pending changes written and session closed"),
        (status = 400, description = "Invalid user id"),
        (status = 404, description = "Session not open")
    )
)]
/// Close a user's session
///
/// Writes any pending change and releases the session. Stored data is kept; opening the session
/// again reloads it.
#[axum::debug_handler]
async fn close_session(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    if close_open_session(&state, &user_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(SESSION_NOT_OPEN)
    }
}

#[utoipa::path(
    post,
    path = "/sessions/{user_id}/groups",
    params(("user_id" = String, Path, description = "Computing id of the user")),
    request_body = CreateGroupReq,
    responses(
        (status = 200, description = "Group created or merged", body = SessionView),
        (status = 400, description = "Empty name"),
        (status = 404, description = "Session not open or diagnosis not found"),
        (status = 409, description = "Name already taken (empty groups only)")
    )
)]
/// Create a top-level group, or merge diagnoses into an existing one
#[axum::debug_handler]
async fn create_group(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
    Json(req): Json<CreateGroupReq>,
) -> Result<Json<SessionView>, ApiError> {
    apply_hint(&state, &user_id, |ws| {
        if req.empty {
            ws.create_empty_group(&req.name)
        } else {
            ws.create_or_merge_group(&req.name, &req.diagnosis_ids)
        }
    })
    .await
}

#[utoipa::path(
    post,
    path = "/sessions/{user_id}/groups/{group_id}/subgroups",
    params(
        ("user_id" = String, Path, description = "Computing id of the user"),
        ("group_id" = String, Path, description = "Parent group id")
    ),
    request_body = SubgroupReq,
    responses(
        (status = 200, description = "Subgroup added", body = SubgroupRes),
        (status = 400, description = "Empty name"),
        (status = 404, description = "Session or parent group not found")
    )
)]
#[axum::debug_handler]
async fn add_subgroup(
    State(state): State<AppState>,
    AxumPath((user_id, group_id)): AxumPath<(String, String)>,
    Json(req): Json<SubgroupReq>,
) -> Result<Json<SubgroupRes>, ApiError> {
    let parent = parse_group_id(&group_id)?;
    let (created, session) =
        apply_change(&state, &user_id, |ws| ws.add_subgroup(&parent, &req.name)).await?;

    Ok(Json(SubgroupRes {
        group_id: created.to_string(),
        session,
    }))
}

#[utoipa::path(
    put,
    path = "/sessions/{user_id}/groups/{group_id}/subgroups",
    params(
        ("user_id" = String, Path, description = "Computing id of the user"),
        ("group_id" = String, Path, description = "Parent group id")
    ),
    request_body = ReorderReq,
    responses(
        (status = 200, description = "Subgroups reordered", body = SessionView),
        (status = 400, description = "Order is not a permutation of the current subgroups"),
        (status = 404, description = "Session or parent group not found")
    )
)]
#[axum::debug_handler]
async fn reorder_subgroups(
    State(state): State<AppState>,
    AxumPath((user_id, group_id)): AxumPath<(String, String)>,
    Json(req): Json<ReorderReq>,
) -> Result<Json<SessionView>, ApiError> {
    let parent = parse_group_id(&group_id)?;
    let order = req
        .order
        .iter()
        .map(|id| parse_group_id(id))
        .collect::<Result<Vec<_>, _>>()?;

    apply_hint(&state, &user_id, |ws| ws.reorder_subgroups(&parent, &order)).await
}

#[utoipa::path(
    post,
    path = "/sessions/{user_id}/groups/{group_id}/collapse",
    params(
        ("user_id" = String, Path, description = "Computing id of the user"),
        ("group_id" = String, Path, description = "Group id")
    ),
    responses(
        (status = 200, description = "Collapsed state toggled", body = SessionView),
        (status = 404, description = "Session or group not found")
    )
)]
#[axum::debug_handler]
async fn toggle_collapse(
    State(state): State<AppState>,
    AxumPath((user_id, group_id)): AxumPath<(String, String)>,
) -> Result<Json<SessionView>, ApiError> {
    let group = parse_group_id(&group_id)?;
    apply_hint(&state, &user_id, |ws| ws.toggle_collapse(&group)).await
}

#[utoipa::path(
    delete,
    path = "/sessions/{user_id}/groups/{group_id}",
    params(
        ("user_id" = String, Path, description = "Computing id of the user"),
        ("group_id" = String, Path, description = "Group id")
    ),
    responses(
        (status = 200, description = "Group deleted, diagnoses moved to unsorted", body = SessionView),
        (status = 404, description = "Session or group not found")
    )
)]
#[axum::debug_handler]
async fn delete_group(
    State(state): State<AppState>,
    AxumPath((user_id, group_id)): AxumPath<(String, String)>,
) -> Result<Json<SessionView>, ApiError> {
    let group = parse_group_id(&group_id)?;
    apply_hint(&state, &user_id, |ws| ws.delete_group(&group)).await
}

#[utoipa::path(
    post,
    path = "/sessions/{user_id}/moves",
    params(("user_id" = String, Path, description = "Computing id of the user")),
    request_body = MoveReq,
    responses(
        (status = 200, description = "Diagnosis moved", body = SessionView),
        (status = 404, description = "Session, diagnosis or target group not found")
    )
)]
/// Move a diagnosis into a group (the drop of a drag-and-drop)
#[axum::debug_handler]
async fn move_diagnosis(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
    Json(req): Json<MoveReq>,
) -> Result<Json<SessionView>, ApiError> {
    let target = parse_group_id(&req.target_group_id)?;
    apply_hint(&state, &user_id, |ws| {
        ws.move_diagnosis(&req.diagnosis_id, &target)
    })
    .await
}

#[utoipa::path(
    post,
    path = "/sessions/{user_id}/suggestions/accept",
    params(("user_id" = String, Path, description = "Computing id of the user")),
    request_body = AcceptReq,
    responses(
        (status = 200, description = "Suggestion confirmed as a group", body = SessionView),
        (status = 404, description = "Session not open"),
        (status = 409, description = "No suggestion left")
    )
)]
#[axum::debug_handler]
async fn accept_suggestion(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
    Json(req): Json<AcceptReq>,
) -> Result<Json<SessionView>, ApiError> {
    apply_hint(&state, &user_id, |ws| {
        ws.accept_current_suggestion(req.name.as_deref())
    })
    .await
}

#[utoipa::path(
    post,
    path = "/sessions/{user_id}/suggestions/dismiss",
    params(("user_id" = String, Path, description = "Computing id of the user")),
    responses(
        (status = 200, description = "Suggestion dismissed, diagnoses moved to unsorted", body = SessionView),
        (status = 404, description = "Session not open"),
        (status = 409, description = "No suggestion left")
    )
)]
#[axum::debug_handler]
async fn dismiss_suggestion(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
) -> Result<Json<SessionView>, ApiError> {
    apply_hint(&state, &user_id, |ws| ws.dismiss_current_suggestion()).await
}

#[utoipa::path(
    post,
    path = "/sessions/{user_id}/undo",
    params(("user_id" = String, Path, description = "Computing id of the user")),
    responses(
        (status = 200, description = "Last change undone; `warning` is set when there was nothing to undo", body = SessionView),
        (status = 404, description = "Session not open")
    )
)]
#[axum::debug_handler]
async fn undo(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
) -> Result<Json<SessionView>, ApiError> {
    let (undone, mut view) = apply_change(&state, &user_id, |ws| {
        Ok(match ws.undo() {
            Some(hint) => (true, hint),
            None => (false, SaveHint::None),
        })
    })
    .await?;

    if !undone {
        view.warning = Some("nothing to undo".into());
    }
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/sessions/{user_id}/save",
    params(("user_id" = String, Path, description = "Computing id of the user")),
    responses(
        (status = 200, description = "Session written", body = SaveRes),
        (status = 404, description = "Session not open")
    )
)]
/// Save now, bypassing the quiet period
#[axum::debug_handler]
async fn save(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
) -> Result<Json<SaveRes>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let session = open_session_for(&state, &user_id).await?;

    let (snapshot, saves) = {
        let mut session = session.lock().await;
        session.workspace.mark_saved();
        (session.workspace.state().clone(), session.saves.clone())
    };
    let outcome = saves.save_now(snapshot).await;

    Ok(Json(SaveRes {
        outcome: outcome_label(&outcome).to_string(),
        warning: outcome.warning().map(str::to_string),
    }))
}

#[utoipa::path(
    get,
    path = "/sessions/{user_id}/summary",
    params(("user_id" = String, Path, description = "Computing id of the user")),
    responses(
        (status = 200, description = "Progress summary", body = SummaryRes),
        (status = 404, description = "Session not open")
    )
)]
#[axum::debug_handler]
async fn summary(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
) -> Result<Json<SummaryRes>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let session = open_session_for(&state, &user_id).await?;

    let summary = session.lock().await.workspace.summary();
    Ok(Json(SummaryRes {
        user_id: summary.user_id,
        group_count: summary.group_count,
        subgroup_count: summary.subgroup_count,
        confirmed_diagnosis_count: summary.confirmed_diagnosis_count,
        unsorted_count: summary.unsorted_count,
        suggestions_remaining: summary.suggestions_remaining,
        complete: summary.complete,
        generated_at: summary.generated_at.to_rfc3339(),
    }))
}
