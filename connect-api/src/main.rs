//! Material Connect Web API
//!
//! Hosts one game session over HTTP for a thin browser client, and keeps the
//! player's best score in SQLite. The client maps pointer events to cell
//! indices and posts them to `/select/*`; every response carries the full
//! board so the client never keeps its own copy of the tiles.

mod store;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use connect_core::{Board, EngineError, Extend, Game, Merge};

use crate::store::ScoreStore;

// =============================================================================
// Configuration
// =============================================================================

/// Material Connect game server
#[derive(Parser, Debug)]
#[command(name = "connect-api")]
#[command(about = "Material Connect game session and best-score service", long_about = None)]
#[command(version)]
struct Cli {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// SQLite file for best scores (":memory:" keeps them for this run only)
    #[arg(long, default_value = "data/scores.db")]
    db: PathBuf,

    /// Key the best score is stored under
    #[arg(long, default_value = "local")]
    player: String,

    /// Fixed RNG seed for reproducible deals
    #[arg(long)]
    seed: Option<u64>,
}

// =============================================================================
// Session State
// =============================================================================

/// The game being played plus the best score seen by this server.
struct GameSession {
    game: Game,
    best: u64,
}

impl GameSession {
    fn new(seed: u64, best: u64) -> Self {
        Self {
            game: Game::new(seed),
            best,
        }
    }

    /// Raise the in-memory best. Returns true on a new record.
    fn observe_score(&mut self, score: u64) -> bool {
        if score > self.best {
            self.best = score;
            true
        } else {
            false
        }
    }
}

/// Shared application state
struct AppStateInner {
    session: Mutex<GameSession>,
    store: Option<ScoreStore>,
    player: String,
}

impl AppStateInner {
    fn session(&self) -> MutexGuard<'_, GameSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist a score if a store is configured. Storage trouble is logged,
    /// not returned: the merge has already happened.
    fn persist(&self, score: u64) {
        if let Some(store) = &self.store {
            if let Err(e) = store.submit(&self.player, score) {
                warn!(error = %e, score, "failed to persist best score");
            }
        }
    }
}

type AppState = Arc<AppStateInner>;

// =============================================================================
// Errors
// =============================================================================

#[derive(Error, Debug)]
enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{0}")]
    BadRequest(String),
    #[error("score store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl From<ApiError> for (StatusCode, Json<ErrorModel>) {
    fn from(err: ApiError) -> Self {
        let status = match &err {
            ApiError::Engine(EngineError::AlreadySelecting | EngineError::NotSelecting) => {
                StatusCode::CONFLICT
            }
            ApiError::Engine(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorModel {
                detail: err.to_string(),
            }),
        )
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorModel>)>;

// =============================================================================
// JSON Models
// =============================================================================

#[derive(Serialize, Deserialize, Debug)]
struct GameStateModel {
    /// Tile values, top row first
    board: Vec<Vec<u32>>,
    score: u64,
    best: u64,
    moves: u32,
    game_over: bool,
    selecting: bool,
    /// Selected cell indices, first to last
    path: Vec<u8>,
    /// Packed board (decimal u128)
    encoding: String,
}

#[derive(Deserialize)]
struct SelectRequest {
    index: usize,
}

#[derive(Serialize, Deserialize, Debug)]
struct ExtendModel {
    result: Extend,
    state: GameStateModel,
}

#[derive(Serialize, Deserialize, Debug)]
struct EndModel {
    merge: Option<Merge>,
    game_over: bool,
    new_record: bool,
    state: GameStateModel,
}

#[derive(Serialize, Deserialize)]
struct StateModel {
    encoding: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct BestModel {
    player: String,
    best: u64,
}

#[derive(Deserialize)]
struct BestSyncRequest {
    score: u64,
}

#[derive(Serialize)]
struct HealthModel {
    status: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct ErrorModel {
    detail: String,
}

// =============================================================================
// Conversion Functions
// =============================================================================

fn session_to_model(session: &GameSession) -> GameStateModel {
    let game = &session.game;
    GameStateModel {
        board: game.board().rows().map(<[u32]>::to_vec).collect(),
        score: game.score(),
        best: session.best,
        moves: game.moves(),
        game_over: game.is_over(),
        selecting: game.selection().is_active(),
        path: game.selection().path().iter().map(|pos| pos.0).collect(),
        encoding: game.board().encode().to_string(),
    }
}

fn parse_encoding(encoding: &str) -> Result<Board, ApiError> {
    let bits: u128 = encoding
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid encoding: {}", encoding)))?;
    Ok(Board::decode(bits)?)
}

// =============================================================================
// API Endpoints
// =============================================================================

async fn get_game(State(state): State<AppState>) -> Json<GameStateModel> {
    let session = state.session();
    Json(session_to_model(&session))
}

async fn reset_game(State(state): State<AppState>) -> Json<GameStateModel> {
    let mut session = state.session();
    session.game.reset();
    info!("game reset");
    Json(session_to_model(&session))
}

async fn begin_selection(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> ApiResult<GameStateModel> {
    let mut session = state.session();
    session.game.begin(req.index).map_err(ApiError::from)?;
    Ok(Json(session_to_model(&session)))
}

async fn extend_selection(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> ApiResult<ExtendModel> {
    let mut session = state.session();
    let result = session.game.extend(req.index).map_err(ApiError::from)?;
    Ok(Json(ExtendModel {
        result,
        state: session_to_model(&session),
    }))
}

async fn end_selection(State(state): State<AppState>) -> ApiResult<EndModel> {
    let mut session = state.session();
    let outcome = session.game.end().map_err(ApiError::from)?;

    let new_record = outcome.merge.is_some() && session.observe_score(outcome.score);
    if new_record {
        info!(score = outcome.score, "new best score");
        state.persist(outcome.score);
    }
    if outcome.game_over && outcome.merge.is_some() {
        info!(score = outcome.score, moves = session.game.moves(), "game over");
    }

    Ok(Json(EndModel {
        merge: outcome.merge,
        game_over: outcome.game_over,
        new_record,
        state: session_to_model(&session),
    }))
}

async fn cancel_selection(State(state): State<AppState>) -> Json<GameStateModel> {
    let mut session = state.session();
    session.game.cancel();
    Json(session_to_model(&session))
}

async fn export_state(State(state): State<AppState>) -> Json<StateModel> {
    let session = state.session();
    Json(StateModel {
        encoding: session.game.board().encode().to_string(),
    })
}

async fn import_state(
    State(state): State<AppState>,
    Json(req): Json<StateModel>,
) -> ApiResult<GameStateModel> {
    let board = parse_encoding(&req.encoding)?;
    let mut session = state.session();
    let seed = session.game.seed().wrapping_add(1);
    session.game = Game::with_board(board, seed);
    Ok(Json(session_to_model(&session)))
}

async fn get_best(State(state): State<AppState>) -> ApiResult<BestModel> {
    let stored = match &state.store {
        Some(store) => store.best(&state.player).map_err(ApiError::from)?,
        None => 0,
    };
    let mut session = state.session();
    session.observe_score(stored);
    Ok(Json(BestModel {
        player: state.player.clone(),
        best: session.best,
    }))
}

/// Merge a best score held elsewhere (e.g. a cloud copy); the higher one wins.
async fn sync_best(
    State(state): State<AppState>,
    Json(req): Json<BestSyncRequest>,
) -> ApiResult<BestModel> {
    let merged = match &state.store {
        Some(store) => store
            .merge_remote(&state.player, req.score)
            .map_err(ApiError::from)?,
        None => req.score,
    };
    let mut session = state.session();
    session.observe_score(merged);
    Ok(Json(BestModel {
        player: state.player.clone(),
        best: session.best,
    }))
}

async fn health() -> Json<HealthModel> {
    Json(HealthModel {
        status: "ok".to_string(),
    })
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/game", get(get_game))
        .route("/reset", post(reset_game))
        .route("/select/begin", post(begin_selection))
        .route("/select/extend", post(extend_selection))
        .route("/select/end", post(end_selection))
        .route("/select/cancel", post(cancel_selection))
        .route("/state/export", get(export_state))
        .route("/state/import", post(import_state))
        .route("/best", get(get_best))
        .route("/best/sync", post(sync_best))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

fn open_store(path: &Path) -> Option<ScoreStore> {
    let result = if path.as_os_str() == ":memory:" {
        ScoreStore::in_memory()
    } else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(error = %e, path = %parent.display(), "cannot create score directory");
            }
        }
        ScoreStore::open(path)
    };
    match result {
        Ok(store) => {
            info!(path = %path.display(), "opened score store");
            Some(store)
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "failed to open score store - best scores will not persist");
            None
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let store = open_store(&cli.db);
    let best = match &store {
        Some(store) => store.best(&cli.player)?,
        None => 0,
    };
    let seed = cli.seed.unwrap_or_else(rand::random);
    info!(seed, best, player = %cli.player, "starting session");

    let state: AppState = Arc::new(AppStateInner {
        session: Mutex::new(GameSession::new(seed, best)),
        store,
        player: cli.player,
    });

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Material Connect API running on http://{}", addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use connect_core::CELL_COUNT;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state(board: Board) -> AppState {
        Arc::new(AppStateInner {
            session: Mutex::new(GameSession {
                game: Game::with_board(board, 1),
                best: 0,
            }),
            store: Some(ScoreStore::in_memory().unwrap()),
            player: "tester".to_string(),
        })
    }

    /// Top row of 2s, everything else alternating 8/16 by column.
    fn board_with_twos_on_top() -> Board {
        let mut values = [0u32; CELL_COUNT];
        for (i, value) in values.iter_mut().enumerate() {
            *value = if i < 5 { 2 } else if i % 2 == 0 { 8 } else { 16 };
        }
        Board::from_values(values).unwrap()
    }

    async fn send(
        state: &AppState,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state(board_with_twos_on_top());
        let (status, body) = send(&state, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_full_gesture_commits_and_records_best() {
        let state = test_state(board_with_twos_on_top());

        let (status, _) = send(&state, "POST", "/select/begin", Some(serde_json::json!({"index": 0}))).await;
        assert_eq!(status, StatusCode::OK);
        for index in [1, 2] {
            let (status, body) =
                send(&state, "POST", "/select/extend", Some(serde_json::json!({"index": index}))).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["result"], "appended");
        }
        let (_, body) = send(&state, "POST", "/select/extend", Some(serde_json::json!({"index": 9}))).await;
        assert_eq!(body["result"], "ignored");
        assert_eq!(body["state"]["path"], serde_json::json!([0, 1, 2]));

        let (status, body) = send(&state, "POST", "/select/end", None).await;
        assert_eq!(status, StatusCode::OK);
        let end: EndModel = serde_json::from_value(body).unwrap();
        let merge = end.merge.unwrap();
        assert_eq!(merge.total, 6);
        assert_eq!(merge.value, 8);
        assert!(end.new_record);
        assert_eq!(end.state.score, 6);
        assert_eq!(end.state.best, 6);
        assert!(!end.state.selecting);

        let stored = state.store.as_ref().unwrap().best("tester").unwrap();
        assert_eq!(stored, 6);
    }

    #[tokio::test]
    async fn test_out_of_order_events_conflict() {
        let state = test_state(board_with_twos_on_top());
        let (status, body) = send(&state, "POST", "/select/end", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["detail"].as_str().unwrap().contains("no selection"));

        send(&state, "POST", "/select/begin", Some(serde_json::json!({"index": 0}))).await;
        let (status, _) = send(&state, "POST", "/select/begin", Some(serde_json::json!({"index": 1}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_out_of_range_index_is_bad_request() {
        let state = test_state(board_with_twos_on_top());
        let (status, _) = send(&state, "POST", "/select/begin", Some(serde_json::json!({"index": 25}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_single_tile_release_discards() {
        let state = test_state(board_with_twos_on_top());
        let before = state.session().game.board().encode();
        send(&state, "POST", "/select/begin", Some(serde_json::json!({"index": 3}))).await;
        let (_, body) = send(&state, "POST", "/select/end", None).await;
        let end: EndModel = serde_json::from_value(body).unwrap();
        assert!(end.merge.is_none());
        assert!(!end.new_record);
        assert_eq!(end.state.score, 0);
        assert_eq!(end.state.encoding, before.to_string());
    }

    #[tokio::test]
    async fn test_export_import_roundtrip() {
        let state = test_state(board_with_twos_on_top());
        let (_, exported) = send(&state, "GET", "/state/export", None).await;

        send(&state, "POST", "/reset", None).await;
        let (status, body) = send(&state, "POST", "/state/import", Some(exported.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["encoding"], exported["encoding"]);
        assert_eq!(body["board"][0], serde_json::json!([2, 2, 2, 2, 2]));
        assert_eq!(body["score"], 0);
    }

    #[tokio::test]
    async fn test_import_rejects_garbage() {
        let state = test_state(board_with_twos_on_top());
        let (status, _) = send(&state, "POST", "/state/import", Some(serde_json::json!({"encoding": "abc"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&state, "POST", "/state/import", Some(serde_json::json!({"encoding": "0"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_best_sync_takes_higher_score() {
        let state = test_state(board_with_twos_on_top());
        let (_, body) = send(&state, "POST", "/best/sync", Some(serde_json::json!({"score": 500}))).await;
        assert_eq!(body["best"], 500);
        let (_, body) = send(&state, "POST", "/best/sync", Some(serde_json::json!({"score": 100}))).await;
        assert_eq!(body["best"], 500);
        let (_, body) = send(&state, "GET", "/best", None).await;
        assert_eq!(body["best"], 500);
        assert_eq!(body["player"], "tester");
    }
}
