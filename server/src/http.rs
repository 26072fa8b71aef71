//! HTTP polling surface
//!
//! A request/response alternative to the UDP protocol for clients that can
//! only poll. Handlers never touch game state themselves: each request is
//! forwarded into the server loop as a [`ServerMessage::Api`] and answered
//! over a oneshot channel, so the single-writer rule still holds.
//!
//! - `GET /api/game-state` -- current snapshot
//! - `POST /api/game-state` -- `{"action": "vote" | "connect" | "disconnect", "direction": ...}`
//! - `POST /api/vote` -- `{"direction": ...}`
//! - `GET /api/game-timer` -- current snapshot, for clients that poll the countdown
//! - `GET /api/state` -- current snapshot; `POST` restarts on a fresh maze when enabled
//!
//! Request bodies are parsed as JSON whatever their content type, since
//! browsers send unload beacons as `text/plain`.

use crate::broadcast::StateBroadcaster;
use crate::network::ServerMessage;
use crate::round::RoundClock;
use crate::votes::VoteError;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use crowdmaze_shared::{GameSnapshot, VoteCounts};
use log::info;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::{Any, CorsLayer};

type LoopSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    Snapshot,
    Vote { direction: String },
    Connect,
    Disconnect,
    Restart,
}

#[derive(Debug)]
pub enum ApiReply {
    Snapshot(GameSnapshot),
    Vote(Result<VoteCounts, VoteError>),
    Players(u32),
}

/// Applies one polling request to the clock. Runs inside the server loop.
pub fn apply_request<B: StateBroadcaster, R: Rng>(
    clock: &mut RoundClock<B, R>,
    request: ApiRequest,
) -> ApiReply {
    match request {
        ApiRequest::Snapshot => ApiReply::Snapshot(clock.snapshot()),
        ApiRequest::Vote { direction } => ApiReply::Vote(clock.vote(&direction)),
        ApiRequest::Connect => ApiReply::Players(clock.participant_joined().connected_players),
        ApiRequest::Disconnect => ApiReply::Players(clock.participant_left()),
        ApiRequest::Restart => ApiReply::Snapshot(clock.restart()),
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid direction")]
    InvalidDirection,
    #[error("Invalid action")]
    InvalidAction,
    #[error("Voting is closed")]
    VotingClosed,
    #[error("Game loop unavailable")]
    Unavailable,
}

impl From<VoteError> for ApiError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::InvalidDirection(_) => ApiError::InvalidDirection,
            VoteError::InvalidPhase(_) => ApiError::VotingClosed,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::InvalidDirection | ApiError::InvalidAction | ApiError::VotingClosed => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionRequest {
    pub action: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoteRequest {
    pub direction: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ActionResponse {
    Voted { success: bool, votes: VoteCounts },
    Players { success: bool, players: u32 },
}

/// Router for the polling API. `allow_restart` enables `POST /api/state`.
pub fn build_router(game_tx: LoopSender, allow_restart: bool) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state_route = if allow_restart {
        get(get_state).post(restart)
    } else {
        get(get_state)
    };

    Router::new()
        .route("/api/game-state", get(get_state).post(post_action))
        .route("/api/vote", post(post_vote))
        .route("/api/game-timer", get(get_state))
        .route("/api/state", state_route)
        .layer(cors)
        .with_state(game_tx)
}

/// Binds `addr` and serves the polling API until the process exits.
pub async fn serve(
    addr: SocketAddr,
    game_tx: LoopSender,
    allow_restart: bool,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP polling API listening on {}", listener.local_addr()?);

    axum::serve(listener, build_router(game_tx, allow_restart)).await
}

async fn submit(game_tx: &LoopSender, request: ApiRequest) -> Result<ApiReply, ApiError> {
    let (reply, response) = oneshot::channel();
    game_tx
        .send(ServerMessage::Api { request, reply })
        .map_err(|_| ApiError::Unavailable)?;
    response.await.map_err(|_| ApiError::Unavailable)
}

/// Parses a JSON body without looking at the content type.
fn parse_body<T: DeserializeOwned>(body: &Bytes, err: ApiError) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|_| err)
}

fn vote_reply(reply: ApiReply) -> Result<Json<ActionResponse>, ApiError> {
    match reply {
        ApiReply::Vote(result) => Ok(Json(ActionResponse::Voted {
            success: true,
            votes: result?,
        })),
        _ => Err(ApiError::Unavailable),
    }
}

async fn get_state(State(game_tx): State<LoopSender>) -> Result<Json<GameSnapshot>, ApiError> {
    match submit(&game_tx, ApiRequest::Snapshot).await? {
        ApiReply::Snapshot(snapshot) => Ok(Json(snapshot)),
        _ => Err(ApiError::Unavailable),
    }
}

async fn restart(State(game_tx): State<LoopSender>) -> Result<Json<GameSnapshot>, ApiError> {
    match submit(&game_tx, ApiRequest::Restart).await? {
        ApiReply::Snapshot(snapshot) => Ok(Json(snapshot)),
        _ => Err(ApiError::Unavailable),
    }
}

async fn post_action(
    State(game_tx): State<LoopSender>,
    body: Bytes,
) -> Result<Json<ActionResponse>, ApiError> {
    let body: ActionRequest = parse_body(&body, ApiError::InvalidAction)?;

    let request = match (body.action.as_deref(), body.direction) {
        (Some("vote"), Some(direction)) if !direction.is_empty() => ApiRequest::Vote { direction },
        (Some("connect"), _) => ApiRequest::Connect,
        (Some("disconnect"), _) => ApiRequest::Disconnect,
        _ => return Err(ApiError::InvalidAction),
    };

    match submit(&game_tx, request).await? {
        ApiReply::Players(players) => Ok(Json(ActionResponse::Players {
            success: true,
            players,
        })),
        reply => vote_reply(reply),
    }
}

async fn post_vote(
    State(game_tx): State<LoopSender>,
    body: Bytes,
) -> Result<Json<ActionResponse>, ApiError> {
    let body: VoteRequest = parse_body(&body, ApiError::InvalidDirection)?;
    let direction = body.direction.ok_or(ApiError::InvalidDirection)?;

    vote_reply(submit(&game_tx, ApiRequest::Vote { direction }).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::RecordingBroadcaster;
    use crate::config::GameSettings;
    use crate::round::TickOutcome;
    use axum::body::Body;
    use axum::http::Request;
    use crowdmaze_shared::{Direction, Grid, Phase, Position, START};
    use serde_json::Value;
    use std::collections::{HashMap, HashSet, VecDeque};
    use tower::ServiceExt;

    type TestClock = RoundClock<RecordingBroadcaster>;

    fn test_clock(round_seconds: u32) -> TestClock {
        let settings = GameSettings {
            round_seconds,
            seed: Some(3),
            ..GameSettings::default()
        };
        RoundClock::new(settings, RecordingBroadcaster::new()).unwrap()
    }

    /// Stands in for the server loop: owns a clock and answers API messages.
    fn spawn_game_loop_with(mut clock: TestClock) -> LoopSender {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let ServerMessage::Api { request, reply } = message {
                    let _ = reply.send(apply_request(&mut clock, request));
                }
            }
        });
        tx
    }

    fn spawn_game_loop() -> LoopSender {
        spawn_game_loop_with(test_clock(60))
    }

    fn router() -> Router {
        build_router(spawn_game_loop(), false)
    }

    /// Directions leading from the start to the exit.
    fn path_to_exit(grid: &Grid, exit: Position) -> Vec<Direction> {
        let mut came_from: HashMap<Position, (Position, Direction)> = HashMap::new();
        let mut seen = HashSet::from([START]);
        let mut queue = VecDeque::from([START]);

        while let Some(current) = queue.pop_front() {
            for direction in Direction::ALL {
                if let Some(next) = current.step(direction, grid.size()) {
                    if grid.is_open(next) && seen.insert(next) {
                        came_from.insert(next, (current, direction));
                        queue.push_back(next);
                    }
                }
            }
        }

        let mut path = Vec::new();
        let mut at = exit;
        while let Some(&(prev, direction)) = came_from.get(&at) {
            path.push(direction);
            at = prev;
        }
        path.reverse();
        path
    }

    /// A clock whose crowd has just walked the token onto the exit.
    fn clock_at_exit() -> TestClock {
        let mut clock = test_clock(1);
        let exit = clock.state().exit;
        let path = path_to_exit(&clock.state().grid, exit);

        let mut outcome = TickOutcome::Counting;
        for direction in path {
            clock.vote(direction.as_str()).unwrap();
            outcome = clock.tick();
        }
        assert_eq!(outcome, TickOutcome::ReachedExit);
        assert_eq!(clock.state().phase, Phase::AtExit);
        clock
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn post_to(uri: &str, content_type: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn post(body: &str) -> Request<Body> {
        post_to("/api/game-state", Some("application/json"), body)
    }

    fn get_from(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_get_snapshot() {
        let (status, json) = send(router(), get_from("/api/game-state")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["timeLeft"], 60);
        assert_eq!(json["phase"], "VOTING");
        assert_eq!(json["playerPos"]["x"], 1);
        assert_eq!(json["exitPos"]["x"], 13);
        assert_eq!(json["atExit"], false);
        assert_eq!(json["maze"][1][1], "open");
        assert_eq!(json["maze"][0][0], "wall");
    }

    #[tokio::test]
    async fn test_game_timer_returns_snapshot() {
        let (status, json) = send(router(), get_from("/api/game-timer")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["timeLeft"], 60);
        assert_eq!(json["maze"].as_array().map(Vec::len), Some(15));
    }

    #[tokio::test]
    async fn test_vote_returns_counts() {
        let router = router();

        let (status, json) = send(router.clone(), post(r#"{"action":"vote","direction":"up"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["votes"]["up"], 1);

        let (_, json) = send(router, post(r#"{"action":"vote","direction":"up"}"#)).await;
        assert_eq!(json["votes"]["up"], 2);
        assert_eq!(json["votes"]["down"], 0);
    }

    #[tokio::test]
    async fn test_vote_route() {
        let router = router();

        let (status, json) = send(
            router.clone(),
            post_to("/api/vote", Some("application/json"), r#"{"direction":"left"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["votes"]["left"], 1);

        for body in [r#"{"direction":"north"}"#, r#"{}"#, r#"{"direction":3}"#, "up"] {
            let (status, json) = send(
                router.clone(),
                post_to("/api/vote", Some("application/json"), body),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
            assert_eq!(json["error"], "Invalid direction");
        }

        let (status, _) = send(router, get_from("/api/vote")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_invalid_direction() {
        let (status, json) = send(router(), post(r#"{"action":"vote","direction":"north"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid direction");
    }

    #[tokio::test]
    async fn test_invalid_action() {
        let router = router();

        let bodies = [
            r#"{"action":"jump"}"#,
            r#"{"action":"vote"}"#,
            r#"{}"#,
            r#"{"action":5}"#,
            r#"{"action":"vote","direction":5}"#,
            "not json",
        ];
        for body in bodies {
            let (status, json) = send(router.clone(), post(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
            assert_eq!(json["error"], "Invalid action");
        }
    }

    #[tokio::test]
    async fn test_body_content_type_ignored() {
        let router = router();

        let (status, json) = send(
            router.clone(),
            post_to("/api/game-state", None, r#"{"action":"connect"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["players"], 1);

        // Unload beacons arrive as text/plain.
        let (status, json) = send(
            router,
            post_to(
                "/api/game-state",
                Some("text/plain;charset=UTF-8"),
                r#"{"action":"disconnect"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["players"], 0);
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let router = router();

        let (status, json) = send(router.clone(), post(r#"{"action":"connect"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["players"], 1);

        let (_, json) = send(router.clone(), post(r#"{"action":"disconnect"}"#)).await;
        assert_eq!(json["players"], 0);

        let (_, json) = send(router, post(r#"{"action":"disconnect"}"#)).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["players"], 0);
    }

    #[tokio::test]
    async fn test_vote_at_exit_is_closed() {
        let router = build_router(spawn_game_loop_with(clock_at_exit()), false);

        let (status, json) = send(router.clone(), post(r#"{"action":"vote","direction":"up"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({ "error": "Voting is closed" }));

        let (status, json) = send(
            router.clone(),
            post_to("/api/vote", Some("application/json"), r#"{"direction":"up"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Voting is closed");

        let (_, json) = send(router, get_from("/api/game-state")).await;
        assert_eq!(json["atExit"], true);
        assert_eq!(json["phase"], "AT_EXIT");
        assert_eq!(json["votes"]["up"], 0);
    }

    #[tokio::test]
    async fn test_restart_route() {
        let game_tx = spawn_game_loop_with(clock_at_exit());

        let (status, _) = send(
            build_router(game_tx.clone(), false),
            post_to("/api/state", None, ""),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let router = build_router(game_tx, true);
        let (status, json) = send(router.clone(), post_to("/api/state", None, "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["phase"], "VOTING");
        assert_eq!(json["atExit"], false);
        assert_eq!(json["playerPos"]["x"], 1);
        assert_eq!(json["playerPos"]["y"], 1);

        let (status, json) = send(router, get_from("/api/state")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["phase"], "VOTING");
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/game-state")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(router(), request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_loop_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let router = build_router(tx, false);

        let (status, json) = send(router, post(r#"{"action":"connect"}"#)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "Game loop unavailable");
    }

    #[test]
    fn test_vote_error_mapping() {
        assert!(matches!(
            ApiError::from(VoteError::InvalidDirection("x".to_string())),
            ApiError::InvalidDirection
        ));
        assert!(matches!(
            ApiError::from(VoteError::InvalidPhase(Phase::AtExit)),
            ApiError::VotingClosed
        ));
    }
}
