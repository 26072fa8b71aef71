//! # Crowd Maze Server Library
//!
//! This library provides the authoritative server for a crowd-voted maze game.
//! Any number of participants vote on a direction; once per round the server
//! resolves the vote, moves a single shared token through the maze and
//! broadcasts the resulting state to everyone.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Game State
//! The server owns the only copy of the maze, the token position, the vote
//! counts and the round timer. Clients never modify state directly; they
//! send votes and receive snapshots.
//!
//! ### Round Timing
//! A one-second tick drives a small state machine: a voting countdown, a
//! short pause once the exit is reached, then a fresh maze.
//!
//! ### State Broadcasting
//! Every tick and every accepted vote produces a full snapshot that is fanned
//! out to all connected sessions.
//!
//! ## Architecture Design
//!
//! ### Single-Writer Event Loop
//! All mutations (votes, clock ticks, joins and leaves) are processed one at
//! a time by the server loop in [`network::Server::run`]. Network receive,
//! network send and timeout detection run as separate tasks that only talk
//! to the loop through channels.
//!
//! ### UDP-Based Communication
//! Clients speak a small bincode-encoded packet protocol over UDP (see
//! `crowdmaze_shared::Packet`). Sessions are tracked per address and dropped
//! after a period of silence.
//!
//! ### HTTP Polling
//! Clients that cannot hold a UDP session can poll `GET /api/game-state` and
//! submit actions with `POST /api/game-state` or `POST /api/vote`. Those
//! requests are routed through the same loop.
//!
//! ## Module Organization
//!
//! - `maze`: randomized depth-first maze carving
//! - `votes`: vote recording and tie-breaking
//! - `movement`: move validation against the maze
//! - `game`: the game state aggregate and snapshots
//! - `round`: the round clock state machine
//! - `broadcast`: the outbound notification trait and an in-memory recorder
//! - `client_manager`: UDP session roster and timeouts
//! - `network`: sockets, background tasks, the packet broadcaster and the server loop
//! - `http`: the polling API
//! - `config`: game settings and validation
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use crowdmaze_server::config::GameSettings;
//! use crowdmaze_server::network::{Server, ServerOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         GameSettings::default(),
//!         ServerOptions::default(),
//!     )
//!     .await?;
//!
//!     // Runs until a Shutdown message arrives:
//!     // - Receives connect / vote / heartbeat / disconnect packets
//!     // - Ticks the round clock once per second
//!     // - Broadcasts a snapshot after every change
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod client_manager;
pub mod config;
pub mod game;
pub mod http;
pub mod maze;
pub mod movement;
pub mod network;
pub mod round;
pub mod votes;
