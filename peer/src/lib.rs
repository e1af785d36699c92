//! # Asteroids Peer Library
//!
//! This library provides everything one player's process needs to take part in
//! a LAN game of asteroids: the fixed-step simulation, the multiplayer session
//! rules and the TCP networking that connects peers.
//!
//! ## Architecture Overview
//!
//! Every peer runs the same code in one of three roles. A standalone peer plays
//! alone. A host plays and also owns the shared parts of the world for up to
//! three clients. A client plays its own ship and mirrors everything else from
//! the host.
//!
//! ### Host Authority
//! Only the host populates the asteroid field, resolves collisions, scores and
//! advances levels. Clients integrate locally between updates so motion stays
//! smooth, then overwrite their field with each snapshot the host sends.
//!
//! ### Single Writer
//! One task owns the whole game state. Network readers, the accept loop, the
//! dialer and the command queue only send events to it, so nothing is ever
//! locked and ticks are strictly ordered.
//!
//! ### Simulation Clock
//! Time inside the game is a counter advanced by each tick. Timers for respawns,
//! level starts and the game-over banner run on that counter, so pausing the
//! game pauses them too.
//!
//! ## Module Organization
//!
//! ### Simulation (`simulation`, `roster`, `field`, `level`, `timers`)
//! - Ship, asteroid and bullet integration and collision resolution
//! - Player slots, asteroid field and level progression
//! - Respawn with safe-haven checks, extra lives and game over
//!
//! ### Session (`session`)
//! - Authority rules for every message type
//! - Join handshake and slot assignment
//! - Per-tick state exchange between host and clients
//!
//! ### Networking (`network`, `connection`, `connection_manager`)
//! - Admission-controlled accept loop and dialer
//! - Line-oriented reader and writer tasks per connection
//! - The node task tying input, ticks and I/O together
//!
//! ### Presentation (`view`, `audio`, `config`)
//! - Serializable snapshot of the world for renderers
//! - Audio cues with sound and music preferences
//! - Command line options and persisted settings
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use peer::config::{NodeConfig, Settings};
//! use peer::network::{Command, Node};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (node, handle) = Node::new(NodeConfig::default(), Settings::default(), None);
//!     let task = tokio::spawn(node.run());
//!
//!     // Wait for players and start as soon as the first one is in
//!     handle.commands.send(Command::Host).ok();
//!     handle.commands.send(Command::Start).ok();
//!
//!     task.await.ok();
//! }
//! ```

pub mod audio;
pub mod config;
pub mod connection;
pub mod connection_manager;
pub mod field;
pub mod level;
pub mod network;
pub mod roster;
pub mod session;
pub mod simulation;
pub mod timers;
pub mod view;
