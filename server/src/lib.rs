//! # Memory Match Server Library
//!
//! Authoritative server for a shared, turn-based memory-matching card game.
//! The server holds the only copy of the game state; clients send intents
//! (join, flip a card, reset, change theme) and render whatever full-state
//! snapshot the server pushes back after each change.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The `GameSession` state machine:
//! - Roster in join order, which is also the turn order
//! - Deck construction from the compiled-in themes with an unbiased shuffle
//! - Reveal and match resolution, scoring, bounded move history
//! - Deferred mismatch resolution through generation-bound tickets, so a
//!   reset that lands while a pair is face-up never touches the new deck
//!
//! Intents produce an `Outcome`: `Applied` (broadcast), `Ignored` (silent
//! misuse such as an out-of-range card) or `Rejected` (ownership or theme
//! errors, reported only to the requester).
//!
//! ### Client Manager Module (`client_manager`)
//! Maps UDP peers to connection-scoped ids, which double as player ids, and
//! times out peers that stop sending heartbeats.
//!
//! ### Network Module (`network`)
//! UDP transport and the main loop. Receiving, sending, timeout sweeps and the
//! mismatch timer run as separate tasks that talk to the main loop over
//! channels; only the main loop mutates the session.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("0.0.0.0:3000", 32).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Known Trade-offs
//!
//! Snapshots include the values of face-down cards; hiding them is up to the
//! client. When a player leaves, the turn index is reduced modulo the new
//! roster size, so the turn may pass to someone other than its holder.

pub mod client_manager;
pub mod game;
pub mod network;
