//! # Memory Match Terminal Client
//!
//! A thin client for the memory-match server. It never decides anything about
//! the game: it forwards typed commands as intents and prints each snapshot
//! the server pushes.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! Parses lines such as `join Ana --theme fruits`, `flip 3`, `reset` or
//! `theme shapes` into commands and maps them onto protocol packets. Card
//! numbers are typed 1-based, as drawn on the board.
//!
//! ### Network Module (`network`)
//! Owns the UDP socket: connection handshake, optional automatic join,
//! one-second heartbeats so the server does not time the connection out, and
//! a `Disconnect` on the way out.
//!
//! ### Rendering Module (`rendering`)
//! Draws the scoreboard with a turn marker, the board with face-down cards
//! masked, and the move history newest first.

pub mod input;
pub mod network;
pub mod rendering;
