//! Corsair Server Library
//!
//! Authoritative real-time backend for a multiplayer pirate action game:
//! one in-process world of players and AI mobs, served over WebTransport.

pub mod config;
pub mod game;
pub mod hub;
pub mod metrics;
pub mod net;
pub mod persistence;
pub mod util;
