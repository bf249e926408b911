//! AquaControl projector: maintenance runs against the PostgreSQL stores.
//!
//! A run either replays the event log into the tank read models or refreshes
//! lagging tank snapshots, then exits.

pub mod config;
pub mod engine;
pub mod error;
