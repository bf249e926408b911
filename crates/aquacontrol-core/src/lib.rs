//! AquaControl Core — shared event-sourcing abstractions.
//!
//! This crate defines the stores, records and traits every other crate
//! depends on: the append-only event log, snapshots, read model rows and the
//! aggregate capability. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod event_store;
pub mod read_model;
pub mod retry;
pub mod sink;
pub mod snapshot;
