//! Tidewatch - terminal client for a directory of live playground sessions
//!
//! This library crate exposes internal modules for integration testing.

pub mod channel;
pub mod config;
pub mod data;
pub mod directory;
pub mod error;
pub mod observation;
pub mod protocol;
pub mod timer;
pub mod tui;
