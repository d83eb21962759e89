//! friendterm: live new-account feed and share trading console for the
//! friend.tech shares contract.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod chain;
pub mod services;
pub mod engine;
pub mod console;
