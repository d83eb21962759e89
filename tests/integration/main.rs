//! Integration tests for friendterm.
//!
//! Everything runs against in-memory mock services; no network.

mod mock_services;
mod simulation;
mod trading;
