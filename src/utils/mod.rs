//! Shared helpers for agent output parsing and image handling.

pub mod extract;
