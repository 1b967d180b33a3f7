//! HTTP API surface.

pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{build_router, start_server, AppState};
