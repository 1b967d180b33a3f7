//! MediAssist: a cache-fronted healthcare question-answering service.
//!
//! Incoming health questions run through an LLM agent pipeline (intent
//! classification, specialist analysis, empathetic responder). Final
//! answers are cached in Redis keyed by a deterministic hash of the
//! normalized query, so repeats inside the TTL window cost no provider
//! calls.

pub mod agents;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod session;
pub mod utils;

pub use error::{MediError, Result};
