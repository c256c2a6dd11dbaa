//! Autotube API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! change feed, WebSocket infrastructure) so integration tests and the
//! binary entrypoint can both access them.

pub mod change_feed;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
