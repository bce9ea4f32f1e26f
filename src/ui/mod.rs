//! Web UI module

pub mod server;
pub mod handlers;
pub mod websocket;

pub use server::{build_router, AppState, WebServer};
