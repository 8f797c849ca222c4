//! HTTP API server for the chat client
//!
//! This module provides a REST API over the chat service:
//! - GET /models - Available models
//! - GET /chat/:model/messages - History for a model
//! - POST /chat/:model/messages - Send a prompt
//! - DELETE /chat/:model/messages - Start a new chat
//! - POST /chat/:model/messages/:id/execute-plan - Run a proposed research plan
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
