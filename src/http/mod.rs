//! Stateless HTTP transport
//!
//! Every `POST /mcp` body is dispatched on its own, without a session.

pub mod handlers;
