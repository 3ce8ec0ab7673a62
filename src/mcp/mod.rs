//! Model Context Protocol (MCP) server handling and JSON-RPC implementations
//!
//! Provides protocol-level specifics surrounding JSON-RPC validation, negotiation,
//! session lifecycle, formatting, and routing.

pub mod methods;
pub mod rpc;
pub mod server;
pub mod session;
