//! MCP (JSON-RPC over stdio) façade over the retrieval engine.
pub mod server;
pub mod tools;
