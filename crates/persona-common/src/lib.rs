pub mod cache;
pub mod embedding;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod mcp_api;
