// Library exports so integration tests and embedders can drive the engine
// without going through the binary.

// ===== Content engine =====
pub mod blockio;
pub mod cache;
pub mod directive;
pub mod expr;
pub mod forwarders;
pub mod generators;

// ===== Request pipeline =====
pub mod handlers;
pub mod pipeline;
pub mod registry;
pub mod serve;

// ===== Server =====
pub mod config;
pub mod error;
pub mod server;
