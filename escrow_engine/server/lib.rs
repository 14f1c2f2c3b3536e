//! gRPC surface of the escrow engine: wire messages, service endpoints,
//! remote clients for the engine's seams and shared binary configuration.

pub mod client;
pub mod config;
pub mod proto;
pub mod service;
pub mod status;
