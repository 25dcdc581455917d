//! Operational HTTP surface: liveness and readiness only.
//!
//! The authenticated HTTP API, WebSocket fabric, and OpenAPI/Swagger surface
//! are out of scope for a background ingestion worker.

pub mod health;
