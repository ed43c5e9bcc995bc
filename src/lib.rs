//! DCM - Distributed Context Manager
//!
//! The real-time coordination plane for concurrent AI-agent workers:
//! - Relational event model over Postgres with strict lifecycle invariants
//! - NOTIFY-backed pub/sub fan-out onto a WebSocket channel fabric
//! - TTL / stale / stuck cleanup engine
//! - Per-session wave state machine
//! - Feedback-weighted keyword-to-tool routing

pub mod adapters;
pub mod api;
pub mod domain;
pub mod gateway;
pub mod infrastructure;
pub mod services;

pub use domain::{DomainError, DomainResult};
