//! Audit execution and scoring engine for structured site inspections.
//!
//! The `audits` module owns the session lifecycle, response validation,
//! derived-value resolution, completion gating, scoring, and action-plan
//! generation. `config`, `telemetry`, and `error` carry the service plumbing
//! shared with the API binary.

pub mod audits;
pub mod config;
pub mod error;
pub mod telemetry;
