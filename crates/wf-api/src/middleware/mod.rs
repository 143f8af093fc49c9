//! # Pipeline Stages
//!
//! Stages that run before route resolution. Authentication and the
//! authorization policy live in `wf-auth`.

pub mod diagnostics;
pub mod https;
pub mod tracing_layer;
