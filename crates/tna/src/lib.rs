//! Training Needs Analysis backend: the training request approval chain, feedback surveys and
//! the notifications they emit.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
