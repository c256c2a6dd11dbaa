//! Autotube stage workers.
//!
//! One [`runner::StageRunner`] per pipeline stage polls the job table,
//! claims the oldest job queued for its stage, and hands it to that stage's
//! [`executor::StageExecutor`].

pub mod config;
pub mod executor;
pub mod executors;
pub mod llm;
pub mod runner;
pub mod youtube;
