//! Domain logic for the topic-to-video pipeline.
//!
//! Everything in this crate is free of database dependencies. Callers load
//! job rows, convert them into [`state_machine::JobSnapshot`]s and pass them
//! into the pure functions here; the resulting decisions are written back by
//! the `db` layer.

pub mod action;
pub mod captions;
pub mod error;
pub mod ffmpeg;
pub mod job_events;
pub mod job_status;
pub mod liveness;
pub mod state_machine;
pub mod status_view;
pub mod storage;
pub mod sub_status;
pub mod types;
pub mod validation;
