//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod heartbeat_repo;
pub mod job_repo;
pub mod youtube_video_repo;

pub use heartbeat_repo::HeartbeatRepo;
pub use job_repo::{JobRepo, QueueOutcome};
pub use youtube_video_repo::YoutubeVideoRepo;
