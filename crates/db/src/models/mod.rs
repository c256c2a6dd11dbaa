//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus the create/update DTOs for that table.

pub mod heartbeat;
pub mod job;
pub mod youtube_video;
