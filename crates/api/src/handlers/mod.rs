pub mod actions;
pub mod jobs;
pub mod status;
pub mod uploads;
