//! One [`StageExecutor`](crate::executor::StageExecutor) per pipeline stage.

pub mod script;
pub mod upload;
pub mod video;
pub mod voiceover;

pub use script::ScriptExecutor;
pub use upload::UploadExecutor;
pub use video::VideoExecutor;
pub use voiceover::VoiceoverExecutor;
