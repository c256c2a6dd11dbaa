//! Fine-grained progress markers within a stage.
//!
//! Observability only: nothing in the state machine branches on these.

use serde::{Deserialize, Serialize};

use crate::action::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubStatus {
    GeneratingTitleDescription,
    GeneratingScript,
    UploadingScript,
    GeneratingAudio,
    UploadingVoiceover,
    FetchingVoiceover,
    RenderingVideo,
    UploadingRender,
    FetchingVideo,
    UploadingToYoutube,
}

impl SubStatus {
    pub const ALL: [SubStatus; 10] = [
        Self::GeneratingTitleDescription,
        Self::GeneratingScript,
        Self::UploadingScript,
        Self::GeneratingAudio,
        Self::UploadingVoiceover,
        Self::FetchingVoiceover,
        Self::RenderingVideo,
        Self::UploadingRender,
        Self::FetchingVideo,
        Self::UploadingToYoutube,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneratingTitleDescription => "generating_title_description",
            Self::GeneratingScript => "generating_script",
            Self::UploadingScript => "uploading_script",
            Self::GeneratingAudio => "generating_audio",
            Self::UploadingVoiceover => "uploading_voiceover",
            Self::FetchingVoiceover => "fetching_voiceover",
            Self::RenderingVideo => "rendering_video",
            Self::UploadingRender => "uploading_render",
            Self::FetchingVideo => "fetching_video",
            Self::UploadingToYoutube => "uploading_to_youtube",
        }
    }

    pub fn from_str_value(s: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|sub| sub.as_str() == s)
            .ok_or_else(|| format!("Invalid sub-status '{s}'"))
    }

    /// The stage that reports this marker.
    pub fn stage(&self) -> Stage {
        match self {
            Self::GeneratingTitleDescription | Self::GeneratingScript | Self::UploadingScript => {
                Stage::Script
            }
            Self::GeneratingAudio | Self::UploadingVoiceover => Stage::Voiceover,
            Self::FetchingVoiceover | Self::RenderingVideo | Self::UploadingRender => Stage::Video,
            Self::FetchingVideo | Self::UploadingToYoutube => Stage::Upload,
        }
    }
}

impl std::fmt::Display for SubStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_values_round_trip() {
        for sub in SubStatus::ALL {
            assert_eq!(SubStatus::from_str_value(sub.as_str()), Ok(sub));
        }
    }

    #[test]
    fn unknown_sub_status_rejected() {
        assert!(SubStatus::from_str_value("thinking").is_err());
    }

    #[test]
    fn every_stage_reports_at_least_one_marker() {
        for stage in Stage::ALL {
            assert!(SubStatus::ALL.iter().any(|s| s.stage() == stage), "{stage}");
        }
    }

    #[test]
    fn audio_generation_precedes_voiceover_upload_within_stage() {
        assert_eq!(SubStatus::GeneratingAudio.stage(), Stage::Voiceover);
        assert_eq!(SubStatus::UploadingVoiceover.stage(), Stage::Voiceover);
    }
}
