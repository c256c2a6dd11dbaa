//! Voiceover stage: narrates the script with the `edge-tts` CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use autotube_core::action::Stage;
use autotube_core::storage::{artifact_key, ArtifactKind, ArtifactStore};
use autotube_core::sub_status::SubStatus;
use autotube_db::models::job::{Job, StageOutputs};

use crate::executor::{required_text, ExecutionError, ProgressReporter, StageExecutor};

pub struct VoiceoverExecutor {
    store: Arc<dyn ArtifactStore>,
    voice: Option<String>,
    temp_dir: PathBuf,
}

impl VoiceoverExecutor {
    pub fn new(store: Arc<dyn ArtifactStore>, voice: Option<String>, temp_dir: PathBuf) -> Self {
        Self {
            store,
            voice,
            temp_dir,
        }
    }
}

#[async_trait]
impl StageExecutor for VoiceoverExecutor {
    fn stage(&self) -> Stage {
        Stage::Voiceover
    }

    async fn execute(
        &self,
        job: &Job,
        progress: &dyn ProgressReporter,
    ) -> Result<StageOutputs, ExecutionError> {
        let script = required_text(job.script.as_deref(), "script")?;
        let work = tempfile::Builder::new()
            .prefix(&format!("autotube-voiceover-{}-", job.id))
            .tempdir_in(&self.temp_dir)?;

        progress.report(SubStatus::GeneratingAudio).await;
        let script_path = work.path().join("script.txt");
        tokio::fs::write(&script_path, script).await?;
        let audio_path = work.path().join("voiceover.mp3");
        synthesize(&script_path, &audio_path, self.voice.as_deref()).await?;

        progress.report(SubStatus::UploadingVoiceover).await;
        let kind = ArtifactKind::Voiceover;
        let url = self
            .store
            .put_file(
                kind.bucket(),
                &artifact_key(job.id, kind, kind.default_extension()),
                &audio_path,
            )
            .await?;
        tracing::info!(job_id = job.id, url = %url, "Voiceover stored");

        Ok(StageOutputs {
            voiceover_url: Some(url),
            ..Default::default()
        })
    }
}

/// `edge-tts` arguments for narrating `text_file` into `output`.
pub fn edge_tts_args(text_file: &Path, output: &Path, voice: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "--file".to_string(),
        text_file.to_string_lossy().into_owned(),
        "--write-media".to_string(),
        output.to_string_lossy().into_owned(),
    ];
    if let Some(voice) = voice {
        args.push("--voice".to_string());
        args.push(voice.to_string());
    }
    args
}

async fn synthesize(
    text_file: &Path,
    output: &Path,
    voice: Option<&str>,
) -> Result<(), ExecutionError> {
    let result = tokio::process::Command::new("edge-tts")
        .args(edge_tts_args(text_file, output, voice))
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(|e| ExecutionError::Tts(format!("failed to run edge-tts: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(ExecutionError::Tts(format!(
            "edge-tts exited with {:?}: {}",
            result.status.code(),
            stderr.trim()
        )));
    }

    let size = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(ExecutionError::Tts("edge-tts produced no audio".into()));
    }
    Ok(())
}
