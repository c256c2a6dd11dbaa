//! Script stage: title, description and tags, then the narration script.

use std::sync::Arc;

use async_trait::async_trait;
use autotube_core::action::Stage;
use autotube_core::storage::{artifact_key, ArtifactKind, ArtifactStore};
use autotube_core::sub_status::SubStatus;
use autotube_core::validation::{MAX_DESCRIPTION_LEN, MAX_TAG_LEN, MAX_TITLE_LEN};
use autotube_db::models::job::{Job, StageOutputs};

use crate::executor::{required_text, ExecutionError, ProgressReporter, StageExecutor};
use crate::llm::{Completion, LlmClient};

/// Generated tags kept per video.
pub const MAX_GENERATED_TAGS: usize = 15;

const METADATA_SYSTEM_PROMPT: &str = "You are an expert at creating YouTube titles, \
descriptions, and tags that maximize engagement and SEO.";

const SCRIPT_SYSTEM_PROMPT: &str = "You are an expert YouTube script writer who creates \
engaging, conversational video scripts.";

/// Title, description and tags parsed from the model's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

pub struct ScriptExecutor {
    llm: LlmClient,
    store: Arc<dyn ArtifactStore>,
}

impl ScriptExecutor {
    pub fn new(llm: LlmClient, store: Arc<dyn ArtifactStore>) -> Self {
        Self { llm, store }
    }
}

#[async_trait]
impl StageExecutor for ScriptExecutor {
    fn stage(&self) -> Stage {
        Stage::Script
    }

    async fn execute(
        &self,
        job: &Job,
        progress: &dyn ProgressReporter,
    ) -> Result<StageOutputs, ExecutionError> {
        let topic = required_text(Some(&job.topic), "topic")?;

        progress.report(SubStatus::GeneratingTitleDescription).await;
        let prompt = metadata_prompt(topic);
        let reply = self
            .llm
            .complete(&Completion {
                system: Some(METADATA_SYSTEM_PROMPT),
                prompt: &prompt,
                temperature: 0.7,
                max_tokens: 1000,
            })
            .await?;
        let metadata = parse_metadata(&reply)?;
        tracing::info!(
            job_id = job.id,
            provider = self.llm.provider_name(),
            title = %metadata.title,
            tags = metadata.tags.len(),
            "Generated title and description",
        );

        progress.report(SubStatus::GeneratingScript).await;
        let prompt = script_prompt(topic, &metadata.title);
        let script = self
            .llm
            .complete(&Completion {
                system: Some(SCRIPT_SYSTEM_PROMPT),
                prompt: &prompt,
                temperature: 0.8,
                max_tokens: 2000,
            })
            .await?;
        tracing::info!(job_id = job.id, chars = script.len(), "Generated script");

        progress.report(SubStatus::UploadingScript).await;
        let kind = ArtifactKind::Script;
        self.store
            .put(
                kind.bucket(),
                &artifact_key(job.id, kind, kind.default_extension()),
                script.clone().into_bytes(),
            )
            .await?;

        Ok(StageOutputs {
            script: Some(script),
            title: Some(metadata.title),
            description: Some(metadata.description),
            tags: Some(metadata.tags),
            ..Default::default()
        })
    }
}

pub fn metadata_prompt(topic: &str) -> String {
    format!(
        "Create metadata for a YouTube video about: {topic}\n\
         \n\
         Generate:\n\
         1. A compelling, click-worthy title (under 60 characters)\n\
         2. A detailed description (3-4 paragraphs)\n\
         3. 10-15 relevant tags/keywords\n\
         \n\
         Format your response exactly as:\n\
         TITLE: [title here]\n\
         \n\
         DESCRIPTION:\n\
         [description here]\n\
         \n\
         TAGS:\n\
         tag1, tag2, tag3"
    )
}

pub fn script_prompt(topic: &str, title: &str) -> String {
    format!(
        "Create a compelling YouTube video script about: {topic}\n\
         The video is titled: \"{title}\"\n\
         \n\
         Requirements:\n\
         - Length: 4-5 minutes (approximately 600-800 words)\n\
         - Engaging hook in the first 10 seconds\n\
         - Clear structure with main points\n\
         - Conversational, natural tone\n\
         - Include a call-to-action at the end\n\
         - Format as plain text, no markdown\n\
         - Write as if speaking directly to the camera\n\
         - Use short sentences and paragraphs for better pacing\n\
         \n\
         Script:"
    )
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Description,
    Tags,
}

/// Parse a `TITLE:` / `DESCRIPTION:` / `TAGS:` reply.
///
/// Section headers may carry markdown emphasis and inline content. Tags are
/// comma-separated, de-duplicated case-insensitively and capped at
/// [`MAX_GENERATED_TAGS`]. Values are cut to YouTube's limits.
pub fn parse_metadata(reply: &str) -> Result<GeneratedMetadata, ExecutionError> {
    let mut title = String::new();
    let mut description_lines: Vec<&str> = Vec::new();
    let mut raw_tags: Vec<&str> = Vec::new();
    let mut section = Section::Preamble;

    for line in reply.lines() {
        let bare = line.trim().trim_start_matches(['*', '#', ' ']);
        if let Some(rest) = strip_header(bare, "TITLE:") {
            title = rest.trim().trim_matches('"').to_string();
            section = Section::Preamble;
        } else if let Some(rest) = strip_header(bare, "DESCRIPTION:") {
            section = Section::Description;
            if !rest.trim().is_empty() {
                description_lines.push(rest.trim());
            }
        } else if let Some(rest) = strip_header(bare, "TAGS:") {
            section = Section::Tags;
            raw_tags.extend(rest.split(','));
        } else {
            match section {
                Section::Description => description_lines.push(line.trim()),
                Section::Tags => raw_tags.extend(line.split(',')),
                Section::Preamble => {}
            }
        }
    }

    if title.is_empty() {
        return Err(ExecutionError::MalformedReply(
            "no TITLE line in metadata reply".into(),
        ));
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in raw_tags {
        let tag = tag.trim().trim_start_matches('#').trim();
        if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN {
            continue;
        }
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            tags.push(tag.to_string());
        }
        if tags.len() == MAX_GENERATED_TAGS {
            break;
        }
    }

    Ok(GeneratedMetadata {
        title: truncate_chars(&title, MAX_TITLE_LEN),
        description: truncate_chars(description_lines.join("\n").trim(), MAX_DESCRIPTION_LEN),
        tags,
    })
}

/// `line` without a leading `header` and any markdown emphasis after it.
fn strip_header<'a>(line: &'a str, header: &str) -> Option<&'a str> {
    let head = line.get(..header.len())?;
    if !head.eq_ignore_ascii_case(header) {
        return None;
    }
    Some(line[header.len()..].trim_start_matches(['*', ' ']))
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect::<String>().trim_end().to_string()
}
