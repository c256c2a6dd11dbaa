//! Input validation for user-editable job fields and request payloads.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

pub const MAX_TOPIC_LEN: usize = 500;
/// YouTube's title limit.
pub const MAX_TITLE_LEN: usize = 100;
/// YouTube's description limit.
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const MAX_TAGS: usize = 30;
pub const MAX_TAG_LEN: usize = 100;
/// Maximum job ids accepted in one batch request.
pub const MAX_BATCH_JOB_IDS: usize = 500;

// ---------------------------------------------------------------------------
// Privacy status
// ---------------------------------------------------------------------------

pub const PRIVACY_PRIVATE: &str = "private";
pub const PRIVACY_UNLISTED: &str = "unlisted";
pub const PRIVACY_PUBLIC: &str = "public";

pub const VALID_PRIVACY_STATUSES: &[&str] = &[PRIVACY_PRIVATE, PRIVACY_UNLISTED, PRIVACY_PUBLIC];

/// Visibility of the uploaded YouTube video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl PrivacyStatus {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_ascii_lowercase().as_str() {
            PRIVACY_PRIVATE => Ok(Self::Private),
            PRIVACY_UNLISTED => Ok(Self::Unlisted),
            PRIVACY_PUBLIC => Ok(Self::Public),
            _ => Err(CoreError::Validation(format!(
                "Invalid privacy status '{s}'. Must be one of: {}",
                VALID_PRIVACY_STATUSES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => PRIVACY_PRIVATE,
            Self::Unlisted => PRIVACY_UNLISTED,
            Self::Public => PRIVACY_PUBLIC,
        }
    }
}

// ---------------------------------------------------------------------------
// Field validation
// ---------------------------------------------------------------------------

/// Validate a topic and return it trimmed.
pub fn validate_topic(topic: &str) -> Result<String, CoreError> {
    let trimmed = topic.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Topic must not be empty".into()));
    }
    check_len("Topic", trimmed, MAX_TOPIC_LEN)?;
    Ok(trimmed.to_string())
}

pub fn validate_title(title: &str) -> Result<(), CoreError> {
    check_len("Title", title, MAX_TITLE_LEN)
}

pub fn validate_description(description: &str) -> Result<(), CoreError> {
    check_len("Description", description, MAX_DESCRIPTION_LEN)
}

/// Trim, validate, and de-duplicate tags (case-insensitively, keeping the
/// first spelling and the original order).
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, CoreError> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(CoreError::Validation("Tags must not be empty".into()));
        }
        check_len("Tag", tag, MAX_TAG_LEN)?;
        if !out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            out.push(tag.to_string());
        }
    }
    if out.len() > MAX_TAGS {
        return Err(CoreError::Validation(format!(
            "At most {MAX_TAGS} tags are allowed, got {}",
            out.len()
        )));
    }
    Ok(out)
}

/// Parse a tags form field: a JSON array of strings, or a comma-separated
/// list. Blank entries are dropped.
pub fn parse_tags_field(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
            return list
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
    }
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate a batch of job ids, dropping duplicates while keeping order.
pub fn validate_job_ids(ids: &[DbId]) -> Result<Vec<DbId>, CoreError> {
    if ids.is_empty() {
        return Err(CoreError::Validation(
            "At least one job id is required".into(),
        ));
    }
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    if unique.len() > MAX_BATCH_JOB_IDS {
        return Err(CoreError::Validation(format!(
            "At most {MAX_BATCH_JOB_IDS} job ids per request, got {}",
            unique.len()
        )));
    }
    Ok(unique)
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), CoreError> {
    let len = value.chars().count();
    if len > max {
        return Err(CoreError::Validation(format!(
            "{field} must be at most {max} characters, got {len}"
        )));
    }
    Ok(())
}
