//! Artifact storage layout and the [`ArtifactStore`] abstraction.
//!
//! Artifacts live at `{bucket}/{job_id}/{stem}.{ext}` where the bucket is
//! one of `voiceovers`, `renders`, `scripts`. Jobs reference artifacts by
//! public URL; the store maps its own URLs back to objects.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const BUCKET_VOICEOVERS: &str = "voiceovers";
pub const BUCKET_RENDERS: &str = "renders";
pub const BUCKET_SCRIPTS: &str = "scripts";

/// Every bucket, in the order job artifacts are deleted.
pub const ALL_BUCKETS: &[&str] = &[BUCKET_VOICEOVERS, BUCKET_RENDERS, BUCKET_SCRIPTS];

/// Video container extensions accepted by the manual upload endpoint.
pub const ACCEPTED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm"];

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// The kind of artifact a stage produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Script,
    Voiceover,
    Video,
}

impl ArtifactKind {
    pub fn bucket(self) -> &'static str {
        match self {
            Self::Script => BUCKET_SCRIPTS,
            Self::Voiceover => BUCKET_VOICEOVERS,
            Self::Video => BUCKET_RENDERS,
        }
    }

    /// File stem within the job's directory.
    pub fn stem(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Voiceover => "voiceover",
            Self::Video => "video",
        }
    }

    pub fn default_extension(self) -> &'static str {
        match self {
            Self::Script => "txt",
            Self::Voiceover => "mp3",
            Self::Video => "mp4",
        }
    }
}

/// Object key of an artifact within its bucket: `{job_id}/{stem}.{ext}`.
pub fn artifact_key(job_id: DbId, kind: ArtifactKind, ext: &str) -> String {
    format!("{job_id}/{}.{ext}", kind.stem())
}

/// MIME type for an artifact extension.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Validate an uploaded video's filename and return its normalized
/// extension.
pub fn video_extension(filename: &str) -> Result<&'static str, CoreError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    ACCEPTED_VIDEO_EXTENSIONS
        .iter()
        .find(|accepted| **accepted == ext)
        .copied()
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "Unsupported video file '{filename}'. Must be one of: {}",
                ACCEPTED_VIDEO_EXTENSIONS.join(", ")
            ))
        })
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("unknown bucket '{0}'")]
    UnknownBucket(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("URL is not served by this store: {0}")]
    ForeignUrl(String),
}

/// Where stage executors put artifacts and where the API deletes them from.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `bucket/key`, replacing any existing object, and
    /// return the object's public URL.
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<String, StorageError>;

    /// Store the contents of a local file.
    async fn put_file(&self, bucket: &str, key: &str, path: &Path)
        -> Result<String, StorageError>;

    /// Copy the object behind `url` (as returned by `put`) to `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<(), StorageError>;

    /// Remove every artifact belonging to `job_id`, in every bucket.
    /// Returns the number of objects removed; absent objects are not an
    /// error.
    async fn delete_job_artifacts(&self, job_id: DbId) -> Result<usize, StorageError>;

    /// Public URL of `bucket/key`.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Filesystem-backed store: `{root}/{bucket}/{key}`, served by the API
/// under `public_base_url`.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        if !ALL_BUCKETS.contains(&bucket) {
            return Err(StorageError::UnknownBucket(bucket.to_string()));
        }
        let key_path = Path::new(key);
        let safe = !key.is_empty()
            && key_path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(bucket).join(key_path))
    }

    /// Map one of this store's public URLs back to `(bucket, key)`.
    fn parse_url<'a>(&self, url: &'a str) -> Result<(&'a str, &'a str), StorageError> {
        url.strip_prefix(self.public_base_url.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.split_once('/'))
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("partial");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let path = self.object_path(bucket, key)?;
        self.write_atomic(&path, &bytes).await?;
        tracing::debug!(bucket, key, size = bytes.len(), "Stored artifact");
        Ok(self.public_url(bucket, key))
    }

    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
    ) -> Result<String, StorageError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("partial");
        let size = tokio::fs::copy(source, &tmp).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(bucket, key, size, "Stored artifact from file");
        Ok(self.public_url(bucket, key))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), StorageError> {
        let (bucket, key) = self.parse_url(url)?;
        let path = self.object_path(bucket, key)?;
        match tokio::fs::copy(&path, dest).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(url.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_job_artifacts(&self, job_id: DbId) -> Result<usize, StorageError> {
        let mut removed = 0;
        for bucket in ALL_BUCKETS {
            let dir = self.root.join(bucket).join(job_id.to_string());
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    tokio::fs::remove_file(entry.path()).await?;
                    removed += 1;
                }
            }
            tokio::fs::remove_dir_all(&dir).await?;
        }
        Ok(removed)
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.public_base_url)
    }
}
