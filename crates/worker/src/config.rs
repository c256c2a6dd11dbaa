use std::path::PathBuf;
use std::str::FromStr;

use autotube_core::action::Stage;
use autotube_core::liveness::DEFAULT_HEARTBEAT_TTL_SECS;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Which chat-completion API the script stage talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi { api_key: String, model: String },
    Anthropic { api_key: String, model: String },
}

impl LlmProvider {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi { .. } => "openai",
            Self::Anthropic { .. } => "claude",
        }
    }
}

/// OAuth client credentials used to mint YouTube access tokens.
#[derive(Debug, Clone)]
pub struct YoutubeCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Stages this process runs a runner for.
    pub stages: Vec<Stage>,
    /// Prefix of each runner's heartbeat name: `{prefix}-{stage}`.
    pub worker_name: String,
    pub poll_interval_secs: u64,
    pub heartbeat_ttl_secs: i32,
    /// `None` when no API key is configured; the script stage is then
    /// skipped at startup.
    pub llm: Option<LlmProvider>,
    /// `edge-tts` voice; the CLI default is used when unset.
    pub tts_voice: Option<String>,
    pub background_video_dir: PathBuf,
    /// `None` when any of the three YouTube variables is unset.
    pub youtube: Option<YoutubeCredentials>,
    pub storage_root: PathBuf,
    pub public_base_url: String,
    /// Scratch space for downloads and renders.
    pub temp_dir: PathBuf,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                              |
    /// |------------------------------|--------------------------------------|
    /// | `DATABASE_URL`               | required                             |
    /// | `DB_MAX_CONNECTIONS`         | `5`                                  |
    /// | `WORKER_STAGES`              | `script,voiceover,video,upload`      |
    /// | `WORKER_NAME`                | `worker-{pid}`                       |
    /// | `WORKER_POLL_INTERVAL_SECS`  | `10`                                 |
    /// | `WORKER_HEARTBEAT_TTL_SECS`  | `30`                                 |
    /// | `AI_PROVIDER`                | `openai` (`openai` or `claude`)      |
    /// | `OPENAI_API_KEY`             | unset                                |
    /// | `OPENAI_MODEL`               | `gpt-4o-mini`                        |
    /// | `CLAUDE_API_KEY`             | unset                                |
    /// | `CLAUDE_MODEL`               | `claude-3-5-sonnet-20241022`         |
    /// | `EDGE_TTS_VOICE`             | unset                                |
    /// | `BACKGROUND_VIDEO_DIR`       | `./backgrounds`                      |
    /// | `YOUTUBE_CLIENT_ID`          | unset                                |
    /// | `YOUTUBE_CLIENT_SECRET`      | unset                                |
    /// | `YOUTUBE_REFRESH_TOKEN`      | unset                                |
    /// | `STORAGE_ROOT`               | `./storage`                          |
    /// | `PUBLIC_BASE_URL`            | `http://localhost:3000/storage`      |
    /// | `LOCAL_TEMP_DIR`             | system temp dir                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let stages = match std::env::var("WORKER_STAGES") {
            Ok(value) => parse_stages(&value)?,
            Err(_) => Stage::ALL.to_vec(),
        };

        let provider = optional_var("AI_PROVIDER").unwrap_or_else(|| "openai".into());
        let llm = parse_llm_provider(&provider)?;

        let youtube = match (
            optional_var("YOUTUBE_CLIENT_ID"),
            optional_var("YOUTUBE_CLIENT_SECRET"),
            optional_var("YOUTUBE_REFRESH_TOKEN"),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                Some(YoutubeCredentials {
                    client_id,
                    client_secret,
                    refresh_token,
                })
            }
            _ => None,
        };

        let public_base_url = optional_var("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000/storage".into());

        Ok(Self {
            database_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 5)?,
            stages,
            worker_name: optional_var("WORKER_NAME")
                .unwrap_or_else(|| format!("worker-{}", std::process::id())),
            poll_interval_secs: parse_var("WORKER_POLL_INTERVAL_SECS", 10)?,
            heartbeat_ttl_secs: parse_var(
                "WORKER_HEARTBEAT_TTL_SECS",
                DEFAULT_HEARTBEAT_TTL_SECS as i32,
            )?,
            llm,
            tts_voice: optional_var("EDGE_TTS_VOICE"),
            background_video_dir: optional_var("BACKGROUND_VIDEO_DIR")
                .unwrap_or_else(|| "./backgrounds".into())
                .into(),
            youtube,
            storage_root: optional_var("STORAGE_ROOT")
                .unwrap_or_else(|| "./storage".into())
                .into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            temp_dir: optional_var("LOCAL_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        })
    }

    /// Heartbeat name of the runner for `stage`.
    pub fn runner_name(&self, stage: Stage) -> String {
        format!("{}-{}", self.worker_name, stage)
    }
}

/// Parse a comma-separated stage list. Duplicates are dropped.
pub fn parse_stages(value: &str) -> Result<Vec<Stage>, ConfigError> {
    let mut stages = Vec::new();
    for part in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let stage = Stage::from_str_value(part).map_err(|reason| ConfigError::Invalid {
            var: "WORKER_STAGES",
            value: value.to_string(),
            reason,
        })?;
        if !stages.contains(&stage) {
            stages.push(stage);
        }
    }
    if stages.is_empty() {
        return Err(ConfigError::Invalid {
            var: "WORKER_STAGES",
            value: value.to_string(),
            reason: "no stages listed".into(),
        });
    }
    Ok(stages)
}

fn parse_llm_provider(provider: &str) -> Result<Option<LlmProvider>, ConfigError> {
    match provider.trim().to_ascii_lowercase().as_str() {
        "openai" => Ok(optional_var("OPENAI_API_KEY").map(|api_key| LlmProvider::OpenAi {
            api_key,
            model: optional_var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".into()),
        })),
        "claude" | "anthropic" => {
            Ok(optional_var("CLAUDE_API_KEY").map(|api_key| LlmProvider::Anthropic {
                api_key,
                model: optional_var("CLAUDE_MODEL")
                    .unwrap_or_else(|| "claude-3-5-sonnet-20241022".into()),
            }))
        }
        _ => Err(ConfigError::Invalid {
            var: "AI_PROVIDER",
            value: provider.to_string(),
            reason: "expected 'openai' or 'claude'".into(),
        }),
    }
}

/// A set, non-blank environment variable.
fn optional_var(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
