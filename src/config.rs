use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

const MAX_BACKOFF: f64 = 10.0;
const MAX_WAIT_SECS: u64 = 24 * 60 * 60;
const MAX_INTERVAL_MS: u64 = 60 * 60 * 1000;

/// Client settings, layered as defaults < YAML file < environment < CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Generation endpoints run synchronously on the backend.
    pub generate_timeout_secs: u64,
    pub poll: PollSettings,
    pub speech: SpeechSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    pub initial_delay_ms: u64,
    pub interval_ms: u64,
    pub backoff: f64,
    pub max_interval_ms: u64,
    pub timeout_secs: u64,
    /// Anything at or below this size is treated as a placeholder.
    pub min_content_length: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeechSettings {
    pub stt_command: Option<String>,
    pub stt_args: Vec<String>,
    pub tts_command: Option<String>,
    pub tts_args: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            request_timeout_secs: 120,
            generate_timeout_secs: 600,
            poll: PollSettings::default(),
            speech: SpeechSettings::default(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2_000,
            interval_ms: 3_000,
            backoff: 1.5,
            max_interval_ms: 30_000,
            timeout_secs: 15 * 60,
            min_content_length: 1024,
        }
    }
}

impl Settings {
    /// Loads settings from `path` (or `TEACHASSIST_CONFIG`) and the process environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("TEACHASSIST_CONFIG").map(PathBuf::from));

        let mut settings = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings
            .apply_env(|key| std::env::var(key).ok())
            .context("apply environment overrides")?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).with_context(|| format!("parse config: {}", path.display()))
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(base_url) = var("TEACHASSIST_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(raw) = var("TEACHASSIST_POLL_TIMEOUT_SECS") {
            self.poll.timeout_secs = raw
                .parse()
                .with_context(|| format!("invalid TEACHASSIST_POLL_TIMEOUT_SECS={raw:?}"))?;
        }
        if let Some(raw) = var("TEACHASSIST_POLL_INTERVAL_MS") {
            self.poll.interval_ms = raw
                .parse()
                .with_context(|| format!("invalid TEACHASSIST_POLL_INTERVAL_MS={raw:?}"))?;
        }
        if let Some(raw) = var("TEACHASSIST_POLL_INITIAL_DELAY_MS") {
            self.poll.initial_delay_ms = raw
                .parse()
                .with_context(|| format!("invalid TEACHASSIST_POLL_INITIAL_DELAY_MS={raw:?}"))?;
        }
        if let Some(command) = var("TEACHASSIST_STT_COMMAND") {
            self.speech.stt_command = Some(command);
        }
        if let Some(command) = var("TEACHASSIST_TTS_COMMAND") {
            self.speech.tts_command = Some(command);
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid base url: {:?}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("base url must be http or https: {}", self.base_url);
        }
        if self.poll.interval_ms == 0 {
            anyhow::bail!("poll.interval_ms must be > 0");
        }
        if !(1.0..=MAX_BACKOFF).contains(&self.poll.backoff) {
            anyhow::bail!(
                "poll.backoff must be between 1.0 and {MAX_BACKOFF} (got {})",
                self.poll.backoff
            );
        }
        if self.poll.max_interval_ms < self.poll.interval_ms {
            anyhow::bail!("poll.max_interval_ms must be >= poll.interval_ms");
        }
        for (name, value) in [
            ("poll.initial_delay_ms", self.poll.initial_delay_ms),
            ("poll.max_interval_ms", self.poll.max_interval_ms),
        ] {
            if value > MAX_INTERVAL_MS {
                anyhow::bail!("{name} must be at most {MAX_INTERVAL_MS} (got {value})");
            }
        }
        for (name, value) in [
            ("poll.timeout_secs", self.poll.timeout_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("generate_timeout_secs", self.generate_timeout_secs),
        ] {
            if value > MAX_WAIT_SECS {
                anyhow::bail!("{name} must be at most {MAX_WAIT_SECS} (got {value})");
            }
        }
        Ok(())
    }

    /// Base URL without a trailing slash, ready for `format!("{base}/path")`.
    pub fn normalized_base_url(&self) -> String {
        self.base_url.trim_end_matches('/').to_owned()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }
}
