use std::fmt;
use std::str::FromStr;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::model::{Flashcard, QuizPayload, VideoMeta};

/// Every artifact the backend can generate for a topic.
///
/// Adding a variant forces every `match` below (endpoint, payload parsing,
/// rendering) to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Plan,
    Quiz,
    Practice,
    Flashcards,
    Video,
    Resources,
    Youtube,
}

impl ContentKind {
    pub const ALL: [ContentKind; 7] = [
        ContentKind::Plan,
        ContentKind::Quiz,
        ContentKind::Practice,
        ContentKind::Flashcards,
        ContentKind::Video,
        ContentKind::Resources,
        ContentKind::Youtube,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            ContentKind::Plan => "plan",
            ContentKind::Quiz => "quiz",
            ContentKind::Practice => "practice",
            ContentKind::Flashcards => "flashcards",
            ContentKind::Video => "video",
            ContentKind::Resources => "resources",
            ContentKind::Youtube => "youtube",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Plan => "Lesson plan",
            ContentKind::Quiz => "Quiz",
            ContentKind::Practice => "Practice set",
            ContentKind::Flashcards => "Flashcards",
            ContentKind::Video => "Short video",
            ContentKind::Resources => "Curated resources",
            ContentKind::Youtube => "YouTube videos",
        }
    }

    pub fn endpoint(self) -> String {
        format!("/generate/{}", self.slug())
    }

    /// Kinds whose result is a downloadable file rather than inline data.
    pub fn is_file(self) -> bool {
        match self {
            ContentKind::Plan | ContentKind::Practice | ContentKind::Video => true,
            ContentKind::Quiz
            | ContentKind::Flashcards
            | ContentKind::Resources
            | ContentKind::Youtube => false,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        ContentKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == normalized)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unsupported content type: {raw:?}. expected one of: {}",
                    ContentKind::ALL.map(ContentKind::slug).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    pub filename: String,
    /// Backend-relative link, e.g. `/download/Plan_ch1_0.pdf`.
    pub file_url: String,
}

impl FileArtifact {
    pub fn from_filename(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let file_url = format!("/download/{filename}");
        Self { filename, file_url }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Plan(FileArtifact),
    Quiz {
        file: Option<FileArtifact>,
        quiz: QuizPayload,
    },
    Practice(FileArtifact),
    Flashcards(Vec<Flashcard>),
    Video(FileArtifact),
    Resources(Vec<VideoMeta>),
    Youtube(Vec<VideoMeta>),
}

impl GenerationResult {
    pub fn kind(&self) -> ContentKind {
        match self {
            GenerationResult::Plan(_) => ContentKind::Plan,
            GenerationResult::Quiz { .. } => ContentKind::Quiz,
            GenerationResult::Practice(_) => ContentKind::Practice,
            GenerationResult::Flashcards(_) => ContentKind::Flashcards,
            GenerationResult::Video(_) => ContentKind::Video,
            GenerationResult::Resources(_) => ContentKind::Resources,
            GenerationResult::Youtube(_) => ContentKind::Youtube,
        }
    }

    pub fn file(&self) -> Option<&FileArtifact> {
        match self {
            GenerationResult::Plan(file)
            | GenerationResult::Practice(file)
            | GenerationResult::Video(file) => Some(file),
            GenerationResult::Quiz { file, .. } => file.as_ref(),
            GenerationResult::Flashcards(_)
            | GenerationResult::Resources(_)
            | GenerationResult::Youtube(_) => None,
        }
    }

    /// Result for a deferred file job once its output exists.
    pub fn from_ready_file(kind: ContentKind, filename: &str) -> anyhow::Result<Self> {
        let file = FileArtifact::from_filename(filename);
        match kind {
            ContentKind::Plan => Ok(GenerationResult::Plan(file)),
            ContentKind::Practice => Ok(GenerationResult::Practice(file)),
            ContentKind::Video => Ok(GenerationResult::Video(file)),
            ContentKind::Quiz
            | ContentKind::Flashcards
            | ContentKind::Resources
            | ContentKind::Youtube => {
                anyhow::bail!("{kind} results are inline data, not a file")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResponse {
    Ready(GenerationResult),
    /// The backend accepted the job and will write `filename` later.
    Deferred { filename: String },
}

/// Interprets a `/generate/{kind}` response body.
///
/// Any kind may come back as `{status: "processing"}`; video is also
/// treated as deferred whenever it carries a filename but no `file_url`.
pub fn parse_generation_response(
    kind: ContentKind,
    body: &Value,
) -> anyhow::Result<GenerationResponse> {
    if status_of(body) == Some("processing") {
        let filename = deferred_filename(body).ok_or_else(|| {
            anyhow::anyhow!("{kind} job is processing but the response names no output file")
        })?;
        return Ok(GenerationResponse::Deferred { filename });
    }

    if kind == ContentKind::Video
        && str_field(body, "file_url").is_none()
        && let Some(filename) = deferred_filename(body)
    {
        return Ok(GenerationResponse::Deferred { filename });
    }

    parse_payload(kind, body).map(GenerationResponse::Ready)
}

/// Builds the typed result for `kind` from an immediate response or from a
/// deferred job's JSON output.
pub fn parse_payload(kind: ContentKind, body: &Value) -> anyhow::Result<GenerationResult> {
    match kind {
        ContentKind::Plan => file_artifact(body).map(GenerationResult::Plan),
        ContentKind::Practice => file_artifact(body).map(GenerationResult::Practice),
        ContentKind::Video => file_artifact(body).map(GenerationResult::Video),
        ContentKind::Quiz => {
            let file = file_artifact(body).ok();
            let quiz = quiz_payload(body).context("parse quiz payload")?;
            Ok(GenerationResult::Quiz { file, quiz })
        }
        ContentKind::Flashcards => {
            let cards = list_payload(body, &["data", "flashcards", "cards"])
                .context("parse flashcards payload")?;
            Ok(GenerationResult::Flashcards(cards))
        }
        ContentKind::Resources => {
            let videos = list_payload(body, &["data", "resources", "videos", "results"])
                .context("parse resources payload")?;
            Ok(GenerationResult::Resources(videos))
        }
        ContentKind::Youtube => {
            let videos = list_payload(body, &["data", "videos", "results"])
                .context("parse youtube payload")?;
            Ok(GenerationResult::Youtube(videos))
        }
    }
}

fn status_of(body: &Value) -> Option<&str> {
    str_field(body, "status")
}

fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn deferred_filename(body: &Value) -> Option<String> {
    str_field(body, "filename")
        .or_else(|| str_field(body, "json_file"))
        .map(str::to_owned)
}

fn file_artifact(body: &Value) -> anyhow::Result<FileArtifact> {
    match (str_field(body, "filename"), str_field(body, "file_url")) {
        (Some(filename), Some(file_url)) => Ok(FileArtifact {
            filename: filename.to_owned(),
            file_url: file_url.to_owned(),
        }),
        (Some(filename), None) => Ok(FileArtifact::from_filename(filename)),
        (None, Some(file_url)) => {
            let filename = file_url
                .rsplit('/')
                .next()
                .filter(|name| !name.is_empty())
                .ok_or_else(|| anyhow::anyhow!("file_url has no file name: {file_url}"))?;
            Ok(FileArtifact {
                filename: filename.to_owned(),
                file_url: file_url.to_owned(),
            })
        }
        (None, None) => anyhow::bail!("response has neither `filename` nor `file_url`"),
    }
}

fn quiz_payload(body: &Value) -> anyhow::Result<QuizPayload> {
    let data = body.get("data").unwrap_or(body);
    let quiz = match data {
        Value::Array(_) => QuizPayload {
            topic: String::new(),
            class_level: None,
            difficulty: None,
            duration_minutes: None,
            questions: serde_json::from_value(data.clone()).context("parse questions")?,
        },
        _ => serde_json::from_value(data.clone()).context("parse quiz object")?,
    };
    if quiz.questions.is_empty() {
        anyhow::bail!("quiz has no questions");
    }
    Ok(quiz)
}

/// Finds the first array either at the top level or under one of `keys`,
/// looking one object level deep (`{data: {videos: [...]}}`).
fn list_payload<T: serde::de::DeserializeOwned>(
    body: &Value,
    keys: &[&str],
) -> anyhow::Result<Vec<T>> {
    fn find<'a>(value: &'a Value, keys: &[&str], depth: usize) -> Option<&'a Value> {
        if value.is_array() {
            return Some(value);
        }
        for key in keys {
            let Some(inner) = value.get(*key) else {
                continue;
            };
            if inner.is_array() {
                return Some(inner);
            }
            if depth == 0
                && let Some(found) = find(inner, keys, depth + 1)
            {
                return Some(found);
            }
        }
        None
    }

    let list = find(body, keys, 0)
        .ok_or_else(|| anyhow::anyhow!("no list found under any of: {}", keys.join(", ")))?;
    serde_json::from_value(list.clone()).context("deserialize list items")
}
