//! Interactive terminal front end over [`App`].
//!
//! Each line is one command; the current phase decides what gets rendered
//! after it. Failures are printed as `! alert:` lines and never end the
//! session.

mod chat;
mod interrupt;
mod quiz;
mod terminal;

use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use tokio::io::AsyncBufRead;

use crate::api::TeachingApi;
use crate::app::{App, Phase};
use crate::chat::ChatSession;
use crate::content::{ContentKind, GenerationResult};
use crate::poll::PollPolicy;
use crate::quiz::QuizSession;
use crate::render;
use crate::speech::Speech;

pub use chat::converse;
pub use interrupt::{Armed, Interrupts, Listener};
pub use quiz::{score_screen, take as take_quiz};
pub use terminal::Terminal;

const LANDING: &str = "\
AI Teaching Assistant
Turn curriculum documents into lesson plans, quizzes, practice sets,
flashcards, short videos and curated resources.

Type `start` to open the dashboard, `upload <path>` to add a document,
or `help` for every command.";

const HELP: &str = "\
Commands:
  start                 open the dashboard
  upload <path>         upload and process a document
  files | refresh       reload the document library
  open <file>           select a document (path, file name or title)
  topic <n>             select topic number n
  kind <kind>           plan, quiz, practice, flashcards, video, resources, youtube
  generate [kind]       generate content for the selection (Ctrl-C stops waiting)
  take                  take the generated quiz
  save <path>           download the generated file
  analytics             show quiz performance
  chat                  talk to the AI tutor
  back                  go to the previous screen
  quit                  leave";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Empty,
    Help,
    Quit,
    Start,
    Upload(PathBuf),
    Files,
    Open(String),
    Topic(usize),
    Kind(ContentKind),
    Generate(Option<ContentKind>),
    Take,
    Save(PathBuf),
    Analytics,
    Chat,
    Back,
}

fn parse(line: &str) -> anyhow::Result<Command> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let required = |what: &str| -> anyhow::Result<String> {
        if rest.is_empty() {
            anyhow::bail!("`{word}` needs {what}");
        }
        Ok(rest.to_owned())
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "" => Command::Empty,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "start" => Command::Start,
        "upload" => Command::Upload(PathBuf::from(required("a file path")?)),
        "files" | "refresh" | "library" => Command::Files,
        "open" => Command::Open(required("a document name")?),
        "topic" => {
            let raw = required("a topic number")?;
            let index = raw
                .parse::<usize>()
                .with_context(|| format!("topic number must be a non-negative integer: {raw}"))?;
            Command::Topic(index)
        }
        "kind" => Command::Kind(required("a content kind")?.parse()?),
        "generate" | "gen" => {
            if rest.is_empty() {
                Command::Generate(None)
            } else {
                Command::Generate(Some(rest.parse()?))
            }
        }
        "take" => Command::Take,
        "save" | "download" => Command::Save(PathBuf::from(required("an output path")?)),
        "analytics" | "stats" => Command::Analytics,
        "chat" => Command::Chat,
        "back" => Command::Back,
        other => anyhow::bail!("unknown command `{other}` (try `help`)"),
    };
    Ok(command)
}

pub struct Shell<R, W> {
    api: Arc<dyn TeachingApi>,
    app: App,
    speech: Speech,
    term: Terminal<R, W>,
}

impl<R, W> Shell<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(
        api: Arc<dyn TeachingApi>,
        poll_policy: PollPolicy,
        speech: Speech,
        input: R,
        output: W,
    ) -> Self {
        Self {
            app: App::new(Arc::clone(&api), poll_policy),
            api,
            speech,
            term: Terminal::new(input, output),
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn with_interrupts(self, interrupts: Interrupts) -> Self {
        Self {
            term: self.term.with_interrupts(interrupts),
            ..self
        }
    }

    pub fn interrupts(&self) -> &Interrupts {
        self.term.interrupts()
    }

    pub fn into_output(self) -> W {
        self.term.into_output()
    }

    /// Reads commands until `quit` or end of input.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let api = Arc::clone(&self.api);
        let mut chat = ChatSession::new(api.as_ref());

        self.term.say(LANDING)?;
        loop {
            let label = prompt_label(self.app.phase());
            let Some(line) = self.term.prompt(label).await? else {
                break;
            };
            let command = match parse(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => command,
                Err(err) => {
                    self.term.alert(&err)?;
                    continue;
                }
            };
            tracing::debug!(?command, "shell command");
            if let Err(err) = self.dispatch(command, &mut chat).await {
                self.term.alert(&err)?;
            }
        }
        Ok(())
    }

    async fn dispatch(
        &mut self,
        command: Command,
        chat: &mut ChatSession<'_, dyn TeachingApi>,
    ) -> anyhow::Result<()> {
        match command {
            Command::Empty | Command::Quit => {}
            Command::Help => self.term.say(HELP)?,
            Command::Start => {
                self.app.load_library().await?;
                self.app.open_dashboard();
                self.show_screen()?;
            }
            Command::Upload(path) => {
                self.term
                    .say(&format!("Uploading {} and extracting topics...", path.display()))?;
                let doc = self.app.upload(&path).await?;
                let message = format!("Processed {} ({} topics).", doc.label(), doc.topics.len());
                self.term.say(&message)?;
                self.show_screen()?;
            }
            Command::Files => {
                self.app.load_library().await?;
                self.term.say(&render::library(self.app.library()))?;
            }
            Command::Open(query) => {
                self.app.select_file(&query)?;
                self.show_screen()?;
            }
            Command::Topic(index) => {
                let topic = self.app.select_topic(index)?;
                let message = format!("Topic {index}: {topic}");
                self.term.say(&message)?;
            }
            Command::Kind(kind) => {
                self.app.select_kind(kind);
                self.term.say(&format!("Content: {}", kind.label()))?;
            }
            Command::Generate(kind) => {
                if let Some(kind) = kind {
                    self.app.select_kind(kind);
                }
                self.generate().await?;
            }
            Command::Take => self.run_quiz().await?,
            Command::Save(path) => self.save(&path).await?,
            Command::Analytics => {
                self.app.show_analytics().await?;
                self.show_screen()?;
            }
            Command::Chat => converse(&mut self.term, chat, &self.speech).await?,
            Command::Back => {
                self.app.back();
                self.show_screen()?;
            }
        }
        Ok(())
    }

    async fn generate(&mut self) -> anyhow::Result<()> {
        let kind = self.app.selected_kind();
        let topic = self.app.selected_topic_name().unwrap_or("the document").to_owned();
        self.term.say(&format!(
            "Generating {} for {topic}... (Ctrl-C stops waiting)",
            kind.label().to_lowercase()
        ))?;

        let _armed = self.term.interrupts().arm(self.app.cancel_handle());
        self.app.generate().await?;

        self.show_screen()?;
        match self.app.result() {
            Some(GenerationResult::Quiz { .. }) => self.term.say("Type `take` to start the quiz.")?,
            Some(result) if result.file().is_some() => {
                self.term.say("Type `save <path>` to download it.")?
            }
            _ => {}
        }
        Ok(())
    }

    async fn run_quiz(&mut self) -> anyhow::Result<()> {
        let Some(GenerationResult::Quiz { quiz, .. }) = self.app.result() else {
            anyhow::bail!("generate a quiz first");
        };
        let fallback = self.app.selected_topic_name().unwrap_or("General");
        let session = QuizSession::new(quiz.clone(), fallback)?;

        let Some(result) = take_quiz(&mut self.term, session).await? else {
            return Ok(());
        };
        self.term.say(&score_screen(&result))?;
        self.app.submit_quiz(&result).await?;
        self.term.say("Result saved to your analytics.")
    }

    async fn save(&mut self, path: &Path) -> anyhow::Result<()> {
        let file = self
            .app
            .result()
            .and_then(GenerationResult::file)
            .ok_or_else(|| anyhow::anyhow!("nothing to download; generate a file first"))?;
        let filename = file.filename.clone();
        let out = if path.is_dir() {
            path.join(&filename)
        } else {
            path.to_path_buf()
        };
        let bytes = self.api.download(&filename, &out, false).await?;
        self.term
            .say(&format!("Saved {bytes} bytes to {}", out.display()))
    }

    fn show_screen(&mut self) -> anyhow::Result<()> {
        let screen = self.screen();
        self.term.say(&screen)
    }

    fn screen(&self) -> String {
        match self.app.phase() {
            Phase::Landing => LANDING.to_owned(),
            Phase::Dashboard => self.dashboard(),
            Phase::Generating => "Generating...".to_owned(),
            Phase::Results => match self.app.result() {
                Some(result) => render::generation(result, &|url| self.api.link(url)),
                None => "No results.".to_owned(),
            },
            Phase::DashboardAnalytics => match self.app.analytics() {
                Some(analytics) => render::analytics(analytics),
                None => "No analytics loaded.".to_owned(),
            },
        }
    }

    fn dashboard(&self) -> String {
        let mut out = render::library(self.app.library());
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        match self.app.selected_file() {
            Some(doc) => {
                let _ = writeln!(out, "Selected: {} ({})", doc.label(), doc.filename);
                out.push_str(&render::topics(
                    &doc.topics,
                    Some(self.app.selected_topic()),
                ));
                let _ = writeln!(out, "Content: {}", self.app.selected_kind().label());
            }
            None => out.push_str("Open a document with `open <file>` or upload one.\n"),
        }
        out
    }
}

fn prompt_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Landing => "teachassist",
        Phase::Dashboard => "dashboard",
        Phase::DashboardAnalytics => "analytics",
        Phase::Generating => "generating",
        Phase::Results => "results",
    }
}
