use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::content::ContentKind;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Backend base URL (overrides the config file and TEACHASSIST_BASE_URL).
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// YAML settings file (defaults to TEACHASSIST_CONFIG when set).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log more to stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the backend is up.
    Health,
    /// List processed documents and their topics.
    Files,
    Upload(UploadArgs),
    Generate(GenerateArgs),
    Download(DownloadArgs),
    /// Generate a quiz and take it in the terminal.
    Quiz(QuizArgs),
    /// Show quiz performance analytics.
    Analytics,
    Chat(ChatArgs),
    /// Interactive session: dashboard, generation, quizzes and chat.
    Shell,
}

/// Upload a curriculum document for topic extraction.
#[derive(Debug, Args)]
pub struct UploadArgs {
    /// PDF, JSON or text file to upload.
    #[arg(long)]
    pub file: PathBuf,
}

/// Generate learning content for one topic of a document.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Document path, file name or title as listed by `files`.
    #[arg(long)]
    pub file: String,

    /// Zero-based topic index.
    #[arg(long, default_value_t = 0)]
    pub topic: usize,

    #[arg(long, value_enum, default_value_t = ContentKind::Plan)]
    pub kind: ContentKind,

    /// Return as soon as the backend accepts a deferred job.
    #[arg(long, default_value_t = false)]
    pub no_wait: bool,

    /// Directory to download the generated file into.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Save a generated file from the backend.
#[derive(Debug, Args)]
pub struct DownloadArgs {
    #[arg(long)]
    pub filename: String,

    #[arg(long)]
    pub out: PathBuf,

    /// Overwrite `out` when it exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct QuizArgs {
    /// Document path, file name or title as listed by `files`.
    #[arg(long)]
    pub file: String,

    /// Zero-based topic index.
    #[arg(long, default_value_t = 0)]
    pub topic: usize,
}

/// Ask the AI tutor. Interactive when no message is given.
#[derive(Debug, Args)]
pub struct ChatArgs {
    #[arg(long)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_defaults_to_plan_for_first_topic() {
        let cli = Cli::parse_from(["teachassist", "generate", "--file", "ch1.json"]);
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.kind, ContentKind::Plan);
        assert_eq!(args.topic, 0);
        assert!(!args.no_wait);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::parse_from([
            "teachassist",
            "files",
            "--base-url",
            "http://10.0.0.2:8000",
            "-vv",
        ]);
        assert_eq!(cli.base_url.as_deref(), Some("http://10.0.0.2:8000"));
        assert_eq!(cli.verbose, 2);
    }
}
