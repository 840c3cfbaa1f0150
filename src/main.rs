use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;

use teachassist::api::TeachingApi;
use teachassist::api::client::HttpClient;
use teachassist::cli::{Cli, Command};
use teachassist::commands;
use teachassist::config::Settings;
use teachassist::poll::PollPolicy;
use teachassist::shell::Interrupts;
use teachassist::speech::Speech;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    teachassist::logging::init(cli.verbose).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    let mut settings = Settings::load(cli.config.as_deref()).context("load settings")?;
    if let Some(base_url) = &cli.base_url {
        settings.base_url = base_url.clone();
    }
    settings.validate().context("validate settings")?;
    tracing::debug!(base_url = %settings.base_url, "settings loaded");

    let api: Arc<dyn TeachingApi> =
        Arc::new(HttpClient::new(&settings).context("build backend client")?);
    let policy = PollPolicy::from(&settings.poll);
    let speech = Speech::from_settings(&settings.speech);
    let interrupts = Interrupts::default();
    let _listener = interrupts.listen();

    tokio::select! {
        biased;
        result = run(cli.command, api, policy, speech, &interrupts) => result,
        _ = interrupts.ended() => anyhow::bail!("interrupted"),
    }
}

async fn run(
    command: Command,
    api: Arc<dyn TeachingApi>,
    policy: PollPolicy,
    speech: Speech,
    interrupts: &Interrupts,
) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();

    match command {
        Command::Health => {
            commands::health(api.as_ref(), &mut stdout)
                .await
                .context("health")?;
        }
        Command::Files => {
            commands::files(api.as_ref(), &mut stdout)
                .await
                .context("files")?;
        }
        Command::Upload(args) => {
            commands::upload(api.as_ref(), args, &mut stdout)
                .await
                .context("upload")?;
        }
        Command::Generate(args) => {
            commands::generate(api, policy, interrupts, args, &mut stdout)
                .await
                .context("generate")?;
        }
        Command::Download(args) => {
            commands::download(api.as_ref(), args, &mut stdout)
                .await
                .context("download")?;
        }
        Command::Quiz(args) => {
            commands::quiz(api, policy, interrupts, args)
                .await
                .context("quiz")?;
        }
        Command::Analytics => {
            commands::analytics(api.as_ref(), &mut stdout)
                .await
                .context("analytics")?;
        }
        Command::Chat(args) => {
            commands::chat(api.as_ref(), &speech, interrupts, args, &mut stdout)
                .await
                .context("chat")?;
        }
        Command::Shell => {
            commands::shell(api, policy, speech, interrupts)
                .await
                .context("shell")?;
        }
    }

    Ok(())
}
