use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::io::BufReader;

use crate::api::TeachingApi;
use crate::api::model::GenerateRequest;
use crate::app::App;
use crate::chat::ChatSession;
use crate::cli::{ChatArgs, DownloadArgs, GenerateArgs, QuizArgs, UploadArgs};
use crate::content::{ContentKind, GenerationResponse, GenerationResult};
use crate::poll::PollPolicy;
use crate::quiz::QuizSession;
use crate::render;
use crate::shell::{self, Interrupts, Shell, Terminal};
use crate::speech::Speech;

fn stdin_terminal(
    interrupts: &Interrupts,
) -> Terminal<BufReader<tokio::io::Stdin>, std::io::Stdout> {
    Terminal::new(BufReader::new(tokio::io::stdin()), std::io::stdout())
        .with_interrupts(interrupts.clone())
}

pub async fn health<W: Write>(api: &dyn TeachingApi, out: &mut W) -> anyhow::Result<()> {
    let health = api.health().await.context("check backend")?;
    writeln!(out, "{}", health.status)?;
    if !health.message.is_empty() {
        writeln!(out, "{}", health.message)?;
    }
    Ok(())
}

pub async fn files<W: Write>(api: &dyn TeachingApi, out: &mut W) -> anyhow::Result<()> {
    let library = api.list_files().await.context("list documents")?;
    writeln!(out, "{}", render::library(&library).trim_end())?;
    Ok(())
}

pub async fn upload<W: Write>(
    api: &dyn TeachingApi,
    args: UploadArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let receipt = api
        .upload(&args.file)
        .await
        .with_context(|| format!("upload {}", args.file.display()))?;
    writeln!(out, "{}: {}", receipt.status, args.file.display())?;
    if let Some(message) = receipt.message.filter(|m| !m.is_empty()) {
        writeln!(out, "{message}")?;
    }
    if let Some(json_file) = receipt.json_file {
        writeln!(out, "topics: {json_file}")?;
    }
    Ok(())
}

async fn selected_app(
    api: Arc<dyn TeachingApi>,
    policy: PollPolicy,
    file: &str,
    topic: usize,
    kind: ContentKind,
) -> anyhow::Result<App> {
    let mut app = App::new(api, policy);
    app.load_library().await?;
    app.open_dashboard();
    app.select_file(file)?;
    app.select_topic(topic)?;
    app.select_kind(kind);
    Ok(app)
}

pub async fn generate<W: Write>(
    api: Arc<dyn TeachingApi>,
    policy: PollPolicy,
    interrupts: &Interrupts,
    args: GenerateArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut app = selected_app(Arc::clone(&api), policy, &args.file, args.topic, args.kind).await?;

    let result = if args.no_wait {
        let filename = app
            .selected_file()
            .map(|doc| doc.filename.clone())
            .ok_or_else(|| anyhow::anyhow!("no document selected"))?;
        let request = GenerateRequest {
            filename,
            topic_index: args.topic,
        };
        match api
            .generate(args.kind, &request)
            .await
            .with_context(|| format!("generate {}", args.kind))?
        {
            GenerationResponse::Ready(result) => result,
            GenerationResponse::Deferred { filename } => {
                writeln!(out, "processing: {filename}")?;
                writeln!(out, "  {}", api.link(&format!("/download/{filename}")))?;
                return Ok(());
            }
        }
    } else {
        let _armed = interrupts.arm(app.cancel_handle());
        app.generate().await?.clone()
    };

    out.write_all(render::generation(&result, &|url| api.link(url)).as_bytes())?;
    if let Some(dir) = &args.out {
        save_into(api.as_ref(), &result, dir, out).await?;
    }
    Ok(())
}

async fn save_into<W: Write>(
    api: &dyn TeachingApi,
    result: &GenerationResult,
    dir: &Path,
    out: &mut W,
) -> anyhow::Result<()> {
    let Some(file) = result.file() else {
        writeln!(out, "{} results are inline; nothing to download", result.kind())?;
        return Ok(());
    };
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create output dir: {}", dir.display()))?;
    let path = dir.join(&file.filename);
    let bytes = api.download(&file.filename, &path, false).await?;
    writeln!(out, "saved {bytes} bytes to {}", path.display())?;
    Ok(())
}

pub async fn download<W: Write>(
    api: &dyn TeachingApi,
    args: DownloadArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let bytes = api.download(&args.filename, &args.out, args.force).await?;
    writeln!(out, "saved {bytes} bytes to {}", args.out.display())?;
    Ok(())
}

pub async fn quiz(
    api: Arc<dyn TeachingApi>,
    policy: PollPolicy,
    interrupts: &Interrupts,
    args: QuizArgs,
) -> anyhow::Result<()> {
    let mut app = selected_app(api, policy, &args.file, args.topic, ContentKind::Quiz).await?;
    let result = {
        let _armed = interrupts.arm(app.cancel_handle());
        app.generate().await?.clone()
    };
    let kind = result.kind();
    let GenerationResult::Quiz { quiz, .. } = result else {
        anyhow::bail!("backend returned {kind} instead of a quiz");
    };
    let fallback = app.selected_topic_name().unwrap_or("General").to_owned();
    let session = QuizSession::new(quiz, &fallback)?;

    let mut term = stdin_terminal(interrupts);
    let Some(summary) = shell::take_quiz(&mut term, session).await? else {
        return Ok(());
    };
    term.say(&shell::score_screen(&summary))?;
    app.submit_quiz(&summary).await?;
    term.say("Result saved to your analytics.")
}

pub async fn analytics<W: Write>(api: &dyn TeachingApi, out: &mut W) -> anyhow::Result<()> {
    let analytics = api.analytics().await.context("load analytics")?;
    out.write_all(render::analytics(&analytics).as_bytes())?;
    Ok(())
}

pub async fn chat<W: Write>(
    api: &dyn TeachingApi,
    speech: &Speech,
    interrupts: &Interrupts,
    args: ChatArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut session = ChatSession::new(api);
    let Some(message) = args.message else {
        let mut term = stdin_terminal(interrupts);
        return shell::converse(&mut term, &mut session, speech).await;
    };
    let reply = session.send(&message).await?;
    if reply.is_error {
        anyhow::bail!("{}", reply.content);
    }
    out.write_all(render::chat_message(reply).as_bytes())?;
    Ok(())
}

pub async fn shell(
    api: Arc<dyn TeachingApi>,
    policy: PollPolicy,
    speech: Speech,
    interrupts: &Interrupts,
) -> anyhow::Result<()> {
    let mut shell = Shell::new(
        api,
        policy,
        speech,
        BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
    )
    .with_interrupts(interrupts.clone());
    shell.run().await
}
