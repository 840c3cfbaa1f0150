use std::process::Stdio;

use anyhow::Context as _;
use tokio::io::AsyncWriteExt as _;
use tokio::process::{Child, Command};

use crate::config::SpeechSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        command
    }
}

/// Speech-to-text and text-to-speech through external commands.
///
/// The recognizer reads audio however it likes and prints the transcript on
/// stdout; the synthesizer receives the text to speak on stdin.
#[derive(Debug, Clone, Default)]
pub struct Speech {
    recognizer: Option<CommandSpec>,
    synthesizer: Option<CommandSpec>,
}

impl Speech {
    pub fn from_settings(settings: &SpeechSettings) -> Self {
        let spec = |program: &Option<String>, args: &[String]| {
            program.as_ref().map(|program| CommandSpec {
                program: program.clone(),
                args: args.to_vec(),
            })
        };
        Self {
            recognizer: spec(&settings.stt_command, &settings.stt_args),
            synthesizer: spec(&settings.tts_command, &settings.tts_args),
        }
    }

    pub fn can_listen(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn can_speak(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// Starts one recognition. The returned handle owns the recognizer process.
    pub fn listen(&self) -> anyhow::Result<Recognition> {
        let Some(spec) = &self.recognizer else {
            anyhow::bail!("speech recognition is not supported here (set TEACHASSIST_STT_COMMAND)");
        };
        tracing::debug!(program = %spec.program, "start speech recognition");
        let child = spec
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawn speech recognizer: {}", spec.program))?;
        Ok(Recognition {
            program: spec.program.clone(),
            child,
        })
    }

    pub async fn speak(&self, text: &str) -> anyhow::Result<()> {
        let Some(spec) = &self.synthesizer else {
            anyhow::bail!("text-to-speech is not supported here (set TEACHASSIST_TTS_COMMAND)");
        };
        if text.trim().is_empty() {
            return Ok(());
        }
        tracing::debug!(program = %spec.program, chars = text.len(), "speak");

        let mut child = spec
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawn speech synthesizer: {}", spec.program))?;
        {
            let mut stdin = child.stdin.take().context("open synthesizer stdin")?;
            stdin
                .write_all(text.as_bytes())
                .await
                .context("write synthesizer stdin")?;
        }
        let status = child.wait().await.context("wait synthesizer process")?;
        if !status.success() {
            anyhow::bail!("speech synthesizer failed: {} ({status})", spec.program);
        }
        Ok(())
    }
}

/// A running recognition. Dropping it stops the recognizer.
#[derive(Debug)]
pub struct Recognition {
    program: String,
    child: Child,
}

impl Recognition {
    /// Waits for the recognizer and returns the trimmed transcript.
    pub async fn finish(self) -> anyhow::Result<String> {
        let output = self
            .child
            .wait_with_output()
            .await
            .context("wait speech recognizer")?;
        if !output.status.success() {
            anyhow::bail!(
                "speech recognizer failed: {} ({})",
                self.program,
                output.status
            );
        }
        let transcript =
            String::from_utf8(output.stdout).context("recognizer output is not valid UTF-8")?;
        Ok(transcript.trim().to_owned())
    }

    pub async fn cancel(mut self) -> anyhow::Result<()> {
        tracing::debug!(program = %self.program, "cancel speech recognition");
        self.child
            .kill()
            .await
            .with_context(|| format!("stop speech recognizer: {}", self.program))
    }
}
