use std::io::Write;

use anyhow::Context as _;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, Lines};

use crate::shell::Interrupts;

/// Line-oriented input plus a text sink.
pub struct Terminal<R, W> {
    lines: Lines<R>,
    out: W,
    interrupts: Interrupts,
}

impl<R, W> Terminal<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(input: R, out: W) -> Self {
        Self {
            lines: input.lines(),
            out,
            interrupts: Interrupts::default(),
        }
    }

    /// Routes Ctrl-C through `interrupts` instead of a private set.
    pub fn with_interrupts(mut self, interrupts: Interrupts) -> Self {
        self.interrupts = interrupts;
        self
    }

    pub fn interrupts(&self) -> &Interrupts {
        &self.interrupts
    }

    /// Shows `label> ` and reads one line. `None` means end of input or an
    /// interrupt that ended the session.
    pub async fn prompt(&mut self, label: &str) -> anyhow::Result<Option<String>> {
        write!(self.out, "{label}> ").context("write prompt")?;
        self.out.flush().context("flush prompt")?;
        let line = tokio::select! {
            biased;
            _ = self.interrupts.ended() => None,
            line = self.lines.next_line() => line.context("read input")?,
        };
        if line.is_none() {
            writeln!(self.out).context("write output")?;
        }
        Ok(line)
    }

    pub fn say(&mut self, text: &str) -> anyhow::Result<()> {
        self.out.write_all(text.as_bytes()).context("write output")?;
        if !text.ends_with('\n') {
            self.out.write_all(b"\n").context("write output")?;
        }
        self.out.flush().context("flush output")
    }

    pub fn alert(&mut self, err: &anyhow::Error) -> anyhow::Result<()> {
        self.say(&format!("! alert: {err:#}"))
    }

    pub fn into_output(self) -> W {
        self.out
    }
}
