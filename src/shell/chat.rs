use std::io::Write;

use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

use crate::api::TeachingApi;
use crate::chat::ChatSession;
use crate::render;
use crate::shell::Terminal;
use crate::speech::Speech;

const CHAT_HELP: &str = "Chat with the tutor. /listen to ask by voice, /speak to hear the last answer, /exit to leave.";

/// Chat screen. Returns when the user types `/exit` or input ends.
pub async fn converse<R, W, A>(
    term: &mut Terminal<R, W>,
    chat: &mut ChatSession<'_, A>,
    speech: &Speech,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    A: TeachingApi + ?Sized,
{
    term.say(CHAT_HELP)?;
    for message in chat.transcript().messages() {
        term.say(&render::chat_message(message))?;
    }

    loop {
        let Some(line) = term.prompt("chat").await? else {
            return Ok(());
        };
        let text = match line.trim() {
            "" => continue,
            "/exit" | "/back" | "/quit" => return Ok(()),
            "/help" => {
                term.say(CHAT_HELP)?;
                continue;
            }
            "/speak" => {
                let Some(last) = chat.transcript().last_assistant() else {
                    term.say("Nothing to read out yet.")?;
                    continue;
                };
                let spoken = render::markdown_to_text(&last.content);
                if let Err(err) = speech.speak(&spoken).await {
                    term.alert(&err)?;
                }
                continue;
            }
            "/listen" => match listen(term, speech).await {
                Ok(Some(heard)) => {
                    term.say(&format!("(heard) {heard}"))?;
                    heard
                }
                Ok(None) => continue,
                Err(err) => {
                    term.alert(&err)?;
                    continue;
                }
            },
            text => text.to_owned(),
        };

        match chat.send(&text).await {
            Ok(reply) => term.say(&render::chat_message(reply))?,
            Err(err) => term.alert(&err)?,
        }
    }
}

/// One recognition, stopped by Ctrl-C. `None` when nothing usable was heard.
async fn listen<R, W>(term: &mut Terminal<R, W>, speech: &Speech) -> anyhow::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let recognition = speech.listen()?;
    term.say("Listening... (Ctrl-C to stop)")?;
    let stop = CancellationToken::new();
    let _armed = term.interrupts().arm(stop.clone());
    let heard = tokio::select! {
        transcript = recognition.finish() => transcript?,
        _ = stop.cancelled() => {
            term.say("Stopped listening.")?;
            return Ok(None);
        }
    };
    if heard.is_empty() {
        term.say("Didn't catch that.")?;
        return Ok(None);
    }
    Ok(Some(heard))
}
