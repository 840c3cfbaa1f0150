use std::fmt::Write as _;
use std::io::Write;

use tokio::io::AsyncBufRead;

use crate::api::model::QuizResult;
use crate::quiz::{self, Advance, OptionState, QuizSession, Selection};
use crate::render;
use crate::shell::Terminal;

fn question_screen(session: &QuizSession) -> String {
    let mut out = String::new();
    let Some(question) = session.current() else {
        return out;
    };
    let _ = writeln!(
        out,
        "\nQuestion {} of {}  (score {})",
        session.index() + 1,
        session.total(),
        session.score()
    );
    let _ = writeln!(out, "{}", render::markdown_to_text(&question.question));
    for (idx, option) in question.options.iter().enumerate() {
        let marker = match session.option_state(idx) {
            OptionState::Open | OptionState::Neutral => "   ",
            OptionState::Correct => "[+]",
            OptionState::WrongPick => "[x]",
        };
        let _ = writeln!(out, "{marker} {}) {option}", idx + 1);
    }
    out
}

pub fn score_screen(result: &QuizResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nQuiz complete: {}", result.topic);
    let _ = writeln!(
        out,
        "Score: {}/{} ({:.0}%)",
        result.score,
        result.total_questions,
        result.percent()
    );
    if quiz::passed(result) {
        out.push_str("Passed. Nice work!\n");
    } else {
        out.push_str("Keep practising and review the topics below.\n");
    }
    if !result.weak_subtopics.is_empty() {
        let _ = writeln!(out, "Review: {}", result.weak_subtopics.join(", "));
    }
    out
}

/// Runs one attempt. Returns `None` when the user leaves before the end.
pub async fn take<R, W>(
    term: &mut Terminal<R, W>,
    mut session: QuizSession,
) -> anyhow::Result<Option<QuizResult>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    term.say(&format!(
        "Starting quiz on {} ({} questions). Answer with the option number, `quit` to stop.",
        session.topic(),
        session.total()
    ))?;
    loop {
        term.say(&question_screen(&session))?;
        loop {
            let Some(line) = term.prompt("answer").await? else {
                return Ok(None);
            };
            let line = line.trim();
            if matches!(line, "quit" | "back" | "exit") {
                term.say("Quiz abandoned; nothing was submitted.")?;
                return Ok(None);
            }
            let Some(option) = line.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) else {
                term.say("Type the number of your answer, or `quit`.")?;
                continue;
            };
            match session.select(option) {
                Selection::Correct => term.say("Correct!")?,
                Selection::Wrong { correct } => {
                    let answer = correct
                        .and_then(|idx| {
                            session
                                .current()
                                .and_then(|q| q.options.get(idx))
                                .map(|text| format!("{}) {text}", idx + 1))
                        })
                        .unwrap_or_else(|| "not listed".to_owned());
                    term.say(&format!("Not quite. The answer is {answer}."))?;
                }
                Selection::OutOfRange => {
                    term.say("Pick one of the listed options.")?;
                    continue;
                }
                Selection::Locked | Selection::Finished => {}
            }
            break;
        }

        match session.advance() {
            Advance::Next | Advance::NeedsAnswer => {}
            Advance::Finished(result) => return Ok(Some(result)),
        }
    }
}
