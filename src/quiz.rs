use chrono::{DateTime, SecondsFormat, Utc};

use crate::api::model::{QuizPayload, QuizQuestion, QuizResult};

/// Score (percent) at or above which the score screen reports a pass.
pub const PASS_PERCENT: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Correct,
    Wrong { correct: Option<usize> },
    /// The question was already answered; nothing changed.
    Locked,
    OutOfRange,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Next,
    NeedsAnswer,
    Finished(QuizResult),
}

/// How an option should be styled once the question is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionState {
    Open,
    Correct,
    WrongPick,
    Neutral,
}

/// One attempt at a quiz: forward-only, one pick per question.
#[derive(Debug, Clone)]
pub struct QuizSession {
    topic: String,
    questions: Vec<QuizQuestion>,
    current: usize,
    picked: Option<usize>,
    score: usize,
    weak_subtopics: Vec<String>,
    finished: bool,
}

impl QuizSession {
    /// `fallback_topic` names the quiz when the payload carries no topic.
    pub fn new(quiz: QuizPayload, fallback_topic: &str) -> anyhow::Result<Self> {
        if quiz.questions.is_empty() {
            anyhow::bail!("quiz has no questions");
        }
        let topic = if quiz.topic.trim().is_empty() {
            fallback_topic.to_owned()
        } else {
            quiz.topic
        };
        Ok(Self {
            topic,
            questions: quiz.questions,
            current: 0,
            picked: None,
            score: 0,
            weak_subtopics: Vec::new(),
            finished: false,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn weak_subtopics(&self) -> &[String] {
        &self.weak_subtopics
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Zero-based index of the question on screen.
    pub fn index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&QuizQuestion> {
        if self.finished {
            return None;
        }
        self.questions.get(self.current)
    }

    pub fn is_locked(&self) -> bool {
        self.picked.is_some()
    }

    pub fn select(&mut self, option: usize) -> Selection {
        let Some(question) = self.current() else {
            return Selection::Finished;
        };
        if self.picked.is_some() {
            return Selection::Locked;
        }
        if option >= question.options.len() {
            return Selection::OutOfRange;
        }

        let correct = question.correct_index();
        let tag = question
            .learning_objective
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_owned);

        self.picked = Some(option);
        if correct == Some(option) {
            self.score += 1;
            tracing::debug!(question = self.current, "correct answer");
            Selection::Correct
        } else {
            let tag = tag.unwrap_or_else(|| self.topic.clone());
            tracing::debug!(question = self.current, %tag, "wrong answer");
            self.weak_subtopics.push(tag);
            Selection::Wrong { correct }
        }
    }

    pub fn option_state(&self, option: usize) -> OptionState {
        let Some(picked) = self.picked else {
            return OptionState::Open;
        };
        let correct = self.current().and_then(QuizQuestion::correct_index);
        if correct == Some(option) {
            OptionState::Correct
        } else if picked == option {
            OptionState::WrongPick
        } else {
            OptionState::Neutral
        }
    }

    pub fn advance(&mut self) -> Advance {
        self.advance_at(Utc::now())
    }

    pub fn advance_at(&mut self, now: DateTime<Utc>) -> Advance {
        if self.finished {
            return Advance::Finished(self.summary_at(now));
        }
        if self.picked.is_none() {
            return Advance::NeedsAnswer;
        }
        self.picked = None;
        if self.current + 1 < self.questions.len() {
            self.current += 1;
            return Advance::Next;
        }
        self.finished = true;
        Advance::Finished(self.summary_at(now))
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> QuizResult {
        QuizResult {
            topic: self.topic.clone(),
            score: self.score,
            total_questions: self.questions.len(),
            date: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            weak_subtopics: self.weak_subtopics.clone(),
        }
    }
}

pub fn passed(result: &QuizResult) -> bool {
    result.percent() >= PASS_PERCENT
}
