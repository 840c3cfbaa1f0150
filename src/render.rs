//! Plain-text rendering for the terminal screens.

use std::fmt::Write as _;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::api::model::{Analytics, Flashcard, FolderGroup, QuizPayload, VideoMeta};
use crate::chat::{ChatMessage, Role};
use crate::content::GenerationResult;

/// Flattens markdown (chat answers, flashcards) into wrapped-free terminal text.
pub fn markdown_to_text(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);

    let mut out = String::new();
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut link_dest: Option<String> = None;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                ensure_blank_line(&mut out);
                if level == HeadingLevel::H1 {
                    out.push_str("== ");
                } else {
                    out.push_str("-- ");
                }
            }
            Event::End(TagEnd::Heading(_)) | Event::End(TagEnd::Paragraph) => {
                out.push('\n');
            }
            Event::Start(Tag::Paragraph) => {
                if lists.is_empty() {
                    ensure_blank_line(&mut out);
                }
            }
            Event::Start(Tag::List(start)) => {
                if lists.is_empty() {
                    ensure_blank_line(&mut out);
                }
                lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                lists.pop();
            }
            Event::Start(Tag::Item) => {
                ensure_line_start(&mut out);
                let depth = lists.len().saturating_sub(1);
                out.push_str(&"  ".repeat(depth));
                match lists.last_mut() {
                    Some(Some(n)) => {
                        let _ = write!(out, "{n}. ");
                        *n += 1;
                    }
                    _ => out.push_str("- "),
                }
            }
            Event::End(TagEnd::Item) => ensure_line_start(&mut out),
            Event::Start(Tag::CodeBlock(_)) => ensure_blank_line(&mut out),
            Event::End(TagEnd::CodeBlock) => ensure_line_start(&mut out),
            Event::Start(Tag::Link { dest_url, .. }) => {
                link_dest = Some(dest_url.to_string());
            }
            Event::End(TagEnd::Link) => {
                if let Some(dest) = link_dest.take() {
                    let _ = write!(out, " <{dest}>");
                }
            }
            Event::Text(text) => out.push_str(&text),
            Event::Code(code) => {
                out.push('`');
                out.push_str(&code);
                out.push('`');
            }
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::Rule => {
                ensure_blank_line(&mut out);
                out.push_str("----\n");
            }
            Event::End(TagEnd::TableCell) => out.push_str(" | "),
            Event::End(TagEnd::TableRow) | Event::End(TagEnd::TableHead) => out.push('\n'),
            _ => {}
        }
    }

    out.trim().to_owned()
}

fn ensure_line_start(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn ensure_blank_line(out: &mut String) {
    if out.is_empty() {
        return;
    }
    ensure_line_start(out);
    if !out.ends_with("\n\n") {
        out.push('\n');
    }
}

pub fn library(groups: &[FolderGroup]) -> String {
    if groups.iter().all(|group| group.files.is_empty()) {
        return "No processed documents yet. Upload one to get started.".to_owned();
    }
    let mut out = String::new();
    for group in groups {
        let _ = writeln!(out, "[{}]", group.folder);
        for doc in &group.files {
            let _ = writeln!(
                out,
                "  {}  ({} topic{})  {}",
                doc.label(),
                doc.topic_count,
                if doc.topic_count == 1 { "" } else { "s" },
                doc.filename
            );
        }
    }
    out
}

pub fn topics(topics: &[String], selected: Option<usize>) -> String {
    let mut out = String::new();
    for (idx, topic) in topics.iter().enumerate() {
        let marker = if selected == Some(idx) { '>' } else { ' ' };
        let _ = writeln!(out, "{marker} {idx}. {topic}");
    }
    out
}

pub fn flashcards(cards: &[Flashcard]) -> String {
    let mut out = String::new();
    for (idx, card) in cards.iter().enumerate() {
        let _ = writeln!(out, "Card {} of {}", idx + 1, cards.len());
        let _ = writeln!(out, "  Q: {}", markdown_to_text(&card.front));
        let _ = writeln!(out, "  A: {}", markdown_to_text(&card.back));
    }
    out
}

pub fn videos(videos: &[VideoMeta]) -> String {
    if videos.is_empty() {
        return "No videos found.".to_owned();
    }
    let mut out = String::new();
    for video in videos {
        let _ = writeln!(out, "* {}", video.title);
        if !video.channel.is_empty() {
            let _ = writeln!(out, "  {}", video.channel);
        }
        let _ = writeln!(out, "  {}", video.url);
    }
    out
}

fn quiz_overview(out: &mut String, quiz: &QuizPayload) {
    let _ = writeln!(out, "Quiz: {}", quiz.topic);
    let mut facts = Vec::new();
    if let Some(class_level) = &quiz.class_level {
        facts.push(format!("class {class_level}"));
    }
    if let Some(difficulty) = &quiz.difficulty {
        facts.push(difficulty.clone());
    }
    if let Some(minutes) = quiz.duration_minutes {
        facts.push(format!("{minutes} min"));
    }
    facts.push(format!(
        "{} question{}",
        quiz.questions.len(),
        if quiz.questions.len() == 1 { "" } else { "s" }
    ));
    let _ = writeln!(out, "  {}", facts.join(", "));
}

/// Results screen for one generation. `link` turns a backend-relative
/// `file_url` into something the user can open.
pub fn generation(result: &GenerationResult, link: &dyn Fn(&str) -> String) -> String {
    let mut out = String::new();
    match result {
        GenerationResult::Plan(file)
        | GenerationResult::Practice(file)
        | GenerationResult::Video(file) => {
            let _ = writeln!(out, "{} ready: {}", result.kind().label(), file.filename);
            let _ = writeln!(out, "  {}", link(&file.file_url));
        }
        GenerationResult::Quiz { file, quiz } => {
            quiz_overview(&mut out, quiz);
            if let Some(file) = file {
                let _ = writeln!(out, "  printable copy: {}", link(&file.file_url));
            }
        }
        GenerationResult::Flashcards(cards) => {
            if cards.is_empty() {
                out.push_str("No flashcards were generated.\n");
            }
            out.push_str(&flashcards(cards));
        }
        GenerationResult::Resources(found) | GenerationResult::Youtube(found) => {
            out.push_str(&videos(found));
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
    }
    out
}

pub fn chat_message(message: &ChatMessage) -> String {
    let mut out = String::new();
    match message.role {
        Role::User => {
            let _ = writeln!(out, "you> {}", message.content);
        }
        Role::Assistant if message.is_error => {
            let _ = writeln!(out, "! {}", message.content);
        }
        Role::Assistant => {
            let _ = writeln!(out, "tutor> {}", markdown_to_text(&message.content));
            let topics: Vec<&str> = message
                .sources
                .iter()
                .map(|s| s.topic.as_str())
                .filter(|t| !t.is_empty())
                .collect();
            if !topics.is_empty() {
                let _ = writeln!(out, "  sources: {}", topics.join(", "));
            }
        }
    }
    out
}

const BAR_WIDTH: usize = 20;

fn bar(score: f64, full: f64) -> String {
    let ratio = if full > 0.0 {
        (score / full).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

/// Text rendition of the analytics dashboard; the radar chart becomes bars.
pub fn analytics(analytics: &Analytics) -> String {
    let mut out = String::new();
    out.push_str("Proficiency by topic\n");
    if analytics.spider_data.is_empty() {
        out.push_str("  No quiz results yet. Take a quiz to see your progress.\n");
    }
    for point in &analytics.spider_data {
        let _ = writeln!(
            out,
            "  {:<24} [{}] {:>5.1}%",
            point.subject,
            bar(point.score, point.full_mark),
            point.score
        );
    }

    if !analytics.weakest_topics.is_empty() {
        out.push_str("\nNeeds attention\n");
        for weak in &analytics.weakest_topics {
            let _ = writeln!(out, "  {:<24} {:>5.1}%", weak.topic, weak.score);
        }
    }

    if !analytics.recommendations.is_empty() {
        out.push_str("\nRecommended reading\n");
        for rec in &analytics.recommendations {
            let _ = writeln!(out, "  {}: {}", rec.topic, rec.suggestion);
            for source in rec.sources.iter().filter(|s| !s.topic.is_empty()) {
                let _ = writeln!(out, "    - {}", source.topic);
            }
        }
    }

    if !analytics.recent_activity.is_empty() {
        out.push_str("\nRecent activity\n");
        for entry in analytics.recent_activity.iter().rev() {
            let _ = writeln!(
                out,
                "  {}  {:<24} {}/{}",
                entry.date.get(..10).unwrap_or(&entry.date),
                entry.topic,
                entry.score,
                entry.total_questions
            );
        }
    }
    out
}
