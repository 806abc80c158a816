//! Message texts for the bot, in Telegram HTML.

use std::borrow::Cow;
use std::fmt::Write;

use teloxide::utils::html::escape;

use crate::bank::question::option_letter;
use crate::session::{AnswerRecord, Results, Session};

pub(crate) fn question_text(session: &Session) -> String {
    let question = session.current_question();
    format!(
        "Task {} — Question {} of {}\nProgress: {}%\nID: {}\n\n<b>{}</b>",
        escape(session.task_id().as_str()),
        session.question_index() + 1,
        session.total(),
        session.progress_percent(),
        escape(question.id().as_str()),
        escape(question.text()),
    )
}

pub(crate) fn feedback_text(session: &Session, record: &AnswerRecord) -> String {
    let mut text = question_text(session);
    let badge = if record.is_correct() {
        "✓ Correct!"
    } else {
        "✗ Incorrect"
    };
    let _ = write!(
        text,
        "\n\nYour answer: {}. {}\n<b>{badge}</b>",
        option_letter(record.user_choice()),
        escape(record.user_answer_text()),
    );
    if !record.is_correct() {
        let _ = write!(
            text,
            "\nCorrect answer: {}. {}",
            option_letter(record.correct_choice()),
            escape(record.correct_answer_text()),
        );
    }
    if !record.explanation().is_empty() {
        let _ = write!(text, "\n\n<b>Explanation:</b> {}", escape(record.explanation()));
    }
    text
}

/// Longest text Telegram accepts in one message.
pub(crate) const MESSAGE_LIMIT: usize = 4096;

// Per-field caps keep any single breakdown entry under `MESSAGE_LIMIT`.
const QUESTION_CAP: usize = 1200;
const ANSWER_CAP: usize = 400;
const EXPLANATION_CAP: usize = 1200;

fn clip(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => Cow::Owned(format!("{}…", &text[..end])),
        None => Cow::Borrowed(text),
    }
}

fn breakdown_entry(number: usize, answer: &AnswerRecord) -> String {
    let status = if answer.is_correct() { "✓ Right" } else { "✗ Wrong" };
    let mut entry = format!(
        "<b>Question {number}</b> {status}\n{}\nYour answer: {}. {}",
        escape(&clip(answer.question_text(), QUESTION_CAP)),
        option_letter(answer.user_choice()),
        escape(&clip(answer.user_answer_text(), ANSWER_CAP)),
    );
    if !answer.is_correct() {
        let _ = write!(
            entry,
            "\nCorrect answer: {}. {}",
            option_letter(answer.correct_choice()),
            escape(&clip(answer.correct_answer_text(), ANSWER_CAP)),
        );
    }
    if !answer.explanation().is_empty() {
        let _ = write!(
            entry,
            "\n<i>{}</i>",
            escape(&clip(answer.explanation(), EXPLANATION_CAP))
        );
    }
    entry
}

/// Score summary followed by the per-question breakdown, split into as many
/// messages as needed to stay under [`MESSAGE_LIMIT`]. Never empty.
pub(crate) fn results_messages(results: &Results<'_>) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = format!(
        "<b>Results — Task {}</b>\n\n{} / {}\n{}%\n\n<b>Breakdown:</b>",
        escape(results.task_id.as_str()),
        results.score.correct,
        results.score.total,
        results.score.percentage(),
    );
    let mut current_len = current.chars().count();

    for (number, answer) in results.answers.iter().enumerate() {
        let entry = breakdown_entry(number + 1, answer);
        let entry_len = entry.chars().count();
        if current_len > 0 && current_len + 2 + entry_len > MESSAGE_LIMIT {
            messages.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(&entry);
        current_len += entry_len;
    }
    messages.push(current);
    messages
}

pub(crate) fn notice(error: &crate::error::QuizError) -> String {
    use crate::error::QuizError;

    match error {
        QuizError::BankNotLoaded => "Questions are still loading. Please try again in a moment.".into(),
        QuizError::BankUnavailable(_) => "Questions could not be loaded. Please try again later.".into(),
        QuizError::UnknownTask(task) => format!("Task '{task}' not found."),
        QuizError::EmptyTask(task) => format!("Task '{task}' has no questions yet."),
        QuizError::InvalidChoice { .. } => "That option does not exist.".into(),
        QuizError::AlreadyAnswered(_) => "You have already answered this question.".into(),
        QuizError::InvalidTransition { .. } => "That action is not available right now.".into(),
        QuizError::BackNavigationDisabled => "Going back is disabled for this quiz.".into(),
    }
}
