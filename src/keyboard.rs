use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

use crate::bank::question::{option_letter, TaskId};
use crate::session::{DisplayToken, Session};

pub(crate) const TAKE_QUIZ: &str = "Take a quiz📝";
const TASK_PREFIX: &str = "Task ";

/// What an inline button asks the session to do.
///
/// Buttons on a question message carry the [`DisplayToken`] of that message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Choose { token: DisplayToken, choice: usize },
    Next,
    Back { token: DisplayToken },
    Retry,
    Home,
    Report,
}

impl CallbackAction {
    pub fn to_data(self) -> String {
        match self {
            CallbackAction::Choose { token, choice } => {
                format!("opt:{}:{}:{choice}", token.question, token.shown)
            }
            CallbackAction::Next => "next".into(),
            CallbackAction::Back { token } => format!("back:{}:{}", token.question, token.shown),
            CallbackAction::Retry => "retry".into(),
            CallbackAction::Home => "home".into(),
            CallbackAction::Report => "report".into(),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "next" => return Some(CallbackAction::Next),
            "retry" => return Some(CallbackAction::Retry),
            "home" => return Some(CallbackAction::Home),
            "report" => return Some(CallbackAction::Report),
            _ => {}
        }

        let mut parts = data.split(':');
        let kind = parts.next()?;
        let token = DisplayToken {
            question: parts.next()?.parse().ok()?,
            shown: parts.next()?.parse().ok()?,
        };
        let action = match kind {
            "opt" => CallbackAction::Choose {
                token,
                choice: parts.next()?.parse().ok()?,
            },
            "back" => CallbackAction::Back { token },
            _ => return None,
        };
        parts.next().is_none().then_some(action)
    }
}

fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_data())
}

pub(crate) fn action_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(TAKE_QUIZ)]])
}

pub(crate) fn tasks_keyboard(tasks: &[TaskId]) -> KeyboardMarkup {
    let keyboard = tasks
        .iter()
        .map(|task| vec![KeyboardButton::new(format!("{TASK_PREFIX}{task}"))]);

    KeyboardMarkup::new(keyboard)
}

/// Reads a task id back from a task button (or a bare id typed by hand).
pub(crate) fn parse_task_button(text: &str) -> TaskId {
    let text = text.trim();
    TaskId::new(text.strip_prefix(TASK_PREFIX).unwrap_or(text).trim())
}

/// One button per displayed option. Callback data carries the display token
/// and the displayed index.
pub(crate) fn options_keyboard(session: &Session) -> InlineKeyboardMarkup {
    let token = session.display_token();
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = session
        .current_options()
        .into_iter()
        .enumerate()
        .map(|(index, option)| {
            vec![button(
                format!("{}. {}", option_letter(index), option),
                CallbackAction::Choose {
                    token,
                    choice: index,
                },
            )]
        })
        .collect();

    if session.can_go_back() {
        keyboard.push(vec![button("← Back", CallbackAction::Back { token })]);
    }

    InlineKeyboardMarkup::new(keyboard)
}

pub(crate) fn feedback_keyboard(session: &Session) -> InlineKeyboardMarkup {
    let next = if session.is_last_question() {
        "Finish"
    } else {
        "Next →"
    };

    InlineKeyboardMarkup::new(vec![
        vec![button(next, CallbackAction::Next)],
        vec![button("Report a problem", CallbackAction::Report)],
    ])
}

pub(crate) fn results_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("Try again", CallbackAction::Retry),
        button("Back to tasks", CallbackAction::Home),
    ]])
}
