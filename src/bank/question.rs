use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Task identifier. The bank file may spell it as a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

/// Question identifier, unique within its task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct QuestionId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdent {
    Text(String),
    Integer(i64),
}

impl From<RawIdent> for String {
    fn from(raw: RawIdent) -> Self {
        match raw {
            RawIdent::Text(text) => text,
            RawIdent::Integer(number) => number.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawIdent::deserialize(deserializer).map(|raw| TaskId(raw.into()))
    }
}

impl<'de> Deserialize<'de> for QuestionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawIdent::deserialize(deserializer).map(|raw| QuestionId(raw.into()))
    }
}

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: Vec<String>,
    correct: usize,
    #[serde(default)]
    explanation: String,
}

impl Question {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        options: Vec<String>,
        correct: usize,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            id: QuestionId::new(id),
            text: text.into(),
            options,
            correct,
            explanation: explanation.into(),
        }
    }

    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Checks the invariants a loaded question must hold.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.options.len() < 2 {
            return Err(format!(
                "needs at least 2 options, found {}",
                self.options.len()
            ));
        }
        if self.correct >= self.options.len() {
            return Err(format!(
                "correct index {} is out of range for {} options",
                self.correct,
                self.options.len()
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.id, self.text)
    }
}

/// Letter shown in front of an option: `A`, `B`, ...
pub fn option_letter(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .and_then(|i| b'A'.checked_add(i))
        .filter(u8::is_ascii_uppercase)
        .map(char::from)
        .unwrap_or('?')
}
