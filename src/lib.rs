use state::QuizState;
use teloxide::{dispatching::dialogue::InMemStorage, prelude::Dialogue};

pub mod bank;
pub mod commands;
pub mod config;
pub mod error;
pub mod keyboard;
pub mod relay;
pub mod render;
pub mod runner;
pub mod schema;
pub mod session;
pub mod shuffle;
pub mod state;

type UserDialogue = Dialogue<QuizState, InMemStorage<QuizState>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;
