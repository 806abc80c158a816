use teloxide::{
    payloads::SendMessageSetters, prelude::Requester, types::Message, utils::command::BotCommands,
    Bot,
};

use crate::{keyboard::action_keyboard, state::QuizState, HandlerResult, UserDialogue};

#[derive(Debug, Clone, BotCommands)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "display help.")]
    Help,
    #[command(description = "leave the current quiz.")]
    Cancel,
    #[command(description = "start the bot.")]
    Start,
}

/// Drops the chat's session, if any, and returns to the main menu state.
/// Returns whether a quiz was running.
async fn leave_quiz(dialogue: &UserDialogue) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let running = match dialogue.get().await? {
        Some(QuizState::Running { session }) | Some(QuizState::ReportIssue { session }) => {
            tracing::info!(session = %session.id(), task = %session.task_id(), "quiz left");
            session.return_home();
            true
        }
        _ => false,
    };
    dialogue.update(QuizState::Start).await?;
    Ok(running)
}

pub(crate) async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

pub(crate) async fn cancel(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    let text = if leave_quiz(&dialogue).await? {
        "Quiz cancelled. Your answers were discarded."
    } else {
        "There is no quiz to cancel."
    };
    bot.send_message(msg.chat.id, text)
        .reply_markup(action_keyboard())
        .await?;
    Ok(())
}

pub(crate) async fn start(bot: Bot, msg: Message, dialogue: UserDialogue) -> HandlerResult {
    leave_quiz(&dialogue).await?;
    bot.send_message(msg.chat.id, "Please choose what to do:")
        .reply_markup(action_keyboard())
        .await?;
    Ok(())
}
