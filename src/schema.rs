use std::error::Error;

use teloxide::{
    dispatching::{
        dialogue::{self, InMemStorage},
        DpHandlerDescription, UpdateFilterExt, UpdateHandler,
    },
    dptree::{self, Handler},
    prelude::{DependencyMap, Requester},
    types::{Message, Update},
    Bot,
};
use tracing::instrument;

use crate::{
    bank::BankHandle,
    commands::{cancel, help, start, Command},
    runner,
    state::QuizState,
    HandlerResult,
};

/// Full dispatch tree. Expects `BankHandle`, `QuizPolicy`, `FeedbackClient`
/// and `InMemStorage<QuizState>` among the dependencies.
pub fn schema() -> UpdateHandler<Box<dyn Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(help))
        .branch(case![Command::Start].endpoint(start))
        .branch(case![Command::Cancel].endpoint(cancel));

    let handler = Update::filter_message()
        .branch(command_handler)
        .branch(case![QuizState::Start].endpoint(runner::choose_what_to_do::<BankHandle>))
        .branch(running_scheme())
        .endpoint(invalid_state);

    dialogue::enter::<Update, InMemStorage<QuizState>, QuizState, _>()
        .branch(handler)
        .branch(callback_query_scheme())
}

#[instrument(level = "debug")]
fn running_scheme(
) -> Handler<'static, DependencyMap, Result<(), Box<dyn Error + Send + Sync + 'static>>, DpHandlerDescription>
{
    use dptree::case;
    tracing::debug!("Building dispatching tree for runner");
    Update::filter_message()
        .branch(case![QuizState::Selection].endpoint(runner::selection::<BankHandle>))
        .branch(case![QuizState::ReportIssue { session }].endpoint(runner::receive_report))
}

#[instrument(level = "debug")]
fn callback_query_scheme(
) -> Handler<'static, DependencyMap, Result<(), Box<dyn Error + Send + Sync + 'static>>, DpHandlerDescription>
{
    use dptree::case;
    tracing::debug!("Building dispatching tree for callback queries");
    Update::filter_callback_query()
        .branch(case![QuizState::Running { session }].endpoint(runner::take_action))
        .endpoint(runner::stale_action)
}

#[instrument(level = "info", skip(bot))]
async fn invalid_state(bot: Bot, msg: Message) -> HandlerResult {
    tracing::info!(
        "{}: invalid input '{:?}'",
        msg.chat.username().unwrap_or("anonymous"),
        msg.text()
    );
    bot.send_message(
        msg.chat.id,
        "Unable to handle the message. Enter /help to see usages.",
    )
    .await?;
    Ok(())
}
