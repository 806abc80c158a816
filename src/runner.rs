use chrono::Utc;
use rand::thread_rng;
use teloxide::{
    dispatching::dialogue::GetChatId,
    payloads::{AnswerCallbackQuerySetters, EditMessageTextSetters, SendMessageSetters},
    prelude::Requester,
    types::{CallbackQuery, ChatId, InlineKeyboardMarkup, Message, ParseMode, ReplyMarkup},
    Bot,
};
use tracing::instrument;

use crate::{
    bank::RetrieveTasks,
    error::QuizError,
    keyboard::{
        self, action_keyboard, feedback_keyboard, options_keyboard, parse_task_button,
        results_keyboard, tasks_keyboard, CallbackAction,
    },
    relay::{client::FeedbackClient, payload::FeedbackRequest},
    render,
    session::{AnswerRecord, Phase, QuizPolicy, Session},
    state::QuizState,
    HandlerResult, UserDialogue,
};

fn username(msg: &Message) -> &str {
    msg.chat.username().unwrap_or("anonymous")
}

#[instrument(level = "info", skip(bot, dialogue, bank))]
pub(crate) async fn choose_what_to_do<Tasks: RetrieveTasks>(
    bot: Bot,
    msg: Message,
    dialogue: UserDialogue,
    bank: Tasks,
) -> HandlerResult {
    match msg.text() {
        Some(keyboard::TAKE_QUIZ) => match bank.retrieve_task_ids() {
            Ok(tasks) if tasks.is_empty() => {
                bot.send_message(msg.chat.id, "No available tasks.").await?;
            }
            Ok(tasks) => {
                tracing::info!("{} chooses to take a quiz.", username(&msg));
                dialogue.update(QuizState::Selection).await?;
                bot.send_message(msg.chat.id, "Please, choose a task:")
                    .reply_markup(tasks_keyboard(&tasks))
                    .await?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "task list unavailable");
                bot.send_message(msg.chat.id, render::notice(&e)).await?;
            }
        },
        other => {
            tracing::info!("Invalid message {:?} from {}", other, username(&msg));
            bot.send_message(msg.chat.id, "Invalid input. Please try again.")
                .reply_markup(action_keyboard())
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue, bank))]
pub(crate) async fn selection<Tasks: RetrieveTasks>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    bank: Tasks,
    policy: QuizPolicy,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please, choose a task from the keyboard.")
            .await?;
        return Ok(());
    };

    let task_id = parse_task_button(text);
    let started = Session::start(&bank, task_id.clone(), policy, &mut thread_rng());
    match started {
        Ok(session) => {
            tracing::info!(
                session = %session.id(),
                "{} starts task '{}'",
                username(&msg),
                task_id
            );
            dialogue
                .update(QuizState::Running {
                    session: session.clone(),
                })
                .await?;
            bot.send_message(msg.chat.id, "Let's begin!")
                .reply_markup(ReplyMarkup::kb_remove())
                .await?;
            send_question(&bot, msg.chat.id, &session).await?;
        }
        Err(e) => {
            tracing::info!("{} failed to start task '{}': {}", username(&msg), task_id, e);
            bot.send_message(msg.chat.id, render::notice(&e)).await?;
        }
    }

    Ok(())
}

async fn send_question(bot: &Bot, chat_id: ChatId, session: &Session) -> HandlerResult {
    bot.send_message(chat_id, render::question_text(session))
        .parse_mode(ParseMode::Html)
        .reply_markup(options_keyboard(session))
        .await?;
    Ok(())
}

/// Sends the results, split over several messages when long. The last one
/// carries the retry and home buttons.
async fn send_results(bot: &Bot, chat_id: ChatId, session: &Session) -> HandlerResult {
    let messages = render::results_messages(&session.results()?);
    let mut messages = messages.into_iter().peekable();
    while let Some(text) = messages.next() {
        let request = bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
        if messages.peek().is_none() {
            request.reply_markup(results_keyboard()).await?;
        } else {
            request.await?;
        }
    }
    Ok(())
}

/// Edits the message the button was pressed on, or sends a new one when that
/// message is no longer available.
async fn replace_message(
    bot: &Bot,
    chat_id: ChatId,
    q: &CallbackQuery,
    text: String,
    markup: InlineKeyboardMarkup,
) -> HandlerResult {
    match &q.message {
        Some(message) => {
            bot.edit_message_text(chat_id, message.id(), text)
                .parse_mode(ParseMode::Html)
                .reply_markup(markup)
                .await?;
        }
        None => {
            bot.send_message(chat_id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(markup)
                .await?;
        }
    }
    Ok(())
}

/// Re-renders whatever the session currently shows.
async fn send_screen(bot: &Bot, chat_id: ChatId, session: &Session) -> HandlerResult {
    match (session.phase(), session.current_answer()) {
        (Phase::Feedback, Some(record)) => {
            bot.send_message(chat_id, render::feedback_text(session, record))
                .parse_mode(ParseMode::Html)
                .reply_markup(feedback_keyboard(session))
                .await?;
            Ok(())
        }
        (Phase::Finished, _) => send_results(bot, chat_id, session).await,
        _ => send_question(bot, chat_id, session).await,
    }
}

async fn reject(bot: &Bot, q: &CallbackQuery, error: &QuizError) -> HandlerResult {
    tracing::info!(error = %error, "rejected quiz action");
    bot.answer_callback_query(&q.id)
        .text(render::notice(error))
        .await?;
    Ok(())
}

/// What to put on screen after a successful action.
enum Screen {
    Feedback(AnswerRecord),
    Question { in_place: bool },
    Results,
}

#[instrument(level = "info", skip(bot, dialogue, session), fields(session = %session.id()))]
pub(crate) async fn take_action(
    bot: Bot,
    dialogue: UserDialogue,
    q: CallbackQuery,
    mut session: Session,
) -> HandlerResult {
    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    };
    let Some(chat_id) = q.chat_id() else {
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    };
    let user = q.from.username.clone().unwrap_or_default();

    let screen = match action {
        CallbackAction::Choose { token, choice } => {
            let submitted = session.submit_displayed(token, choice).cloned();
            let record = match submitted {
                Ok(record) => record,
                Err(e) => return reject(&bot, &q, &e).await,
            };
            tracing::info!(
                bank_option = ?session.current_shuffle().original_index(choice),
                "{} answers {} to question '{}' of task '{}'. Correctness: {}",
                user,
                choice,
                record.question_text(),
                session.task_id(),
                record.is_correct()
            );
            Screen::Feedback(record)
        }
        CallbackAction::Next => {
            let advanced = session.advance(&mut thread_rng());
            match advanced {
                Ok(Phase::Answering) => Screen::Question { in_place: false },
                Ok(_) => {
                    if let Ok(score) = session.score() {
                        tracing::info!(
                            "{} completed task '{}' with result {}",
                            user,
                            session.task_id(),
                            score
                        );
                    }
                    Screen::Results
                }
                Err(e) => return reject(&bot, &q, &e).await,
            }
        }
        CallbackAction::Back { token } => {
            let moved = session
                .ensure_displayed(token)
                .and_then(|()| session.go_back(&mut thread_rng()));
            if let Err(e) = moved {
                return reject(&bot, &q, &e).await;
            }
            Screen::Question { in_place: true }
        }
        CallbackAction::Retry => {
            let restarted = session.retry(&mut thread_rng());
            if let Err(e) = restarted {
                return reject(&bot, &q, &e).await;
            }
            tracing::info!("{} retries task '{}'", user, session.task_id());
            Screen::Question { in_place: false }
        }
        CallbackAction::Home => {
            session.return_home();
            dialogue.update(QuizState::Start).await?;
            bot.answer_callback_query(&q.id).await?;
            bot.send_message(chat_id, "What do you want to do now?")
                .reply_markup(action_keyboard())
                .await?;
            return Ok(());
        }
        CallbackAction::Report => {
            dialogue.update(QuizState::ReportIssue { session }).await?;
            bot.answer_callback_query(&q.id).await?;
            bot.send_message(
                chat_id,
                "Describe the problem with this question in one message.",
            )
            .await?;
            return Ok(());
        }
    };

    // Stored before sending, so a failed send can be retried from the new state.
    dialogue
        .update(QuizState::Running {
            session: session.clone(),
        })
        .await?;
    bot.answer_callback_query(&q.id).await?;

    match screen {
        Screen::Feedback(record) => {
            let text = render::feedback_text(&session, &record);
            replace_message(&bot, chat_id, &q, text, feedback_keyboard(&session)).await
        }
        Screen::Question { in_place: true } => {
            let text = render::question_text(&session);
            replace_message(&bot, chat_id, &q, text, options_keyboard(&session)).await
        }
        Screen::Question { in_place: false } => send_question(&bot, chat_id, &session).await,
        Screen::Results => send_results(&bot, chat_id, &session).await,
    }
}

/// Builds the relay payload for a report about the question on screen.
pub(crate) fn feedback_request(session: &Session, description: &str, user: &str) -> FeedbackRequest {
    let answered = match session.phase() {
        Phase::Feedback => session.current_answer(),
        Phase::Finished => session.answers().last(),
        Phase::Answering => None,
    };
    let question_text = match answered {
        Some(record) => record.question_text().to_owned(),
        None => session.current_question().text().to_owned(),
    };

    FeedbackRequest {
        task_id: Some(session.task_id().clone()),
        question_text: Some(question_text),
        user_answer: answered.map(|record| record.user_answer_text().to_owned()),
        correct_answer: answered.map(|record| record.correct_answer_text().to_owned()),
        description: Some(description.to_owned()),
        timestamp: Some(Utc::now().into()),
        user_agent: Some(format!("telegram/{user}")),
    }
}

#[instrument(level = "info", skip(bot, dialogue, session, client), fields(session = %session.id()))]
pub(crate) async fn receive_report(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    session: Session,
    client: FeedbackClient,
) -> HandlerResult {
    let Some(description) = msg.text() else {
        bot.send_message(msg.chat.id, "Please, describe the problem in a text message.")
            .await?;
        return Ok(());
    };

    let request = feedback_request(&session, description, username(&msg));
    let submitted = client.submit(&request).await;
    dialogue
        .update(QuizState::Running {
            session: session.clone(),
        })
        .await?;
    match submitted {
        Ok(_) => {
            tracing::info!("{} reported a problem in task '{}'", username(&msg), session.task_id());
            bot.send_message(msg.chat.id, "Thank you! Your feedback has been sent.")
                .await?;
        }
        Err(e) => {
            tracing::warn!(error = %e, "feedback relay failed");
            bot.send_message(
                msg.chat.id,
                "Could not send feedback right now. Your quiz progress is kept.",
            )
            .await?;
        }
    }

    send_screen(&bot, msg.chat.id, &session).await
}

#[instrument(level = "info", skip(bot))]
pub(crate) async fn stale_action(bot: Bot, q: CallbackQuery) -> HandlerResult {
    bot.answer_callback_query(&q.id)
        .text("This quiz has already ended.")
        .await?;
    Ok(())
}
