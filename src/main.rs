use std::error::Error;
use std::sync::Arc;

use dotenvy::dotenv;
use mathstat_quiz::bank::BankHandle;
use mathstat_quiz::config::Config;
use mathstat_quiz::relay::{self, client::FeedbackClient, mailer::mailer_from_config, RelayState};
use mathstat_quiz::schema::schema;
use mathstat_quiz::state::QuizState;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::error_handlers::IgnoringErrorHandlerSafe;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks::{self, Options};
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .json()
        .with_span_events(FmtSpan::ENTER)
        .log_internal_errors(true)
        .with_line_number(true)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    // teloxide and reqwest log through `log`
    tracing_log::LogTracer::init()?;

    let bank = BankHandle::spawn_load(config.bank_source.clone());

    let mailer = Arc::from(mailer_from_config(&config.mail));
    let relay_state = RelayState::new(mailer, config.mail.clone());
    let relay = tokio::spawn(relay::serve(config.relay_addr, relay_state));

    let Some(token) = config.bot_token.clone() else {
        tracing::info!("TELOXIDE_TOKEN is not set, running the feedback relay only");
        relay.await??;
        return Ok(());
    };

    let bot = Bot::new(token);
    tracing::info!("Starting bot...");

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![
            InMemStorage::<QuizState>::new(),
            bank,
            config.policy,
            FeedbackClient::new(config.feedback_url.clone())
        ])
        .enable_ctrlc_handler()
        .build();

    if let Some(webhook) = &config.webhook {
        let listener = webhooks::axum(bot, Options::new(webhook.addr, webhook.url.clone())).await?;
        dispatcher
            .dispatch_with_listener(listener, Arc::new(IgnoringErrorHandlerSafe))
            .await;
    } else {
        dispatcher.dispatch().await;
    }

    relay.abort();
    Ok(())
}
