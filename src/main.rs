use anyhow::Result;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod dispatch;
mod domain;
mod telegram;

use config::Config;
use db::LedgerDb;
use dispatch::{Action, Dispatcher, UserInfo};
use domain::ledger::LedgerService;
use domain::reminder::ReminderService;
use telegram::{BotApi, CallbackQuery, Message, Update};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config::from_env()?;

    info!("Setting up database");
    let db = LedgerDb::new(&cfg.database_url).await?;

    let api = BotApi::new(&cfg.token);
    let reminder = ReminderService::new(db.clone(), cfg.allowed_users.clone());
    tokio::spawn(run_reminder_loop(api.clone(), reminder, cfg.reminder_hour));

    let dispatcher = Dispatcher::new(LedgerService::new(db), cfg.allowed_users.clone());

    info!("Starting long-poll event loop");
    run_event_loop(api, dispatcher).await
}

async fn run_event_loop(api: BotApi, mut dispatcher: Dispatcher) -> Result<()> {
    let mut offset = 0i64;
    loop {
        let updates = match api.get_updates(offset, 30).await {
            Ok(updates) => updates,
            Err(e) => {
                error!("getUpdates failed: {e:#}");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            // One event at a time; a failure is logged and never carries
            // over into the next event.
            if let Err(e) = handle_update(&api, &mut dispatcher, update).await {
                error!("failed to handle update: {e:#}");
            }
        }
    }
}

async fn handle_update(api: &BotApi, dispatcher: &mut Dispatcher, update: Update) -> Result<()> {
    if let Some(message) = update.message {
        return handle_message(api, dispatcher, message).await;
    }
    if let Some(callback) = update.callback_query {
        return handle_callback(api, dispatcher, callback).await;
    }
    Ok(())
}

async fn handle_message(api: &BotApi, dispatcher: &mut Dispatcher, message: Message) -> Result<()> {
    let Some(text) = message.text.as_deref() else {
        return Ok(());
    };
    let user = match &message.from {
        Some(from) => UserInfo {
            id: from.id,
            display_name: from.first_name.clone(),
            handle: from.username.clone(),
        },
        None => return Ok(()),
    };

    let actions = dispatcher.handle_text(&user, text).await?;
    // Text events have no bot message to edit; every action becomes a reply.
    for action in actions {
        let (text, keyboard) = match action {
            Action::Reply { text, keyboard } | Action::EditLast { text, keyboard } => {
                (text, keyboard)
            }
        };
        api.send_message(message.chat.id, &text, keyboard.as_ref()).await?;
    }
    Ok(())
}

async fn handle_callback(
    api: &BotApi,
    dispatcher: &mut Dispatcher,
    callback: CallbackQuery,
) -> Result<()> {
    if let Err(e) = api.answer_callback(&callback.id).await {
        error!("answerCallbackQuery failed: {e:#}");
    }

    let user = UserInfo {
        id: callback.from.id,
        display_name: callback.from.first_name.clone(),
        handle: callback.from.username.clone(),
    };
    let Some(tag) = callback.data.as_deref() else {
        return Ok(());
    };

    let actions = dispatcher.handle_callback(&user, tag).await?;
    for action in actions {
        match action {
            Action::Reply { text, keyboard } => {
                api.send_message(user.id, &text, keyboard.as_ref()).await?;
            }
            Action::EditLast { text, keyboard } => match &callback.message {
                Some(origin) => {
                    api.edit_message_text(origin.chat.id, origin.message_id, &text, keyboard.as_ref())
                        .await?;
                }
                // No originating message to rewrite; degrade to a reply.
                None => {
                    api.send_message(user.id, &text, keyboard.as_ref()).await?;
                }
            },
        }
    }
    Ok(())
}

/// Fire the reminder check once a day at the configured local hour.
async fn run_reminder_loop(api: BotApi, reminder: ReminderService, hour: u32) {
    loop {
        tokio::time::sleep(until_next(hour)).await;

        let yesterday = Local::now().date_naive() - ChronoDuration::days(1);
        info!(%yesterday, "running daily reminder check");

        // Fire-and-forget broadcast: one failed delivery never blocks the
        // remaining users.
        for r in reminder.reminders_for(yesterday).await {
            if let Err(e) = api.send_message(r.user_id, &r.text, Some(&dispatch::main_menu())).await
            {
                error!(user_id = r.user_id, "failed to deliver reminder: {e:#}");
            }
        }
    }
}

/// Wall-clock duration until the next occurrence of `hour:00` local time.
fn until_next(hour: u32) -> Duration {
    let now = Local::now().naive_local();
    let target = next_occurrence(now, hour);
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

fn next_occurrence(now: NaiveDateTime, hour: u32) -> NaiveDateTime {
    // Config validates the hour to 0..=23, so the fallback never fires.
    let today_at = now.date().and_hms_opt(hour, 0, 0).unwrap_or(now);
    if now < today_at {
        today_at
    } else {
        today_at + ChronoDuration::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_occurrence_is_today_before_the_hour() {
        let now = "2026-02-10T06:30:00".parse::<NaiveDateTime>().unwrap();
        let next = next_occurrence(now, 8);
        assert_eq!(next, "2026-02-10T08:00:00".parse::<NaiveDateTime>().unwrap());
    }

    #[test]
    fn next_occurrence_rolls_to_tomorrow_after_the_hour() {
        let now = "2026-02-10T08:00:00".parse::<NaiveDateTime>().unwrap();
        let next = next_occurrence(now, 8);
        assert_eq!(next, "2026-02-11T08:00:00".parse::<NaiveDateTime>().unwrap());
    }
}
