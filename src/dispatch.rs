//! Event classification and routing.
//!
//! Inbound text and button events are turned into transport-neutral
//! [`Action`]s here, so everything up to the wire can be exercised without a
//! network. The event loop in `main` executes the actions against the Bot
//! API.
use anyhow::Result;
use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::domain::ledger::{LedgerService, PendingUpdates, RecordOutcome};
use crate::domain::models::NewShift;
use crate::domain::{parser, stats};
use crate::telegram::{InlineKeyboard, InlineKeyboardButton};

const RECENT_LIMIT: i64 = 5;

/// Identity of the actor behind an inbound event.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: i64,
    pub display_name: String,
    pub handle: Option<String>,
}

/// Outbound effect of handling one event.
#[derive(Debug, PartialEq)]
pub enum Action {
    Reply { text: String, keyboard: Option<InlineKeyboard> },
    /// Rewrite the message the pressed button was attached to.
    EditLast { text: String, keyboard: Option<InlineKeyboard> },
}

fn reply(text: impl Into<String>) -> Action {
    Action::Reply { text: text.into(), keyboard: None }
}

fn reply_menu(text: impl Into<String>) -> Action {
    Action::Reply { text: text.into(), keyboard: Some(main_menu()) }
}

fn edit_menu(text: impl Into<String>) -> Action {
    Action::EditLast { text: text.into(), keyboard: Some(main_menu()) }
}

pub fn main_menu() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        vec![
            InlineKeyboardButton::new("📊 Stats", "stats"),
            InlineKeyboardButton::new("📋 Recent", "list"),
        ],
        vec![
            InlineKeyboardButton::new("➕ Add", "add"),
            InlineKeyboardButton::new("🗑 Delete", "delete"),
        ],
        vec![
            InlineKeyboardButton::new("📅 This month", "month"),
            InlineKeyboardButton::new("🔎 Pick month", "choose_month"),
        ],
        vec![InlineKeyboardButton::new("🏆 Best month", "best_month")],
    ])
}

pub struct Dispatcher {
    ledger: LedgerService,
    allow_list: Vec<i64>,
    pending: PendingUpdates,
}

impl Dispatcher {
    pub fn new(ledger: LedgerService, allow_list: Vec<i64>) -> Self {
        Self { ledger, allow_list, pending: PendingUpdates::new() }
    }

    /// An empty allow-list means the bot is open.
    fn authorized(&self, user_id: i64) -> bool {
        self.allow_list.is_empty() || self.allow_list.contains(&user_id)
    }

    async fn register(&self, user: &UserInfo) {
        if let Err(e) = self
            .ledger
            .db()
            .register_user(user.id, &user.display_name, user.handle.as_deref())
            .await
        {
            warn!(user_id = user.id, "failed to register user: {e:#}");
        }
    }

    pub async fn handle_text(&mut self, user: &UserInfo, text: &str) -> Result<Vec<Action>> {
        self.handle_text_on(user, text, Local::now().date_naive()).await
    }

    pub async fn handle_callback(&mut self, user: &UserInfo, tag: &str) -> Result<Vec<Action>> {
        self.handle_callback_on(user, tag, Local::now().date_naive()).await
    }

    async fn handle_text_on(
        &mut self,
        user: &UserInfo,
        text: &str,
        today: NaiveDate,
    ) -> Result<Vec<Action>> {
        if !self.authorized(user.id) {
            debug!(user_id = user.id, "ignoring text from unlisted user");
            return Ok(Vec::new());
        }
        self.register(user).await;

        let text = text.trim();

        if text == "/start" {
            return Ok(vec![
                reply("💎 <b>Shift Manager</b>\n\nPick an action:"),
                reply_menu("👇 Menu:"),
            ]);
        }

        if let Some(args) = text.strip_prefix("/delete") {
            return self.delete_by_command(user.id, args).await;
        }

        if let Some(month) = parser::parse_month(text) {
            return self.month_stats(user.id, &month).await;
        }

        match parser::parse_entry(text, today) {
            Ok(entry) => self.record_entry(user.id, entry).await,
            Err(e) => {
                debug!(user_id = user.id, %e, "unparseable text");
                Ok(vec![reply("❌ Bad format\n\nExample:\n2026-02-01 100 80 40")])
            }
        }
    }

    async fn handle_callback_on(
        &mut self,
        user: &UserInfo,
        tag: &str,
        today: NaiveDate,
    ) -> Result<Vec<Action>> {
        if !self.authorized(user.id) {
            debug!(user_id = user.id, "ignoring callback from unlisted user");
            return Ok(Vec::new());
        }
        self.register(user).await;

        match tag {
            "stats" => self.all_time_stats(user.id).await,
            "list" => self.recent_list(user.id).await,
            "add" => Ok(vec![reply(
                "Send a shift as:\n\n\
                 📅 YYYY-MM-DD 💰 RATE 🍾 CONSUM ☕ TIPS\n\n\
                 Examples:\n\
                 2026-02-01 100 80 40\n\
                 100 80 40 — for today\n\
                 yesterday 100 80 40\n\
                 5.3 100 80 40 — day.month of this year",
            )]),
            "delete" => self.delete_picker(user.id).await,
            "month" => {
                let month = today.format("%Y-%m").to_string();
                self.month_stats(user.id, &month).await
            }
            "choose_month" => Ok(vec![reply("Send a month like:\n2026-02")]),
            "best_month" => self.best_month(user.id).await,
            "back" => {
                // Back doubles as cancel for a pending update.
                self.ledger.cancel_update(user.id, &mut self.pending);
                Ok(vec![Action::EditLast {
                    text: "💎 <b>Shift Manager</b>\n\nPick an action:".into(),
                    keyboard: Some(main_menu()),
                }])
            }
            "confirm_update" => match self.ledger.confirm_update(user.id, &mut self.pending).await? {
                Some(record) => Ok(vec![edit_menu(format!(
                    "♻️ Shift updated: {} — <b>{:.2}</b>",
                    record.date,
                    record.total()
                ))]),
                // Confirming with nothing pending is a silent no-op.
                None => Ok(Vec::new()),
            },
            _ => {
                if let Some(id) = tag.strip_prefix("delete:") {
                    return self.delete_by_button(user.id, id).await;
                }
                debug!(user_id = user.id, tag, "unknown callback tag");
                Ok(Vec::new())
            }
        }
    }

    async fn record_entry(&mut self, user_id: i64, entry: NewShift) -> Result<Vec<Action>> {
        match self.ledger.record_entry(user_id, entry, &mut self.pending).await? {
            RecordOutcome::Saved(record) => {
                let month = record.month_prefix();
                let rows = self.ledger.db().shifts_in_month(user_id, &month).await?;
                let month_total = stats::totals(&rows).grand;
                Ok(vec![reply_menu(format!(
                    "✅ Shift saved: {} — <b>{:.2}</b>\n\n\
                     📅 {month}: {} shifts, total <b>{:.2}</b>",
                    record.date,
                    record.total(),
                    rows.len(),
                    month_total,
                ))])
            }
            RecordOutcome::NeedsConfirmation { existing, staged } => Ok(vec![Action::Reply {
                text: format!(
                    "⚠️ A shift for {} already exists: <b>{:.2}</b>\n\
                     New values: {} + {} + {} = <b>{:.2}</b>\n\n\
                     Overwrite?",
                    existing.date,
                    existing.total(),
                    staged.rate,
                    staged.consum,
                    staged.tips,
                    staged.total(),
                ),
                keyboard: Some(InlineKeyboard::new(vec![
                    vec![InlineKeyboardButton::new("✅ Overwrite", "confirm_update")],
                    vec![InlineKeyboardButton::new("⬅ Back", "back")],
                ])),
            }]),
        }
    }

    async fn all_time_stats(&self, user_id: i64) -> Result<Vec<Action>> {
        let rows = self.ledger.db().shifts_for_user(user_id).await?;
        let Some(s) = stats::summarize(&rows) else {
            return Ok(vec![reply_menu("No data")]);
        };
        Ok(vec![reply_menu(format!(
            "📊 <b>Your statistics</b>\n\n\
             📅 Shifts: <b>{}</b>\n\
             💰 Total income: <b>{:.2}</b>\n\
             📈 Average: <b>{:.2}</b>\n\n\
             🔥 Best shift: {} — <b>{:.2}</b>",
            s.shifts, s.total, s.average, s.best.0, s.best.1,
        ))])
    }

    async fn recent_list(&self, user_id: i64) -> Result<Vec<Action>> {
        let rows = self.ledger.db().recent_shifts(user_id, RECENT_LIMIT).await?;
        if rows.is_empty() {
            return Ok(vec![reply_menu("No data")]);
        }
        let mut text = String::from("📋 Recent shifts:\n\n");
        for r in &rows {
            text.push_str(&format!("{}. {} — {:.2}\n", r.id, r.date, r.total()));
        }
        Ok(vec![reply_menu(text)])
    }

    async fn month_stats(&self, user_id: i64, month: &str) -> Result<Vec<Action>> {
        let rows = self.ledger.db().shifts_in_month(user_id, month).await?;
        if rows.is_empty() {
            return Ok(vec![reply_menu(format!("No data for {month}"))]);
        }
        Ok(vec![reply_menu(format!(
            "📅 {month}\n\n\
             Shifts: <b>{}</b>\n\
             💰 Total: <b>{:.2}</b>\n\
             📈 Average: <b>{:.2}</b>",
            rows.len(),
            stats::totals(&rows).grand,
            stats::average(&rows),
        ))])
    }

    async fn best_month(&self, user_id: i64) -> Result<Vec<Action>> {
        let rows = self.ledger.db().shifts_for_user(user_id).await?;
        match stats::best_month(&rows) {
            Some(best) => Ok(vec![reply_menu(format!(
                "🏆 Best month: {} — <b>{:.2}</b>",
                best.month, best.total,
            ))]),
            None => Ok(vec![reply_menu("No data")]),
        }
    }

    async fn delete_picker(&self, user_id: i64) -> Result<Vec<Action>> {
        let rows = self.ledger.db().recent_shifts(user_id, RECENT_LIMIT).await?;
        if rows.is_empty() {
            return Ok(vec![edit_menu("No shifts to delete")]);
        }

        let mut text = String::from("🗑 Pick a shift to delete:\n\n");
        let mut keyboard_rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
        for r in &rows {
            text.push_str(&format!("{}. {} — {:.2}\n", r.id, r.date, r.total()));
            keyboard_rows.push(vec![InlineKeyboardButton::new(
                format!("❌ Delete {}", r.date),
                format!("delete:{}", r.id),
            )]);
        }
        keyboard_rows.push(vec![InlineKeyboardButton::new("⬅ Back", "back")]);

        Ok(vec![Action::EditLast {
            text,
            keyboard: Some(InlineKeyboard::new(keyboard_rows)),
        }])
    }

    async fn delete_by_button(&self, user_id: i64, id: &str) -> Result<Vec<Action>> {
        let Ok(id) = id.parse::<i64>() else {
            debug!(user_id, id, "malformed delete tag");
            return Ok(Vec::new());
        };
        self.ledger.delete(id, user_id).await?;
        Ok(vec![edit_menu("✅ Shift deleted")])
    }

    async fn delete_by_command(&self, user_id: i64, args: &str) -> Result<Vec<Action>> {
        let args = args.trim();
        let Ok(id) = args.parse::<i64>() else {
            return Ok(vec![reply("Use:\n/delete ID")]);
        };
        self.ledger.delete(id, user_id).await?;
        info!(user_id, id, "shift deleted by command");
        Ok(vec![reply_menu("🗑 Deleted")])
    }
}
