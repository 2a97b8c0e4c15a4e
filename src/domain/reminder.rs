//! Daily reminder check: who has no shift on record for a given date.
use chrono::NaiveDate;
use tracing::error;

use crate::db::LedgerDb;

pub struct ReminderService {
    db: LedgerDb,
    /// Static allow-list; empty means "everyone with at least one record".
    allow_list: Vec<i64>,
}

/// One reminder addressed to one user.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub user_id: i64,
    pub text: String,
}

impl ReminderService {
    pub fn new(db: LedgerDb, allow_list: Vec<i64>) -> Self {
        Self { db, allow_list }
    }

    /// Check every known user for a record on `date` and collect reminders
    /// for the ones with a gap. Per-user failures are logged and skipped so
    /// one bad lookup never blocks the remaining users.
    pub async fn reminders_for(&self, date: NaiveDate) -> Vec<Reminder> {
        let users = if self.allow_list.is_empty() {
            match self.db.known_users().await {
                Ok(users) => users,
                Err(e) => {
                    error!("failed to list known users for reminders: {e:#}");
                    return Vec::new();
                }
            }
        } else {
            self.allow_list.clone()
        };

        let mut reminders = Vec::new();
        for user_id in users {
            match self.db.shift_on_date(user_id, date).await {
                Ok(Some(_)) => {}
                Ok(None) => reminders.push(Reminder {
                    user_id,
                    text: format!(
                        "🌙 You haven't logged a shift for {date}\n\n\
                         The shift is over — don't forget to enter it 👇"
                    ),
                }),
                Err(e) => error!(user_id, "reminder check failed: {e:#}"),
            }
        }
        reminders
    }
}
