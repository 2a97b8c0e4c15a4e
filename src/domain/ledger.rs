//! Ledger service: the single write path into the shifts table.
//!
//! The "at most one record per (user, date)" invariant is procedural, not a
//! database constraint: every insert and update goes through
//! [`LedgerService::record_entry`] / [`LedgerService::confirm_update`], which
//! check the existing row first and stage a pending update when a date is
//! already taken.
use anyhow::Result;
use std::collections::HashMap;
use tracing::info;

use crate::db::LedgerDb;
use crate::domain::models::{NewShift, ShiftRecord};

/// Per-user staged entries awaiting a confirm/cancel decision.
///
/// One slot per user: a second colliding entry before confirmation silently
/// replaces the first. Slots are cleared on confirm or cancel; there is no
/// time-based expiry.
#[derive(Debug, Default)]
pub struct PendingUpdates {
    slots: HashMap<i64, NewShift>,
}

impl PendingUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, user_id: i64, entry: NewShift) {
        self.slots.insert(user_id, entry);
    }

    pub fn take(&mut self, user_id: i64) -> Option<NewShift> {
        self.slots.remove(&user_id)
    }

    pub fn clear(&mut self, user_id: i64) {
        self.slots.remove(&user_id);
    }

    pub fn get(&self, user_id: i64) -> Option<&NewShift> {
        self.slots.get(&user_id)
    }
}

/// Outcome of trying to record a parsed entry.
#[derive(Debug, PartialEq)]
pub enum RecordOutcome {
    /// The date was free; the row is in the ledger.
    Saved(ShiftRecord),
    /// The date already has a record; the entry was staged instead.
    NeedsConfirmation {
        existing: ShiftRecord,
        staged: NewShift,
    },
}

#[derive(Clone)]
pub struct LedgerService {
    db: LedgerDb,
}

impl LedgerService {
    pub fn new(db: LedgerDb) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &LedgerDb {
        &self.db
    }

    /// Record a parsed entry, staging it instead when the date collides with
    /// an existing row. Never creates a second row for the same (user, date).
    pub async fn record_entry(
        &self,
        user_id: i64,
        entry: NewShift,
        pending: &mut PendingUpdates,
    ) -> Result<RecordOutcome> {
        if let Some(existing) = self.db.shift_on_date(user_id, entry.date).await? {
            info!(user_id, date = %entry.date, "shift exists, staging pending update");
            pending.stage(user_id, entry.clone());
            return Ok(RecordOutcome::NeedsConfirmation { existing, staged: entry });
        }

        let id = self.db.insert_shift(user_id, &entry).await?;
        info!(user_id, date = %entry.date, id, "shift saved");
        Ok(RecordOutcome::Saved(ShiftRecord {
            id,
            user_id,
            date: entry.date,
            rate: entry.rate,
            consum: entry.consum,
            tips: entry.tips,
        }))
    }

    /// Apply the user's pending update to the existing row for its date.
    /// With no pending update this is a silent no-op (`None`).
    pub async fn confirm_update(
        &self,
        user_id: i64,
        pending: &mut PendingUpdates,
    ) -> Result<Option<ShiftRecord>> {
        let Some(staged) = pending.take(user_id) else {
            return Ok(None);
        };

        let updated = self
            .db
            .update_shift_amounts(user_id, staged.date, staged.rate, staged.consum, staged.tips)
            .await?;
        if !updated {
            // The row was deleted while the update sat pending; the staged
            // entry becomes a plain insert so the data is not lost.
            let id = self.db.insert_shift(user_id, &staged).await?;
            info!(user_id, date = %staged.date, id, "pending update landed on a free date");
            return Ok(Some(ShiftRecord {
                id,
                user_id,
                date: staged.date,
                rate: staged.rate,
                consum: staged.consum,
                tips: staged.tips,
            }));
        }

        info!(user_id, date = %staged.date, "shift updated");
        Ok(self.db.shift_on_date(user_id, staged.date).await?)
    }

    /// Drop any pending update for the user without touching the store.
    pub fn cancel_update(&self, user_id: i64, pending: &mut PendingUpdates) {
        pending.clear(user_id);
    }

    pub async fn delete(&self, id: i64, user_id: i64) -> Result<bool> {
        let deleted = self.db.delete_shift(id, user_id).await?;
        info!(user_id, id, deleted, "delete shift");
        Ok(deleted)
    }
}
