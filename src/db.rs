use anyhow::Result;
use chrono::{Local, NaiveDate};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::sync::Arc;

use crate::domain::models::{NewShift, ShiftRecord};

/// LedgerDb manages all database operations for the shift ledger.
#[derive(Clone)]
pub struct LedgerDb {
    pool: Arc<SqlitePool>,
}

impl LedgerDb {
    /// Create a new database connection, creating the database file and
    /// schema if they do not exist yet.
    pub async fn new(url: &str) -> Result<Self> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let pool = SqlitePool::connect(url).await?;
        Self::setup_schema(&pool).await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Initialize a test database with a unique name.
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS shifts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                rate REAL NOT NULL,
                consum REAL NOT NULL,
                tips REAL NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                display_name TEXT NOT NULL,
                handle TEXT,
                registered_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Insert a new shift row. Duplicate-date checking is the
    /// LedgerService's job; this always creates a row.
    pub async fn insert_shift(&self, user_id: i64, shift: &NewShift) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO shifts (user_id, date, rate, consum, tips) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(shift.date)
        .bind(shift.rate)
        .bind(shift.consum)
        .bind(shift.tips)
        .execute(&*self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Replace the amounts of the existing row for (user, date). The id and
    /// date stay unchanged. Returns whether a row was updated.
    pub async fn update_shift_amounts(
        &self,
        user_id: i64,
        date: NaiveDate,
        rate: f64,
        consum: f64,
        tips: f64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE shifts SET rate = ?, consum = ?, tips = ? WHERE user_id = ? AND date = ?",
        )
        .bind(rate)
        .bind(consum)
        .bind(tips)
        .bind(user_id)
        .bind(date)
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete at most one shift, scoped by both id and owner. Deleting a
    /// missing or non-owned id is a no-op, not an error.
    pub async fn delete_shift(&self, id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shifts WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Full unordered history for one user.
    pub async fn shifts_for_user(&self, user_id: i64) -> Result<Vec<ShiftRecord>> {
        let rows = sqlx::query_as::<_, ShiftRecord>(
            "SELECT id, user_id, date, rate, consum, tips FROM shifts WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await?;
        Ok(rows)
    }

    /// Most recent shifts by insertion order, newest first.
    pub async fn recent_shifts(&self, user_id: i64, limit: i64) -> Result<Vec<ShiftRecord>> {
        let rows = sqlx::query_as::<_, ShiftRecord>(
            "SELECT id, user_id, date, rate, consum, tips FROM shifts \
             WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&*self.pool)
        .await?;
        Ok(rows)
    }

    /// The current record for (user, date), if any.
    pub async fn shift_on_date(&self, user_id: i64, date: NaiveDate) -> Result<Option<ShiftRecord>> {
        let row = sqlx::query_as::<_, ShiftRecord>(
            "SELECT id, user_id, date, rate, consum, tips FROM shifts \
             WHERE user_id = ? AND date = ?",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&*self.pool)
        .await?;
        Ok(row)
    }

    /// All shifts whose date starts with the given `YYYY-MM` prefix.
    pub async fn shifts_in_month(&self, user_id: i64, month_prefix: &str) -> Result<Vec<ShiftRecord>> {
        let rows = sqlx::query_as::<_, ShiftRecord>(
            "SELECT id, user_id, date, rate, consum, tips FROM shifts \
             WHERE user_id = ? AND date LIKE ?",
        )
        .bind(user_id)
        .bind(format!("{month_prefix}%"))
        .fetch_all(&*self.pool)
        .await?;
        Ok(rows)
    }

    /// Distinct owners with at least one shift on record.
    pub async fn known_users(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT DISTINCT user_id FROM shifts")
            .fetch_all(&*self.pool)
            .await?;
        Ok(ids)
    }

    /// Record a user the first time they are seen; later calls are no-ops.
    pub async fn register_user(
        &self,
        user_id: i64,
        display_name: &str,
        handle: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO users (user_id, display_name, handle, registered_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(display_name)
        .bind(handle)
        .bind(Local::now().to_rfc3339())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(date: &str, rate: f64, consum: f64, tips: f64) -> NewShift {
        NewShift {
            date: date.parse().expect("valid date"),
            rate,
            consum,
            tips,
        }
    }

    async fn setup_test() -> LedgerDb {
        LedgerDb::init_test().await.expect("Failed to create test database")
    }

    #[tokio::test]
    async fn test_insert_and_fetch_by_date() {
        let db = setup_test().await;

        let id = db.insert_shift(1, &shift("2026-02-01", 100.0, 80.0, 40.0)).await.unwrap();

        let found = db.shift_on_date(1, "2026-02-01".parse().unwrap()).await.unwrap();
        let record = found.expect("record should exist");
        assert_eq!(record.id, id);
        assert_eq!(record.rate, 100.0);
        assert_eq!(record.total(), 220.0);

        // Other users and other dates stay invisible.
        assert!(db.shift_on_date(2, "2026-02-01".parse().unwrap()).await.unwrap().is_none());
        assert!(db.shift_on_date(1, "2026-02-02".parse().unwrap()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_owner_scoped() {
        let db = setup_test().await;

        let id = db.insert_shift(1, &shift("2026-02-01", 100.0, 0.0, 0.0)).await.unwrap();

        // Wrong owner: silent no-op.
        assert!(!db.delete_shift(id, 2).await.unwrap());
        assert_eq!(db.shifts_for_user(1).await.unwrap().len(), 1);

        assert!(db.delete_shift(id, 1).await.unwrap());
        assert_eq!(db.shifts_for_user(1).await.unwrap().len(), 0);

        // Deleting again is a no-op, not an error.
        assert!(!db.delete_shift(id, 1).await.unwrap());
        assert!(!db.delete_shift(9999, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_recent_shifts_ordered_by_id_desc() {
        let db = setup_test().await;

        for day in 1..=7 {
            let date = format!("2026-02-{day:02}");
            db.insert_shift(1, &shift(&date, 100.0, 0.0, 0.0)).await.unwrap();
        }

        let recent = db.recent_shifts(1, 5).await.unwrap();
        assert_eq!(recent.len(), 5);
        for pair in recent.windows(2) {
            assert!(pair[0].id > pair[1].id);
        }
        assert_eq!(recent[0].date, "2026-02-07".parse::<NaiveDate>().unwrap());
    }

    #[tokio::test]
    async fn test_month_prefix_filter() {
        let db = setup_test().await;

        db.insert_shift(1, &shift("2026-01-31", 100.0, 0.0, 0.0)).await.unwrap();
        db.insert_shift(1, &shift("2026-02-01", 100.0, 0.0, 0.0)).await.unwrap();
        db.insert_shift(1, &shift("2026-02-28", 100.0, 0.0, 0.0)).await.unwrap();
        db.insert_shift(2, &shift("2026-02-15", 100.0, 0.0, 0.0)).await.unwrap();

        let feb = db.shifts_in_month(1, "2026-02").await.unwrap();
        assert_eq!(feb.len(), 2);
        assert!(feb.iter().all(|r| r.month_prefix() == "2026-02"));

        let march = db.shifts_in_month(1, "2026-03").await.unwrap();
        assert!(march.is_empty());
    }

    #[tokio::test]
    async fn test_update_amounts_keeps_id_and_date() {
        let db = setup_test().await;

        let id = db.insert_shift(1, &shift("2026-02-01", 100.0, 80.0, 40.0)).await.unwrap();
        assert!(db
            .update_shift_amounts(1, "2026-02-01".parse().unwrap(), 50.0, 50.0, 50.0)
            .await
            .unwrap());

        let record = db
            .shift_on_date(1, "2026-02-01".parse().unwrap())
            .await
            .unwrap()
            .expect("record should exist");
        assert_eq!(record.id, id);
        assert_eq!((record.rate, record.consum, record.tips), (50.0, 50.0, 50.0));

        // No row for that date: nothing updated.
        assert!(!db
            .update_shift_amounts(1, "2026-03-01".parse().unwrap(), 1.0, 1.0, 1.0)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_known_users() {
        let db = setup_test().await;
        assert!(db.known_users().await.unwrap().is_empty());

        db.insert_shift(1, &shift("2026-02-01", 100.0, 0.0, 0.0)).await.unwrap();
        db.insert_shift(1, &shift("2026-02-02", 100.0, 0.0, 0.0)).await.unwrap();
        db.insert_shift(2, &shift("2026-02-01", 100.0, 0.0, 0.0)).await.unwrap();

        let mut users = db.known_users().await.unwrap();
        users.sort_unstable();
        assert_eq!(users, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_register_user_is_write_once() {
        let db = setup_test().await;

        db.register_user(1, "Alice", Some("alice")).await.unwrap();
        db.register_user(1, "Someone Else", None).await.unwrap();

        let name: String = sqlx::query_scalar("SELECT display_name FROM users WHERE user_id = 1")
            .fetch_one(&*db.pool)
            .await
            .unwrap();
        assert_eq!(name, "Alice");
    }
}
