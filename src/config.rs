//! Process configuration from the environment, with `.env` support.
use anyhow::{bail, Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Bot platform credential.
    pub token: String,
    /// Static allow-list of user ids; empty means the bot is open and
    /// reminders go to every user with at least one record.
    pub allowed_users: Vec<i64>,
    pub database_url: String,
    /// Local hour of the daily reminder tick.
    pub reminder_hour: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let token = env::var("TOKEN").context("TOKEN must be set")?;
        let allowed_users = parse_allow_list(&env::var("ALLOWED_USERS").unwrap_or_default())?;
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:shifts.db".to_string());
        let reminder_hour = match env::var("REMINDER_HOUR") {
            Ok(raw) => {
                let hour: u32 = raw.parse().context("REMINDER_HOUR must be a number")?;
                if hour > 23 {
                    bail!("REMINDER_HOUR must be between 0 and 23");
                }
                hour
            }
            Err(_) => 8,
        };

        Ok(Self { token, allowed_users, database_url, reminder_hour })
    }
}

fn parse_allow_list(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().with_context(|| format!("bad user id in ALLOWED_USERS: {s}")))
        .collect()
}
