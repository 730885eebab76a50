use std::env;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;
pub const MAX_FETCH_CONCURRENCY: usize = 32;
pub const DEFAULT_DAILY_WINDOW_DAYS: u32 = 30;
pub const MAX_DAILY_WINDOW_DAYS: u32 = 366;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub fetch_concurrency: usize,
    pub daily_window_days: u32,
    pub report_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            daily_window_days: DEFAULT_DAILY_WINDOW_DAYS,
            report_timeout: Duration::from_secs(30),
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            fetch_concurrency: clamp_concurrency(parse_var(
                "ATTENDANCE_FETCH_CONCURRENCY",
                defaults.fetch_concurrency,
            )?),
            daily_window_days: check_window_days(parse_var(
                "ATTENDANCE_DAILY_WINDOW_DAYS",
                defaults.daily_window_days,
            )?)?,
            report_timeout: Duration::from_secs(parse_var(
                "REPORT_TIMEOUT_SECS",
                defaults.report_timeout.as_secs(),
            )?),
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a Postgres instance (or pass --demo)")
    }
}

pub fn clamp_concurrency(value: usize) -> usize {
    value.clamp(1, MAX_FETCH_CONCURRENCY)
}

pub fn check_window_days(days: u32) -> anyhow::Result<u32> {
    if days > MAX_DAILY_WINDOW_DAYS {
        anyhow::bail!("daily window of {days} days exceeds the {MAX_DAILY_WINDOW_DAYS}-day maximum");
    }
    Ok(days)
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
