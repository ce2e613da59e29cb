use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    /// Hours before the campaign end date at which the grace period opens
    pub grace_period_hours: i64,
    /// Seconds between phase-advancement runs
    pub phase_tick_secs: u64,
    /// Seconds between retry reconciliation runs
    pub reconcile_tick_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/groupbuy".to_string()),
            grace_period_hours: env_or("GRACE_PERIOD_HOURS", 48),
            phase_tick_secs: env_or("PHASE_TICK_SECS", 60),
            reconcile_tick_secs: env_or("RECONCILE_TICK_SECS", 900),
        })
    }

    /// Grace window as a duration relative to the campaign end date
    pub fn grace_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.grace_period_hours)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
