use anyhow::Result;
use std::env;
use std::time::Duration;
use crate::constants::*;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub sweep_interval_secs: u64,
    pub presence_stale_secs: u64,
    pub sweeper_stop_grace_secs: u64,
    pub run_sweeper: bool,
    /// Comma-separated CORS origins; any origin when unset.
    pub allowed_origins: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_SERVER_PORT.to_string())
                .parse()
                .unwrap_or(DEFAULT_SERVER_PORT),
            sweep_interval_secs: parse_or("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?,
            presence_stale_secs: parse_or("PRESENCE_STALE_SECS", DEFAULT_PRESENCE_STALE_SECS)?,
            sweeper_stop_grace_secs: parse_or(
                "SWEEPER_STOP_GRACE_SECS",
                DEFAULT_SWEEPER_STOP_GRACE_SECS,
            )?,
            run_sweeper: parse_or("RUN_SWEEPER", true)?,
            allowed_origins: env::var("ALLOWED_ORIGINS").ok(),
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be greater than zero");
        }
        if self.presence_stale_secs <= self.sweep_interval_secs {
            anyhow::bail!(
                "PRESENCE_STALE_SECS ({}) must be greater than SWEEP_INTERVAL_SECS ({})",
                self.presence_stale_secs,
                self.sweep_interval_secs
            );
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn presence_stale_after(&self) -> Duration {
        Duration::from_secs(self.presence_stale_secs)
    }

    pub fn sweeper_stop_grace(&self) -> Duration {
        Duration::from_secs(self.sweeper_stop_grace_secs)
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(interval: u64, stale: u64) -> Config {
        Config {
            database_url: "postgres://localhost/locator".to_string(),
            port: DEFAULT_SERVER_PORT,
            sweep_interval_secs: interval,
            presence_stale_secs: stale,
            sweeper_stop_grace_secs: DEFAULT_SWEEPER_STOP_GRACE_SECS,
            run_sweeper: true,
            allowed_origins: None,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(config(DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_PRESENCE_STALE_SECS).validate().is_ok());
    }

    #[test]
    fn test_stale_threshold_must_exceed_interval() {
        assert!(config(300, 300).validate().is_err());
        assert!(config(300, 200).validate().is_err());
        assert!(config(0, 900).validate().is_err());
    }
}
