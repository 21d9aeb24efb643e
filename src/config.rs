use std::{env, str::FromStr, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub payment: PaymentSettings,
    pub reconciler_interval: Duration,
    pub reconciler_enabled: bool,
}

/// Knobs of the payment lifecycle that are fixed per deployment.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub expire_after: chrono::Duration,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            expire_after: chrono::Duration::minutes(15),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("APP_PORT", 3000u16)?;
        let expire_minutes = parse_var("PAYMENT_EXPIRE_MINUTES", 15i64)?;
        let interval_secs = parse_var("RECONCILER_INTERVAL_SECS", 60u64)?;
        let reconciler_enabled = parse_var("RECONCILER_ENABLED", true)?;

        if expire_minutes <= 0 {
            anyhow::bail!("PAYMENT_EXPIRE_MINUTES must be positive");
        }
        if interval_secs == 0 {
            anyhow::bail!("RECONCILER_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            payment: PaymentSettings {
                expire_after: chrono::Duration::minutes(expire_minutes),
            },
            reconciler_interval: Duration::from_secs(interval_secs),
            reconciler_enabled,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        _ => Ok(default),
    }
}
