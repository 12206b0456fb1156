use std::path::PathBuf;
use std::time::Duration;

use crate::auth::guard::MAX_TRACKED_IDENTITIES;

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub users_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    pub sweep_interval: Duration,
    pub guard_max_records: usize,
    pub admin: Option<AdminConfig>,
}

/// Account created at startup when no user has this email yet.
#[derive(Clone)]
pub struct AdminConfig {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("MBANKING_JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("MBANKING_JWT_SECRET environment variable is required"))?;

        let admin = match (
            std::env::var("MBANKING_ADMIN_EMAIL").ok(),
            std::env::var("MBANKING_ADMIN_PASSWORD").ok(),
        ) {
            (Some(email), Some(password)) => Some(AdminConfig {
                name: std::env::var("MBANKING_ADMIN_NAME").unwrap_or_else(|_| "Admin".to_string()),
                email,
                password,
            }),
            (None, None) => None,
            _ => anyhow::bail!(
                "MBANKING_ADMIN_EMAIL and MBANKING_ADMIN_PASSWORD must be set together"
            ),
        };

        let sweep_interval = Duration::from_secs(parse_var("MBANKING_SWEEP_INTERVAL_SECS", 600)?);
        if sweep_interval.is_zero() {
            anyhow::bail!("MBANKING_SWEEP_INTERVAL_SECS must be greater than zero");
        }

        Ok(Config {
            bind_addr: {
                let port = std::env::var("MBANKING_PORT").unwrap_or_else(|_| "8080".to_string());
                std::env::var("MBANKING_BIND_ADDR")
                    .unwrap_or_else(|_| format!("0.0.0.0:{}", port))
            },
            users_path: PathBuf::from(
                std::env::var("MBANKING_USERS_PATH").unwrap_or_else(|_| "./users.json".to_string()),
            ),
            jwt_secret,
            token_ttl_hours: parse_var("MBANKING_TOKEN_TTL_HOURS", 24)?,
            sweep_interval,
            guard_max_records: parse_var("MBANKING_GUARD_MAX_RECORDS", MAX_TRACKED_IDENTITIES as u64)? as usize,
            admin,
        })
    }
}

fn parse_var(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a positive integer: {}", name, e)),
        Err(_) => Ok(default),
    }
}
