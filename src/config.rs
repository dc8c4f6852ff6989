use crate::inpars::ListingFilters;
use chrono::TimeDelta;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://inpars.ru/api/v2/";
const DEFAULT_EXPAND: &[&str] = &[
    "region", "city", "metro", "category", "material", "rentTime", "rooms", "rentTerms",
];
// Upper bound the listings API accepts for `limit`.
const MAX_PAGE_LIMIT: u32 = 1000;
const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnv(String),
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub inpars: InParsConfig,
    pub monitor: MonitorConfig,
    pub filters: ListingFilters,
    pub storage: StorageConfig,
    pub retention: RetentionConfig,
    pub seen_set: SeenSetConfig,
    pub webhooks: WebhookConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct InParsConfig {
    pub token: String,
    /// Always ends with `/` so endpoint paths can be joined onto it.
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub page_limit: u32,
    /// How many of the newest listings to mark as seen at startup.
    pub seed_limit: u32,
    /// Pause between two dispatches within one cycle.
    pub dispatch_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// When unset the in-memory seen-set strategy is used.
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub sweep_interval: Duration,
    pub max_age: TimeDelta,
}

#[derive(Debug, Clone)]
pub struct SeenSetConfig {
    pub trim_threshold: usize,
    pub trim_window: i64,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub subscribers: Vec<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let token = env
            .string("INPARS_API_TOKEN")
            .ok_or_else(|| ConfigError::MissingEnv("INPARS_API_TOKEN".to_string()))?;

        let page_limit = env.page_limit("MAX_LISTINGS", 50)?;
        let seed_limit = env.page_limit("SEED_LIMIT", 500)?;

        let sweep_hours = env.positive("CLEANUP_INTERVAL", 24)?;
        let sweep_secs = sweep_hours
            .checked_mul(3600)
            .ok_or_else(|| invalid("CLEANUP_INTERVAL", sweep_hours, "too many hours"))?;

        let max_age_days: i64 = env.parse("CLEANUP_DAYS", 30)?;
        if !(1..=MAX_RETENTION_DAYS).contains(&max_age_days) {
            return Err(invalid(
                "CLEANUP_DAYS",
                max_age_days,
                format!("must be between 1 and {MAX_RETENTION_DAYS}"),
            ));
        }
        let max_age = TimeDelta::try_days(max_age_days)
            .ok_or_else(|| invalid("CLEANUP_DAYS", max_age_days, "out of range"))?;

        let trim_window: i64 = env.parse("SEEN_TRIM_WINDOW", 5_000)?;
        if trim_window < 1 {
            return Err(invalid("SEEN_TRIM_WINDOW", trim_window, "must be at least 1"));
        }

        Ok(Config {
            inpars: InParsConfig {
                token,
                base_url: env.base_url("INPARS_BASE_URL")?,
                timeout: Duration::from_secs(env.positive("INPARS_TIMEOUT_SECS", 30)?),
            },
            monitor: MonitorConfig {
                poll_interval: Duration::from_secs(env.positive("POLL_INTERVAL", 60)?),
                page_limit,
                seed_limit,
                dispatch_delay: Duration::from_millis(env.parse("DISPATCH_DELAY_MS", 500)?),
            },
            filters: ListingFilters {
                region_ids: env.list("DEFAULT_REGIONS", vec![77])?,
                city_ids: env.list("DEFAULT_CITIES", Vec::new())?,
                type_ad: env.list("TYPE_AD", vec![1])?,
                seller_types: env.list("SELLER_TYPES", vec![1, 2, 3])?,
                cost_min: env.parse("MIN_COST", 0)?,
                cost_max: env.parse("MAX_COST", 0)?,
                floor_min: env.parse("FLOOR_MIN", 0)?,
                floor_max: env.parse("FLOOR_MAX", 0)?,
                expand: env.list(
                    "EXPAND",
                    DEFAULT_EXPAND.iter().map(|s| s.to_string()).collect(),
                )?,
            },
            storage: StorageConfig {
                database_path: env.string("DATABASE_PATH").map(PathBuf::from),
            },
            retention: RetentionConfig {
                sweep_interval: Duration::from_secs(sweep_secs),
                max_age,
            },
            seen_set: SeenSetConfig {
                trim_threshold: env.parse("SEEN_TRIM_THRESHOLD", 10_000)?,
                trim_window,
            },
            webhooks: WebhookConfig {
                subscribers: env.list("WEBHOOK_SUBSCRIBERS", Vec::new())?,
                timeout: Duration::from_secs(env.positive("WEBHOOK_TIMEOUT_SECS", 10)?),
            },
            logging: LoggingConfig {
                level: env.string("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                json: env.flag("LOG_JSON", false)?,
            },
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.string(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, raw, e)),
            None => Ok(default),
        }
    }

    fn positive(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        let value = self.parse(key, default)?;
        if value == 0 {
            return Err(invalid(key, value, "must be greater than zero"));
        }
        Ok(value)
    }

    fn page_limit(&self, key: &str, default: u32) -> Result<u32, ConfigError> {
        let value = self.parse(key, default)?;
        if value == 0 || value > MAX_PAGE_LIMIT {
            return Err(invalid(
                key,
                value,
                format!("must be between 1 and {MAX_PAGE_LIMIT}"),
            ));
        }
        Ok(value)
    }

    /// Comma-separated list, e.g. `"77,50"`.
    fn list<T>(&self, key: &str, default: Vec<T>) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(raw) = self.string(key) else {
            return Ok(default);
        };

        raw.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse().map_err(|e: T::Err| invalid(key, part, e)))
            .collect()
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.string(key).map(|v| v.to_ascii_lowercase()).as_deref() {
            None => Ok(default),
            Some("1" | "true" | "yes" | "on") => Ok(true),
            Some("0" | "false" | "no" | "off") => Ok(false),
            Some(other) => Err(invalid(key, other, "expected true or false")),
        }
    }

    fn base_url(&self, key: &str) -> Result<Url, ConfigError> {
        let mut raw = self
            .string(key)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| invalid(key, &raw, e))
    }
}

fn invalid(key: &str, value: impl Display, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
