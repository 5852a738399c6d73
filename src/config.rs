use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_FORM_IDS: &str = "ynFUyrAc,i6GB06nW,OejwZ32V";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub webhook_secret: String,
    pub typeform_webhook_secret: Option<String>,
    pub typeform_token: Option<String>,
    pub typeform_base_url: String,
    pub application_form_ids: Vec<String>,
    pub page_size: usize,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub page_delay: Duration,
    pub upstream_max_retries: u32,
    pub upstream_retry_backoff: Duration,
    pub request_timeout: Duration,
    pub store_timeout: Duration,
    pub name_scan_limit: usize,
    pub webhook_rps: u32,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub messaging_url: Option<String>,
    pub messaging_token: Option<String>,
    pub default_country_code: String,
    pub field_alias_map_path: Option<String>,
    pub sync_cron: Option<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            webhook_secret: get_env("WEBHOOK_SECRET")?,
            typeform_webhook_secret: get_optional("TYPEFORM_WEBHOOK_SECRET"),
            typeform_token: get_optional("TYPEFORM_TOKEN"),
            typeform_base_url: get_url(
                "TYPEFORM_BASE_URL",
                get_optional("TYPEFORM_BASE_URL")
                    .unwrap_or_else(|| "https://api.typeform.com".to_string()),
            )?,
            application_form_ids: parse_list(
                &get_optional("APPLICATION_FORM_IDS").unwrap_or_else(|| DEFAULT_FORM_IDS.to_string()),
            ),
            page_size: get_env_parse_or("PAGE_SIZE", 200)?,
            batch_size: get_env_parse_or("BATCH_SIZE", 10)?,
            batch_delay: Duration::from_millis(get_env_parse_or("BATCH_DELAY_MS", 2000)?),
            page_delay: Duration::from_millis(get_env_parse_or("PAGE_DELAY_MS", 1000)?),
            upstream_max_retries: get_env_parse_or("UPSTREAM_MAX_RETRIES", 3)?,
            upstream_retry_backoff: Duration::from_millis(get_env_parse_or(
                "UPSTREAM_RETRY_BACKOFF_MS",
                1500,
            )?),
            request_timeout: Duration::from_secs(get_env_parse_or("REQUEST_TIMEOUT_SECS", 30)?),
            store_timeout: Duration::from_secs(get_env_parse_or("STORE_TIMEOUT_SECS", 10)?),
            name_scan_limit: get_env_parse_or("NAME_SCAN_LIMIT", 500)?,
            webhook_rps: get_env_parse_or("WEBHOOK_RPS", 20)?,
            openai_api_key: get_optional("OPENAI_API_KEY"),
            openai_model: get_optional("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            messaging_url: get_optional("MESSAGING_URL")
                .map(|raw| get_url("MESSAGING_URL", raw))
                .transpose()?,
            messaging_token: get_optional("MESSAGING_TOKEN"),
            default_country_code: get_optional("DEFAULT_COUNTRY_CODE")
                .unwrap_or_else(|| "55".to_string()),
            field_alias_map_path: get_optional("FIELD_ALIAS_MAP_PATH"),
            sync_cron: get_optional("SYNC_CRON"),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}

fn get_url(name: &str, raw: String) -> Result<String> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("Invalid URL for {}: {}", name, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Config(format!("{} must be an http(s) URL", name)));
    }
    Ok(raw.trim().to_string())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}
