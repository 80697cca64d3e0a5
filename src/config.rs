use crate::quota::DEFAULT_DAILY_MAX;
use crate::storage::FileStore;
use crate::types::{EndpointConfig, Environment};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_TEST_URL: &str = "http://localhost:5678/webhook-test/compliance-chat";
pub const DEFAULT_PRODUCTION_URL: &str = "http://localhost:5678/webhook/compliance-chat";

/// Runtime configuration for the chat client.
/// Values are sourced from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub test_url: String,
    pub production_url: String,
    pub environment: Environment,
    pub state_file: PathBuf,
    pub daily_max: u32,
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Config {
    /// Load configuration from environment.
    ///
    /// Env vars:
    /// - CHAT_WEBHOOK_TEST_URL (default: local n8n test webhook)
    /// - CHAT_WEBHOOK_PRODUCTION_URL (default: local n8n production webhook)
    /// - CHAT_ENVIRONMENT (test | production, default: test)
    /// - CHAT_STATE_FILE (default: <data_dir>/compliance-chat/storage.json)
    /// - CHAT_DAILY_MAX (default: 10)
    /// - CHAT_HTTP_TIMEOUT_SECS (default: unset, no timeout)
    /// - CHAT_USER_AGENT (default: compliance-chat/<version>)
    pub fn from_env() -> Result<Self, String> {
        let test_url =
            env::var("CHAT_WEBHOOK_TEST_URL").unwrap_or_else(|_| DEFAULT_TEST_URL.to_string());
        let production_url = env::var("CHAT_WEBHOOK_PRODUCTION_URL")
            .unwrap_or_else(|_| DEFAULT_PRODUCTION_URL.to_string());
        validate_url("CHAT_WEBHOOK_TEST_URL", &test_url)?;
        validate_url("CHAT_WEBHOOK_PRODUCTION_URL", &production_url)?;

        let environment = match env::var("CHAT_ENVIRONMENT") {
            Ok(v) => v.parse::<Environment>()?,
            Err(_) => Environment::Test,
        };
        let state_file = env::var("CHAT_STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| FileStore::default_path());
        let daily_max = parse_number::<u32>("CHAT_DAILY_MAX")?.unwrap_or(DEFAULT_DAILY_MAX);
        // Zero means no timeout, same as leaving it unset.
        let timeout_secs = parse_number::<u64>("CHAT_HTTP_TIMEOUT_SECS")?.filter(|s| *s > 0);
        let default_ua = format!("compliance-chat/{}", env!("CARGO_PKG_VERSION"));
        let user_agent = env::var("CHAT_USER_AGENT").unwrap_or(default_ua);

        Ok(Self {
            test_url,
            production_url,
            environment,
            state_file,
            daily_max,
            timeout_secs,
            user_agent,
        })
    }

    pub fn endpoints(&self) -> EndpointConfig {
        EndpointConfig {
            test_url: self.test_url.clone(),
            production_url: self.production_url.clone(),
            selected: self.environment,
        }
    }
}

fn parse_number<T: FromStr>(name: &str) -> Result<Option<T>, String> {
    parse_number_value(name, env::var(name).ok())
}

// Unset is `None`; set but not a non-negative integer is an error.
fn parse_number_value<T: FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, String> {
    match raw {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{} must be a non-negative integer, got '{}'", name, v)),
    }
}

fn validate_url(name: &str, value: &str) -> Result<(), String> {
    let parsed =
        url::Url::parse(value).map_err(|e| format!("{} is not a valid URL: {}", name, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{} must use http or https, got '{}'", name, other)),
    }
}
