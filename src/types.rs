use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which webhook receives outgoing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Test,
    Production,
}

impl Environment {
    /// Wire value sent in the `environment` payload field.
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    /// Human label shown next to the toggle.
    pub fn label(self) -> &'static str {
        match self {
            Environment::Test => "Test",
            Environment::Production => "Production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}' (expected test or production)", other)),
        }
    }
}

/// Test and production webhook addresses plus the runtime selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub test_url: String,
    pub production_url: String,
    pub selected: Environment,
}

impl EndpointConfig {
    pub fn selected_url(&self) -> &str {
        match self.selected {
            Environment::Test => &self.test_url,
            Environment::Production => &self.production_url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One rendered message in the conversation. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Local>,
    pub is_error: bool,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            timestamp,
            is_error: false,
        }
    }

    pub fn assistant(text: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            timestamp,
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            timestamp,
            is_error: true,
        }
    }
}
