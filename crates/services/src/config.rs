use std::env;
use std::path::PathBuf;

use edu_core::model::UserId;

use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite:edusentri.sqlite3";
pub const DEFAULT_CHAT_CREDITS: u32 = 20;
pub const DEFAULT_DISPLAY_NAME: &str = "Estudante";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatConfig {
    pub webhook_url: String,
}

impl ChatConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let webhook_url = lookup("EDU_CHAT_WEBHOOK_URL")?;
        if webhook_url.trim().is_empty() {
            return None;
        }
        Some(Self {
            webhook_url: webhook_url.trim().to_owned(),
        })
    }
}

/// Runtime settings for the app, read from `EDU_*` environment variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub db_url: String,
    pub user_id: UserId,
    pub display_name: String,
    pub cache_dir: Option<PathBuf>,
    pub chat: Option<ChatConfig>,
    pub chat_credits: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_owned(),
            user_id: UserId::new(1),
            display_name: DEFAULT_DISPLAY_NAME.to_owned(),
            cache_dir: None,
            chat: None,
            chat_credits: DEFAULT_CHAT_CREDITS,
        }
    }
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_url = lookup("EDU_DB_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.db_url);
        let user_id = match lookup("EDU_USER_ID") {
            Some(raw) => UserId::new(parse_var("EDU_USER_ID", &raw)?),
            None => defaults.user_id,
        };
        let display_name = lookup("EDU_DISPLAY_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.display_name);
        let cache_dir = lookup("EDU_CACHE_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let chat_credits = match lookup("EDU_CHAT_CREDITS") {
            Some(raw) => parse_var("EDU_CHAT_CREDITS", &raw)?,
            None => defaults.chat_credits,
        };

        Ok(Self {
            db_url,
            user_id,
            display_name,
            cache_dir,
            chat: ChatConfig::from_lookup(&lookup),
            chat_credits,
        })
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        raw: raw.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.chat.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = AppConfig::from_lookup(lookup(&[
            ("EDU_DB_URL", "sqlite::memory:"),
            ("EDU_USER_ID", "42"),
            ("EDU_CACHE_DIR", "/tmp/edu"),
            ("EDU_CHAT_WEBHOOK_URL", " https://hooks.example.com/chat "),
            ("EDU_CHAT_CREDITS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.db_url, "sqlite::memory:");
        assert_eq!(config.user_id, UserId::new(42));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/edu")));
        assert_eq!(
            config.chat.map(|c| c.webhook_url),
            Some("https://hooks.example.com/chat".to_owned())
        );
        assert_eq!(config.chat_credits, 5);
    }

    #[test]
    fn blank_webhook_disables_chat() {
        let config = AppConfig::from_lookup(lookup(&[("EDU_CHAT_WEBHOOK_URL", "  ")])).unwrap();
        assert!(config.chat.is_none());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("EDU_USER_ID", "abc")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "EDU_USER_ID",
                raw: "abc".into()
            }
        );
        assert!(AppConfig::from_lookup(lookup(&[("EDU_CHAT_CREDITS", "-1")])).is_err());
    }
}
