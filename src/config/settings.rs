//! User settings: remote location, credentials, poll interval.
//!
//! Stored as JSON at the resolved config path. Environment variables
//! override individual fields at load time. Nothing talks to the remote
//! until [`Settings::validate`] has produced a [`ValidSettings`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Keys accepted by `config set` / `config unset`.
pub const SETTING_KEYS: &[&str] = &["url", "username", "password", "interval", "tree_path", "confirm"];

/// Raw settings as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// URL of the shared bookmark document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Poll interval in minutes, kept as the user wrote it.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub interval: Option<String>,

    /// Local bookmark tree file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_path: Option<PathBuf>,

    /// Ask before applying changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm: Option<bool>,
}

/// Settings that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    pub interval: Duration,
    pub confirm: bool,
}

/// Accept `"5"` and `5` alike.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

impl Settings {
    /// Load settings from `path`. A missing file yields empty settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
    }

    /// Load settings and apply `MARKSYNC_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Same as [`Settings::load`].
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut settings = Self::load(path)?;
        settings.apply_overrides(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// Save settings to `path`, creating the parent directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        crate::storage::file::atomic_write(path, &content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))
    }

    /// Override fields from environment-style lookups. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MARKSYNC_URL") {
            self.url = Some(v);
        }
        if let Some(v) = get("MARKSYNC_USERNAME") {
            self.username = Some(v);
        }
        if let Some(v) = get("MARKSYNC_PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = get("MARKSYNC_INTERVAL") {
            self.interval = Some(v);
        }
    }

    /// Set one field from its string form.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for an unknown key or a non-boolean `confirm`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "url" => self.url = Some(value.to_string()),
            "username" => self.username = Some(value.to_string()),
            "password" => self.password = Some(value.to_string()),
            "interval" => self.interval = Some(value.to_string()),
            "tree_path" => self.tree_path = Some(PathBuf::from(value)),
            "confirm" => {
                let flag = value.parse::<bool>().map_err(|_| {
                    Error::InvalidArgument(format!("confirm must be true or false, got '{value}'"))
                })?;
                self.confirm = Some(flag);
            }
            other => return Err(unknown_key(other)),
        }
        Ok(())
    }

    /// Clear one field.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for an unknown key.
    pub fn unset(&mut self, key: &str) -> Result<()> {
        match key {
            "url" => self.url = None,
            "username" => self.username = None,
            "password" => self.password = None,
            "interval" => self.interval = None,
            "tree_path" => self.tree_path = None,
            "confirm" => self.confirm = None,
            other => return Err(unknown_key(other)),
        }
        Ok(())
    }

    /// Copy safe to print: the password is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            password: self.password.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }

    /// Check that a sync can be attempted.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first missing or invalid field,
    /// checked in the order url, username, password, interval.
    pub fn validate(&self) -> Result<ValidSettings> {
        let url = required(self.url.as_deref(), "url")?;
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| Error::Config(format!("url is invalid: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        let username = required(self.username.as_deref(), "username")?;
        let password = required(self.password.as_deref(), "password")?;

        let raw_interval = required(self.interval.as_deref(), "interval")?;
        let minutes: f64 = raw_interval
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("interval must be a number of minutes, got '{raw_interval}'")))?;
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(Error::Config(format!(
                "interval must be a positive number of minutes, got '{raw_interval}'"
            )));
        }
        let interval = Duration::try_from_secs_f64(minutes * 60.0).map_err(|_| {
            Error::Config(format!("interval is too large, got '{raw_interval}' minutes"))
        })?;

        Ok(ValidSettings {
            url: url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            interval,
            confirm: self.confirm.unwrap_or(false),
        })
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{field} is missing")))
}

fn unknown_key(key: &str) -> Error {
    Error::InvalidArgument(format!(
        "unknown setting '{key}' (expected one of: {})",
        SETTING_KEYS.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn complete() -> Settings {
        Settings {
            url: Some("https://dav.example/bookmarks.json".into()),
            username: Some("ana".into()),
            password: Some("secret".into()),
            interval: Some("5".into()),
            ..Settings::default()
        }
    }

    #[test]
    fn test_validate_complete_settings() {
        let valid = complete().validate().unwrap();
        assert_eq!(valid.interval, Duration::from_secs(300));
        assert!(!valid.confirm);
    }

    #[test]
    fn test_validate_names_first_missing_field() {
        let mut settings = complete();
        settings.username = Some("  ".into());
        settings.interval = None;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("username")), "{err}");
    }

    #[test]
    fn test_validate_rejects_bad_interval() {
        for raw in ["abc", "0", "-3", "NaN"] {
            let mut settings = complete();
            settings.interval = Some(raw.into());
            let err = settings.validate().unwrap_err();
            assert!(err.to_string().contains("interval"), "{raw}: {err}");
        }

        let mut settings = complete();
        settings.interval = Some("0.5".into());
        assert_eq!(settings.validate().unwrap().interval, Duration::from_secs(30));
    }

    #[test]
    fn test_validate_rejects_huge_interval() {
        let mut settings = complete();
        settings.interval = Some("1e300".into());
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("interval is too large")), "{err}");
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let mut settings = complete();
        settings.url = Some("ftp://files.example/b.json".into());
        assert!(settings.validate().unwrap_err().to_string().contains("http"));

        settings.url = Some("not a url".into());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_interval_accepts_number_in_file() {
        let settings: Settings = serde_json::from_str(r#"{"url":"https://x.example","interval":15}"#).unwrap();
        assert_eq!(settings.interval.as_deref(), Some("15"));
    }

    #[test]
    fn test_env_overrides_win() {
        let mut settings = complete();
        settings.apply_overrides(|name| match name {
            "MARKSYNC_URL" => Some("https://other.example/b.json".into()),
            "MARKSYNC_PASSWORD" => Some(String::new()),
            _ => None,
        });
        assert_eq!(settings.url.as_deref(), Some("https://other.example/b.json"));
        assert_eq!(settings.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_set_unset_and_save_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut settings = Settings::load(&path).unwrap();
        assert_eq!(settings, Settings::default());

        settings.set("url", "https://dav.example/b.json").unwrap();
        settings.set("confirm", "true").unwrap();
        assert!(settings.set("confirm", "maybe").is_err());
        assert!(settings.set("colour", "blue").is_err());
        settings.save(&path).unwrap();

        let mut loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.confirm, Some(true));
        loaded.unset("url").unwrap();
        assert!(loaded.url.is_none());
    }

    #[test]
    fn test_redacted_masks_password() {
        let shown = complete().redacted();
        assert_eq!(shown.password.as_deref(), Some("********"));
        assert_eq!(shown.username.as_deref(), Some("ana"));
    }
}
