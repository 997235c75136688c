use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_VERSION: u64 = 1;

/// Overrides the configured username when set.
pub const USERNAME_ENV: &str = "TIMEPORT_USERNAME";
/// Password for the identity provider. Never written to the config file.
pub const PASSWORD_ENV: &str = "TIMEPORT_PASSWORD";

fn default_date_format() -> String {
    "%Y/%m/%d".into()
}

fn default_day_format() -> String {
    "%a %m/%d".into()
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".into()
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Some(Self::Chrome),
            "firefox" => Some(Self::Firefox),
            _ => None,
        }
    }
}

/// Upper bounds for every wait against the remote UI, in milliseconds.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Timeouts {
    /// Detail page settling after navigation. Exceeding it is tolerated.
    pub load_idle_ms: u64,
    /// Dialogs appearing or closing, buttons becoming available.
    pub dialog_ms: u64,
    /// Page navigations and URL changes.
    pub navigation_ms: u64,
    /// Sign-in including a manual MFA prompt.
    pub login_ms: u64,
    /// Pause after filling fields so the page can catch up.
    pub settle_ms: u64,
    /// Interval between polls while waiting.
    pub poll_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            load_idle_ms: 5_000,
            dialog_ms: 30_000,
            navigation_ms: 30_000,
            login_ms: 120_000,
            settle_ms: 1_000,
            poll_ms: 250,
        }
    }
}

impl Timeouts {
    pub fn load_idle(&self) -> Duration {
        Duration::from_millis(self.load_idle_ms)
    }

    pub fn dialog(&self) -> Duration {
        Duration::from_millis(self.dialog_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn login(&self) -> Duration {
        Duration::from_millis(self.login_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no config file found at {0}, run `timeport init` first")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config at {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{field} is empty in {path}")]
    Empty { field: &'static str, path: PathBuf },

    #[error("could not determine the config directory")]
    NoConfigDir,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub version: u64,
    /// Your name as the service shows it on conversation entries.
    pub display_name: String,
    /// How the service renders full dates (strftime syntax).
    pub date_format: String,
    /// How the weekly timesheet labels its days (strftime syntax, no year).
    pub day_format: String,
    /// Sign-in name, normally a company email address.
    pub username: String,
    pub webdriver_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub debug_logging: bool,
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            display_name: String::new(),
            date_format: default_date_format(),
            day_format: default_day_format(),
            username: String::new(),
            webdriver_url: default_webdriver_url(),
            browser: Browser::default(),
            headless: false,
            debug_logging: false,
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// The default config file: `<config dir>/timeport/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("timeport").join("config.json"))
    }

    /// Load and validate the config at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate(path)?;
        Ok(config)
    }

    /// Read the config at `path` without validating it. A missing file
    /// yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::read(path) {
            Err(ConfigError::Missing(_)) => Ok(Self::default()),
            other => other,
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let required = [
            ("display-name", &self.display_name),
            ("date-format", &self.date_format),
            ("day-format", &self.day_format),
            ("webdriver-url", &self.webdriver_url),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty {
                    field,
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    /// Username from the environment, falling back to the config.
    pub fn effective_username(&self) -> String {
        std::env::var(USERNAME_ENV)
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.username.clone())
    }

    /// `(key, value)` pairs for display. The password is never included.
    pub fn settings(&self) -> Vec<(&'static str, String)> {
        vec![
            ("version", self.version.to_string()),
            ("display-name", self.display_name.clone()),
            ("date-format", self.date_format.clone()),
            ("day-format", self.day_format.clone()),
            ("username", self.username.clone()),
            ("webdriver-url", self.webdriver_url.clone()),
            ("browser", self.browser.as_str().to_string()),
            ("headless", self.headless.to_string()),
            ("debug-logging", self.debug_logging.to_string()),
            ("timeouts.load-idle-ms", self.timeouts.load_idle_ms.to_string()),
            ("timeouts.dialog-ms", self.timeouts.dialog_ms.to_string()),
            ("timeouts.navigation-ms", self.timeouts.navigation_ms.to_string()),
            ("timeouts.login-ms", self.timeouts.login_ms.to_string()),
            ("timeouts.settle-ms", self.timeouts.settle_ms.to_string()),
            ("timeouts.poll-ms", self.timeouts.poll_ms.to_string()),
        ]
    }
}
