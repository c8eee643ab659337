mod selectors;

pub use selectors::Selectors;

use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{PortalError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Portal endpoints and account scope
    #[serde(default)]
    pub portal: PortalConfig,

    /// Browser configuration
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Polling budgets
    #[serde(default)]
    pub wait: WaitConfig,

    /// Where artifacts and diagnostics land
    #[serde(default)]
    pub output: OutputConfig,

    /// Markup selectors and page-text markers for the portal UI
    #[serde(default)]
    pub selectors: Selectors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal root, used as the session base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// App identifiers listing
    #[serde(default = "default_app_ids_url")]
    pub app_ids_url: String,

    /// Preferred team, skips the interactive team picker
    pub team_id: Option<String>,

    /// Sent as Accept-Language; text markers assume English
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_ids_url: default_app_ids_url(),
            team_id: None,
            language: default_language(),
        }
    }
}

fn default_base_url() -> String {
    "https://developer.apple.com/devcenter/ios/index.action".to_string()
}

fn default_app_ids_url() -> String {
    "https://developer.apple.com/account/ios/identifiers/bundle/bundleList.action".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Browser executable path (overrides auto-discovery)
    pub executable: Option<String>,

    /// Run without an on-screen window
    #[serde(default = "default_true")]
    pub headless: bool,

    /// CDP port for the launched browser
    #[serde(default = "default_cdp_port")]
    pub cdp_port: u16,

    /// User data directory (defaults to a folder under the temp folder)
    pub user_data_dir: Option<String>,

    /// Extra browser arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            cdp_port: default_cdp_port(),
            user_data_dir: None,
            extra_args: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cdp_port() -> u16 {
    9333
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Empty polls tolerated before an element is declared missing
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between element polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Delay between checks of the certificate generation indicator
    #[serde(default = "default_generation_poll_interval_ms")]
    pub generation_poll_interval_ms: u64,

    /// Fixed delay after opening an app row
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            generation_poll_interval_ms: default_generation_poll_interval_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl WaitConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn generation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.generation_poll_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

fn default_max_attempts() -> u32 {
    100
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_generation_poll_interval_ms() -> u64 {
    2000
}

fn default_settle_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Certificates are written here as aps_<environment>_<app>.cer
    #[serde(default = "default_tmp_folder")]
    pub tmp_folder: PathBuf,

    /// Error screenshots are written here
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,

    /// Open error screenshots in the local viewer
    #[serde(default = "default_true")]
    pub open_screenshots: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tmp_folder: default_tmp_folder(),
            screenshot_dir: default_screenshot_dir(),
            open_screenshots: true,
        }
    }
}

fn default_tmp_folder() -> PathBuf {
    std::env::temp_dir().join("pushcert")
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// Load configuration from all sources (file, env, defaults)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            // PUSHCERT_WAIT__MAX_ATTEMPTS=50 -> wait.max_attempts
            .merge(Env::prefixed("PUSHCERT_").split("__"))
            .extract()
            .map_err(|e| PortalError::Config(e.to_string()))
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pushcert")
            .join("config.toml")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| PortalError::Config(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Team id from the config, ignoring blank values
    pub fn team_id(&self) -> Option<&str> {
        self.portal
            .team_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_matches_portal_conventions() {
        let config = Config::default();

        assert_eq!(config.portal.language, "en");
        assert!(config.browser.headless);
        assert_eq!(config.wait.max_attempts, 100);
        assert_eq!(config.wait.poll_interval(), Duration::from_millis(200));
        assert!(config.portal.team_id.is_none());
    }

    #[test]
    fn blank_team_id_is_treated_as_missing() {
        let mut config = Config::default();
        config.portal.team_id = Some("   ".to_string());
        assert_eq!(config.team_id(), None);

        config.portal.team_id = Some(" ABCDE12345 ".to_string());
        assert_eq!(config.team_id(), Some("ABCDE12345"));
    }

    #[test]
    #[serial]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[portal]
team_id = "TEAM42"

[wait]
max_attempts = 5

[selectors]
loading_indicator = ".spinner"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.team_id(), Some("TEAM42"));
        assert_eq!(config.wait.max_attempts, 5);
        assert_eq!(config.wait.poll_interval_ms, 200);
        assert_eq!(config.selectors.loading_indicator, ".spinner");
        assert_eq!(config.selectors.download_button, ".button.small.blue");
    }

    #[test]
    #[serial]
    fn env_values_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[wait]\nmax_attempts = 5\n").unwrap();

        std::env::set_var("PUSHCERT_WAIT__MAX_ATTEMPTS", "7");
        let config = Config::load_from(&path);
        std::env::remove_var("PUSHCERT_WAIT__MAX_ATTEMPTS");

        assert_eq!(config.unwrap().wait.max_attempts, 7);
    }
}
