use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::driver::web::{BrowserType, WebDriverConfig};

const LOCAL_CONFIG: &str = "lumi-recorder.yaml";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    /// Port of the recorder API
    pub port: u16,

    /// Public base URL the capture script posts events to.
    /// Defaults to `http://localhost:<port>`.
    pub base_url: Option<String>,

    /// Lifecycle monitor polling interval (ms)
    pub poll_interval_ms: u64,

    /// Quality rules file. The built-in rule set is used when absent.
    pub quality_rules: Option<PathBuf>,

    /// Root folder of the per-project locator files
    pub locators_dir: PathBuf,

    /// Browser launched for each recording session
    pub browser: BrowserConfig,
}

/// Browser section of the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BrowserConfig {
    pub browser_type: String,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub executable: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 9090,
            base_url: None,
            poll_interval_ms: 1000,
            quality_rules: None,
            locators_dir: PathBuf::from("locators"),
            browser: BrowserConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser_type: "chromium".to_string(),
            headless: false,
            viewport_width: 1280,
            viewport_height: 900,
            executable: None,
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, or from the default locations:
    /// 1. ./lumi-recorder.yaml
    /// 2. ~/.lumi/recorder.yaml
    /// 3. Built-in defaults
    ///
    /// Environment overrides (`LUMI_HEADLESS`, `LUMI_RECORDER_PORT`) are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_location(),
        };

        let mut config = match candidate {
            Some(p) => Self::load_from(&p)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    fn default_location() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            return Some(local);
        }
        dirs::home_dir()
            .map(|home| home.join(".lumi").join("recorder.yaml"))
            .filter(|p| p.exists())
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("LUMI_HEADLESS") {
            self.browser.headless = v == "true" || v == "1";
        }
        if let Some(port) = std::env::var("LUMI_RECORDER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.port = port;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    pub fn public_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }

    pub fn web_driver_config(&self) -> WebDriverConfig {
        let browser_type = match self.browser.browser_type.to_lowercase().as_str() {
            "firefox" => BrowserType::Firefox,
            "webkit" | "safari" => BrowserType::Webkit,
            _ => BrowserType::Chromium,
        };
        WebDriverConfig {
            browser_type,
            headless: self.browser.headless,
            viewport_width: self.browser.viewport_width,
            viewport_height: self.browser.viewport_height,
            executable: self.browser.executable.clone(),
        }
    }
}
