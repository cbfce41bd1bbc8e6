use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathsConfig {
    /// Root of the per-session directories (`<root>/<id>/events.jsonl`)
    #[serde(default)]
    pub session_state_dir: Option<PathBuf>,
    /// Where caches and the browser anchor document live
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// JSON map of session id -> pid for sessions resumed elsewhere
    #[serde(default)]
    pub active_registry: Option<PathBuf>,
    /// JSON map of session id -> alias
    #[serde(default)]
    pub aliases: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_fallback_poll")]
    pub fallback_poll_secs: u64,
    #[serde(default = "default_staleness_minutes")]
    pub staleness_minutes: i64,
}

fn default_refresh_interval() -> u64 {
    3
}

fn default_fallback_poll() -> u64 {
    30
}

fn default_staleness_minutes() -> i64 {
    30
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            fallback_poll_secs: default_fallback_poll(),
            staleness_minutes: default_staleness_minutes(),
        }
    }
}

impl PollingConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn fallback_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_poll_secs)
    }

    pub fn staleness(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.staleness_minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Title prefixes the agent sets on its own window while working
    #[serde(default = "default_working_prefixes")]
    pub working_title_prefixes: Vec<String>,
    /// Minimize other sessions' windows when focusing one
    #[serde(default)]
    pub auto_hide: bool,
    /// Titles of shell windows that have not been renamed yet
    #[serde(default = "default_generic_shell_titles")]
    pub generic_shell_titles: Vec<String>,
}

fn default_working_prefixes() -> Vec<String> {
    vec!["🤖".to_string()]
}

fn default_generic_shell_titles() -> Vec<String> {
    [
        "Windows PowerShell",
        "PowerShell",
        "Command Prompt",
        "pwsh",
        "bash",
        "zsh",
        "sh",
        "fish",
        "Terminal",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            working_title_prefixes: default_working_prefixes(),
            auto_hide: false,
            generic_shell_titles: default_generic_shell_titles(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Program used to open the anchor document
    #[serde(default = "default_browser_command")]
    pub command: String,
    /// WM classes (substring, case-insensitive) identifying browser windows
    #[serde(default = "default_window_classes")]
    pub window_classes: Vec<String>,
    #[serde(default = "default_open_timeout")]
    pub open_timeout_ms: u64,
}

fn default_browser_command() -> String {
    "xdg-open".to_string()
}

fn default_window_classes() -> Vec<String> {
    ["chromium", "google-chrome", "microsoft-edge", "brave", "firefox"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_open_timeout() -> u64 {
    10_000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            command: default_browser_command(),
            window_classes: default_window_classes(),
            open_timeout_ms: default_open_timeout(),
        }
    }
}

impl BrowserConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

impl Config {
    pub fn session_state_dir(&self) -> PathBuf {
        self.paths.session_state_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".copilot/session-state"))
                .unwrap_or_else(|| PathBuf::from("/tmp/.copilot/session-state"))
        })
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.paths.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(directories::ProjectDirs::from("com", "lookout", "lookout")
                .context("Could not determine data directory")?
                .data_dir()
                .to_path_buf()),
        }
    }

    pub fn handle_cache_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("handles.json"))
    }

    pub fn status_cache_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("status.json"))
    }

    pub fn terminal_cache_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("terminals.json"))
    }

    pub fn anchor_document_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("anchor.html"))
    }

    pub fn saved_tabs_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("workspace-tabs.json"))
    }

    /// Tracking requests queued by one-shot commands for the running loop
    pub fn track_requests_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("track-requests.json"))
    }

    pub fn active_registry_path(&self) -> Result<PathBuf> {
        match &self.paths.active_registry {
            Some(path) => Ok(path.clone()),
            None => Ok(self.data_dir()?.join("active-sessions.json")),
        }
    }

    pub fn aliases_path(&self) -> Result<PathBuf> {
        match &self.paths.aliases {
            Some(path) => Ok(path.clone()),
            None => Ok(self.data_dir()?.join("aliases.json")),
        }
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let dir = directories::ProjectDirs::from("", "", "lookout")
        .context("Could not determine config directory")?
        .config_dir()
        .to_path_buf();
    Ok(dir)
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load the config, falling back to defaults when no file exists.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    Ok(config)
}

/// Write a default config file, asking before overwriting an existing one.
pub fn init(path: Option<&Path>) -> Result<()> {
    use std::io::{self, Write};

    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if config_path.exists() {
        print!("Config already exists at {}. Overwrite? [y/N] ", config_path.display());
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(&config_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))?;
    }

    println!("Config saved to {}", config_path.display());
    Ok(())
}
