use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// WebSocket base address; channels live at `/watch_list` and `/observe/{id}`
    #[serde(default = "default_server_url")]
    pub url: String,
}

fn default_server_url() -> String {
    "ws://localhost:3001".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
        }
    }
}

impl ServerConfig {
    /// Parse and validate the server address.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url)
            .with_context(|| format!("Invalid server url {:?}", self.url))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => anyhow::bail!(
                "Server url {} must use ws:// or wss://, not {}://",
                self.url,
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// How long a keystroke keeps a session marked as active
    #[serde(default = "default_pulse_ms")]
    pub pulse_ms: u64,
}

fn default_pulse_ms() -> u64 {
    100
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            pulse_ms: default_pulse_ms(),
        }
    }
}

impl ActivityConfig {
    pub fn pulse_delay(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_tick_ms() -> u64 {
    250
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

impl UiConfig {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(16))
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "tidewatch").context("Could not determine home directory")
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Directory for the TUI log file.
pub fn log_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

/// Load the config file, falling back to defaults when it does not exist.
///
/// An explicitly requested path must exist.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (default_config_path()?, false),
    };

    if !path.exists() {
        if explicit {
            anyhow::bail!("Config file not found at {}", path.display());
        }
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    config.server.base_url()?;

    Ok(config)
}

/// Write a config file with owner-only permissions.
pub fn save(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

pub async fn init_wizard() -> Result<()> {
    use std::io::{self, Write};

    println!("Tidewatch Configuration Wizard");
    println!("==============================\n");

    let config_path = default_config_path()?;
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

    print!("Playground server url [{}]: ", default_server_url());
    io::stdout().flush()?;
    let mut server_url = String::new();
    io::stdin().read_line(&mut server_url)?;

    print!("Activity pulse in ms [{}]: ", default_pulse_ms());
    io::stdout().flush()?;
    let mut pulse = String::new();
    io::stdin().read_line(&mut pulse)?;

    let mut config = Config::default();
    if !server_url.trim().is_empty() {
        config.server.url = server_url.trim().to_string();
    }
    if !pulse.trim().is_empty() {
        config.activity.pulse_ms = pulse
            .trim()
            .parse()
            .with_context(|| format!("Not a number of milliseconds: {}", pulse.trim()))?;
    }
    config.server.base_url()?;

    save(&config, &config_path)?;

    println!("\nConfig saved to {}", config_path.display());
    println!("Run `tidewatch` to browse playgrounds.");

    Ok(())
}
