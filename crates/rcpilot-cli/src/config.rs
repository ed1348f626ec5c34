//! Configuration – reads/writes `~/.rcpilot/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rcpilot_kernel::NamedValues;
use rcpilot_kernel::named_values::THROTTLE_TIME;
use rcpilot_types::{ActuatorConfig, PilotError};
use serde::{Deserialize, Serialize};

/// Persisted configuration.  Every field has a default, so an empty file is
/// a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP + WebSocket port.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Directory served for paths other than `/`, `/command` and `/status`.
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// Shortcut for `named_values.throttleTime`; wins when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_time_ms: Option<u32>,

    /// Simulated time the servo board takes to report ready.
    #[serde(default)]
    pub board_ready_delay_ms: u64,

    /// Extra or replacement command tokens (`forward = 60`).
    #[serde(default)]
    pub named_values: BTreeMap<String, i32>,

    #[serde(default = "ActuatorConfig::acceleration")]
    pub acceleration: ActuatorConfig,

    #[serde(default = "ActuatorConfig::steering")]
    pub steering: ActuatorConfig,
}

fn default_http_port() -> u16 {
    80
}
fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            public_dir: default_public_dir(),
            throttle_time_ms: None,
            board_ready_delay_ms: 0,
            named_values: BTreeMap::new(),
            acceleration: ActuatorConfig::acceleration(),
            steering: ActuatorConfig::steering(),
        }
    }
}

impl Config {
    /// The dispatcher's lookup table: stock values, then `[named_values]`,
    /// then `throttle_time_ms`.
    pub fn named_values(&self) -> NamedValues {
        let mut overrides = self.named_values.clone();
        if let Some(ms) = self.throttle_time_ms {
            overrides.insert(THROTTLE_TIME.to_string(), i32::try_from(ms).unwrap_or(i32::MAX));
        }
        NamedValues::with_overrides(overrides)
    }

    pub fn board_ready_delay(&self) -> Duration {
        Duration::from_millis(self.board_ready_delay_ms)
    }
}

/// Return the path to `~/.rcpilot/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rcpilot").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
/// Environment overrides are left to the caller.
pub fn load_from(path: &Path) -> Result<Option<Config>, PilotError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        PilotError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| PilotError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `RCPILOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `RCPILOT_HTTP_PORT` | `http_port` |
/// | `RCPILOT_PUBLIC_DIR` | `public_dir` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("RCPILOT_HTTP_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.http_port = port;
    }
    if let Ok(v) = std::env::var("RCPILOT_PUBLIC_DIR") {
        cfg.public_dir = PathBuf::from(v);
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), PilotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            PilotError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| PilotError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        PilotError::Config(format!("failed to write config at {}: {e}", path.display()))
    })
}
