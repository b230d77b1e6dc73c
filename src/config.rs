use crate::error::{Error, ErrorKind, Result};
use crate::utilities::read_file_string;
use failure::ResultExt;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Deployment settings shared by every pipeline run in the process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the installed tool binaries: `<binaries_path>/<tool>/<version>/<exe>`.
    pub binaries_path: PathBuf,
    /// Directory under which per-step temporary artifacts are staged.
    pub temp_path: PathBuf,
    /// Wine launcher for `.exe` tools on non-Windows hosts.
    pub wine_path: Option<PathBuf>,
    /// Seconds after which an external tool is killed; waits forever when unset.
    pub process_timeout: Option<u64>,
    /// Number of requests compiled concurrently.
    pub worker_count: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            binaries_path: PathBuf::from("./binaries"),
            temp_path: PathBuf::from("./.temp"),
            wine_path: None,
            process_timeout: None,
            worker_count: 4,
        }
    }
}

impl Config {
    /// Override settings from `BINARIES_PATH`, `TEMP_PATH`, `WINE_PATH` and
    /// `PROCESS_TIMEOUT` when they are present in the environment.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(path) = env::var("BINARIES_PATH") {
            self.binaries_path = PathBuf::from(path);
        }

        if let Ok(path) = env::var("TEMP_PATH") {
            self.temp_path = PathBuf::from(path);
        }

        if let Ok(path) = env::var("WINE_PATH") {
            if !path.is_empty() {
                self.wine_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(timeout) = env::var("PROCESS_TIMEOUT") {
            let seconds = timeout.trim().parse::<u64>().map_err(|_| {
                Error::config(format!("PROCESS_TIMEOUT '{}' is not a number", timeout))
            })?;
            self.process_timeout = Some(seconds);
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::config("worker_count must be at least 1"));
        }
        if self.process_timeout == Some(0) {
            return Err(Error::config(
                "process_timeout must be positive (omit it to wait indefinitely)",
            ));
        }
        Ok(())
    }

    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout.map(Duration::from_secs)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let config_toml = read_file_string(&path).with_context(|_| ErrorKind::path(path))?;
    parse_config(&config_toml)
}

pub fn parse_config(config_toml: &str) -> Result<Config> {
    let config: Config = toml::from_str(&config_toml)?;
    config.validate()?;
    Ok(config)
}
