use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

// -----------------------------------------------------------------------------
// Config (root)
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub parser: ParserSection,
    #[serde(default)]
    pub surface: SurfaceSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            scheduler: SchedulerConfig::default(),
            parser: ParserSection::default(),
            surface: SurfaceSection::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let path = Path::new(path);
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        serde_json::from_str(&contents).map_err(ConfigError::Json)
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".chime/timers")
}

// -----------------------------------------------------------------------------
// SchedulerConfig
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,
    #[serde(default = "default_restart_delay")]
    pub restart_delay_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            restart_delay_seconds: default_restart_delay(),
        }
    }
}

fn default_horizon_days() -> i64 {
    40
}

fn default_restart_delay() -> u64 {
    5
}

// -----------------------------------------------------------------------------
// ParserSection
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ParserSection {
    #[serde(default = "default_adjacency_gap")]
    pub adjacency_gap: usize,
    #[serde(default = "default_message")]
    pub default_message: String,
}

impl Default for ParserSection {
    fn default() -> Self {
        Self {
            adjacency_gap: default_adjacency_gap(),
            default_message: default_message(),
        }
    }
}

fn default_adjacency_gap() -> usize {
    3
}

fn default_message() -> String {
    "...".to_string()
}

// -----------------------------------------------------------------------------
// SurfaceSection
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SurfaceSection {
    #[serde(default = "default_event")]
    pub event: String,
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
    #[serde(default = "default_prompt_timeout")]
    pub prompt_timeout_seconds: u64,
}

impl Default for SurfaceSection {
    fn default() -> Self {
        Self {
            event: default_event(),
            list_limit: default_list_limit(),
            prompt_timeout_seconds: default_prompt_timeout(),
        }
    }
}

fn default_event() -> String {
    "blast".to_string()
}

fn default_list_limit() -> usize {
    10
}

fn default_prompt_timeout() -> u64 {
    15
}

// -----------------------------------------------------------------------------
// ConfigError
// -----------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {e}"),
            ConfigError::Json(e) => write!(f, "failed to parse config file: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data_dir, PathBuf::from(".chime/timers"));
        assert_eq!(config.scheduler.horizon_days, 40);
        assert_eq!(config.scheduler.restart_delay_seconds, 5);
        assert_eq!(config.parser.adjacency_gap, 3);
        assert_eq!(config.parser.default_message, "...");
        assert_eq!(config.surface.event, "blast");
        assert_eq!(config.surface.list_limit, 10);
        assert_eq!(config.surface.prompt_timeout_seconds, 15);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let tmp_dir = TempDir::new().unwrap();
        let missing_path = tmp_dir.path().join("missing-config.json");
        let config = Config::load(missing_path.to_str().unwrap()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from(".chime/timers"));
        assert_eq!(config.scheduler.horizon_days, 40);
    }

    #[test]
    fn test_load_valid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
{{
  "data_dir": "/var/lib/chime",
  "scheduler": {{ "horizon_days": 14, "restart_delay_seconds": 2 }},
  "surface": {{ "list_limit": 25 }}
}}
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/chime"));
        assert_eq!(config.scheduler.horizon_days, 14);
        assert_eq!(config.scheduler.restart_delay_seconds, 2);
        assert_eq!(config.surface.list_limit, 25);
    }

    #[test]
    fn test_load_partial_json_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "parser": {{ "adjacency_gap": 5 }} }}"#).unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.parser.adjacency_gap, 5);
        assert_eq!(config.parser.default_message, "..."); // default
        assert_eq!(config.data_dir, PathBuf::from(".chime/timers")); // default
        assert_eq!(config.surface.event, "blast"); // default
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{ not json").unwrap();

        let result = Config::load(file.path().to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_config_error_display() {
        let io_error = ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "test",
        ));
        assert!(io_error.to_string().contains("failed to read config file"));
    }
}
