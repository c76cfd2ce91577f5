//! TOML configuration for the RFB server.
//!
//! The file is optional; every field has a default so a missing file, an
//! empty file, or one that names only a few keys all produce a working
//! configuration:
//!
//! ```toml
//! [server]
//! name = "lab-console"
//!
//! [network]
//! port = 5901
//!
//! [engine]
//! tick_interval_ms = 250
//! ```
//!
//! Command-line flags are applied on top of the loaded file by the binary.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rfb_core::protocol::messages::RECTANGLE_HEADER_SIZE;
use rfb_core::EngineConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub input: InputSection,
}

/// Identity and logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Desktop name sent to viewers in ServerInit.
    #[serde(default = "default_name")]
    pub name: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listener and socket buffer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    /// IP address to bind to. `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Concurrent sessions allowed; further peers are turned away.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Largest single read handed to the engine.
    #[serde(default = "default_read_chunk")]
    pub read_chunk: usize,
    /// Outbound buffer per session; writes beyond it report backpressure.
    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,
}

/// Protocol engine tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSection {
    #[serde(default = "default_receive_window")]
    pub receive_window: usize,
    #[serde(default = "default_grid")]
    pub grid_columns: u16,
    #[serde(default = "default_grid")]
    pub grid_rows: u16,
    #[serde(default = "default_max_segment")]
    pub max_segment: usize,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_retry_ticks")]
    pub retry_ticks: u32,
}

/// The in-memory display served to viewers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplaySection {
    #[serde(default = "default_width")]
    pub width: u16,
    #[serde(default = "default_height")]
    pub height: u16,
    /// Repaint a moving band so viewers see updates.
    #[serde(default = "default_true")]
    pub animate: bool,
    #[serde(default = "default_animate_interval_ms")]
    pub animate_interval_ms: u64,
}

/// Keyboard injection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSection {
    /// Scancode bytes buffered before key events are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_name() -> String {
    "rfb-console".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5900
}
fn default_max_connections() -> usize {
    4
}
fn default_read_chunk() -> usize {
    1024
}
fn default_send_buffer() -> usize {
    8192
}
fn default_receive_window() -> usize {
    EngineConfig::default().receive_window
}
fn default_grid() -> u16 {
    8
}
fn default_max_segment() -> usize {
    EngineConfig::default().max_segment
}
fn default_tick_interval_ms() -> u64 {
    500
}
fn default_retry_ticks() -> u32 {
    EngineConfig::default().retry_ticks
}
fn default_width() -> u16 {
    1024
}
fn default_height() -> u16 {
    768
}
fn default_true() -> bool {
    true
}
fn default_animate_interval_ms() -> u64 {
    250
}
fn default_queue_capacity() -> usize {
    64
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_connections: default_max_connections(),
            read_chunk: default_read_chunk(),
            send_buffer: default_send_buffer(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            receive_window: default_receive_window(),
            grid_columns: default_grid(),
            grid_rows: default_grid(),
            max_segment: default_max_segment(),
            tick_interval_ms: default_tick_interval_ms(),
            retry_ticks: default_retry_ticks(),
        }
    }
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            animate: default_true(),
            animate_interval_ms: default_animate_interval_ms(),
        }
    }
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

impl AppConfig {
    /// Checks values the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.engine;
        let n = &self.network;
        let d = &self.display;
        if e.grid_columns == 0 || e.grid_rows == 0 {
            return Err(invalid("engine.grid_columns and engine.grid_rows must be non-zero"));
        }
        if e.receive_window == 0 {
            return Err(invalid("engine.receive_window must be non-zero"));
        }
        if e.max_segment == 0 {
            return Err(invalid("engine.max_segment must be non-zero"));
        }
        if e.tick_interval_ms == 0 {
            return Err(invalid("engine.tick_interval_ms must be non-zero"));
        }
        if n.read_chunk == 0 {
            return Err(invalid("network.read_chunk must be non-zero"));
        }
        if n.send_buffer < RECTANGLE_HEADER_SIZE + e.max_segment {
            return Err(invalid(&format!(
                "network.send_buffer ({}) must hold a rectangle header plus one segment ({})",
                n.send_buffer,
                RECTANGLE_HEADER_SIZE + e.max_segment
            )));
        }
        if d.width == 0 || d.height == 0 {
            return Err(invalid("display.width and display.height must be non-zero"));
        }
        if d.animate && d.animate_interval_ms == 0 {
            return Err(invalid("display.animate_interval_ms must be non-zero"));
        }
        Ok(())
    }

    /// Socket address the listener binds to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `network.bind_address` is not an IP
    /// address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.network.bind_address.parse().map_err(|_| {
            invalid(&format!(
                "network.bind_address '{}' is not an IP address",
                self.network.bind_address
            ))
        })?;
        Ok(SocketAddr::new(ip, self.network.port))
    }

    /// Engine settings for each new connection.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            receive_window: self.engine.receive_window,
            grid_columns: self.engine.grid_columns,
            grid_rows: self.engine.grid_rows,
            max_segment: self.engine.max_segment,
            retry_ticks: self.engine.retry_ticks,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.engine.tick_interval_ms)
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_app_config_default_listens_on_5900() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.network.port, 5900);
        assert_eq!(cfg.bind_addr().unwrap().to_string(), "0.0.0.0:5900");
    }

    #[test]
    fn test_app_config_default_engine_matches_core_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.engine_config(), EngineConfig::default());
        assert_eq!(cfg.tick_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_app_config_default_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_deserialize_partial_section_keeps_other_defaults() {
        // Arrange
        let toml_str = r#"
[network]
port = 5901

[server]
name = "lab"
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.network.port, 5901);
        assert_eq!(cfg.network.max_connections, 4);
        assert_eq!(cfg.server.name, "lab");
        assert_eq!(cfg.server.log_level, "info");
        assert_eq!(cfg.display.width, 1024);
    }

    #[test]
    fn test_deserialize_invalid_toml_returns_parse_error() {
        let result: Result<AppConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_grid() {
        let mut cfg = AppConfig::default();
        cfg.engine.grid_rows = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_send_buffer_smaller_than_segment() {
        let mut cfg = AppConfig::default();
        cfg.network.send_buffer = cfg.engine.max_segment;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_display() {
        let mut cfg = AppConfig::default();
        cfg.display.width = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bind_addr_rejects_hostname() {
        let mut cfg = AppConfig::default();
        cfg.network.bind_address = "not.an.ip".to_string();
        assert!(matches!(cfg.bind_addr(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/rfb.toml");
        assert_eq!(load_config(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_load_config_reads_pretty_printed_file() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("rfb_test_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rfb.toml");
        let mut cfg = AppConfig::default();
        cfg.network.port = 6000;
        cfg.engine.retry_ticks = 5;
        cfg.server.log_level = "debug".to_string();
        std::fs::write(&path, toml::to_string_pretty(&cfg).unwrap()).unwrap();

        // Act
        let loaded = load_config(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_reports_parse_error() {
        let dir = std::env::temp_dir().join(format!("rfb_test_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[network]\nport = \"five\"").unwrap();

        let result = load_config(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }
}
