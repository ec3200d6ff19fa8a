//! Logger configuration
//!
//! Loaded from a JSON, YAML or TOML file (chosen by extension) with
//! `EW1_HOST`, `EW1_PORT`, `EW1_UNIT_ID` and `EW1_TIMEOUT` overriding the
//! device section. The Sheets token may come from `EW1_SHEETS_TOKEN`.

use common::config_loader::get_string_config;
use common::logging::LogConfig;
use ew1_registers::{default_registers, RegisterDefinition, TcpSettings};
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "EW1_";
pub const TOKEN_ENV: &str = "EW1_SHEETS_TOKEN";

/// EW-1 connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// Connect and per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

fn default_host() -> String {
    "192.168.1.100".to_string()
}

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout() -> f64 {
    5.0
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            unit_id: default_unit_id(),
            timeout: default_timeout(),
        }
    }
}

impl DeviceConfig {
    pub fn tcp_settings(&self) -> Result<TcpSettings, ConfigError> {
        let timeout = Duration::try_from_secs_f64(self.timeout)
            .ok()
            .filter(|t| !t.is_zero())
            .ok_or_else(|| {
                ConfigError::Invalid(format!("timeout must be positive, got {}", self.timeout))
            })?;

        let mut settings = TcpSettings::new(self.host.clone());
        settings.port = self.port;
        settings.unit_id = self.unit_id;
        settings.timeout = timeout;
        Ok(settings)
    }
}

/// Google Sheets destination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Full spreadsheet URL or bare spreadsheet id
    #[serde(default)]
    pub spreadsheet_url: String,
    /// Worksheet (tab) name; the first tab "Sheet1" when absent
    #[serde(default)]
    pub worksheet: Option<String>,
    /// OAuth bearer token with the spreadsheets scope
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl SheetsConfig {
    /// Token from config, else `EW1_SHEETS_TOKEN`; `None` when neither is set
    pub fn resolve_token(&self) -> Option<String> {
        Some(get_string_config(self.token.as_deref(), TOKEN_ENV, "")).filter(|t| !t.is_empty())
    }
}

/// Complete logger configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggerConfig {
    #[serde(default)]
    pub ew1: DeviceConfig,
    /// Registers in column order
    #[serde(default)]
    pub registers: Vec<RegisterDefinition>,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub logging: LogConfig,
    /// Set when the file listed no registers and the example map was used
    #[serde(skip)]
    pub uses_example_map: bool,
}

impl LoggerConfig {
    /// Load and validate `path`; an empty register list falls back to the
    /// EW-1 example map
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Figment::new().merge(Yaml::file(path)),
            Some("toml") => Figment::new().merge(Toml::file(path)),
            _ => Figment::new().merge(Json::file(path)),
        };

        let mut config: LoggerConfig = figment
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .only(&["host", "port", "unit_id", "timeout"])
                    .map(|key| format!("ew1.{}", key.as_str()).into()),
            )
            .extract()?;

        if config.registers.is_empty() {
            config.registers = default_registers();
            config.uses_example_map = true;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for reg in &self.registers {
            if reg.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "register at address {} has no name",
                    reg.address
                )));
            }
            if !seen.insert(reg.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate register name '{}'",
                    reg.name
                )));
            }
            if !reg.scale.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "register '{}' has a non-finite scale",
                    reg.name
                )));
            }
        }
        self.ew1.tcp_settings().map(|_| ())
    }

    /// Warnings about the loaded configuration; call once logging is up
    pub fn log_warnings(&self) {
        if self.uses_example_map {
            warn!("No registers configured, using the example EW-1 map");
        }
    }

    /// Output columns in configuration order
    pub fn columns(&self) -> Vec<String> {
        self.registers.iter().map(|r| r.name.clone()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use ew1_registers::{DataType, RegisterType};
    use std::io::Write;
    use tracing_test::traced_test;

    fn write_config(extension: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(extension)
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_json() {
        let file = write_config(
            ".json",
            r#"{
                "ew1": {"host": "10.0.0.5", "port": 1502},
                "registers": [
                    {"address": 0, "name": "supply", "register_type": "input",
                     "data_type": "int16", "scale": 0.1, "unit": "°C"},
                    {"address": 10, "name": "power", "data_type": "float32", "count": 2}
                ],
                "sheets": {"spreadsheet_url": "https://docs.google.com/spreadsheets/d/abc/edit"}
            }"#,
        );

        let config = LoggerConfig::load(file.path()).unwrap();
        assert_eq!(config.ew1.host, "10.0.0.5");
        assert_eq!(config.ew1.port, 1502);
        assert_eq!(config.ew1.unit_id, 1);
        assert_eq!(config.columns(), vec!["supply", "power"]);
        assert_eq!(config.registers[0].register_type, RegisterType::Input);
        assert_eq!(config.registers[1].register_type, RegisterType::Holding);
        assert_eq!(config.registers[1].data_type, DataType::Float32);
        assert_eq!(config.registers[1].scale, 1.0);
    }

    #[test]
    fn test_load_yaml() {
        let file = write_config(
            ".yaml",
            "ew1:\n  host: ew1.local\nregisters:\n  - address: 3\n    name: outdoor\n    data_type: int16\n",
        );
        let config = LoggerConfig::load(file.path()).unwrap();
        assert_eq!(config.ew1.host, "ew1.local");
        assert_eq!(config.registers[0].address, 3);
    }

    #[test]
    fn test_missing_file() {
        let err = LoggerConfig::load(Path::new("/nonexistent/registers.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_empty_registers_use_example_map() {
        let file = write_config(".json", r#"{"ew1": {"host": "10.0.0.5"}}"#);
        let config = LoggerConfig::load(file.path()).unwrap();
        assert_eq!(config.registers.len(), 6);
        assert_eq!(config.columns()[0], "temp_1");
        assert!(config.uses_example_map);
    }

    #[test]
    #[traced_test]
    fn test_example_map_warning_logged_on_demand() {
        let file = write_config(".json", r#"{"ew1": {"host": "10.0.0.5"}}"#);
        let config = LoggerConfig::load(file.path()).unwrap();
        assert!(!logs_contain("No registers configured"));

        config.log_warnings();
        assert!(logs_contain("No registers configured, using the example EW-1 map"));
    }

    #[test]
    #[traced_test]
    fn test_configured_registers_log_no_warning() {
        let file = write_config(".json", r#"{"registers": [{"address": 0, "name": "t"}]}"#);
        let config = LoggerConfig::load(file.path()).unwrap();
        assert!(!config.uses_example_map);
        config.log_warnings();
        assert!(!logs_contain("No registers configured"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let file = write_config(
            ".json",
            r#"{"registers": [{"address": 0, "name": "t"}, {"address": 1, "name": "t"}]}"#,
        );
        let err = LoggerConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate register name"));
    }

    #[test]
    fn test_bad_register_type_rejected() {
        let file = write_config(
            ".json",
            r#"{"registers": [{"address": 0, "name": "t", "register_type": "analog"}]}"#,
        );
        assert!(matches!(
            LoggerConfig::load(file.path()).unwrap_err(),
            ConfigError::Invalid(_)
        ));
    }

    #[test]
    fn test_tcp_settings() {
        let device = DeviceConfig {
            timeout: 2.5,
            ..Default::default()
        };
        let settings = device.tcp_settings().unwrap();
        assert_eq!(settings.endpoint(), "192.168.1.100:502");
        assert_eq!(settings.timeout, Duration::from_millis(2500));

        let device = DeviceConfig {
            timeout: -1.0,
            ..Default::default()
        };
        assert!(device.tcp_settings().is_err());
    }

    #[test]
    fn test_token_from_config() {
        let sheets = SheetsConfig {
            token: Some("ya29.token".to_string()),
            ..Default::default()
        };
        assert_eq!(sheets.resolve_token().as_deref(), Some("ya29.token"));
    }
}
