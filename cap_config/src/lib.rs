//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Parser, output and telemetry settings from defaults, capkit.toml and CAPKIT_ env vars

use std::fmt;
use std::path::Path;

use cap_core::{Error, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "capkit.toml";

const LEVELS: &[&str] = &["info", "recommendation", "warning", "error"];

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub parser: ParserConfig,
    #[validate(nested)]
    pub output: OutputConfig,
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

/// How documents are parsed and checked
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct ParserConfig {
    /// Fail on ERROR findings instead of only reporting them
    pub validate: bool,
    /// Check against the published schema only, without the semantic validator
    pub strict_schema: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            validate: true,
            strict_schema: false,
        }
    }
}

/// What the CLI prints for each document
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Xml,
    Json,
    #[default]
    Reasons,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Json => "json",
            OutputFormat::Reasons => "reasons",
        };
        f.write_str(name)
    }
}

/// Serializer and report settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct OutputConfig {
    /// Spaces per nesting level; `0` or unset writes compact output
    #[validate(range(max = 16))]
    pub indent: Option<u32>,
    pub format: OutputFormat,
    /// Lowest finding level printed
    #[validate(custom(function = "validate_level"))]
    pub min_level: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            indent: Some(2),
            format: OutputFormat::Reasons,
            min_level: "info".to_string(),
        }
    }
}

fn validate_level(level: &str) -> std::result::Result<(), ValidationError> {
    if LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_level"))
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `production` switches logs to JSON
    #[validate(length(min = 1))]
    pub env: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
        }
    }
}

impl Config {
    /// Load from defaults, `capkit.toml` if present, then `CAPKIT_` environment variables
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load using `path` as the optional configuration file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut builder = ConfigBuilder::builder()
            .set_default("parser.validate", true)?
            .set_default("parser.strict_schema", false)?
            .set_default("output.indent", 2)?
            .set_default("output.format", "reasons")?
            .set_default("output.min_level", "info")?
            .set_default("telemetry.env", "development")?;

        if path.exists() {
            builder = builder.add_source(File::from(path).required(false));
        }

        // Nested keys use a double underscore: CAPKIT_PARSER__STRICT_SCHEMA
        builder = builder.add_source(
            Environment::with_prefix("CAPKIT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build config: {}", e)))?;

        let parsed: Config = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;

        parsed
            .validate()
            .map_err(|e| Error::Config(format!("Config validation failed: {}", e)))?;

        Ok(parsed)
    }
}
