//! Configuration for plan managers.
//!
//! Provides the device pool and logging settings an instance is created
//! with. Values are layered from optional TOML files and `DPP_PLAN__*`
//! environment variables.

#[cfg(test)]
mod tests;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

/// Default device pool budget (1 GiB).
pub const DEFAULT_MEMORY_BUDGET_BYTES: usize = 1024 * 1024 * 1024;

/// Default allocation granularity in bytes.
pub const DEFAULT_ALIGNMENT: usize = 256;

/// Device pool configuration.
///
/// # Example
///
/// ```
/// use dpp_plan::config::DeviceConfig;
///
/// let config = DeviceConfig::with_budget(4096);
/// assert_eq!(config.memory_budget_bytes, 4096);
/// assert_eq!(config.alignment, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Accelerator ordinal the pool represents.
    pub device_id: u32,
    /// Bytes of scratch storage all plans on this device may hold.
    pub memory_budget_bytes: usize,
    /// Every allocation is rounded up to a multiple of this (power of two).
    pub alignment: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET_BYTES,
            alignment: DEFAULT_ALIGNMENT,
        }
    }
}

impl DeviceConfig {
    /// Create config with a custom pool budget.
    pub fn with_budget(memory_budget_bytes: usize) -> Self {
        Self {
            memory_budget_bytes,
            ..Default::default()
        }
    }

    /// Validate configuration parameters.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `memory_budget_bytes` is 0
    /// - `alignment` is not a power of two
    pub fn validate(&self) -> PlanResult<()> {
        if self.memory_budget_bytes == 0 {
            return Err(PlanError::Config(
                "device.memory_budget_bytes must be greater than 0".to_string(),
            ));
        }
        if !self.alignment.is_power_of_two() {
            return Err(PlanError::Config(format!(
                "device.alignment must be a power of two, got {}",
                self.alignment
            )));
        }
        Ok(())
    }
}

/// Logging settings, consumed by whoever installs the subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"dpp_plan=debug"`.
    pub level: String,
    /// One of `pretty`, `json`, `compact`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    const FORMATS: [&'static str; 3] = ["pretty", "json", "compact"];

    pub fn validate(&self) -> PlanResult<()> {
        if !Self::FORMATS.contains(&self.format.as_str()) {
            return Err(PlanError::Config(format!(
                "logging.format must be one of {:?}, got '{}'",
                Self::FORMATS,
                self.format
            )));
        }
        Ok(())
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
}

impl ManagerConfig {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in order:
    /// 1. config/default.toml (base settings)
    /// 2. config/{DPP_PLAN_ENV}.toml (environment-specific)
    /// 3. Environment variables with DPP_PLAN__ prefix, e.g.
    ///    `DPP_PLAN__DEVICE__MEMORY_BUDGET_BYTES`
    pub fn load() -> PlanResult<Self> {
        let env = std::env::var("DPP_PLAN_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                config::Environment::with_prefix("DPP_PLAN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: ManagerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> PlanResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlanError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: ManagerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> PlanResult<()> {
        self.device.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
