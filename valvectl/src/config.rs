//! CLI configuration
//!
//! Settings come from defaults, then environment variables, then
//! command-line arguments.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the server URL
pub const ENV_SERVER: &str = "VALVECTL_SERVER";

/// Environment variable overriding the output format
pub const ENV_FORMAT: &str = "VALVECTL_FORMAT";

/// Environment variable overriding the request timeout (seconds)
pub const ENV_TIMEOUT: &str = "VALVECTL_TIMEOUT";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CliConfig {
    /// Server URL
    pub server_url: String,

    /// Output format (`table` or `json`)
    pub output_format: String,

    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            output_format: "table".to_string(),
            timeout: 10,
        }
    }
}

impl CliConfig {
    /// Create a new builder for constructing configuration
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for CLI configuration with validation.
///
/// Values set first win: apply CLI arguments before calling
/// [`ConfigBuilder::with_env_overrides`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    server_url: Option<String>,
    output_format: Option<String>,
    timeout: Option<u64>,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set server URL (with validation)
    pub fn with_server_url(mut self, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        Self::validate_url(&url)?;
        self.server_url = Some(url);
        Ok(self)
    }

    /// Set output format (with validation)
    pub fn with_output_format(mut self, format: impl Into<String>) -> Result<Self> {
        let format = format.into();
        Self::validate_output_format(&format)?;
        self.output_format = Some(format);
        Ok(self)
    }

    /// Set timeout (with validation)
    pub fn with_timeout(mut self, timeout: u64) -> Result<Self> {
        Self::validate_timeout(timeout)?;
        self.timeout = Some(timeout);
        Ok(self)
    }

    /// Fill unset values from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Fill unset values through `lookup`; invalid values are ignored
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.server_url.is_none() {
            if let Some(server_url) = lookup(ENV_SERVER) {
                if Self::validate_url(&server_url).is_ok() {
                    self.server_url = Some(server_url);
                }
            }
        }

        if self.output_format.is_none() {
            if let Some(format) = lookup(ENV_FORMAT) {
                if Self::validate_output_format(&format).is_ok() {
                    self.output_format = Some(format);
                }
            }
        }

        if self.timeout.is_none() {
            if let Some(timeout) = lookup(ENV_TIMEOUT).and_then(|t| t.parse().ok()) {
                if Self::validate_timeout(timeout).is_ok() {
                    self.timeout = Some(timeout);
                }
            }
        }

        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<CliConfig> {
        let defaults = CliConfig::default();

        let server_url = self.server_url.unwrap_or(defaults.server_url);
        let output_format = self.output_format.unwrap_or(defaults.output_format);
        let timeout = self.timeout.unwrap_or(defaults.timeout);

        Self::validate_url(&server_url)?;
        Self::validate_output_format(&output_format)?;
        Self::validate_timeout(timeout)?;

        Ok(CliConfig {
            server_url,
            output_format,
            timeout,
        })
    }

    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(anyhow::anyhow!("Server URL cannot be empty"));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "Server URL must start with http:// or https://"
            ));
        }

        Ok(())
    }

    fn validate_output_format(format: &str) -> Result<()> {
        match format {
            "table" | "json" => Ok(()),
            _ => Err(anyhow::anyhow!(
                "Invalid output format '{}'. Must be 'table' or 'json'",
                format
            )),
        }
    }

    fn validate_timeout(timeout: u64) -> Result<()> {
        if timeout == 0 {
            return Err(anyhow::anyhow!("Timeout must be greater than 0"));
        }

        if timeout > 300 {
            return Err(anyhow::anyhow!(
                "Timeout must be less than or equal to 300 seconds"
            ));
        }

        Ok(())
    }
}
