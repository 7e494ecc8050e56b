//! Configuration loading and validation.
//!
//! Configuration comes from a YAML file merged with `CURLENS_`-prefixed
//! environment variables (nested fields split on `__`):
//!
//! ```bash
//! CURLENS_PORT=8080
//! CURLENS_PROCESSOR__URL="https://lambda.example.com/process"
//! CURLENS_PROCESSOR__API_KEY="secret"
//! ```
//!
//! The remote processor URL and API key are required: their absence is a
//! deployment-time error caught by [`Config::load`] before the server binds
//! a socket, never a per-request failure. The credential is held server-side
//! and injected by the gateway; it is never exposed to callers.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "CURLENS_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Remote processing function (required)
    pub processor: ProcessorConfig,
    /// Upload validation limits
    pub upload: UploadConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

/// Remote processing function connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Endpoint of the processing function
    pub url: Option<Url>,
    /// Credential injected as the `x-api-key` header on every forward
    pub api_key: Option<String>,
    /// Outbound request timeout in seconds
    pub timeout_secs: u64,
}

/// Limits enforced locally before any network call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Maximum accepted file size in bytes
    pub max_file_size: u64,
    /// Minimum accepted file size in bytes; rejects obviously empty or
    /// truncated exports
    pub min_file_size: u64,
    /// Required filename extension, compared case-insensitively
    pub allowed_extension: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            processor: ProcessorConfig::default(),
            upload: UploadConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024, // 100 MiB
            min_file_size: 100,
            allowed_extension: ".parquet".to_string(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allow_credentials: false,
            max_age: None,
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Create the figment for configuration loading
    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("CURLENS_").split("__"))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.processor.url.is_none() {
            return Err(Error::Internal {
                operation: "Config validation: processor.url is not configured. \
                 Please set CURLENS_PROCESSOR__URL or add processor.url to the config file."
                    .to_string(),
            });
        }

        if self.processor.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Internal {
                operation: "Config validation: processor.api_key is not configured. \
                 Please set CURLENS_PROCESSOR__API_KEY or add processor.api_key to the config file."
                    .to_string(),
            });
        }

        if self.upload.min_file_size > self.upload.max_file_size {
            return Err(Error::Internal {
                operation: "Config validation: upload.min_file_size exceeds upload.max_file_size".to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: 60,
        }
    }
}
