//! Layered CLI configuration.
//!
//! Sources, lowest to highest precedence: built-in defaults, the config
//! file (`~/.config/mailcarve/config.toml` unless overridden), environment
//! variables prefixed `MAILCARVE_`, then explicit CLI flags.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use mailcarve_image::ImageViews;
use mailcarve_pipeline::PipelineConfig;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub images: ImageSettings,
}

/// AI collaborator service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_max_analyzed_height")]
    pub max_analyzed_height: u32,
    #[serde(default = "default_copy_pair_count")]
    pub copy_pair_count: u32,
    #[serde(default = "default_verified_confidence")]
    pub verified_confidence: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
            max_analyzed_height: default_max_analyzed_height(),
            copy_pair_count: default_copy_pair_count(),
            verified_confidence: default_verified_confidence(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ImageSettings {
    /// Transform proxy base URL; views are built against the source CDN
    /// directly when unset.
    #[serde(default)]
    pub proxy_base: Option<String>,
}

fn default_endpoint() -> String {
    "http://localhost:8500".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_poll_timeout_secs() -> u64 {
    15
}

fn default_max_analyzed_height() -> u32 {
    7900
}

fn default_copy_pair_count() -> u32 {
    3
}

fn default_verified_confidence() -> f64 {
    0.8
}

impl AppConfig {
    pub fn load(config_file: Option<PathBuf>, endpoint: Option<String>) -> Result<Self> {
        let mut builder = Config::builder();

        match &config_file {
            Some(path) => {
                builder = builder.add_source(File::from(path.clone()));
            }
            None => {
                if let Some(path) = Self::default_config_path() {
                    builder = builder.add_source(File::from(path).required(false));
                }
            }
        }

        builder = builder.add_source(Environment::with_prefix("MAILCARVE").separator("__"));

        let mut app: AppConfig = builder
            .build()
            .with_context(|| match &config_file {
                Some(path) => format!("failed to read config from {}", path.display()),
                None => "failed to build configuration".to_string(),
            })?
            .try_deserialize()
            .context("invalid configuration")?;

        if let Some(endpoint) = endpoint {
            app.service.endpoint = endpoint;
        }

        Ok(app)
    }

    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mailcarve").join("config.toml"))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            poll_interval: Duration::from_secs(self.pipeline.poll_interval_secs),
            poll_timeout: Duration::from_secs(self.pipeline.poll_timeout_secs),
            max_analyzed_height: self.pipeline.max_analyzed_height,
            copy_pair_count: self.pipeline.copy_pair_count,
            verified_confidence: self.pipeline.verified_confidence,
        }
    }

    pub fn image_views(&self) -> ImageViews {
        match &self.images.proxy_base {
            Some(base) => ImageViews::with_proxy(base.clone()),
            None => ImageViews::new(),
        }
    }
}
