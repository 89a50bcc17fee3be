//! Configuration management for colloc.
//!
//! This module handles the layered configuration system with the following precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values (lowest priority)

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::collocator::{CollocationOptions, DEFAULT_PROBE_POINTS};
use crate::error::{CollocError, Result};

/// Command-line arguments for colloc
#[derive(Parser, Debug)]
#[command(name = "colloc")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the JSON job holding the source and sample datasets
    pub job: PathBuf,

    /// Where to write the result (stdout when omitted)
    #[arg(short, long, env = "COLLOC_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Kernel to use, overriding the config file
    #[arg(short, long, env = "COLLOC_KERNEL")]
    pub kernel: Option<String>,

    /// Number of worker threads
    #[arg(short, long, env = "COLLOC_WORKERS")]
    pub workers: Option<usize>,

    /// Fail when a larger share of sample points has no value
    #[arg(long, env = "COLLOC_MAX_INVALID_FRACTION")]
    pub max_invalid_fraction: Option<f64>,

    /// Path to JSON configuration file
    #[arg(short, long, env = "COLLOC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "COLLOC_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Execution settings that do not change results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of worker threads (None = number of CPU cores)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Sample points processed sequentially before parallel dispatch
    #[serde(default = "default_probe_points")]
    pub probe_points: usize,

    /// Largest tolerated share of sample points without a value
    #[serde(default)]
    pub max_invalid_fraction: Option<f64>,
}

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default collocation options; a job may carry its own
    #[serde(default)]
    pub collocation: CollocationOptions,

    /// Runtime configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Input and output locations of a run
#[derive(Debug, Clone, PartialEq)]
pub struct JobPaths {
    pub job: PathBuf,
    pub output: Option<PathBuf>,
}

impl Config {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<(Self, JobPaths)> {
        Self::from_args(Args::parse())
    }

    /// Resolve configuration from parsed arguments
    pub fn from_args(args: Args) -> Result<(Self, JobPaths)> {
        // Start with defaults
        let mut config = Config::default();

        if let Some(config_path) = &args.config {
            let json_config = Self::load_from_file(config_path)?;
            config.merge(json_config);
        }

        if let Some(kernel) = args.kernel {
            config.collocation.kernel = kernel;
        }
        if args.workers.is_some() {
            config.runtime.workers = args.workers;
        }
        if args.max_invalid_fraction.is_some() {
            config.runtime.max_invalid_fraction = args.max_invalid_fraction;
        }
        if let Some(log_level) = args.log_level {
            config.log_level = log_level;
        }

        let paths = JobPaths {
            job: args.job,
            output: args.output,
        };
        Ok((config, paths))
    }

    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        self.collocation = other.collocation;
        if other.runtime.workers.is_some() {
            self.runtime.workers = other.runtime.workers;
        }
        if other.runtime.max_invalid_fraction.is_some() {
            self.runtime.max_invalid_fraction = other.runtime.max_invalid_fraction;
        }
        self.runtime.probe_points = other.runtime.probe_points;
        self.log_level = other.log_level;
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.runtime.workers == Some(0) {
            return Err(CollocError::config("Worker count cannot be 0"));
        }

        if let Some(fraction) = self.runtime.max_invalid_fraction {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(CollocError::config(format!(
                    "Invalid max_invalid_fraction: {}. Must lie between 0 and 1",
                    fraction
                )));
            }
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(CollocError::config(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.log_level
                )));
            }
        }

        self.collocation.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collocation: CollocationOptions::default(),
            runtime: RuntimeConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: None,
            probe_points: default_probe_points(),
            max_invalid_fraction: None,
        }
    }
}

// Default value functions for serde
fn default_probe_points() -> usize {
    DEFAULT_PROBE_POINTS
}

fn default_log_level() -> String {
    "info".to_string()
}
