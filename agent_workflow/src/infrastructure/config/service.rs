// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration Service
//!
//! Layered configuration loading and validation. Precedence, lowest to
//! highest: built-in defaults, the optional TOML file, environment
//! variables prefixed `AGENT_WORKFLOW` (nested keys separated by `__`,
//! e.g. `AGENT_WORKFLOW_TEMPLATE__CACHE_MAX_SIZE=50`).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use agent_workflow_domain::WorkflowError;

use crate::infrastructure::security::PathSecurityConfig;
use crate::infrastructure::templates::TemplateCacheConfig;
use crate::infrastructure::tools::FileReadToolConfig;
use crate::infrastructure::runtime::memory_manager::MemoryManagerConfig;

/// Template engine options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// If false, no compiled-template caching
    pub cache_enabled: bool,

    /// LRU ceiling, at least 1
    pub cache_max_size: usize,

    /// Entry TTL in seconds; 0 disables TTL eviction
    pub cache_ttl_secs: u64,

    /// Sweeper period override in seconds
    pub cache_cleanup_interval_secs: Option<u64>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_max_size: 100,
            cache_ttl_secs: 3600,
            cache_cleanup_interval_secs: None,
        }
    }
}

impl TemplateSettings {
    /// Converts into the cache's own configuration type.
    pub fn cache_config(&self) -> TemplateCacheConfig {
        TemplateCacheConfig {
            enabled: self.cache_enabled,
            max_size: self.cache_max_size,
            ttl: (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs)),
            cleanup_interval: self.cache_cleanup_interval_secs.map(Duration::from_secs),
        }
    }
}

/// Memory manager options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub emergency_threshold: f64,
    pub monitoring_interval_secs: u64,
    pub cleanup_interval_secs: u64,

    /// Optional hard limit in bytes; system totals when unset
    pub memory_limit_bytes: Option<u64>,

    /// Delay before the post-aggressive-cleanup usage log
    pub gc_log_delay_ms: u64,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            warning_threshold: 0.75,
            critical_threshold: 0.85,
            emergency_threshold: 0.95,
            monitoring_interval_secs: 30,
            cleanup_interval_secs: 300,
            memory_limit_bytes: None,
            gc_log_delay_ms: 500,
        }
    }
}

impl MemorySettings {
    /// Converts into the memory manager's configuration type.
    pub fn manager_config(&self) -> MemoryManagerConfig {
        MemoryManagerConfig {
            warning_threshold: self.warning_threshold,
            critical_threshold: self.critical_threshold,
            emergency_threshold: self.emergency_threshold,
            monitoring_interval: Duration::from_secs(self.monitoring_interval_secs),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
            memory_limit: self.memory_limit_bytes,
            gc_log_delay: Duration::from_millis(self.gc_log_delay_ms),
        }
    }
}

/// Path security and file-read options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSecuritySettings {
    /// Sandbox root for file reads
    pub base_dir: PathBuf,

    pub allow_symlinks: bool,

    /// Per-read size ceiling in bytes
    pub file_read_max_size: u64,

    /// Pre-resolution length cap in characters
    pub file_read_max_path_length: usize,

    /// Ceiling on path component count
    pub max_components: usize,
}

impl Default for PathSecuritySettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            allow_symlinks: false,
            file_read_max_size: 10 * 1024 * 1024,
            file_read_max_path_length: 4096,
            max_components: 10,
        }
    }
}

impl PathSecuritySettings {
    /// Converts into the validator's configuration type.
    pub fn validator_config(&self) -> PathSecurityConfig {
        PathSecurityConfig {
            base_dir: self.base_dir.clone(),
            allow_symlinks: self.allow_symlinks,
            max_path_length: self.file_read_max_path_length,
            max_components: self.max_components,
        }
    }

    /// Converts into the file-read tool's configuration type.
    pub fn file_read_config(&self) -> FileReadToolConfig {
        FileReadToolConfig {
            max_file_size: self.file_read_max_size,
        }
    }
}

/// Stage execution defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    /// Retry budget applied when a stage does not set its own
    pub default_max_retries: u32,

    /// Fixed delay between attempts
    pub retry_backoff_ms: u64,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            default_max_retries: 3,
            retry_backoff_ms: 0,
        }
    }
}

impl StageSettings {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Root configuration tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub template: TemplateSettings,
    pub memory: MemorySettings,
    pub path_security: PathSecuritySettings,
    pub stage: StageSettings,
}

impl WorkflowConfig {
    /// Validates cross-field invariants after loading.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.template.cache_max_size == 0 {
            return Err(WorkflowError::invalid_config(
                "template.cache_max_size must be at least 1",
            ));
        }
        if self.path_security.file_read_max_path_length == 0 {
            return Err(WorkflowError::invalid_config(
                "path_security.file_read_max_path_length must be positive",
            ));
        }
        if self.path_security.file_read_max_size == 0 {
            return Err(WorkflowError::invalid_config(
                "path_security.file_read_max_size must be positive",
            ));
        }
        self.memory.manager_config().validate()?;
        Ok(())
    }
}

/// Loader for [`WorkflowConfig`].
pub struct ConfigService;

impl ConfigService {
    /// Loads configuration from defaults, an optional file, and the
    /// environment.
    pub fn load(file: Option<&Path>) -> Result<WorkflowConfig, WorkflowError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("AGENT_WORKFLOW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| WorkflowError::invalid_config(format!("Failed to read configuration: {}", e)))?;

        let config: WorkflowConfig = settings
            .try_deserialize()
            .map_err(|e| WorkflowError::invalid_config(format!("Malformed configuration: {}", e)))?;

        config.validate()?;
        debug!("configuration loaded and validated");
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<WorkflowConfig, WorkflowError> {
        let config: WorkflowConfig =
            toml::from_str(raw).map_err(|e| WorkflowError::invalid_config(format!("Malformed TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
