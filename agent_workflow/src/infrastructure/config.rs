// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Configuration
//!
//! Startup configuration for the orchestrator: template cache policy,
//! memory-manager thresholds and schedules, path-security limits, and
//! stage defaults. Loaded from layered sources (built-in defaults, an
//! optional TOML file, `AGENT_WORKFLOW_*` environment overrides) and
//! validated before any component starts.
//!
//! ## Example Configuration File
//!
//! ```toml
//! [template]
//! cache_enabled = true
//! cache_max_size = 100
//! cache_ttl_secs = 3600
//!
//! [memory]
//! warning_threshold = 0.75
//! critical_threshold = 0.85
//! emergency_threshold = 0.95
//! monitoring_interval_secs = 30
//! cleanup_interval_secs = 300
//!
//! [path_security]
//! base_dir = "/srv/sandbox"
//! allow_symlinks = false
//! file_read_max_size = 10485760
//! file_read_max_path_length = 4096
//!
//! [stage]
//! default_max_retries = 3
//! retry_backoff_ms = 0
//! ```

pub mod service;

pub use service::{
    ConfigService, MemorySettings, PathSecuritySettings, StageSettings, TemplateSettings, WorkflowConfig,
};
