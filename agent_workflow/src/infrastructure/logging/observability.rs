// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Observability Setup
//!
//! One-shot installation of the global tracing subscriber. The filter
//! honours `RUST_LOG` when set and falls back to the configured default
//! level; repeated initialization is a no-op so tests and embedders can
//! call it freely.

use tracing_subscriber::EnvFilter;

/// Options for the global subscriber.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset, e.g. `"info"`
    /// or `"agent_workflow=debug,info"`
    pub log_level: String,

    /// Whether to render the event target (module path)
    pub include_target: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            include_target: false,
        }
    }
}

/// Installs the global tracing subscriber once.
///
/// Returns whether this call performed the installation; `false` means a
/// subscriber was already in place.
pub fn init_observability(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.include_target)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_initialization_is_safe() {
        let config = ObservabilityConfig::default();
        // Whichever call wins the race, the second one must not panic.
        let _ = init_observability(&config);
        let second = init_observability(&config);
        assert!(!second);
    }

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.include_target);
    }
}
