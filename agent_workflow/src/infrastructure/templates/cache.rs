// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Compiled Template Cache
//!
//! Size-bounded, access-ordered cache of compiled templates keyed by raw
//! template source, with combined LRU and TTL eviction.
//!
//! ## Lookup Policy
//!
//! 1. Caching disabled: compile on every call, count a miss.
//! 2. Entry present and fresh: count a hit, return the shared instance.
//! 3. Entry present but past its TTL: evict it, count a TTL eviction and
//!    a miss, compile and re-insert.
//! 4. Entry absent: count a miss, compile and insert. An insert that would
//!    exceed capacity evicts the least-recently-accessed entry and counts
//!    an LRU eviction.
//!
//! The check/insert/evict sequence runs as one atomic region under a
//! single lock; counters are lock-free atomics. A background sweeper (see
//! `TemplateEngine::start_sweeper`) removes expired entries periodically
//! so the map cannot hold stale compilations indefinitely when accesses
//! are sparse.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::engine::{CompiledTemplate, TemplateError};

/// Minimum sweeper period used when deriving it from the TTL.
const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Configuration for the compiled-template cache.
#[derive(Debug, Clone)]
pub struct TemplateCacheConfig {
    /// When false, every compile bypasses the cache
    pub enabled: bool,

    /// LRU capacity ceiling, at least 1
    pub max_size: usize,

    /// Entry time-to-live; `None` disables TTL eviction
    pub ttl: Option<Duration>,

    /// Sweeper period override; derived as `max(ttl / 2, 300s)` when unset
    pub cleanup_interval: Option<Duration>,
}

impl Default for TemplateCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 100,
            ttl: Some(Duration::from_secs(3600)),
            cleanup_interval: None,
        }
    }
}

/// A compiled template paired with its creation timestamp.
struct CachedTemplate {
    template: Arc<CompiledTemplate>,
    created_at: Instant,
}

/// Counter snapshot exposed for observability.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub current_size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub lru_evictions: u64,
    pub ttl_evictions: u64,
    pub hit_rate: f64,
}

/// Thread-safe compiled-template cache.
pub struct TemplateCache {
    enabled: bool,
    ttl: Option<Duration>,
    cleanup_interval: Duration,
    max_size: usize,
    entries: Mutex<LruCache<String, CachedTemplate>>,
    hits: AtomicU64,
    misses: AtomicU64,
    lru_evictions: AtomicU64,
    ttl_evictions: AtomicU64,
}

impl TemplateCache {
    /// Creates a cache from its configuration. A capacity below 1 is
    /// raised to 1.
    pub fn new(config: TemplateCacheConfig) -> Self {
        let max_size = config.max_size.max(1);
        let ttl = config.ttl.filter(|ttl| !ttl.is_zero());
        let cleanup_interval = config.cleanup_interval.unwrap_or_else(|| {
            ttl.map(|ttl| (ttl / 2).max(MIN_CLEANUP_INTERVAL))
                .unwrap_or(MIN_CLEANUP_INTERVAL)
        });

        Self {
            enabled: config.enabled,
            ttl,
            cleanup_interval,
            max_size,
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN),
            )),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            lru_evictions: AtomicU64::new(0),
            ttl_evictions: AtomicU64::new(0),
        }
    }

    /// Whether entries expire at all
    pub fn ttl_enabled(&self) -> bool {
        self.enabled && self.ttl.is_some()
    }

    /// Sweeper period for expired-entry cleanup
    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    /// Looks up or compiles the template for `source`.
    pub fn get_or_compile<F>(&self, source: &str, compile: F) -> Result<Arc<CompiledTemplate>, TemplateError>
    where
        F: FnOnce(&str) -> Result<CompiledTemplate, TemplateError>,
    {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::new(compile(source)?));
        }

        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get(source) {
            if !self.is_expired(entry) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(&entry.template));
            }
            entries.pop(source);
            self.ttl_evictions.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        let template = Arc::new(compile(source)?);
        let evicted = entries.push(
            source.to_string(),
            CachedTemplate {
                template: Arc::clone(&template),
                created_at: Instant::now(),
            },
        );
        if let Some((evicted_key, _)) = evicted {
            // push returns the displaced LRU entry; a same-key replacement
            // is not an eviction.
            if evicted_key != source {
                self.lru_evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        Ok(template)
    }

    /// Removes every expired entry, returning how many were evicted.
    pub fn sweep_expired(&self) -> usize {
        let Some(_ttl) = self.ttl else {
            return 0;
        };
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        self.ttl_evictions.fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            current_size: self.entries.lock().len(),
            max_size: self.max_size,
            hits,
            misses,
            lru_evictions: self.lru_evictions.load(Ordering::Relaxed),
            ttl_evictions: self.ttl_evictions.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }

    fn is_expired(&self, entry: &CachedTemplate) -> bool {
        match self.ttl {
            Some(ttl) => entry.created_at.elapsed() >= ttl,
            None => false,
        }
    }
}
