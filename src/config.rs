// ABOUTME: Environment-driven engine configuration with typed parsing and defaults
// ABOUTME: Read once at startup; nothing here is consulted at request time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! Engine configuration.
//!
//! Configuration is environment-only: every knob has a sensible default and
//! an override variable. Unparseable values log a warning and fall back to
//! the default rather than failing startup.

use std::env;
use std::path::PathBuf;
use tracing::warn;

/// Default bound on the request cache
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

/// Default neighbor count for the similarity scan
pub const DEFAULT_TOP_K: usize = 7;

/// Runtime configuration for the estimation engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory holding the model artifacts loaded at startup
    pub artifacts_dir: PathBuf,
    /// Request cache capacity (least-recently-used eviction)
    pub cache_max_entries: usize,
    /// Neighbors considered by the similarity refinement stage
    pub top_k: usize,
    /// Weight neighbor deltas by cosine similarity (equal weights when off)
    pub weight_by_similarity: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            top_k: DEFAULT_TOP_K,
            weight_by_similarity: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment.
    ///
    /// Recognized variables: `MACROLENS_ARTIFACTS`, `MACROLENS_CACHE_MAXSIZE`,
    /// `MACROLENS_TOP_K`, `MACROLENS_WEIGHT_BY_SIMILARITY`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            artifacts_dir: env::var("MACROLENS_ARTIFACTS")
                .map_or(defaults.artifacts_dir, PathBuf::from),
            cache_max_entries: parse_var("MACROLENS_CACHE_MAXSIZE", defaults.cache_max_entries),
            top_k: parse_var("MACROLENS_TOP_K", defaults.top_k),
            weight_by_similarity: parse_var(
                "MACROLENS_WEIGHT_BY_SIMILARITY",
                defaults.weight_by_similarity,
            ),
        }
    }
}

/// Parse an environment variable, warning and defaulting on bad values
fn parse_var<T: std::str::FromStr + std::fmt::Debug>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    variable = name,
                    value = raw,
                    default = ?default,
                    "unparseable configuration value, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}
