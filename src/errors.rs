// ABOUTME: Unified error taxonomy for the estimation pipeline
// ABOUTME: Contract violations abort requests; missing knowledge degrades, never errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! Error handling for the estimation core.
//!
//! Three classes of failure exist (and only the first two surface as errors
//! at request time):
//!
//! - **Contract violations**: a stage handed the next stage a payload
//!   missing required keys. These are integration bugs and abort the
//!   request with the missing keys named.
//! - **Baseline failures**: the external baseline collaborator failed.
//! - **Artifact errors**: a model file is missing, corrupt, or carries an
//!   incompatible schema version. These are caught at load time, logged,
//!   and demoted to "artifact absent"; they never reach request handling.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the estimation core
#[derive(Debug, Error)]
pub enum EngineError {
    /// A stage's output is missing keys required by the next stage
    #[error("{stage} output missing required keys: {}", missing.join(", "))]
    ContractViolation {
        /// Stage whose output violated the handoff contract
        stage: &'static str,
        /// Names of the missing keys
        missing: Vec<String>,
    },

    /// Request input failed validation
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The external baseline collaborator failed to produce an estimate
    #[error("baseline provider failed: {0}")]
    Baseline(String),

    /// An artifact file could not be loaded (caught at startup, not retried)
    #[error("artifact {}: {message}", path.display())]
    Artifact {
        /// Path of the offending artifact file
        path: PathBuf,
        /// What went wrong while loading it
        message: String,
    },
}

impl EngineError {
    /// Contract violation for `stage`, naming the `missing` keys
    #[must_use]
    pub fn contract_violation(stage: &'static str, missing: Vec<String>) -> Self {
        Self::ContractViolation { stage, missing }
    }

    /// Invalid request input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Baseline collaborator failure
    pub fn baseline(message: impl Into<String>) -> Self {
        Self::Baseline(message.into())
    }

    /// Artifact load failure at `path`
    pub fn artifact(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Artifact {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, EngineError>;
