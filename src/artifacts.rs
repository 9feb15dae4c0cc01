// ABOUTME: Versioned JSON artifact schemas and the tolerant startup loader
// ABOUTME: Missing, corrupt, or mis-versioned files log a warning and read as absent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! Model artifacts.
//!
//! Everything the engine knows is loaded from explicit-schema JSON files at
//! process start and never touched again. Each file carries a
//! `schema_version` tag; an incompatible version fails the load loudly (a
//! warning naming the file and versions) and the artifact is treated as
//! absent, so the serving path degrades instead of deserializing into the
//! wrong shape.

use crate::calibration::CalibrationModel;
use crate::errors::EngineError;
use crate::models::{MacroVector, PerMacro};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Schema version this build reads and writes
pub const SCHEMA_VERSION: u32 = 1;

/// File names under the artifacts directory
pub const CALIBRATION_MODEL_FILE: &str = "calibration_model.json";
/// Ingredient-embedding table file
pub const INGREDIENT_EMBEDDINGS_FILE: &str = "ingredient_embeddings.json";
/// Dish-embedding table file
pub const DISH_EMBEDDINGS_FILE: &str = "dish_embeddings.json";
/// Precomputed neighbor index file
pub const NEIGHBOR_INDEX_FILE: &str = "neighbor_index.json";
/// Macro delta percentile bounds file
pub const MACRO_DELTA_STATS_FILE: &str = "macro_delta_stats.json";
/// Confidence lookup-curve parameters file
pub const CONFIDENCE_PARAMS_FILE: &str = "confidence_params.json";
/// Optional learned refinement model file
pub const REFINEMENT_MODEL_FILE: &str = "refinement_model.json";

/// Anything loaded from disk with a schema version tag
pub trait VersionedArtifact {
    /// Artifact name used in log lines
    const NAME: &'static str;
    /// The version tag read from the file
    fn schema_version(&self) -> u32;
}

macro_rules! versioned {
    ($ty:ty, $name:literal) => {
        impl VersionedArtifact for $ty {
            const NAME: &'static str = $name;
            fn schema_version(&self) -> u32 {
                self.schema_version
            }
        }
    };
}

/// On-disk wrapper for the calibration model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationArtifact {
    /// Schema version tag
    pub schema_version: u32,
    /// The ratio tables and sample counts
    pub model: CalibrationModel,
}
versioned!(CalibrationArtifact, "calibration model");

/// Ingredient name → fixed-length embedding vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientEmbeddings {
    /// Schema version tag
    pub schema_version: u32,
    /// Embedding width every vector must share
    pub dim: usize,
    /// Embeddings keyed by lowercase ingredient name
    pub embeddings: BTreeMap<String, Vec<f32>>,
}
versioned!(IngredientEmbeddings, "ingredient embeddings");

impl IngredientEmbeddings {
    /// Elementwise mean over all ingredient vectors, substituted for
    /// out-of-vocabulary ingredients. `None` when the table is empty.
    #[must_use]
    pub fn mean_embedding(&self) -> Option<Vec<f32>> {
        if self.embeddings.is_empty() {
            return None;
        }
        let mut sum = vec![0.0f64; self.dim];
        for vector in self.embeddings.values() {
            for (acc, &v) in sum.iter_mut().zip(vector) {
                *acc += f64::from(v);
            }
        }
        let n = self.embeddings.len() as f64;
        Some(sum.into_iter().map(|v| (v / n) as f32).collect())
    }
}

/// One dish from the training corpus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DishRecord {
    /// Stable dish identifier
    pub id: String,
    /// The dish's embedding vector
    pub embedding: Vec<f32>,
    /// The dish's known macros
    pub macros: MacroVector,
}

/// All training-corpus dish embeddings, in a stable order used for
/// similarity tie-breaking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishEmbeddings {
    /// Schema version tag
    pub schema_version: u32,
    /// Embedding width
    pub dim: usize,
    /// Dishes in corpus order
    pub dishes: Vec<DishRecord>,
}
versioned!(DishEmbeddings, "dish embeddings");

/// A precomputed neighbor with its cached relative macro deltas
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedNeighbor {
    /// Neighbor dish id
    pub neighbor_id: String,
    /// Cosine similarity to the owning dish
    pub similarity: f64,
    /// Precomputed relative macro deltas
    pub macro_deltas: PerMacro<f64>,
}

/// Precomputed nearest neighbors for dishes seen during training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborIndex {
    /// Schema version tag
    pub schema_version: u32,
    /// dish id → ordered neighbor list
    pub neighbors: BTreeMap<String, Vec<CachedNeighbor>>,
}
versioned!(NeighborIndex, "neighbor index");

/// Empirical percentile bounds for one macro's relative delta
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DeltaBounds {
    /// 10th percentile (lower clamp)
    pub p10: f64,
    /// 90th percentile (upper clamp)
    pub p90: f64,
    /// Median delta, used by the median-only refinement mode
    pub median: f64,
}

impl Default for DeltaBounds {
    /// Wide bounds applied when no stats artifact is loaded
    fn default() -> Self {
        Self {
            p10: -1.0,
            p90: 1.0,
            median: 0.0,
        }
    }
}

/// Percentile bounds per macro
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroDeltaStats {
    /// Schema version tag
    pub schema_version: u32,
    /// Bounds per macro
    pub stats: PerMacro<DeltaBounds>,
}
versioned!(MacroDeltaStats, "macro delta stats");

impl Default for MacroDeltaStats {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            stats: PerMacro::default(),
        }
    }
}

/// A piecewise-linear lookup curve (bin edges and values, interpolated)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupCurve {
    /// Ascending bin edges
    pub bin_edges: Vec<f64>,
    /// Value at each bin edge
    pub values: Vec<f64>,
}

/// Confidence lookup parameters for the refinement stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceParams {
    /// Schema version tag
    pub schema_version: u32,
    /// Mean neighbor similarity → base confidence
    pub similarity_to_confidence: LookupCurve,
    /// Ingredient coverage → confidence penalty
    pub coverage_penalty: LookupCurve,
}
versioned!(ConfidenceParams, "confidence params");

impl Default for ConfidenceParams {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            similarity_to_confidence: LookupCurve {
                bin_edges: vec![0.0, 1.0],
                values: vec![0.5, 1.0],
            },
            coverage_penalty: LookupCurve {
                bin_edges: vec![0.0, 0.5, 0.75, 1.0],
                values: vec![0.5, 0.2, 0.05, 0.0],
            },
        }
    }
}

/// Learned linear refinement model with its input scaler.
///
/// Predicts all five macros from the fixed feature layout
/// (query embedding ⧺ base macros ⧺ padded neighbor blocks); always applied
/// behind the percentile clamp, never instead of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementModel {
    /// Schema version tag
    pub schema_version: u32,
    /// Expected feature vector width; mismatches disable the model
    pub feature_dim: usize,
    /// Standard-scaler mean per feature
    pub scaler_mean: Vec<f64>,
    /// Standard-scaler deviation per feature
    pub scaler_std: Vec<f64>,
    /// One weight row per macro, in canonical macro order
    pub weights: Vec<Vec<f64>>,
    /// One bias per macro, in canonical macro order
    pub bias: Vec<f64>,
}
versioned!(RefinementModel, "refinement model");

impl RefinementModel {
    /// Structural sanity check beyond the version tag
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.weights.len() == 5
            && self.bias.len() == 5
            && self.scaler_mean.len() == self.feature_dim
            && self.scaler_std.len() == self.feature_dim
            && self.weights.iter().all(|row| row.len() == self.feature_dim)
    }
}

/// Load one versioned artifact, degrading every failure to `None`.
///
/// A missing file is the expected steady state and logs at debug; a corrupt
/// file or version mismatch logs a warning. Nothing is retried.
#[must_use]
pub fn load_artifact<T>(dir: &Path, file_name: &str) -> Option<T>
where
    T: DeserializeOwned + VersionedArtifact,
{
    let path = dir.join(file_name);
    match try_load::<T>(&path) {
        Ok(artifact) => Some(artifact),
        Err(EngineError::Artifact { path, message }) if message == "not found" => {
            debug!(artifact = T::NAME, path = %path.display(), "artifact not present");
            None
        }
        Err(err) => {
            warn!(artifact = T::NAME, error = %err, "artifact load failed, treating as absent");
            None
        }
    }
}

fn try_load<T>(path: &Path) -> Result<T, EngineError>
where
    T: DeserializeOwned + VersionedArtifact,
{
    if !path.is_file() {
        return Err(EngineError::artifact(path, "not found"));
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| EngineError::artifact(path, format!("read failed: {e}")))?;
    let artifact: T = serde_json::from_str(&raw)
        .map_err(|e| EngineError::artifact(path, format!("parse failed: {e}")))?;
    if artifact.schema_version() != SCHEMA_VERSION {
        return Err(EngineError::artifact(
            path,
            format!(
                "incompatible schema version {} (supported: {SCHEMA_VERSION})",
                artifact.schema_version()
            ),
        ));
    }
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::{load_artifact, IngredientEmbeddings, MacroDeltaStats, SCHEMA_VERSION};
    use std::fs;

    #[test]
    fn version_mismatch_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macro_delta_stats.json");
        fs::write(
            &path,
            serde_json::json!({
                "schema_version": SCHEMA_VERSION + 1,
                "stats": {
                    "calories": {"p10": -0.1, "p90": 0.1, "median": 0.0},
                    "fat": {"p10": -0.1, "p90": 0.1, "median": 0.0},
                    "carbs": {"p10": -0.1, "p90": 0.1, "median": 0.0},
                    "protein": {"p10": -0.1, "p90": 0.1, "median": 0.0},
                    "sodium": {"p10": -0.1, "p90": 0.1, "median": 0.0}
                }
            })
            .to_string(),
        )
        .unwrap();

        let loaded: Option<MacroDeltaStats> = load_artifact(dir.path(), "macro_delta_stats.json");
        assert!(loaded.is_none());
    }

    #[test]
    fn corrupt_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ingredient_embeddings.json"), "{not json").unwrap();
        let loaded: Option<IngredientEmbeddings> =
            load_artifact(dir.path(), "ingredient_embeddings.json");
        assert!(loaded.is_none());
    }

    #[test]
    fn mean_embedding_averages_all_vectors() {
        let table = IngredientEmbeddings {
            schema_version: SCHEMA_VERSION,
            dim: 2,
            embeddings: [
                ("beef".to_owned(), vec![1.0, 0.0]),
                ("bun".to_owned(), vec![0.0, 1.0]),
            ]
            .into_iter()
            .collect(),
        };
        assert_eq!(table.mean_embedding(), Some(vec![0.5, 0.5]));
    }
}
