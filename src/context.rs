// ABOUTME: EngineContext: every model artifact loaded once at startup, then immutable
// ABOUTME: Each artifact degrades independently; refinement needs both embedding tables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! Engine context.
//!
//! All learned state lives here, loaded from the artifacts directory exactly
//! once and shared read-only (`Arc<EngineContext>`) across request threads.
//! Missing artifacts disable the stages that need them; nothing is reloaded
//! at request time.

use crate::artifacts::{
    load_artifact, CalibrationArtifact, ConfidenceParams, DishEmbeddings, IngredientEmbeddings,
    MacroDeltaStats, NeighborIndex, RefinementModel, CALIBRATION_MODEL_FILE,
    CONFIDENCE_PARAMS_FILE, DISH_EMBEDDINGS_FILE, INGREDIENT_EMBEDDINGS_FILE,
    MACRO_DELTA_STATS_FILE, NEIGHBOR_INDEX_FILE, REFINEMENT_MODEL_FILE,
};
use crate::calibration::CalibrationModel;
use crate::config::EngineConfig;
use crate::refinement::RefinementArtifacts;
use tracing::info;

/// Immutable engine state shared by all requests
#[derive(Debug)]
pub struct EngineContext {
    /// Engine configuration
    pub config: EngineConfig,
    /// Calibration model; absent → stage 2 passes through at floor confidence
    pub calibration: Option<CalibrationModel>,
    /// Refinement artifacts; absent → stage 3 is an identity pass
    pub refinement: Option<RefinementArtifacts>,
}

impl EngineContext {
    /// Load every artifact from the configured directory.
    ///
    /// Never fails: each artifact that is missing, corrupt, or carries an
    /// incompatible schema version is logged and left absent. Refinement
    /// activates only when both the ingredient and dish embedding tables
    /// loaded; its remaining artifacts default individually (wide delta
    /// bounds, built-in confidence curves, no learned model).
    #[must_use]
    pub fn load(config: EngineConfig) -> Self {
        let dir = config.artifacts_dir.clone();

        let calibration = load_artifact::<CalibrationArtifact>(&dir, CALIBRATION_MODEL_FILE)
            .map(|artifact| artifact.model);

        let ingredients = load_artifact::<IngredientEmbeddings>(&dir, INGREDIENT_EMBEDDINGS_FILE);
        let dishes = load_artifact::<DishEmbeddings>(&dir, DISH_EMBEDDINGS_FILE);
        let refinement = match (ingredients, dishes) {
            (Some(ingredients), Some(dishes)) => Some(RefinementArtifacts::new(
                ingredients,
                dishes,
                load_artifact::<NeighborIndex>(&dir, NEIGHBOR_INDEX_FILE),
                load_artifact::<MacroDeltaStats>(&dir, MACRO_DELTA_STATS_FILE),
                load_artifact::<ConfidenceParams>(&dir, CONFIDENCE_PARAMS_FILE),
                load_artifact::<RefinementModel>(&dir, REFINEMENT_MODEL_FILE),
            )),
            _ => None,
        };

        info!(
            artifacts_dir = %dir.display(),
            calibration = calibration.is_some(),
            refinement = refinement.is_some(),
            "engine context loaded"
        );

        Self {
            config,
            calibration,
            refinement,
        }
    }

    /// A context with no artifacts at all; both learned stages degrade
    #[must_use]
    pub fn empty(config: EngineConfig) -> Self {
        Self {
            config,
            calibration: None,
            refinement: None,
        }
    }

    /// Install a calibration model directly, bypassing the artifact files
    #[must_use]
    pub fn with_calibration(mut self, model: CalibrationModel) -> Self {
        self.calibration = Some(model);
        self
    }

    /// Install refinement artifacts directly, bypassing the artifact files
    #[must_use]
    pub fn with_refinement(mut self, artifacts: RefinementArtifacts) -> Self {
        self.refinement = Some(artifacts);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::EngineContext;
    use crate::artifacts::SCHEMA_VERSION;
    use crate::config::EngineConfig;
    use serde_json::json;
    use std::fs;

    #[test]
    fn empty_directory_loads_with_both_stages_absent() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            artifacts_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        let context = EngineContext::load(config);
        assert!(context.calibration.is_none());
        assert!(context.refinement.is_none());
    }

    #[test]
    fn refinement_requires_both_embedding_tables() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ingredient_embeddings.json"),
            json!({
                "schema_version": SCHEMA_VERSION,
                "dim": 1,
                "embeddings": {"beef": [1.0]}
            })
            .to_string(),
        )
        .unwrap();

        let config = EngineConfig {
            artifacts_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        let context = EngineContext::load(config);
        // Dish embeddings are missing, so the stage stays off
        assert!(context.refinement.is_none());
    }
}
