// ABOUTME: Integration tests for the similarity refinement engine
// ABOUTME: Covers neighbor search, percentile bounding, and the learned model path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use macrolens::artifacts::{
    DeltaBounds, DishEmbeddings, DishRecord, IngredientEmbeddings, MacroDeltaStats,
    RefinementModel, SCHEMA_VERSION,
};
use macrolens::models::{Macro, MacroVector, PerMacro, PortionSize};
use macrolens::refinement::{
    embed_dish, refine, DishFeatures, RefineOptions, RefineRequest, RefinementArtifacts,
};

fn ingredient_table() -> IngredientEmbeddings {
    IngredientEmbeddings {
        schema_version: SCHEMA_VERSION,
        dim: 2,
        embeddings: [
            ("beef".to_owned(), vec![1.0, 0.0]),
            ("chicken".to_owned(), vec![0.9, 0.1]),
            ("lettuce".to_owned(), vec![0.0, 1.0]),
        ]
        .into_iter()
        .collect(),
    }
}

fn macros(calories: f64) -> MacroVector {
    MacroVector {
        calories,
        fat: calories * 0.05,
        carbs: calories * 0.09,
        protein: calories * 0.04,
        sodium: calories * 1.8,
    }
}

fn features<'a>(ingredients: &'a [String], methods: &'a [String]) -> DishFeatures<'a> {
    DishFeatures {
        ingredients,
        cooking_methods: methods,
        sauce_intensity: 0.3,
        portion: PortionSize::Medium,
    }
}

/// Corpus whose dishes are embedded with the same embedder the engine uses,
/// so live-scan similarities are meaningful
fn corpus(table: &IngredientEmbeddings) -> DishEmbeddings {
    let oov = table.mean_embedding().unwrap();
    let dishes = [
        ("beef-burger", vec!["beef".to_owned()], vec!["grilled".to_owned()], 620.0),
        ("chicken-burger", vec!["chicken".to_owned()], vec!["grilled".to_owned()], 540.0),
        ("garden-salad", vec!["lettuce".to_owned()], vec!["raw".to_owned()], 150.0),
    ]
    .into_iter()
    .map(|(id, ingredients, methods, calories)| DishRecord {
        id: id.into(),
        embedding: embed_dish(table, &oov, &features(&ingredients, &methods)),
        macros: macros(calories),
    })
    .collect();
    DishEmbeddings {
        schema_version: SCHEMA_VERSION,
        dim: 15,
        dishes,
    }
}

fn stats(p10: f64, p90: f64) -> MacroDeltaStats {
    MacroDeltaStats {
        schema_version: SCHEMA_VERSION,
        stats: PerMacro::from_fn(|_| DeltaBounds {
            p10,
            p90,
            median: 0.0,
        }),
    }
}

fn artifacts(delta_stats: Option<MacroDeltaStats>, model: Option<RefinementModel>) -> RefinementArtifacts {
    let table = ingredient_table();
    let dishes = corpus(&table);
    RefinementArtifacts::new(table, dishes, None, delta_stats, None, model)
}

#[test]
fn similar_dishes_pull_the_estimate_toward_their_macros() {
    let artifacts = artifacts(Some(stats(-0.5, 0.5)), None);
    let ingredients = vec!["beef".to_owned()];
    let methods = vec!["grilled".to_owned()];
    let base = macros(500.0);

    let result = refine(
        Some(&artifacts),
        &RefineOptions { top_k: 2, ..RefineOptions::default() },
        &RefineRequest {
            dish_id: None,
            features: features(&ingredients, &methods),
            base,
        },
    );

    // The two burgers average above the base, the salad is excluded
    assert!(result.macros.calories > base.calories);
    assert_eq!(result.neighbors.len(), 2);
    assert_eq!(result.neighbors[0].id, "beef-burger");
    assert!(result.neighbors[0].similarity > result.neighbors[1].similarity);
}

#[test]
fn refined_macros_never_leave_the_percentile_envelope() {
    // Very tight bounds: at most ±1% movement regardless of neighbors
    let artifacts = artifacts(Some(stats(-0.01, 0.01)), None);
    let ingredients = vec!["lettuce".to_owned()];
    let methods = vec!["raw".to_owned()];
    let base = macros(2000.0);

    let result = refine(
        Some(&artifacts),
        &RefineOptions::default(),
        &RefineRequest {
            dish_id: None,
            features: features(&ingredients, &methods),
            base,
        },
    );

    for m in Macro::ALL {
        let lo = base.get(m) * 0.99;
        let hi = base.get(m) * 1.01;
        assert!(
            result.macros.get(m) >= lo - 1e-9 && result.macros.get(m) <= hi + 1e-9,
            "{m} escaped the envelope: {}",
            result.macros.get(m)
        );
    }
}

#[test]
fn missing_stats_artifact_defaults_to_wide_bounds() {
    let artifacts = artifacts(None, None);
    assert_eq!(artifacts.delta_stats.stats.get(Macro::Calories).p10, -1.0);
    assert_eq!(artifacts.delta_stats.stats.get(Macro::Calories).p90, 1.0);
}

#[test]
fn learned_model_predictions_are_clamped_like_the_blend() {
    let dim = 15;
    let feature_dim = dim + 5 + 7 * (dim + 5 + 1);
    let model = RefinementModel {
        schema_version: SCHEMA_VERSION,
        feature_dim,
        scaler_mean: vec![0.0; feature_dim],
        scaler_std: vec![1.0; feature_dim],
        weights: vec![vec![0.0; feature_dim]; 5],
        bias: vec![9999.0; 5],
    };
    let artifacts = artifacts(Some(stats(-0.1, 0.1)), Some(model));
    let ingredients = vec!["beef".to_owned()];
    let methods = vec!["grilled".to_owned()];
    let base = macros(500.0);

    let result = refine(
        Some(&artifacts),
        &RefineOptions::default(),
        &RefineRequest {
            dish_id: None,
            features: features(&ingredients, &methods),
            base,
        },
    );
    for m in Macro::ALL {
        assert!((result.macros.get(m) - base.get(m) * 1.1).abs() < 1e-6, "{m}");
    }
}

#[test]
fn refinement_is_idempotent_for_the_same_request() {
    let artifacts = artifacts(Some(stats(-0.5, 0.5)), None);
    let ingredients = vec!["chicken".to_owned()];
    let methods = vec!["grilled".to_owned()];
    let request = RefineRequest {
        dish_id: None,
        features: features(&ingredients, &methods),
        base: macros(480.0),
    };

    let first = refine(Some(&artifacts), &RefineOptions::default(), &request);
    let second = refine(Some(&artifacts), &RefineOptions::default(), &request);
    assert_eq!(first, second);
}

#[test]
fn out_of_vocabulary_ingredients_lower_confidence() {
    let artifacts = artifacts(Some(stats(-0.5, 0.5)), None);
    let known = vec!["beef".to_owned()];
    let unknown = vec!["quinoa".to_owned(), "tempeh".to_owned()];
    let methods = vec!["grilled".to_owned()];

    let covered = refine(
        Some(&artifacts),
        &RefineOptions::default(),
        &RefineRequest {
            dish_id: None,
            features: features(&known, &methods),
            base: macros(500.0),
        },
    );
    let uncovered = refine(
        Some(&artifacts),
        &RefineOptions::default(),
        &RefineRequest {
            dish_id: None,
            features: features(&unknown, &methods),
            base: macros(500.0),
        },
    );
    assert!(covered.confidence > uncovered.confidence);
}
