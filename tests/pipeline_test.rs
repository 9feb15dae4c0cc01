// ABOUTME: End-to-end pipeline tests: baseline stub through calibration and refinement
// ABOUTME: Exercises degraded, calibration-only, and fully-loaded engine states
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use macrolens::artifacts::{
    DeltaBounds, DishEmbeddings, DishRecord, IngredientEmbeddings, MacroDeltaStats,
    SCHEMA_VERSION,
};
use macrolens::calibration::{CalibrationModel, TrainingObservation};
use macrolens::models::{BaselineEstimate, PerMacro, PortionClass};
use macrolens::refinement::{embed_dish, DishFeatures, RefinementArtifacts};
use macrolens::{
    EngineConfig, EngineContext, EngineError, MacroVector, NutritionRequest, Pipeline,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn request(restaurant: Option<&str>) -> NutritionRequest {
    NutritionRequest {
        item_name: "crispy chicken sandwich".into(),
        description: "fried chicken on a brioche bun".into(),
        restaurant: restaurant.map(Into::into),
        price: Some(8.99),
        modifiers: None,
    }
}

fn baseline_value(confidence: f64) -> Value {
    json!({
        "item_name": "crispy chicken sandwich",
        "ingredients": ["chicken", "bun"],
        "cooking_methods": ["fried"],
        "sauces": ["mayo"],
        "portion_class": "entree",
        "macros": {
            "calories": 600.0, "fat": 30.0, "carbs": 55.0,
            "protein": 28.0, "sodium": 1100.0
        },
        "confidence": confidence
    })
}

fn trained_calibration(ratio: f64) -> CalibrationModel {
    let baseline = BaselineEstimate {
        item_name: "crispy chicken sandwich".into(),
        ingredients: vec!["chicken".into(), "bun".into()],
        cooking_methods: vec!["fried".into()],
        sauces: vec!["mayo".into()],
        portion_class: PortionClass::Entree,
        macros: MacroVector {
            calories: 600.0,
            fat: 30.0,
            carbs: 55.0,
            protein: 28.0,
            sodium: 1100.0,
        },
        confidence: 0.8,
    };
    let truth = MacroVector {
        calories: 600.0 * ratio,
        fat: 30.0 * ratio,
        carbs: 55.0 * ratio,
        protein: 28.0 * ratio,
        sodium: 1100.0 * ratio,
    };
    let mut model = CalibrationModel::new();
    let observations: Vec<_> = (0..10)
        .map(|_| TrainingObservation {
            baseline: baseline.clone(),
            truth,
            restaurant: Some("popeyes".into()),
            price: Some(8.99),
        })
        .collect();
    model.train(&observations);
    model
}

fn refinement_artifacts() -> RefinementArtifacts {
    let table = IngredientEmbeddings {
        schema_version: SCHEMA_VERSION,
        dim: 2,
        embeddings: [
            ("chicken".to_owned(), vec![1.0, 0.0]),
            ("bun".to_owned(), vec![0.0, 1.0]),
        ]
        .into_iter()
        .collect(),
    };
    let oov = table.mean_embedding().unwrap();
    let ingredients = vec!["chicken".to_owned(), "bun".to_owned()];
    let methods = vec!["fried".to_owned()];
    let embedding = embed_dish(
        &table,
        &oov,
        &DishFeatures {
            ingredients: &ingredients,
            cooking_methods: &methods,
            sauce_intensity: 1.0 / 3.0,
            portion: macrolens::models::PortionSize::Medium,
        },
    );
    let dishes = DishEmbeddings {
        schema_version: SCHEMA_VERSION,
        dim: embedding.len(),
        dishes: vec![DishRecord {
            id: "fried-chicken-sandwich".into(),
            embedding,
            macros: MacroVector {
                calories: 720.0,
                fat: 36.0,
                carbs: 66.0,
                protein: 33.6,
                sodium: 1320.0,
            },
        }],
    };
    let stats = MacroDeltaStats {
        schema_version: SCHEMA_VERSION,
        stats: PerMacro::from_fn(|_| DeltaBounds {
            p10: -0.25,
            p90: 0.25,
            median: 0.0,
        }),
    };
    RefinementArtifacts::new(table, dishes, None, Some(stats), None, None)
}

#[test]
fn degraded_engine_serves_the_baseline_with_low_confidence() {
    let context = Arc::new(EngineContext::empty(EngineConfig::default()));
    let pipeline = Pipeline::new(context, |_: &NutritionRequest| Ok(baseline_value(0.8)));

    let response = pipeline.estimate(&request(Some("popeyes"))).unwrap();
    assert_eq!(response.macros.calories, 600.0);
    // 0.5*0.8 + 0.3*0.1 + 0.2*1.0
    assert!((response.confidence - 0.63).abs() < 1e-9);
}

#[test]
fn calibration_multiplier_flows_into_the_response() {
    let context = Arc::new(
        EngineContext::empty(EngineConfig::default()).with_calibration(trained_calibration(1.2)),
    );
    let pipeline = Pipeline::new(context, |_: &NutritionRequest| Ok(baseline_value(0.8)));

    let response = pipeline.estimate(&request(Some("popeyes"))).unwrap();
    assert!((response.macros.calories - 720.0).abs() < 1e-6);
    assert!((response.macros.sodium - 1320.0).abs() < 1e-6);

    let calories_audit = &response.debug.calibration_adjustments["calories"];
    assert!((calories_audit["multiplier"].as_f64().unwrap() - 1.2).abs() < 1e-9);
    assert_eq!(calories_audit["source"].as_str().unwrap(), "restaurant");
}

#[test]
fn full_engine_refines_within_bounds_and_reports_neighbors() {
    let context = Arc::new(
        EngineContext::empty(EngineConfig::default())
            .with_calibration(trained_calibration(1.0))
            .with_refinement(refinement_artifacts()),
    );
    let pipeline = Pipeline::new(context, |_: &NutritionRequest| Ok(baseline_value(0.9)));

    let response = pipeline.estimate(&request(Some("popeyes"))).unwrap();
    // The lone corpus dish sits 20% above the calibrated base; bounds allow it
    assert!(response.macros.calories > 600.0);
    assert!(response.macros.calories <= 600.0 * 1.25 + 1e-6);
    assert_eq!(
        response.debug.refinement_summary.similar_dish_ids,
        vec!["fried-chicken-sandwich".to_owned()]
    );
    assert!((0.0..=1.0).contains(&response.confidence));
}

#[test]
fn same_request_is_deterministic_end_to_end() {
    let context = Arc::new(
        EngineContext::empty(EngineConfig::default())
            .with_calibration(trained_calibration(1.15))
            .with_refinement(refinement_artifacts()),
    );
    let pipeline = Pipeline::new(context, |_: &NutritionRequest| Ok(baseline_value(0.8)));

    let first = pipeline.estimate(&request(Some("popeyes"))).unwrap();
    let second = pipeline.estimate(&request(Some("popeyes"))).unwrap();
    assert_eq!(first, second);
}

#[test]
fn baseline_contract_violations_name_the_stage_and_keys() {
    let context = Arc::new(EngineContext::empty(EngineConfig::default()));
    let pipeline = Pipeline::new(context, |_: &NutritionRequest| {
        Ok(json!({"confidence": 0.8}))
    });

    let err = pipeline.estimate(&request(None)).unwrap_err();
    match err {
        EngineError::ContractViolation { stage, missing } => {
            assert_eq!(stage, "baseline");
            assert_eq!(missing, vec!["macros".to_owned()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn provider_failure_surfaces_as_a_baseline_error() {
    let context = Arc::new(EngineContext::empty(EngineConfig::default()));
    let pipeline = Pipeline::new(context, |_: &NutritionRequest| -> Result<Value, EngineError> {
        Err(EngineError::baseline("collaborator unreachable"))
    });

    let err = pipeline.estimate(&request(None)).unwrap_err();
    assert!(matches!(err, EngineError::Baseline(_)));
    assert!(err.to_string().contains("collaborator unreachable"));
}
