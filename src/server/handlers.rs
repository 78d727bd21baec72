//! Request handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, rejection::JsonRejection, State},
    Form, Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::inference::Prediction;
use crate::quality::Verdict;
use crate::schema::{ProcessSample, FEATURES, TARGET_NAMES};

use super::error::{Result, ServerError};
use super::state::AppState;

/// Body returned by both predict routes
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub uts: f64,
    pub elongation: f64,
    pub conductivity: f64,
    pub quality: Verdict,
}

impl From<&Prediction> for PredictionResponse {
    fn from(prediction: &Prediction) -> Self {
        let rounded = prediction.targets.rounded(2);
        Self {
            uts: rounded.uts,
            elongation: rounded.elongation,
            conductivity: rounded.conductivity,
            quality: prediction.verdict,
        }
    }
}

fn run_prediction(state: &AppState, sample: ProcessSample) -> Result<Json<PredictionResponse>> {
    let prediction = state.context.predict(&sample)?;
    info!(
        uts = prediction.targets.uts,
        elongation = prediction.targets.elongation,
        conductivity = prediction.targets.conductivity,
        quality = %prediction.verdict,
        "Served prediction"
    );
    Ok(Json(PredictionResponse::from(&prediction)))
}

// ============================================================================
// Inference
// ============================================================================

pub async fn predict_json(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResponse>> {
    let Json(body) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let sample = ProcessSample::from_json(&body)?;
    run_prediction(&state, sample)
}

pub async fn predict_form(
    State(state): State<Arc<AppState>>,
    form: std::result::Result<Form<HashMap<String, String>>, FormRejection>,
) -> Result<Json<PredictionResponse>> {
    let Form(form) = form.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let sample = ProcessSample::from_form(&form)?;
    run_prediction(&state, sample)
}

// ============================================================================
// Model / system
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "artifact_id": state.context.header().artifact_id,
    }))
}

pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let ctx = &state.context;
    let header = ctx.header();
    Json(json!({
        "artifact_id": header.artifact_id,
        "format_version": header.format_version,
        "created_at": header.created_at.to_rfc3339(),
        "schema": header.schema,
        "policy": ctx.policy(),
        "metrics": ctx.metrics(),
        "n_trees": ctx.n_trees(),
        "server_started_at": state.started_at.to_rfc3339(),
    }))
}

pub async fn about() -> Json<Value> {
    let features: Vec<Value> = FEATURES
        .iter()
        .map(|f| {
            json!({
                "name": f.name,
                "label": f.label,
                "unit": f.unit,
                "expected_range": [f.min, f.max],
            })
        })
        .collect();

    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Predicts ultimate tensile strength, elongation and conductivity of \
                        aluminium wire rod from nine casting and rolling parameters, and \
                        classifies the predicted rod as Good or Not Good.",
        "features": features,
        "targets": TARGET_NAMES,
    }))
}

/// Who runs the service and where to report problems
pub async fn contact() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "authors": env!("CARGO_PKG_AUTHORS")
            .split(':')
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>(),
        "repository": option_env!("CARGO_PKG_REPOSITORY").filter(|r| !r.is_empty()),
        "message": "For questions about predictions or to report a problem, contact the \
                    process engineering team that operates this service.",
    }))
}

