//! Integration test: Server API endpoints

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wirerod_quality::quality::QualityConfig;
use wirerod_quality::server::{create_router, AppState};
use wirerod_quality::synthetic;
use wirerod_quality::training::{Trainer, TrainingConfig};
use wirerod_quality::InferenceContext;

fn context() -> Arc<InferenceContext> {
    static CONTEXT: OnceLock<Arc<InferenceContext>> = OnceLock::new();
    CONTEXT
        .get_or_init(|| {
            let df = synthetic::generate(80, 42).unwrap();
            let config = TrainingConfig {
                n_estimators: 15,
                ..Default::default()
            };
            let outcome = Trainer::new(config, QualityConfig::default())
                .fit_frame(&df)
                .unwrap();
            Arc::new(InferenceContext::from_outcome(&outcome).unwrap())
        })
        .clone()
}

fn test_app() -> axum::Router {
    create_router(Arc::new(AppState::new(context())))
}

fn sample_body() -> Value {
    json!({
        "chemical_composition": 0.5,
        "casting_temp": 650.0,
        "cooling_water_temp": 20.0,
        "casting_speed": 25.0,
        "entry_temp_rolling_mill": 350.0,
        "emulsion_temp": 65.0,
        "emulsion_pressure": 4.5,
        "emulsion_concentration": 1.2,
        "quench_water_pressure": 2.0
    })
}

fn sample_form() -> String {
    // Alias field names used by the legacy HTML form
    [
        ("chemical_composition", "0.5"),
        ("casting_temperature", "650"),
        ("cooling_water_temperature", "20"),
        ("casting_speed", "25"),
        ("entry_temp_rolling_mill", "350"),
        ("emulsion_temperature", "65"),
        ("emulsion_pressure", "4.5"),
        ("emulsion_concentration", "1.2"),
        ("quench_water_pressure", "2"),
    ]
    .iter()
    .map(|(k, v)| format!("{}={}", k, v))
    .collect::<Vec<_>>()
    .join("&")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn is_two_decimals(v: &Value) -> bool {
    let x = v.as_f64().unwrap();
    ((x * 100.0).round() - x * 100.0).abs() < 1e-6
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(
        body["artifact_id"],
        json!(context().header().artifact_id.to_string())
    );
}

#[tokio::test]
async fn test_model_endpoint() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/model")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["policy"]["kind"], "percentile_band");
    assert_eq!(body["schema"]["features"].as_array().unwrap().len(), 9);
    assert_eq!(body["n_trees"], 15);
}

#[tokio::test]
async fn test_predict_json() {
    let response = test_app()
        .oneshot(post_json("/api/predict", &sample_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    for key in ["uts", "elongation", "conductivity"] {
        assert!(is_two_decimals(&body[key]), "{} not rounded: {}", key, body[key]);
    }
    let quality = body["quality"].as_str().unwrap();
    assert!(quality == "Good" || quality == "Not Good");
}

#[tokio::test]
async fn test_predict_is_deterministic() {
    let first = body_json(
        test_app()
            .oneshot(post_json("/api/predict", &sample_body()))
            .await
            .unwrap(),
    )
    .await;
    let second = body_json(
        test_app()
            .oneshot(post_json("/api/predict", &sample_body()))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_predict_form_matches_json() {
    let form_response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(sample_form()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(form_response.status(), StatusCode::OK);
    let from_form = body_json(form_response).await;

    let from_json = body_json(
        test_app()
            .oneshot(post_json("/api/predict", &sample_body()))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(from_form, from_json);
}

#[tokio::test]
async fn test_non_numeric_casting_temp_is_bad_request() {
    let mut body = sample_body();
    body["casting_temp"] = json!("abc");

    let response = test_app()
        .oneshot(post_json("/api/predict", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], true);
    assert_eq!(body["field"], "casting_temp");
    assert!(body["message"].as_str().unwrap().contains("casting_temp"));
}

#[tokio::test]
async fn test_missing_field_is_bad_request() {
    let mut body = sample_body();
    body.as_object_mut().unwrap().remove("quench_water_pressure");

    let response = test_app()
        .oneshot(post_json("/api/predict", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["field"], "quench_water_pressure");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/predict")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_about_endpoint() {
    let response = test_app()
        .oneshot(Request::builder().uri("/about").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["features"].as_array().unwrap().len(), 9);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], true);
    assert!(body["message"].as_str().unwrap().contains("/api/nonexistent"));
}

#[tokio::test]
async fn test_contact_endpoint() {
    let response = test_app()
        .oneshot(Request::builder().uri("/contact").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "wirerod-quality");
    assert!(body["message"].is_string());
}
