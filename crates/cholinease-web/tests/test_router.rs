//! Router-level tests against a pipeline with a stand-in descriptor generator.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tower::ServiceExt;
use uuid::Uuid;

use cholinease_bioactivity::model::ModelStore;
use cholinease_bioactivity::padel::{DescriptorGenerator, DescriptorJob};
use cholinease_bioactivity::BioactivityPipeline;
use cholinease_common::error::Result;
use cholinease_common::{Config, ModelConfig};
use cholinease_web::router::build_router;
use cholinease_web::state::AppState;

/// Every fingerprint bit is 1 for every molecule.
struct AllOnes;

#[async_trait]
impl DescriptorGenerator for AllOnes {
    async fn generate(&self, job: &DescriptorJob) -> Result<()> {
        let smi = tokio::fs::read_to_string(&job.smi_path).await?;
        let mut csv = format!("Name,{}_bit\n", job.kind.label());
        for line in smi.lines() {
            let name = line.split('\t').nth(1).unwrap_or_default();
            csv.push_str(&format!("{},1\n", name));
        }
        tokio::fs::write(&job.output_path, csv).await?;
        Ok(())
    }

    async fn runtime_check(&self) -> String {
        "openjdk version \"11.0.20\"".to_string()
    }
}

fn app(dir: &Path, with_model: bool) -> axum::Router {
    let reference_csv = dir.join("reference.csv");
    std::fs::write(&reference_csv, "PubChem_bit,KlekotaRoth_bit,CDKextended_bit\n").unwrap();
    let model_path = dir.join("model.json");
    if with_model {
        std::fs::write(
            &model_path,
            r#"{"kind": "linear", "coefficients": [1.0, 1.0, 0.5], "intercept": 3.0}"#,
        )
        .unwrap();
    }

    let mut config = Config::default();
    config.server.static_dir = dir.to_path_buf();
    config.pipeline.work_root = Some(dir.join("work"));
    config.padel.descriptor_types_dir = dir.to_path_buf();

    let (tx, _) = broadcast::channel(64);
    let pipeline = BioactivityPipeline::new(
        Arc::new(AllOnes),
        Arc::new(ModelStore::new(ModelConfig { model_path, reference_csv })),
        dir.to_path_buf(),
        config.pipeline.clone(),
    )
    .with_events(tx.clone());

    build_router(AppState::new(config, pipeline, "openjdk 11".to_string(), tx))
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn form_body(smiles: &str) -> String {
    let encoded: String = smiles
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect();
    format!("smiles={}", encoded)
}

fn post_form(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn form(smiles: &str) -> Request<Body> {
    post_form(form_body(smiles))
}

fn form_for_job(smiles: &str, job: Uuid) -> Request<Body> {
    post_form(format!("{}&job_id={}", form_body(smiles), job))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_form_page_renders() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), true)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Bioactivity Prediction App"));
    assert!(html.contains("openjdk 11"));
    // no banner image in the temp static dir
    assert!(html.contains("drug_discovery1.jpg&#39; not found"));
}

#[tokio::test]
async fn test_blank_submission_warns() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), true).oneshot(form("  \n ")).await.unwrap();
    let html = body_text(response).await;
    assert!(html.contains("alert-warning"));
    assert!(html.contains("Please enter SMILES strings to start the prediction!"));
}

#[tokio::test]
async fn test_submission_shows_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), true).oneshot(form("CCO\nCC(=O)O")).await.unwrap();
    let html = body_text(response).await;

    assert!(html.contains("PubChem descriptors saved successfully!"));
    assert!(html.contains("<td class=\"smiles\">CC(=O)O</td><td>5.5</td>"));
    assert!(html.contains(r#"download="prediction.csv""#));
}

#[tokio::test]
async fn test_submission_without_model_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), false).oneshot(form("CCO")).await.unwrap();
    let html = body_text(response).await;
    assert!(html.contains("Error: Model file"));
    assert!(!html.contains("Predicted Output"));
}

#[tokio::test]
async fn test_api_predict() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"smiles": ["CCO", "", "CCN"]}"#))
        .unwrap();
    let response = app(dir.path(), true).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["target"], "pIC50");
    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[1]["smiles"], "CCN");
    assert_eq!(predictions[1]["index"], 2);
    assert_eq!(predictions[1]["value"], 5.5);
}

#[tokio::test]
async fn test_api_predict_rejects_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"smiles": []}"#))
        .unwrap();
    let response = app(dir.path(), true).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_predict_missing_model_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"smiles": ["CCO"]}"#))
        .unwrap();
    let response = app(dir.path(), false).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_oversized_submission_reports_truncation() {
    let dir = tempfile::tempdir().unwrap();
    let smiles = vec!["CCO"; 101].join("\n");
    let html = body_text(app(dir.path(), true).oneshot(form(&smiles)).await.unwrap()).await;

    assert!(html.contains("Only the first 100 compounds are predicted; 1 were left out."));
    assert!(html.contains("<tr><td>100</td>"));
    assert!(!html.contains("<tr><td>101</td>"));
}

#[tokio::test]
async fn test_system_status() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), true);

    let body: serde_json::Value =
        serde_json::from_str(&body_text(app.clone().oneshot(get("/api/system")).await.unwrap()).await).unwrap();
    assert!(body["java_check"].is_string());
    assert_eq!(body["model_exists"], true);
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["max_compounds"], 100);

    app.clone().oneshot(form("CCO")).await.unwrap();
    let body: serde_json::Value =
        serde_json::from_str(&body_text(app.oneshot(get("/api/system")).await.unwrap()).await).unwrap();
    assert_eq!(body["model_loaded"], true);
}

#[tokio::test]
async fn test_events_require_a_job() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), true).oneshot(get("/api/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_events_stream_only_the_subscribed_job() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), true);
    let job = Uuid::new_v4();

    let events = app.clone().oneshot(get(&format!("/api/events?job={}", job))).await.unwrap();
    assert_eq!(events.status(), StatusCode::OK);
    assert!(events.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    // someone else's run goes first
    app.clone().oneshot(form("CCO")).await.unwrap();
    let html = body_text(app.oneshot(form_for_job("CCN", job)).await.unwrap()).await;
    assert!(html.contains("Predicted Output"));

    let mut frames = events.into_body().into_data_stream();
    let first = tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8(first.to_vec()).unwrap();
    assert!(text.contains("progress"));
    assert!(text.contains(r#""type":"started""#));
    assert!(text.contains(&job.to_string()));
}
