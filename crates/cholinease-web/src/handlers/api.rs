//! JSON API — predictions and system status.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use cholinease_bioactivity::padel::java_version;
use cholinease_bioactivity::SmilesBatch;
use cholinease_common::CholinEaseError;

use crate::handlers::describe_error;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct ApiPredictRequest {
    pub smiles: Vec<String>,
    /// Lets the caller follow `/api/events?job=<id>` during the run
    #[serde(default)]
    pub job_id: Option<Uuid>,
}

pub async fn api_predict(
    State(state): State<SharedState>,
    Json(payload): Json<ApiPredictRequest>,
) -> (StatusCode, Json<Value>) {
    let batch = match SmilesBatch::from_smiles(&payload.smiles, state.pipeline.max_compounds()) {
        Ok(batch) => batch,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "error": describe_error(&e) })),
            )
        }
    };

    let job_id = payload.job_id.unwrap_or_else(Uuid::new_v4);
    let outcome = state.pipeline.predict_job(job_id, &batch).await;
    match outcome.result {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "job_id": outcome.job_id,
                "truncated": batch.truncated(),
                "fingerprints": outcome.fingerprints,
                "target": report.target,
                "predictions": report.rows,
                "generated_at": report.generated_at,
            })),
        ),
        Err(e) => {
            let code = match e {
                CholinEaseError::ModelNotFound(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (
                code,
                Json(json!({
                    "status": "error",
                    "job_id": outcome.job_id,
                    "fingerprints": outcome.fingerprints,
                    "error": describe_error(&e),
                })),
            )
        }
    }
}

pub async fn api_system(State(state): State<SharedState>) -> Json<Value> {
    let padel = &state.config.padel;
    let models = state.pipeline.models();

    Json(json!({
        "java_check": java_version(&padel.java_executable()).await,
        "padel_jar": padel.jar_path,
        "padel_jar_exists": padel.jar_path.exists(),
        "model_path": models.model_path(),
        "model_exists": models.model_path().exists(),
        "model_loaded": models.is_loaded().await,
        "reference_csv": models.reference_path(),
        "max_compounds": state.pipeline.max_compounds(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
