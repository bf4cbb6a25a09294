//! Orchestrator for a prediction request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cholinease_common::config::{Config, PipelineConfig};
use cholinease_common::error::{CholinEaseError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::descriptors::{DescriptorTable, COMBINED_FILE};
use crate::model::ModelStore;
use crate::padel::{resolve_descriptor_types, DescriptorGenerator, DescriptorJob, FingerprintKind, PadelRunner};
use crate::report::PredictionReport;
use crate::smiles::SmilesBatch;

pub const SMI_FILE: &str = "molecule.smi";

/// Progress notifications emitted while a request runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started { job_id: Uuid, compounds: usize },
    FingerprintStarted { job_id: Uuid, fingerprint: FingerprintKind },
    FingerprintFinished { job_id: Uuid, fingerprint: FingerprintKind, ok: bool, message: String },
    Predicted { job_id: Uuid, compounds: usize },
    Failed { job_id: Uuid, message: String },
}

impl PipelineEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            PipelineEvent::Started { job_id, .. }
            | PipelineEvent::FingerprintStarted { job_id, .. }
            | PipelineEvent::FingerprintFinished { job_id, .. }
            | PipelineEvent::Predicted { job_id, .. }
            | PipelineEvent::Failed { job_id, .. } => *job_id,
        }
    }

    /// Whether no further events follow for this job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::Predicted { .. } | PipelineEvent::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintOutcome {
    pub fingerprint: FingerprintKind,
    pub ok: bool,
    pub message: String,
}

/// Everything a caller needs to report back: per-fingerprint status is kept
/// even when a later stage fails.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub job_id: Uuid,
    pub fingerprints: Vec<FingerprintOutcome>,
    pub result: Result<PredictionReport>,
}

pub struct BioactivityPipeline {
    generator: Arc<dyn DescriptorGenerator>,
    models: Arc<ModelStore>,
    descriptor_types_dir: PathBuf,
    config: PipelineConfig,
    events: Option<broadcast::Sender<PipelineEvent>>,
}

impl BioactivityPipeline {
    pub fn new(
        generator: Arc<dyn DescriptorGenerator>,
        models: Arc<ModelStore>,
        descriptor_types_dir: PathBuf,
        config: PipelineConfig,
    ) -> Self {
        Self {
            generator,
            models,
            descriptor_types_dir,
            config,
            events: None,
        }
    }

    /// Pipeline backed by PaDEL-Descriptor and the configured model files.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(PadelRunner::new(config.padel.clone())),
            Arc::new(ModelStore::new(config.model.clone())),
            config.padel.descriptor_types_dir.clone(),
            config.pipeline.clone(),
        )
    }

    pub fn with_events(mut self, tx: broadcast::Sender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn models(&self) -> &Arc<ModelStore> {
        &self.models
    }

    pub fn max_compounds(&self) -> usize {
        self.config.max_compounds
    }

    pub async fn runtime_check(&self) -> String {
        self.generator.runtime_check().await
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            // no subscribers is fine
            let _ = tx.send(event);
        }
    }

    fn work_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("cholinease-");
        let dir = match &self.config.work_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    pub async fn predict(&self, batch: &SmilesBatch) -> PipelineOutcome {
        self.predict_job(Uuid::new_v4(), batch).await
    }

    /// Run under a caller-chosen id, so a client can subscribe to its events first.
    pub async fn predict_job(&self, job_id: Uuid, batch: &SmilesBatch) -> PipelineOutcome {
        info!("Prediction job {} started for {} compounds", job_id, batch.len());
        self.emit(PipelineEvent::Started { job_id, compounds: batch.len() });

        let work_dir = match self.work_dir() {
            Ok(dir) => dir,
            Err(e) => return self.fail(job_id, Vec::new(), e),
        };

        let (fingerprints, result) = self.run_in(job_id, batch, work_dir.path()).await;

        if self.config.keep_workdir {
            let kept = work_dir.keep();
            info!("Keeping work directory {:?}", kept);
        }

        match result {
            Ok(report) => {
                self.emit(PipelineEvent::Predicted { job_id, compounds: report.rows.len() });
                PipelineOutcome { job_id, fingerprints, result: Ok(report) }
            }
            Err(e) => self.fail(job_id, fingerprints, e),
        }
    }

    fn fail(&self, job_id: Uuid, fingerprints: Vec<FingerprintOutcome>, error: CholinEaseError) -> PipelineOutcome {
        warn!("Prediction job {} failed: {}", job_id, error);
        self.emit(PipelineEvent::Failed { job_id, message: error.to_string() });
        PipelineOutcome { job_id, fingerprints, result: Err(error) }
    }

    async fn run_in(
        &self,
        job_id: Uuid,
        batch: &SmilesBatch,
        dir: &Path,
    ) -> (Vec<FingerprintOutcome>, Result<PredictionReport>) {
        let smi_path = dir.join(SMI_FILE);
        if let Err(e) = batch.write_smi(&smi_path).await {
            return (Vec::new(), Err(e));
        }

        let fingerprints = self.generate_all(job_id, &smi_path, dir).await;
        let result = self.assemble_and_predict(batch, dir).await;
        (fingerprints, result)
    }

    /// Run every fingerprint in turn; one failing does not stop the rest.
    async fn generate_all(&self, job_id: Uuid, smi_path: &Path, dir: &Path) -> Vec<FingerprintOutcome> {
        let mut outcomes = Vec::with_capacity(FingerprintKind::ALL.len());

        for kind in FingerprintKind::ALL {
            self.emit(PipelineEvent::FingerprintStarted { job_id, fingerprint: kind });

            let result = match resolve_descriptor_types(&self.descriptor_types_dir, dir, kind).await {
                Ok(descriptor_types) => {
                    let job = DescriptorJob {
                        kind,
                        smi_path: smi_path.to_path_buf(),
                        output_path: dir.join(kind.output_file()),
                        descriptor_types,
                    };
                    self.generator.generate(&job).await
                }
                Err(e) => Err(e),
            };

            let outcome = match result {
                Ok(()) => FingerprintOutcome {
                    fingerprint: kind,
                    ok: true,
                    message: format!("{} descriptors saved successfully!", kind),
                },
                Err(e) => FingerprintOutcome {
                    fingerprint: kind,
                    ok: false,
                    message: format!("Error generating descriptors for {}: {}", kind, e),
                },
            };
            self.emit(PipelineEvent::FingerprintFinished {
                job_id,
                fingerprint: kind,
                ok: outcome.ok,
                message: outcome.message.clone(),
            });
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn assemble_and_predict(&self, batch: &SmilesBatch, dir: &Path) -> Result<PredictionReport> {
        let dir = dir.to_path_buf();
        let combined = tokio::task::spawn_blocking(move || -> Result<DescriptorTable> {
            let tables = FingerprintKind::ALL
                .iter()
                .map(|kind| DescriptorTable::read_csv(&dir.join(kind.output_file())))
                .collect::<Result<Vec<_>>>()?;
            let combined = DescriptorTable::combine(&tables)?;
            combined.write_csv(&dir.join(COMBINED_FILE))?;
            debug!(
                "Combined {} descriptor columns for {} molecules",
                combined.columns().len(),
                combined.row_count()
            );
            Ok(combined)
        })
        .await
        .map_err(|e| CholinEaseError::Other(e.into()))??;

        let loaded = self.models.get().await?;
        let matrix = combined.select(&loaded.features, batch)?;
        let predictions = loaded.model.predict(&matrix)?;
        PredictionReport::new(&loaded.model.target, batch, predictions)
    }
}
