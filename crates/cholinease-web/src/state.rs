//! Shared application state for the web server.

use std::sync::Arc;

use cholinease_bioactivity::{BioactivityPipeline, PipelineEvent};
use cholinease_common::Config;
use tokio::sync::broadcast;

/// Shared state injected into every Axum handler.
pub struct AppState {
    pub config: Config,
    pub pipeline: BioactivityPipeline,
    /// Output of the startup Java check, shown on the form page
    pub java_check: String,
    /// Broadcast channel for SSE push events
    pub event_tx: broadcast::Sender<PipelineEvent>,
}

impl AppState {
    /// State backed by PaDEL and the model files named in `config`.
    pub async fn from_config(config: Config) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let pipeline = BioactivityPipeline::from_config(&config).with_events(event_tx.clone());
        let java_check = pipeline.runtime_check().await;
        Self { config, pipeline, java_check, event_tx }
    }

    /// State around an already-built pipeline; its events must go to `event_tx`.
    pub fn new(
        config: Config,
        pipeline: BioactivityPipeline,
        java_check: String,
        event_tx: broadcast::Sender<PipelineEvent>,
    ) -> Self {
        Self { config, pipeline, java_check, event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.event_tx.subscribe()
    }
}

pub type SharedState = Arc<AppState>;
