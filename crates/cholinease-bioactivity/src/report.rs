//! Prediction table and its CSV download.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use cholinease_common::error::{CholinEaseError, Result};
use serde::{Deserialize, Serialize};

use crate::smiles::SmilesBatch;

pub const SMILES_HEADER: &str = "SMILES Notation";
pub const DOWNLOAD_FILE_NAME: &str = "prediction.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    /// 1-based position in the submitted batch
    pub index: usize,
    pub smiles: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionReport {
    /// Name of the predicted quantity, used as the value column header
    pub target: String,
    pub rows: Vec<PredictionRow>,
    pub generated_at: DateTime<Utc>,
}

/// Float text with at least one decimal place, so `6` is written as `6.0`.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

impl PredictionReport {
    pub fn new(target: &str, batch: &SmilesBatch, predictions: Vec<f64>) -> Result<Self> {
        if predictions.len() != batch.len() {
            return Err(CholinEaseError::Model(format!(
                "model returned {} predictions for {} compounds",
                predictions.len(),
                batch.len()
            )));
        }
        let rows = batch
            .compounds()
            .iter()
            .zip(predictions)
            .enumerate()
            .map(|(i, (compound, value))| PredictionRow {
                index: i + 1,
                smiles: compound.smiles.clone(),
                value,
            })
            .collect();
        Ok(Self {
            target: target.to_string(),
            rows,
            generated_at: Utc::now(),
        })
    }

    /// CSV with a `SMILES Notation,<target>` header and no index column.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([SMILES_HEADER, self.target.as_str()])?;
        for row in &self.rows {
            writer.write_record([row.smiles.clone(), format_value(row.value)])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| CholinEaseError::Other(anyhow::anyhow!("flushing CSV: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| CholinEaseError::Other(e.into()))
    }

    /// `data:` URI carrying the CSV, base64-encoded.
    pub fn download_href(&self) -> Result<String> {
        let csv = self.to_csv()?;
        Ok(format!("data:file/csv;base64,{}", STANDARD.encode(csv.as_bytes())))
    }

    pub fn download_link(&self) -> Result<String> {
        Ok(format!(
            r#"<a href="{}" download="{}">Download Predictions</a>"#,
            self.download_href()?,
            DOWNLOAD_FILE_NAME
        ))
    }
}
