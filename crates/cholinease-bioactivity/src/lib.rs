//! CholinEase Bioactivity - pIC50 prediction for acetylcholinesterase inhibitors.
//!
//! A request flows through:
//! 1. Collecting SMILES input into a batch
//! 2. Fingerprint generation with PaDEL-Descriptor (PubChem, Klekota-Roth, CDK extended)
//! 3. Combining the fingerprint CSVs and selecting the model's reference columns
//! 4. Regression with the pre-trained model
//! 5. Reporting the predictions as a table and CSV download

pub mod smiles;
pub mod padel;
pub mod descriptors;
pub mod model;
pub mod report;
pub mod pipeline;

pub use pipeline::{BioactivityPipeline, FingerprintOutcome, PipelineEvent, PipelineOutcome};
pub use smiles::SmilesBatch;
