//! Fingerprint generation with PaDEL-Descriptor.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use cholinease_common::config::PadelConfig;
use cholinease_common::error::{CholinEaseError, Result};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Every fingerprinter PaDEL knows about; the descriptor-types file toggles them.
const PADEL_FINGERPRINTERS: &[&str] = &[
    "Fingerprinter",
    "ExtendedFingerprinter",
    "EStateFingerprinter",
    "GraphOnlyFingerprinter",
    "MACCSFingerprinter",
    "PubchemFingerprinter",
    "SubstructureFingerprinter",
    "SubstructureFingerprintCount",
    "KlekotaRothFingerprinter",
    "KlekotaRothFingerprintCount",
    "AtomPairs2DFingerprinter",
    "AtomPairs2DFingerprintCount",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintKind {
    PubChem,
    KlekotaRoth,
    CdkExtended,
}

impl FingerprintKind {
    /// The fingerprints the bioactivity model was trained on, in column order.
    pub const ALL: [FingerprintKind; 3] = [
        FingerprintKind::PubChem,
        FingerprintKind::KlekotaRoth,
        FingerprintKind::CdkExtended,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FingerprintKind::PubChem => "PubChem",
            FingerprintKind::KlekotaRoth => "KlekotaRoth",
            FingerprintKind::CdkExtended => "CDKextended",
        }
    }

    pub fn fingerprinter(&self) -> &'static str {
        match self {
            FingerprintKind::PubChem => "PubchemFingerprinter",
            FingerprintKind::KlekotaRoth => "KlekotaRothFingerprinter",
            FingerprintKind::CdkExtended => "ExtendedFingerprinter",
        }
    }

    pub fn descriptor_types_file(&self) -> String {
        format!("{}.xml", self.fingerprinter())
    }

    pub fn output_file(&self) -> String {
        format!("{}_app_data.csv", self.label())
    }
}

impl fmt::Display for FingerprintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Render a PaDEL descriptor-types file that enables only `kind`.
pub fn descriptor_types_xml(kind: FingerprintKind) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer.write_event(Event::Start(BytesStart::new("Root")))?;

    let mut group = BytesStart::new("Group");
    group.push_attribute(("name", "Fingerprint"));
    writer.write_event(Event::Start(group))?;

    for name in PADEL_FINGERPRINTERS {
        let enabled = if *name == kind.fingerprinter() { "true" } else { "false" };
        let mut descriptor = BytesStart::new("Descriptor");
        descriptor.push_attribute(("name", *name));
        descriptor.push_attribute(("value", enabled));
        writer.write_event(Event::Empty(descriptor))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Group")))?;
    writer.write_event(Event::End(BytesEnd::new("Root")))?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| CholinEaseError::Descriptor(format!("descriptor types XML is not UTF-8: {}", e)))
}

/// Use the configured descriptor-types file if present, else write a generated one into `work_dir`.
pub async fn resolve_descriptor_types(
    types_dir: &Path,
    work_dir: &Path,
    kind: FingerprintKind,
) -> Result<PathBuf> {
    let configured = types_dir.join(kind.descriptor_types_file());
    if tokio::fs::try_exists(&configured).await.unwrap_or(false) {
        return Ok(configured);
    }

    debug!("{:?} not found, generating descriptor types for {}", configured, kind);
    let generated = work_dir.join(kind.descriptor_types_file());
    tokio::fs::write(&generated, descriptor_types_xml(kind)?).await?;
    Ok(generated)
}

/// Inputs for one fingerprint generation.
#[derive(Debug, Clone)]
pub struct DescriptorJob {
    pub kind: FingerprintKind,
    pub smi_path: PathBuf,
    pub output_path: PathBuf,
    pub descriptor_types: PathBuf,
}

/// Anything that can turn a .smi file into a fingerprint CSV.
#[async_trait]
pub trait DescriptorGenerator: Send + Sync {
    async fn generate(&self, job: &DescriptorJob) -> Result<()>;

    /// Human-readable report on the runtime the generator depends on.
    async fn runtime_check(&self) -> String;
}

/// Wrapper for PaDEL-Descriptor execution through the JVM.
pub struct PadelRunner {
    java: PathBuf,
    config: PadelConfig,
}

impl PadelRunner {
    pub fn new(config: PadelConfig) -> Self {
        Self {
            java: config.java_executable(),
            config,
        }
    }

    /// Command-line arguments for a single PaDEL invocation.
    pub fn arguments(&self, job: &DescriptorJob) -> Vec<String> {
        let cfg = &self.config;
        let mut args = vec![
            format!("-Xms{}", cfg.java_heap),
            format!("-Xmx{}", cfg.java_heap),
            "-Djava.awt.headless=true".to_string(),
            "-jar".to_string(),
            cfg.jar_path.display().to_string(),
            "-dir".to_string(),
            job.smi_path.display().to_string(),
            "-file".to_string(),
            job.output_path.display().to_string(),
            "-descriptortypes".to_string(),
            job.descriptor_types.display().to_string(),
            "-fingerprints".to_string(),
            "-retainorder".to_string(),
            "-threads".to_string(),
            cfg.threads.to_string(),
        ];
        if cfg.detect_aromaticity {
            args.push("-detectaromaticity".to_string());
        }
        if cfg.standardize_nitro {
            args.push("-standardizenitro".to_string());
        }
        if cfg.standardize_tautomers {
            args.push("-standardizetautomers".to_string());
        }
        if cfg.remove_salt {
            args.push("-removesalt".to_string());
        }
        if cfg.log {
            args.push("-log".to_string());
        }
        if let Some(ms) = cfg.max_runtime_ms {
            args.push("-maxruntime".to_string());
            args.push(ms.to_string());
        }
        args
    }

    async fn run_once(&self, job: &DescriptorJob) -> Result<()> {
        let mut command = Command::new(&self.java);
        command
            .args(self.arguments(job))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match self.config.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), command.output())
                .await
                .map_err(|_| {
                    CholinEaseError::Descriptor(format!("PaDEL timed out after {}s", secs))
                })??,
            None => command.output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CholinEaseError::Descriptor(format!(
                "PaDEL-Descriptor exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        if !tokio::fs::try_exists(&job.output_path).await.unwrap_or(false) {
            return Err(CholinEaseError::DescriptorFileNotFound(job.output_path.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl DescriptorGenerator for PadelRunner {
    async fn generate(&self, job: &DescriptorJob) -> Result<()> {
        info!("Running PaDEL-Descriptor for {} on {:?}", job.kind, job.smi_path);

        let attempts = self.config.retries.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.run_once(job).await {
                Ok(()) => {
                    debug!("{} descriptors written to {:?}", job.kind, job.output_path);
                    return Ok(());
                }
                Err(e) => {
                    warn!("PaDEL attempt {}/{} for {} failed: {}", attempt, attempts, job.kind, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| CholinEaseError::Descriptor("PaDEL was never run".into())))
    }

    async fn runtime_check(&self) -> String {
        java_version(&self.java).await
    }
}

/// Output of `java -version`, or why it could not be run.
pub async fn java_version(java: &Path) -> String {
    match Command::new(java).arg("-version").stdin(Stdio::null()).output().await {
        Ok(output) => {
            // the JVM prints its version banner on stderr
            let mut text = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(stdout.trim());
            }
            if output.status.success() {
                text
            } else {
                format!("java -version exited with {}: {}", output.status, text)
            }
        }
        Err(e) => format!("Java not available ({}): {}", java.display(), e),
    }
}
