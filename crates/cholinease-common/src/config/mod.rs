//! Configuration loading for CholinEase.
//! Reads cholinease.toml from the current directory or the path in CHOLINEASE_CONFIG.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{CholinEaseError, Result};

pub const CONFIG_ENV: &str = "CHOLINEASE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "cholinease.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub padel: PadelConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default = "default_banner_image")]
    pub banner_image: String,
}

fn default_bind()         -> String  { "127.0.0.1:8501".to_string() }
fn default_static_dir()   -> PathBuf { PathBuf::from("static") }
fn default_banner_image() -> String  { "drug_discovery1.jpg".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: default_static_dir(),
            banner_image: default_banner_image(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PadelConfig {
    /// Path to PaDEL-Descriptor.jar
    #[serde(default = "default_padel_jar")]
    pub jar_path: PathBuf,
    /// JAVA_HOME; `java` is looked up on PATH when unset
    #[serde(default)]
    pub java_home: Option<PathBuf>,
    /// Directory holding the fingerprinter descriptor-type XML files
    #[serde(default = "default_descriptor_types_dir")]
    pub descriptor_types_dir: PathBuf,
    #[serde(default = "default_threads")]
    pub threads: u32,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Per-molecule runtime cap passed to PaDEL (-maxruntime), in milliseconds
    #[serde(default)]
    pub max_runtime_ms: Option<u64>,
    #[serde(default = "default_java_heap")]
    pub java_heap: String,
    #[serde(default = "bool_true")]
    pub detect_aromaticity: bool,
    #[serde(default = "bool_true")]
    pub standardize_nitro: bool,
    #[serde(default = "bool_true")]
    pub standardize_tautomers: bool,
    #[serde(default = "bool_true")]
    pub remove_salt: bool,
    #[serde(default = "bool_true")]
    pub log: bool,
}

fn default_padel_jar()            -> PathBuf { PathBuf::from("PaDEL-Descriptor/PaDEL-Descriptor.jar") }
fn default_descriptor_types_dir() -> PathBuf { PathBuf::from(".") }
fn default_threads()              -> u32     { 2 }
fn default_retries()              -> u32     { 3 }
fn default_java_heap()            -> String  { "2G".to_string() }
fn bool_true()                    -> bool    { true }

impl Default for PadelConfig {
    fn default() -> Self {
        Self {
            jar_path: default_padel_jar(),
            java_home: None,
            descriptor_types_dir: default_descriptor_types_dir(),
            threads: default_threads(),
            retries: default_retries(),
            timeout_secs: None,
            max_runtime_ms: None,
            java_heap: default_java_heap(),
            detect_aromaticity: true,
            standardize_nitro: true,
            standardize_tautomers: true,
            remove_salt: true,
            log: true,
        }
    }
}

impl PadelConfig {
    /// The java executable to launch PaDEL with.
    pub fn java_executable(&self) -> PathBuf {
        match &self.java_home {
            Some(home) => home.join("bin").join("java"),
            None => PathBuf::from("java"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// CSV whose header row lists the descriptor columns the model was trained on
    #[serde(default = "default_reference_csv")]
    pub reference_csv: PathBuf,
}

fn default_model_path()    -> PathBuf { PathBuf::from("acetylcholinesterase_model.json") }
fn default_reference_csv() -> PathBuf { PathBuf::from("Combined_PubChem_CDK_Klekota_modified.csv") }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            reference_csv: default_reference_csv(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_max_compounds")]
    pub max_compounds: usize,
    /// Parent directory for per-request scratch directories; system temp when unset
    #[serde(default)]
    pub work_root: Option<PathBuf>,
    #[serde(default)]
    pub keep_workdir: bool,
}

fn default_max_compounds() -> usize { 100 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_compounds: default_max_compounds(),
            work_root: None,
            keep_workdir: false,
        }
    }
}


impl Config {
    /// Load configuration from cholinease.toml.
    /// Checks CHOLINEASE_CONFIG first, then the current directory. A missing
    /// default file yields the built-in defaults; a missing explicit file is an error.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            Err(_) => {
                warn!("{} not found, using built-in defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load an explicitly named file, with the same env overrides as [`Config::load`].
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CholinEaseError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("CHOLINEASE_BIND") {
            self.server.bind = bind;
        }
        if self.padel.java_home.is_none() {
            if let Ok(home) = std::env::var("JAVA_HOME") {
                if !home.is_empty() {
                    self.padel.java_home = Some(PathBuf::from(home));
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_compounds == 0 {
            return Err(CholinEaseError::Config("pipeline.max_compounds must be at least 1".into()));
        }
        if self.padel.retries == 0 {
            return Err(CholinEaseError::Config("padel.retries must be at least 1".into()));
        }
        if self.padel.threads == 0 {
            return Err(CholinEaseError::Config("padel.threads must be at least 1".into()));
        }
        Ok(())
    }
}
