// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths;

/// Model name used whenever configuration resolves to a blank string.
pub const FALLBACK_MODEL: &str = "default-model";

pub const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub iteration: IterationConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub evidence: EvidenceConfig,

    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Fixed model for automatic retries and later manual iterations.
    #[serde(alias = "defaultModelName")]
    pub default: String,
    /// Scarce model reserved for cold start and the first human correction.
    #[serde(alias = "specializedModelName")]
    pub specialized: Option<String>,
    #[serde(alias = "useSpecializedModel")]
    pub use_specialized: bool,
    /// Prefixes of model ids that accept image input.
    pub vision: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: FALLBACK_MODEL.into(),
            specialized: None,
            use_specialized: false,
            vision: vec![
                "gpt-4o".into(),
                "gpt-4.1".into(),
                "gpt-5".into(),
                "o4-mini".into(),
                "claude-".into(),
                "gemini-".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationConfig {
    #[serde(alias = "maxAutoIterations")]
    pub max_auto_iterations: u32,
    /// Keep iterating automatically when a manual iteration fails.
    pub auto_after_manual: bool,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            max_auto_iterations: 3,
            auto_after_manual: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Time value for the settled frame used by similarity and anomaly checks.
    pub baseline_time: f32,
    pub throughput_frames: u32,
    #[serde(alias = "maxScreenshots")]
    pub max_screenshots: u32,
    #[serde(alias = "screenshotJitter")]
    pub screenshot_jitter: f32,
    /// Named reference scene to compare against.
    pub scene: Option<String>,
    /// Directory holding `<scene>.png` reference images.
    pub reference_dir: Option<String>,
    /// Fixed RNG seed for screenshot jitter (reproducible runs).
    pub seed: Option<u64>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            baseline_time: 1.0,
            throughput_frames: 60,
            max_screenshots: 5,
            screenshot_jitter: 2.0,
            scene: None,
            reference_dir: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    #[serde(alias = "perImageByteCap")]
    pub per_image_byte_cap: u64,
    #[serde(alias = "aggregateByteCap")]
    pub aggregate_byte_cap: u64,
    /// Images per request; 0 disables them. Values above 1 are clamped.
    pub max_attached_images: usize,
    /// Write screenshots to the evidence directory and record their paths.
    pub persist: bool,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            per_image_byte_cap: MIB,
            aggregate_byte_cap: 3 * MIB,
            max_attached_images: 1,
            persist: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub id: String,
    pub base_url: String,
    pub api_key_env: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Transport-level retries per call (timeouts, 429, 5xx).
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: "openai".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            max_tokens: Some(4096),
            temperature: Some(0.7),
            max_retries: 2,
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
