use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const MIB: u64 = 1024 * 1024;

const DEFAULT_SYSTEM_PROMPT: &str = "The image uploaded by the user should show one or more medicines. \
Answer in two parts. Part A: a list of the medicines you can identify in the image. \
Part B: possible interactions or conflicts between the medicines in that list.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub limits: Limits,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub api_base: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub system_prompt: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 2500,
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Size ceilings applied by the analysis handler.
///
/// `encoded_check_threshold` enables the secondary estimate-based check for
/// payloads above that size. It is off by default since `max_image_bytes`
/// already bounds the encoded size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_image_bytes: u64,
    pub max_body_bytes: u64,
    pub encoded_check_threshold: Option<u64>,
    pub max_encoded_bytes: u64,
    pub encode_chunk_size: Option<usize>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_image_bytes: 10 * MIB,
            max_body_bytes: 32 * MIB,
            encoded_check_threshold: None,
            max_encoded_bytes: 20 * MIB,
            encode_chunk_size: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub compress: bool,
    pub max_width: u32,
    pub max_height: u32,
    pub quality: f32,
    /// Selections larger than this are refused before any upload.
    pub max_image_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/".to_string(),
            compress: true,
            max_width: 1920,
            max_height: 1080,
            quality: 0.8,
            max_image_bytes: 10 * MIB,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path))?;
        Ok(config)
    }

    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Reads the upstream credential from the environment.
    pub fn api_key(&self) -> anyhow::Result<String> {
        let name = &self.upstream.api_key_env;
        match std::env::var(name) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => anyhow::bail!("environment variable {} is not set", name),
        }
    }
}
