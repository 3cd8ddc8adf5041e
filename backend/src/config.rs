use serde::Deserialize;
use shared::ServiceKind;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

use crate::classifier::LabelPolicy;
use crate::normalizer::{ChannelOrder, InputSpec};

const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_LLM_MODEL_ID: &str = "llama3-8b-8192";
const DEFAULT_MODELS_CONFIG: &str = "config/models.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse models config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid classifier config for {name}: {reason}")]
    InvalidClassifier { name: &'static str, reason: String },
    #[error("No model runtime compiled in for {}; rebuild with the `torch` feature", .0.display())]
    RuntimeUnavailable(PathBuf),
    #[error("Failed to load model {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: Url,
    pub model_id: String,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("model_id", &self.model_id)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service: ServiceKind,
    pub port: u16,
    pub llm: LlmConfig,
    pub models_config: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service = match lookup("SERVICE") {
            Some(value) => ServiceKind::from_str(value.trim())
                .map_err(|_| ConfigError::InvalidVar { name: "SERVICE", value })?,
            None => ServiceKind::All,
        };

        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidVar { name: "PORT", value })?,
            None => service.default_port(),
        };

        let api_key = lookup("API_KEY_LLAMA")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingVar("API_KEY_LLAMA"))?;

        let base_url = lookup("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string());
        let base_url = Url::parse(&base_url).map_err(|_| ConfigError::InvalidVar {
            name: "LLM_BASE_URL",
            value: base_url.clone(),
        })?;

        let model_id = lookup("LLM_MODEL_ID").unwrap_or_else(|| DEFAULT_LLM_MODEL_ID.to_string());
        let models_config = lookup("MODELS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_CONFIG));

        Ok(Self {
            service,
            port,
            llm: LlmConfig {
                api_key,
                base_url,
                model_id,
            },
            models_config,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Model file plus the metadata every inference call is checked against.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassifierSpec {
    pub model_path: PathBuf,
    pub input: InputSpec,
    pub policy: LabelPolicy,
}

impl ClassifierSpec {
    pub fn ecg() -> Self {
        Self {
            model_path: PathBuf::from("models/ecg_model.pt"),
            input: InputSpec::square(224, ChannelOrder::Bgr),
            policy: LabelPolicy::ecg(),
        }
    }

    pub fn xray() -> Self {
        Self {
            model_path: PathBuf::from("models/xray_pneumonia_model.pt"),
            input: InputSpec::square(150, ChannelOrder::Bgr),
            policy: LabelPolicy::xray(),
        }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.input.height == 0 || self.input.width == 0 {
            return Err(ConfigError::InvalidClassifier {
                name,
                reason: "input size must be non-zero".into(),
            });
        }
        self.policy
            .validate()
            .map_err(|reason| ConfigError::InvalidClassifier { name, reason })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "ClassifierSpec::ecg")]
    pub ecg: ClassifierSpec,
    #[serde(default = "ClassifierSpec::xray")]
    pub xray: ClassifierSpec,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            ecg: ClassifierSpec::ecg(),
            xray: ClassifierSpec::xray(),
        }
    }
}

impl ModelsConfig {
    /// Reads the YAML file at `path`, falling back to built-in defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::warn!(
                "Models config {} not found, using built-in classifier defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: ModelsConfig = serde_yaml::from_str(contents)?;
        config.ecg.validate("ecg")?;
        config.xray.validate("xray")?;
        Ok(config)
    }
}
