//! Configuration for codevec.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables such as `CODEVEC__QDRANT__URL`.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of environment overrides; nested keys are joined with `__`.
pub const ENV_PREFIX: &str = "CODEVEC";

/// Fallback variable for the embeddings API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Environment variable '{var}' not set (from config value '{value}')")]
    MissingEnvVar { var: String, value: String },

    #[error("No API key configured. Set embeddings.api_key in config or {0} environment variable")]
    MissingApiKey(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantSettings {
    /// gRPC endpoint
    pub url: String,
    pub api_key: Option<String>,
    pub collection_name: String,
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection_name: "code_vectors".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsSettings {
    /// Literal key or `${ENV_VAR}`
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_batch_size: usize,
    pub max_retries: u32,
}

impl Default for EmbeddingsSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "openai/text-embedding-3-large".to_string(),
            dimensions: 3072,
            base_url: "https://openrouter.ai/api/v1/embeddings".to_string(),
            timeout_secs: 60,
            max_batch_size: 32,
            max_retries: 3,
        }
    }
}

impl EmbeddingsSettings {
    /// The configured API key, falling back to [`API_KEY_ENV`].
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        match resolve_env_value(&self.api_key)? {
            Some(key) => Ok(key),
            None => std::env::var(API_KEY_ENV).map_err(|_| ConfigError::MissingApiKey(API_KEY_ENV)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Files longer than this are logged as oversized
    pub max_file_lines: usize,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            max_file_lines: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerSettings {
    pub extensions: Vec<String>,
    /// Directory names excluded wherever they appear
    pub ignored_dirs: Vec<String>,
}

impl Default for WalkerSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["java".to_string()],
            ignored_dirs: ["test", "build", "target", "bin"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub default_limit: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self { default_limit: 5 }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodevecConfig {
    pub qdrant: QdrantSettings,
    pub embeddings: EmbeddingsSettings,
    pub parser: ParserSettings,
    pub walker: WalkerSettings,
    pub query: QuerySettings,
}

impl CodevecConfig {
    /// Load configuration from `path`, or from [`default_config_path`] when
    /// `None`. An explicit path must exist; the default one may be absent.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let env = env_source();

        match path {
            Some(p) => {
                let expanded = shellexpand::tilde(p);
                Self::load_with(Some((Path::new(&*expanded), true)), env)
            }
            None => match default_config_path() {
                Some(default) => Self::load_with(Some((default.as_path(), false)), env),
                None => Self::load_with(None, env),
            },
        }
    }

    fn load_with(file: Option<(&Path, bool)>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some((path, required)) = file {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embeddings.dimensions == 0 {
            return Err(ConfigError::Invalid(
                "embeddings.dimensions must be greater than 0".to_string(),
            ));
        }
        if self.embeddings.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "embeddings.max_batch_size must be greater than 0".to_string(),
            ));
        }
        if self.query.default_limit == 0 {
            return Err(ConfigError::Invalid(
                "query.default_limit must be greater than 0".to_string(),
            ));
        }
        if self.qdrant.collection_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "qdrant.collection_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML with API keys masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        for key in [&mut shown.qdrant.api_key, &mut shown.embeddings.api_key] {
            if let Some(value) = key.as_mut() {
                if !(value.starts_with("${") && value.ends_with('}')) {
                    *value = "***".to_string();
                }
            }
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

/// Environment overrides. Walker lists take comma-separated values, e.g.
/// `CODEVEC__WALKER__EXTENSIONS=java,kt`.
fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("walker.extensions")
        .with_list_parse_key("walker.ignored_dirs")
}

/// `~/.config/codevec/config.toml` (platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("codevec").join("config.toml"))
}

/// Resolve an optional config value, expanding `${ENV_VAR}` syntax.
///
/// Returns `None` when the value is unset or empty.
pub fn resolve_env_value(value: &Option<String>) -> Result<Option<String>, ConfigError> {
    match value {
        Some(v) if v.starts_with("${") && v.ends_with('}') => {
            let var = &v[2..v.len() - 1];
            std::env::var(var)
                .map(Some)
                .map_err(|_| ConfigError::MissingEnvVar {
                    var: var.to_string(),
                    value: v.clone(),
                })
        }
        Some(v) if !v.is_empty() => Ok(Some(v.clone())),
        _ => Ok(None),
    }
}
