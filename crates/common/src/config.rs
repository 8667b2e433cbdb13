use crate::error::SkillMatchError;
use crate::logger::parse_log_level;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix (`SKILLMATCH_DATASET_PATH`, ...)
pub const ENV_PREFIX: &str = "SKILLMATCH";

/// Which embedding backend produces vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama HTTP server
    Ollama,
    /// Offline feature-hashing embedder
    Hashing,
}

impl FromStr for EmbeddingBackend {
    type Err = SkillMatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hashing" => Ok(Self::Hashing),
            other => Err(SkillMatchError::config(format!(
                "Unknown embedding backend '{}' (expected 'ollama' or 'hashing')",
                other
            ))),
        }
    }
}

/// SkillMatch application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Course dataset (CSV)
    pub dataset_path: PathBuf,

    /// Directory holding the persisted index artifacts
    pub index_dir: PathBuf,

    /// Logical name shared by both index artifacts
    pub index_name: String,

    /// Embedding backend
    pub embedding_backend: EmbeddingBackend,

    /// Ollama API base URL
    pub ollama_base_url: String,

    /// Embedding model name (Ollama backend)
    pub embedding_model: String,

    /// Vector dimension (hashing backend)
    pub hashing_dimension: usize,

    /// Result count used when the caller gives none
    pub default_top_k: usize,

    /// Reject rows with an empty Title
    pub require_title: bool,

    /// Log directory
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("./data/courses.csv"),
            index_dir: PathBuf::from("./db"),
            index_name: "course_index".to_string(),
            embedding_backend: EmbeddingBackend::Hashing,
            ollama_base_url: "http://localhost:11434".to_string(),
            embedding_model: "all-minilm".to_string(),
            hashing_dimension: 384,
            default_top_k: 10,
            require_title: false,
            log_dir: PathBuf::from("./db/log"),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load and validate configuration
    pub fn load(file: Option<&Path>) -> Result<Self, SkillMatchError> {
        let config = Self::load_layers(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge defaults, then an optional config file, then `SKILLMATCH_*`
    /// environment variables
    ///
    /// Not validated; callers applying further overrides validate afterwards.
    pub fn load_layers(file: Option<&Path>) -> Result<Self, SkillMatchError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = file {
            if !path.exists() {
                return Err(SkillMatchError::config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SkillMatchError::config(format!("Failed to load configuration: {}", e)))
    }

    /// Ensure required directories exist, create if not
    pub fn ensure_directories(&self) -> Result<(), SkillMatchError> {
        for dir in [&self.index_dir, &self.log_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    SkillMatchError::config(format!(
                        "Failed to create directory {}: {}",
                        dir.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), SkillMatchError> {
        if self.index_name.trim().is_empty() {
            return Err(SkillMatchError::config("Index name cannot be empty"));
        }
        if self.index_name.contains(['/', '\\']) {
            return Err(SkillMatchError::config(
                "Index name must not contain path separators",
            ));
        }

        if self.embedding_backend == EmbeddingBackend::Ollama {
            if !self.ollama_base_url.starts_with("http://")
                && !self.ollama_base_url.starts_with("https://") {
                return Err(SkillMatchError::config(
                    "Ollama base URL must start with http:// or https://"
                ));
            }
            if self.embedding_model.trim().is_empty() {
                return Err(SkillMatchError::config("Embedding model name cannot be empty"));
            }
        }

        if self.hashing_dimension == 0 {
            return Err(SkillMatchError::config("Hashing dimension cannot be 0"));
        }

        if self.default_top_k == 0 {
            return Err(SkillMatchError::config("Default top_k cannot be 0"));
        }

        if parse_log_level(&self.log_level).is_none() {
            return Err(SkillMatchError::config(format!(
                "Invalid log level '{}'",
                self.log_level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.default_top_k, 10);
        assert_eq!(config.index_name, "course_index");
        assert_eq!(config.embedding_backend, EmbeddingBackend::Hashing);
    }

    #[test]
    fn test_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = AppConfig::default();
        invalid_config.index_name = String::new();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = AppConfig::default();
        invalid_config.index_name = "nested/name".to_string();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = AppConfig::default();
        invalid_config.default_top_k = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = AppConfig::default();
        invalid_config.log_level = "loud".to_string();
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_ollama_url_checked_only_for_ollama_backend() {
        let mut config = AppConfig::default();
        config.ollama_base_url = "localhost:11434".to_string();
        assert!(config.validate().is_ok());

        config.embedding_backend = EmbeddingBackend::Ollama;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Ollama".parse::<EmbeddingBackend>().unwrap(), EmbeddingBackend::Ollama);
        assert_eq!(" hashing ".parse::<EmbeddingBackend>().unwrap(), EmbeddingBackend::Hashing);
        assert!("faiss".parse::<EmbeddingBackend>().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "index_name = \"catalog\"").unwrap();
        writeln!(file, "default_top_k = 5").unwrap();
        writeln!(file, "require_title = true").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.index_name, "catalog");
        assert_eq!(config.default_top_k, 5);
        assert!(config.require_title);
        // untouched fields keep their defaults
        assert_eq!(config.hashing_dimension, 384);
    }

    #[test]
    fn test_override_rescues_invalid_layer() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "embedding_backend = \"ollama\"").unwrap();
        writeln!(file, "ollama_base_url = \"localhost:11434\"").unwrap();

        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, SkillMatchError::Config(_)));

        let mut config = AppConfig::load_layers(Some(file.path())).unwrap();
        assert_eq!(config.embedding_backend, EmbeddingBackend::Ollama);
        config.embedding_backend = EmbeddingBackend::Hashing;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/skillmatch.toml"))).unwrap_err();
        assert!(matches!(err, SkillMatchError::Config(_)));
    }
}
