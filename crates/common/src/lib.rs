pub mod config;
pub mod error;
pub mod logger;

// Re-export commonly used types
pub use config::{AppConfig, EmbeddingBackend};
pub use error::SkillMatchError;
pub type Result<T> = std::result::Result<T, SkillMatchError>;
