/// SkillMatch error types
#[derive(Debug, thiserror::Error)]
pub enum SkillMatchError {
    /// Source dataset cannot be used
    #[error("Data error: {0}")]
    Data(String),

    /// Persisted index is missing, corrupt or inconsistent
    #[error("Index load error: {0}")]
    Load(String),

    /// Index build failed
    #[error("Index build error: {0}")]
    Build(String),

    /// Embedding provider failure
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Malformed query
    #[error("Query error: {0}")]
    Query(String),

    /// Writing the index artifacts failed
    #[error("Persist error: {0}")]
    Persist(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General error (anyhow integration)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SkillMatchError {
    /// Create data error
    pub fn data<S: Into<String>>(msg: S) -> Self {
        Self::Data(msg.into())
    }

    /// Create load error
    pub fn load<S: Into<String>>(msg: S) -> Self {
        Self::Load(msg.into())
    }

    /// Create build error
    pub fn build<S: Into<String>>(msg: S) -> Self {
        Self::Build(msg.into())
    }

    /// Create embedding error
    pub fn embedding<S: Into<String>>(msg: S) -> Self {
        Self::Embedding(msg.into())
    }

    /// Create query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        Self::Query(msg.into())
    }

    /// Create persist error
    pub fn persist<S: Into<String>>(msg: S) -> Self {
        Self::Persist(msg.into())
    }

    /// Create config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the engine can recover locally by rebuilding the index
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Load(_))
    }
}
