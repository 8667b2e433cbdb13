use skillmatch_common::{AppConfig, Result, SkillMatchError};
use skillmatch_embed::EmbeddingProvider;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, warn};

use crate::index::{l2_normalize, VectorIndex};
use crate::persist::{self, ArtifactPaths};
use crate::records::DatasetFile;
use crate::types::{IndexManifest, Recommendation};

/// Where the index comes from and where it is kept
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Course dataset (CSV)
    pub dataset_path: PathBuf,

    /// Directory of the persisted artifacts
    pub index_dir: PathBuf,

    /// Logical artifact name
    pub index_name: String,

    /// Reject rows with an empty Title
    pub require_title: bool,
}

impl From<&AppConfig> for IndexOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            dataset_path: config.dataset_path.clone(),
            index_dir: config.index_dir.clone(),
            index_name: config.index_name.clone(),
            require_title: config.require_title,
        }
    }
}

impl IndexOptions {
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::new(&self.index_dir, &self.index_name)
    }
}

/// How [`ensure_index`] obtained the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    /// Read from persisted artifacts
    Loaded,
    /// Built from the dataset and persisted
    Built,
}

/// Load the persisted index, or build and persist it
///
/// Builds happen when the artifacts are missing or unusable, or when they
/// were made from a different dataset or embedding model. Callers racing on
/// the same artifact path are serialized, so only the first one builds.
pub async fn ensure_index(
    options: &IndexOptions,
    provider: &dyn EmbeddingProvider,
) -> Result<(VectorIndex, IndexSource)> {
    let lock = build_lock(&options.index_dir, &options.index_name)?;
    let _guard = lock.lock().await;

    let dataset = DatasetFile::read(&options.dataset_path);
    if let Err(e) = &dataset {
        warn!("Cannot fingerprint dataset, staleness check skipped: {}", e);
    }
    let fingerprint = dataset.as_ref().ok().map(DatasetFile::fingerprint);

    match persist::load(&options.index_dir, &options.index_name) {
        Ok(index) => {
            match stale_reason(index.manifest(), fingerprint, &provider.model_id()) {
                None => return Ok((index, IndexSource::Loaded)),
                Some(reason) => info!("Persisted index is stale ({}), rebuilding", reason),
            }
        }
        Err(e) if e.is_recoverable() => info!("No usable persisted index ({}), building", e),
        Err(e) => return Err(e),
    }

    let dataset = dataset?;
    let items = dataset.items(options.require_title)?;

    let index = VectorIndex::build(items, provider, dataset.fingerprint()).await?;
    persist::persist(&index, &options.index_dir, &options.index_name)?;

    Ok((index, IndexSource::Built))
}

fn stale_reason(manifest: &IndexManifest, fingerprint: Option<&str>, model_id: &str) -> Option<String> {
    if manifest.model_id != model_id {
        return Some(format!(
            "built with model '{}', current model is '{}'",
            manifest.model_id, model_id
        ));
    }
    match fingerprint {
        Some(current) if current != manifest.dataset_fingerprint => {
            Some("dataset changed since build".to_string())
        }
        _ => None,
    }
}

type LockRegistry = Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>;

/// Per-artifact-path build guard shared by every engine in the process
fn build_lock(dir: &Path, name: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
    static LOCKS: OnceLock<LockRegistry> = OnceLock::new();

    std::fs::create_dir_all(dir).map_err(|e| {
        SkillMatchError::persist(format!("Failed to create index directory {}: {}", dir.display(), e))
    })?;
    let key = dir.canonicalize()?.join(name);

    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Ok(locks.entry(key).or_default().clone())
}

/// Course recommendation engine
///
/// Holds a shared, immutable index. Searches need no locking, so one engine
/// (or many clones of its index handle) can serve concurrent queries.
pub struct RecommendationEngine {
    index: Arc<VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl RecommendationEngine {
    /// Create engine over an existing index
    pub fn new(index: Arc<VectorIndex>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, provider }
    }

    /// Load or build the index once, then create the engine
    pub async fn open(options: &IndexOptions, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let (index, source) = ensure_index(options, provider.as_ref()).await?;
        info!(
            "Recommendation engine initialized - {} courses ({:?})",
            index.len(),
            source
        );
        Ok(Self::new(Arc::new(index), provider))
    }

    /// Recommend up to `k` courses for free-text `query`, best first
    ///
    /// An empty (or token-less) query yields no recommendations.
    pub async fn recommend(&self, query: &str, k: usize) -> Result<Vec<Recommendation>> {
        if k == 0 {
            return Err(SkillMatchError::query("k must be a positive integer"));
        }
        debug!("Searching for: {} (top_k={})", query, k);

        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut query_vector = self.provider.embed(query).await?;
        if query_vector.len() != self.index.dimension() {
            return Err(SkillMatchError::query(format!(
                "Query embedding has dimension {}, index has {}",
                query_vector.len(),
                self.index.dimension()
            )));
        }
        if query_vector.iter().any(|x| !x.is_finite()) {
            return Err(SkillMatchError::embedding("Query embedding contains non-finite values"));
        }
        if !l2_normalize(&mut query_vector) {
            debug!("Query embedding has zero norm, nothing to rank");
            return Ok(Vec::new());
        }

        let results: Vec<Recommendation> = self
            .index
            .search(&query_vector, k)?
            .into_iter()
            .filter_map(|neighbor| {
                self.index.item(neighbor.id).map(|item| Recommendation {
                    item: item.clone(),
                    score: self.index.score(&neighbor),
                })
            })
            .collect();

        info!("Recommendation completed - {} results for '{}'", results.len(), query);
        Ok(results)
    }

    /// Shared index handle
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Number of indexed courses
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Get index statistics
    pub fn stats(&self) -> (usize, String) {
        (self.index.len(), self.index.manifest().model_id.clone())
    }
}
