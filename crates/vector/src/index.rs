use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView1};
use skillmatch_common::{Result, SkillMatchError};
use skillmatch_embed::EmbeddingProvider;
use tracing::{debug, info, warn};

use crate::types::{IndexManifest, Item, Neighbor};

/// Exact nearest-neighbor index over L2-normalized item vectors
///
/// Row `i` of the vector matrix belongs to the item with id `i`. The index
/// is immutable once built or loaded, so a shared reference can serve any
/// number of concurrent searches.
///
/// Rows whose embedding had zero norm stay zero. They have no direction, so
/// they rank after every other row regardless of distance.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    manifest: IndexManifest,
    vectors: Array2<f32>,
    items: Vec<Item>,
    zero_rows: Vec<bool>,
}

impl VectorIndex {
    /// Embed every item's descriptor in one batch and normalize the results
    pub async fn build(
        items: Vec<Item>,
        provider: &dyn EmbeddingProvider,
        dataset_fingerprint: impl Into<String>,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(SkillMatchError::build("No items to index"));
        }
        if let Some(item) = items.iter().enumerate().find(|(pos, item)| item.id != *pos) {
            return Err(SkillMatchError::build(format!(
                "Item ids must match row positions (found id {} at position {})",
                item.1.id, item.0
            )));
        }

        let model_id = provider.model_id();
        info!("Building vector index - {} items, model: {}", items.len(), model_id);

        let descriptors: Vec<String> = items.iter().map(Item::descriptor).collect();
        let embeddings = provider
            .embed_batch(&descriptors)
            .await
            .map_err(|e| SkillMatchError::build(format!("Embedding provider failed: {}", e)))?;

        if embeddings.len() != items.len() {
            return Err(SkillMatchError::build(format!(
                "Embedding provider returned {} vectors for {} items",
                embeddings.len(),
                items.len()
            )));
        }

        let dimension = embeddings[0].len();
        if dimension == 0 {
            return Err(SkillMatchError::build("Embedding provider returned empty vectors"));
        }

        let mut data = Vec::with_capacity(items.len() * dimension);
        let mut zero_rows = Vec::with_capacity(items.len());
        for (id, mut embedding) in embeddings.into_iter().enumerate() {
            if embedding.len() != dimension {
                return Err(SkillMatchError::build(format!(
                    "Dimension mismatch for item {}: expected {}, got {}",
                    id,
                    dimension,
                    embedding.len()
                )));
            }
            if embedding.iter().any(|x| !x.is_finite()) {
                return Err(SkillMatchError::build(format!(
                    "Embedding for item {} contains non-finite values",
                    id
                )));
            }
            zero_rows.push(!l2_normalize(&mut embedding));
            data.extend_from_slice(&embedding);
        }
        let zero_vectors = zero_rows.iter().filter(|&&zero| zero).count();
        if zero_vectors > 0 {
            warn!("{} items have zero-norm embeddings and will rank last", zero_vectors);
        }

        let vectors = Array2::from_shape_vec((items.len(), dimension), data)
            .map_err(|e| SkillMatchError::build(format!("Failed to shape vector matrix: {}", e)))?;

        let manifest = IndexManifest {
            dimension,
            count: items.len(),
            model_id,
            dataset_fingerprint: dataset_fingerprint.into(),
            built_at: now_millis(),
        };

        info!("Vector index built - {} vectors of dimension {}", manifest.count, dimension);
        Ok(Self {
            manifest,
            vectors,
            items,
            zero_rows,
        })
    }

    /// Reassemble a persisted index, checking its invariants
    pub(crate) fn from_parts(
        manifest: IndexManifest,
        vectors: Array2<f32>,
        items: Vec<Item>,
    ) -> Result<Self> {
        let (rows, cols) = vectors.dim();
        if rows != manifest.count || items.len() != manifest.count {
            return Err(SkillMatchError::load(format!(
                "Item count mismatch: manifest {}, vectors {}, items {}",
                manifest.count,
                rows,
                items.len()
            )));
        }
        if cols != manifest.dimension {
            return Err(SkillMatchError::load(format!(
                "Dimension mismatch: manifest {}, vectors {}",
                manifest.dimension, cols
            )));
        }
        if let Some((pos, item)) = items.iter().enumerate().find(|(pos, item)| item.id != *pos) {
            return Err(SkillMatchError::load(format!(
                "Item ids are not sequential (id {} at position {})",
                item.id, pos
            )));
        }

        let zero_rows = vectors
            .outer_iter()
            .map(|row| row.iter().all(|&x| x == 0.0))
            .collect();

        Ok(Self {
            manifest,
            vectors,
            items,
            zero_rows,
        })
    }

    /// Exact top-k search by squared Euclidean distance
    ///
    /// `query` must already be L2-normalized. Zero rows come after all other
    /// rows, and equal distances rank the lower item id first. `k` is clamped
    /// to the index size; `k == 0` returns nothing.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension() {
            return Err(SkillMatchError::query(format!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension()
            )));
        }

        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = ArrayView1::from(query);
        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .outer_iter()
            .enumerate()
            .map(|(id, row)| Neighbor {
                id,
                distance: squared_distance(row, query),
            })
            .collect();

        let rank_order = |a: &Neighbor, b: &Neighbor| {
            self.zero_rows[a.id]
                .cmp(&self.zero_rows[b.id])
                .then(a.distance.total_cmp(&b.distance))
                .then(a.id.cmp(&b.id))
        };
        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, rank_order);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(rank_order);

        debug!("Search completed - {} of {} candidates", neighbors.len(), self.len());
        Ok(neighbors)
    }

    /// Number of indexed items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the index holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Embedding dimension
    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }

    /// Build metadata
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// Items in id order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Item by id
    pub fn item(&self, id: usize) -> Option<&Item> {
        self.items.get(id)
    }

    /// Whether the item's embedding had zero norm
    pub fn is_zero_row(&self, id: usize) -> bool {
        self.zero_rows.get(id).copied().unwrap_or(false)
    }

    /// Similarity of a search hit, in [-1, 1]
    ///
    /// A zero row has no direction, so it scores the minimum.
    pub fn score(&self, neighbor: &Neighbor) -> f32 {
        if self.is_zero_row(neighbor.id) {
            -1.0
        } else {
            similarity_from_distance(neighbor.distance)
        }
    }

    /// Stored (normalized) vector by id
    pub fn vector(&self, id: usize) -> Option<ArrayView1<'_, f32>> {
        (id < self.len()).then(|| self.vectors.row(id))
    }

    pub(crate) fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }
}

/// Scale `vector` to unit length in place
///
/// Returns `false` and leaves the vector untouched when its norm is zero.
pub fn l2_normalize(vector: &mut [f32]) -> bool {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for x in vector.iter_mut() {
        *x /= norm;
    }
    true
}

/// Cosine similarity of two unit vectors from their squared distance
///
/// `d² = 2 − 2·cos θ`, so `cos θ = 1 − d²/2`. The clamp only absorbs float
/// rounding at the ends of the range.
pub fn similarity_from_distance(squared_distance: f32) -> f32 {
    (1.0 - squared_distance / 2.0).clamp(-1.0, 1.0)
}

fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
