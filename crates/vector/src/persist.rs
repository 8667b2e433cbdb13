//! Index artifacts on disk
//!
//! An index is stored as two files sharing one logical name:
//!
//! ```text
//! <name>.vectors     "SMVX" | u32 LE header length | JSON header
//!                    | count * dimension f32 LE
//!   header: { "version", "manifest": IndexManifest, "items_digest" }
//! <name>.items.csv   id,Title,Offered_by,Domain,Duration,Price
//! ```
//!
//! Both files are written to temporary names, synced, then renamed into
//! place: items first, vectors last. The vectors header carries the SHA-256
//! of the items file, so a pair left half-replaced by a crash fails to load
//! instead of being trusted.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use skillmatch_common::{Result, SkillMatchError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::index::VectorIndex;
use crate::types::{IndexManifest, Item, Price};

const MAGIC: &[u8; 4] = b"SMVX";
const FORMAT_VERSION: u32 = 2;

/// Locations of the two artifacts of one index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub vectors: PathBuf,
    pub items: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            vectors: dir.join(format!("{}.vectors", name)),
            items: dir.join(format!("{}.items.csv", name)),
        }
    }

    /// Both artifacts present
    pub fn exists(&self) -> bool {
        self.vectors.exists() && self.items.exists()
    }

    /// Delete both artifacts; missing files are not an error
    pub fn remove(&self) -> Result<()> {
        // vectors first so a concurrent reader never sees vectors without items
        for path in [&self.vectors, &self.items] {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(SkillMatchError::persist(format!(
                        "Failed to remove {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
        Ok(())
    }
}

/// Items artifact row
#[derive(Debug, Serialize, Deserialize)]
struct ItemRow {
    id: usize,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Offered_by")]
    offered_by: String,
    #[serde(rename = "Domain")]
    domain: String,
    #[serde(rename = "Duration")]
    duration: String,
    #[serde(rename = "Price")]
    price: Option<f64>,
}

impl From<&Item> for ItemRow {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            offered_by: item.offered_by.clone(),
            domain: item.domain.clone(),
            duration: item.duration.clone(),
            price: item.price.amount(),
        }
    }
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            offered_by: row.offered_by,
            domain: row.domain,
            duration: row.duration,
            price: Price::from(row.price),
        }
    }
}

/// Write both artifacts of `index` under `dir/name`
pub fn persist(index: &VectorIndex, dir: &Path, name: &str) -> Result<ArtifactPaths> {
    fs::create_dir_all(dir).map_err(|e| {
        SkillMatchError::persist(format!("Failed to create index directory {}: {}", dir.display(), e))
    })?;

    let paths = ArtifactPaths::new(dir, name);
    let items_bytes = encode_items(index.items())?;
    let items_digest = hex::encode(Sha256::digest(&items_bytes));
    let vectors_bytes = encode_vectors(index, &items_digest)?;

    let token = Uuid::new_v4().simple().to_string();
    let items_tmp = temp_path(&paths.items, &token);
    let vectors_tmp = temp_path(&paths.vectors, &token);

    if let Err(e) = write_pair(
        &paths,
        (items_tmp.as_path(), items_bytes.as_slice()),
        (vectors_tmp.as_path(), vectors_bytes.as_slice()),
        dir,
    ) {
        let _ = fs::remove_file(&items_tmp);
        let _ = fs::remove_file(&vectors_tmp);
        return Err(SkillMatchError::persist(format!(
            "Failed to write index '{}' to {}: {}",
            name,
            dir.display(),
            e
        )));
    }

    info!(
        "Index persisted - {} items ({} + {})",
        index.len(),
        paths.vectors.display(),
        paths.items.display()
    );
    Ok(paths)
}

/// Read both artifacts of `dir/name` back into an index
///
/// Every failure (missing file, bad header, digest or count mismatch) is a
/// [`SkillMatchError::Load`].
pub fn load(dir: &Path, name: &str) -> Result<VectorIndex> {
    let paths = ArtifactPaths::new(dir, name);
    let vectors_bytes = read_artifact(&paths.vectors)?;
    let items_bytes = read_artifact(&paths.items)?;

    let decoded = decode_vectors(&vectors_bytes)?;

    let digest = hex::encode(Sha256::digest(&items_bytes));
    if digest != decoded.items_digest {
        return Err(SkillMatchError::load(format!(
            "{} does not belong to {}",
            paths.items.display(),
            paths.vectors.display()
        )));
    }

    let items = decode_items(&items_bytes)?;
    if items.len() != decoded.manifest.count {
        return Err(SkillMatchError::load(format!(
            "Item count mismatch: vectors {}, items {}",
            decoded.manifest.count,
            items.len()
        )));
    }

    let index = VectorIndex::from_parts(decoded.manifest, decoded.vectors, items)?;
    info!("Index loaded - {} items from {}", index.len(), paths.vectors.display());
    Ok(index)
}

fn write_pair(
    paths: &ArtifactPaths,
    items: (&Path, &[u8]),
    vectors: (&Path, &[u8]),
    dir: &Path,
) -> std::io::Result<()> {
    write_synced(items.0, items.1)?;
    write_synced(vectors.0, vectors.1)?;
    fs::rename(items.0, &paths.items)?;
    fs::rename(vectors.0, &paths.vectors)?;
    sync_dir(dir)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

fn temp_path(path: &Path, token: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", file_name, token))
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        SkillMatchError::load(format!("Cannot read {}: {}", path.display(), e))
    })
}

fn encode_items(items: &[Item]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for item in items {
        writer
            .serialize(ItemRow::from(item))
            .map_err(|e| SkillMatchError::persist(format!("Failed to encode item {}: {}", item.id, e)))?;
    }
    writer
        .into_inner()
        .map_err(|e| SkillMatchError::persist(format!("Failed to encode items: {}", e)))
}

fn decode_items(bytes: &[u8]) -> Result<Vec<Item>> {
    csv::Reader::from_reader(bytes)
        .deserialize::<ItemRow>()
        .map(|row| {
            row.map(Item::from)
                .map_err(|e| SkillMatchError::load(format!("Corrupt items artifact: {}", e)))
        })
        .collect()
}

/// JSON header of the vectors artifact
#[derive(Debug, Serialize, Deserialize)]
struct VectorsHeader {
    version: u32,
    manifest: IndexManifest,
    items_digest: String,
}

fn encode_vectors(index: &VectorIndex, items_digest: &str) -> Result<Vec<u8>> {
    let header = serde_json::to_vec(&VectorsHeader {
        version: FORMAT_VERSION,
        manifest: index.manifest().clone(),
        items_digest: items_digest.to_string(),
    })?;
    let vectors = index.vectors();

    let mut buf = Vec::with_capacity(MAGIC.len() + 4 + header.len() + vectors.len() * 4);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&(header.len() as u32).to_le_bytes());
    buf.extend_from_slice(&header);
    for value in vectors.iter() {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    Ok(buf)
}

struct DecodedVectors {
    manifest: IndexManifest,
    vectors: Array2<f32>,
    items_digest: String,
}

fn decode_vectors(bytes: &[u8]) -> Result<DecodedVectors> {
    let truncated = || SkillMatchError::load("Vectors artifact is truncated");

    let rest = bytes
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| SkillMatchError::load("Not a SkillMatch vectors artifact"))?;
    if rest.len() < 4 {
        return Err(truncated());
    }
    let (len, rest) = rest.split_at(4);
    let header_len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
    if rest.len() < header_len {
        return Err(truncated());
    }
    let (header, payload) = rest.split_at(header_len);

    let header: VectorsHeader = serde_json::from_slice(header)
        .map_err(|e| SkillMatchError::load(format!("Corrupt vectors header: {}", e)))?;
    if header.version != FORMAT_VERSION {
        return Err(SkillMatchError::load(format!(
            "Unsupported vectors format version {}",
            header.version
        )));
    }

    let (count, dimension) = (header.manifest.count, header.manifest.dimension);
    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| SkillMatchError::load("Vector matrix size overflows"))?;
    if payload.len() != expected {
        return Err(SkillMatchError::load(format!(
            "Vector payload is {} bytes, expected {}",
            payload.len(),
            expected
        )));
    }

    let data: Vec<f32> = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let vectors = Array2::from_shape_vec((count, dimension), data)
        .map_err(|e| SkillMatchError::load(format!("Bad vector matrix shape: {}", e)))?;

    Ok(DecodedVectors {
        manifest: header.manifest,
        vectors,
        items_digest: header.items_digest,
    })
}
