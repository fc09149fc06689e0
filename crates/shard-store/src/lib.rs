//! On-disk, content-addressed storage for the chunks a single shard node
//! holds. A chunk is keyed by the raw digest bytes the hub sent alongside
//! it (never assumed to be exactly 32 bytes, per the wire protocol's own
//! "MUST NOT assume any other value" wording) plus its chunk index within
//! the original file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("digest must not be empty")]
    EmptyDigest,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Content-addressed chunk storage rooted at a single base directory.
///
/// Chunks are laid out as `<base>/<hex[0..2]>/<hex[2..4]>/<full-hex>/<index:08x>`,
/// splitting on the first two bytes of the digest so that no single
/// directory ends up with one entry per distinct digest ever stored.
pub struct ShardStore {
    base: PathBuf,
    cached_size: Mutex<u64>,
}

fn chunk_path(base: &Path, digest_hex: &str, chunk_index: u32) -> PathBuf {
    let (d0, rest) = digest_hex.split_at(2.min(digest_hex.len()));
    let (d1, _) = rest.split_at(2.min(rest.len()));
    base.join(d0)
        .join(d1)
        .join(digest_hex)
        .join(format!("{chunk_index:08x}"))
}

fn walk_size(dir: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;
    if !dir.exists() {
        return Ok(0);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            total += walk_size(&entry.path())?;
        } else {
            total += metadata.len();
        }
    }
    Ok(total)
}

impl ShardStore {
    /// Opens (creating if necessary) a store rooted at `base`, walking the
    /// existing tree once to seed the cached byte count.
    pub fn open(base: impl Into<PathBuf>) -> StoreResult<Self> {
        let base = base.into();
        std::fs::create_dir_all(&base)?;
        let seeded = walk_size(&base)?;
        tracing::info!(path = %base.display(), bytes = seeded, "shard store opened");
        Ok(Self {
            base,
            cached_size: Mutex::new(seeded),
        })
    }

    fn digest_hex(digest: &[u8]) -> StoreResult<String> {
        if digest.is_empty() {
            return Err(StoreError::EmptyDigest);
        }
        Ok(hex::encode(digest))
    }

    /// Persists `data` under `digest`/`chunk_index`, overwriting any
    /// previous contents at that key. Zero-length `data` is accepted and
    /// written as a zero-byte file.
    pub fn save(&self, digest: &[u8], chunk_index: u32, data: &[u8]) -> StoreResult<()> {
        let hex = Self::digest_hex(digest)?;
        let path = chunk_path(&self.base, &hex, chunk_index);
        let previous_len = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data)?;

        let mut cached = self.cached_size.lock().unwrap();
        *cached = cached.saturating_sub(previous_len) + data.len() as u64;
        Ok(())
    }

    /// Reads back the chunk stored under `digest`/`chunk_index`, if any.
    pub fn load(&self, digest: &[u8], chunk_index: u32) -> StoreResult<Option<Vec<u8>>> {
        let hex = Self::digest_hex(digest)?;
        let path = chunk_path(&self.base, &hex, chunk_index);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes every chunk stored under `digest`, pruning now-empty
    /// ancestor directories. Returns whether anything was actually removed.
    pub fn destroy(&self, digest: &[u8]) -> StoreResult<bool> {
        let hex = Self::digest_hex(digest)?;
        let (d0, rest) = hex.split_at(2.min(hex.len()));
        let (d1, _) = rest.split_at(2.min(rest.len()));
        let digest_dir = self.base.join(d0).join(d1).join(&hex);

        let removed_bytes = walk_size(&digest_dir)?;
        if removed_bytes == 0 && !digest_dir.exists() {
            return Ok(false);
        }

        std::fs::remove_dir_all(&digest_dir)?;
        *self.cached_size.lock().unwrap() -= removed_bytes;

        for ancestor in [digest_dir.parent(), digest_dir.parent().and_then(Path::parent)]
            .into_iter()
            .flatten()
        {
            if ancestor == self.base {
                break;
            }
            let is_empty = std::fs::read_dir(ancestor)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if is_empty {
                let _ = std::fs::remove_dir(ancestor);
            }
        }
        Ok(true)
    }

    /// Total bytes of chunk data currently on disk, maintained incrementally
    /// rather than recomputed by walking the tree on every call.
    pub fn size(&self) -> u64 {
        *self.cached_size.lock().unwrap()
    }
}
