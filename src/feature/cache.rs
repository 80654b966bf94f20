//! Binary caches of parsed features and derived indices
//!
//! Layout of a cache file:
//!
//! ```text
//! magic "TAPESTRY" | version u32 | fingerprint u64 | payload length u64 | crc32 u32 | payload
//! ```
//!
//! The payload is bincode. A cache whose version, fingerprint or checksum
//! does not match is stale and gets rebuilt by the caller.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crc32fast::Hasher;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, TapestryError};

const MAGIC: &[u8; 8] = b"TAPESTRY";
const HEADER_LEN: usize = 8 + 4 + 8 + 8 + 4;

/// Bump whenever a cached structure changes shape
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Subdirectory holding the caches, next to the feature files
pub const CACHE_DIR: &str = ".tf";

/// Extension of cache files
pub const CACHE_EXT: &str = "tfx";

pub fn cache_path(source_dir: &Path, name: &str) -> PathBuf {
    source_dir
        .join(CACHE_DIR)
        .join(format!("{}.{}", name, CACHE_EXT))
}

/// Fingerprint of a source file: its size and modification time
pub fn source_fingerprint(path: &Path) -> Result<u64> {
    let meta = fs::metadata(path)?;
    let mtime = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let mut hasher = Hasher::new();
    hasher.update(&meta.len().to_le_bytes());
    hasher.update(&mtime.to_le_bytes());
    let low = hasher.finalize() as u64;
    Ok((meta.len() << 32) ^ low)
}

/// Fingerprint derived from several others, order sensitive
pub fn combine_fingerprints(parts: &[u64]) -> u64 {
    let mut hasher = Hasher::new();
    let mut high = 0u64;
    for part in parts {
        hasher.update(&part.to_le_bytes());
        high = high.rotate_left(7) ^ part;
    }
    (high << 32) ^ hasher.finalize() as u64
}

fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Write a value to a cache file atomically
pub fn write_cache<T: Serialize>(path: &Path, fingerprint: u64, value: &T) -> Result<()> {
    let payload = bincode::serialize(value)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&CACHE_FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&fingerprint.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&checksum(&payload).to_le_bytes());
    bytes.extend_from_slice(&payload);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension(format!("{}.tmp", CACHE_EXT));
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a cache file; `Ok(None)` when it is missing or stale
pub fn read_cache<T: DeserializeOwned>(path: &Path, fingerprint: u64) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    match decode(&bytes, fingerprint) {
        Ok(value) => Ok(Some(value)),
        Err(reason) => {
            debug!(path = %path.display(), %reason, "stale cache");
            Ok(None)
        }
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8], fingerprint: u64) -> Result<T> {
    let stale = |why: &str| TapestryError::Cache(why.to_string());
    if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
        return Err(stale("not a cache file"));
    }
    let version = u32::from_le_bytes(array(&bytes[8..12])?);
    if version != CACHE_FORMAT_VERSION {
        return Err(stale("format version mismatch"));
    }
    if u64::from_le_bytes(array(&bytes[12..20])?) != fingerprint {
        return Err(stale("source changed"));
    }
    let len = u64::from_le_bytes(array(&bytes[20..28])?) as usize;
    let sum = u32::from_le_bytes(array(&bytes[28..32])?);
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != len || checksum(payload) != sum {
        return Err(stale("checksum mismatch"));
    }
    Ok(bincode::deserialize(payload)?)
}

fn array<const N: usize>(slice: &[u8]) -> Result<[u8; N]> {
    slice
        .try_into()
        .map_err(|_| TapestryError::Cache("truncated header".to_string()))
}

/// Remove all caches under a directory; returns the number of files removed
pub fn clear_cache(source_dir: &Path) -> Result<usize> {
    let dir = source_dir.join(CACHE_DIR);
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(CACHE_EXT) {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_hit_and_miss() {
        let dir = TempDir::new().unwrap();
        let path = cache_path(dir.path(), "levels");
        write_cache(&path, 42, &vec![1u32, 2, 3]).unwrap();

        let hit: Option<Vec<u32>> = read_cache(&path, 42).unwrap();
        assert_eq!(hit, Some(vec![1, 2, 3]));
        let miss: Option<Vec<u32>> = read_cache(&path, 43).unwrap();
        assert_eq!(miss, None);
        let absent: Option<Vec<u32>> = read_cache(&cache_path(dir.path(), "x"), 42).unwrap();
        assert_eq!(absent, None);
    }

    #[test]
    fn test_corrupt_cache_is_stale() {
        let dir = TempDir::new().unwrap();
        let path = cache_path(dir.path(), "order");
        write_cache(&path, 7, &vec![9u32; 16]).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();
        let read: Option<Vec<u32>> = read_cache(&path, 7).unwrap();
        assert_eq!(read, None);
    }

    #[test]
    fn test_clear_cache() {
        let dir = TempDir::new().unwrap();
        write_cache(&cache_path(dir.path(), "a"), 1, &1u8).unwrap();
        write_cache(&cache_path(dir.path(), "b"), 1, &2u8).unwrap();
        assert_eq!(clear_cache(dir.path()).unwrap(), 2);
        assert_eq!(clear_cache(dir.path()).unwrap(), 0);
    }

    #[test]
    fn test_fingerprints_follow_content() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("otype.tf");
        fs::write(&file, "@node\n\nword\n").unwrap();
        let first = source_fingerprint(&file).unwrap();
        fs::write(&file, "@node\n\nword\nword\n").unwrap();
        assert_ne!(first, source_fingerprint(&file).unwrap());
        assert_ne!(combine_fingerprints(&[1, 2]), combine_fingerprints(&[2, 1]));
    }
}
