//! # Backup — Resumable Kernel State Persistence
//!
//! Saves and loads a running `pi(x)` computation's progress as a JSON file
//! with SHA-256 integrity verification and generational backups. Unlike the
//! teacher's per-search-form `Checkpoint` enum (one variant per of a dozen
//! distinct search shapes), every kernel in this crate shares the same
//! resumable shape — a segmented scan accumulating a partial sum — so one
//! `KernelState` struct covers all of them.
//!
//! ## Atomic Writes
//!
//! Backup files are written atomically: write to a temp file, then rename.
//! This prevents corruption from mid-write crashes or power loss.
//!
//! ## Integrity
//!
//! A SHA-256 hash is stored alongside the JSON data. On load, the hash is
//! verified — corrupted backups are detected and skipped, falling back to
//! the most recent valid generation (up to 3 generations kept).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Number of backup generations to keep.
const GENERATIONS: usize = 3;

/// The uniform resumable state for any kernel in this crate: a segmented
/// scan of `[low, z)` accumulating `partial_sum`, keyed by the header
/// `(x, y, z, k)` so a resume can confirm it matches the computation being
/// restarted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct KernelState {
    pub x: String,
    pub y: u64,
    #[serde(default)]
    pub z: u64,
    #[serde(default)]
    pub k: u64,
    pub low: u64,
    pub thread_dist: u64,
    pub partial_sum: String,
    pub percent: f64,
    pub elapsed_secs: f64,
}

impl KernelState {
    /// Whether this state's header matches a fresh computation's `(x, y[,
    /// z, k])`, i.e. whether it is safe to resume from.
    pub fn matches_header(&self, x: u128, y: u64, z: u64, k: u64) -> bool {
        self.x == x.to_string() && self.y == y && self.z == z && self.k == k
    }

    pub fn partial_sum_i128(&self) -> i128 {
        self.partial_sum.parse().unwrap_or(0)
    }
}

/// Wrapper that includes a SHA-256 checksum for integrity verification.
#[derive(Serialize, Deserialize)]
struct BackupEnvelope {
    checksum: String,
    data: serde_json::Value,
}

fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Return the path for generation `gen` (0 = current, 1 = .1, 2 = .2, ...).
fn generation_path(base: &Path, gen: usize) -> PathBuf {
    if gen == 0 {
        base.to_path_buf()
    } else {
        let mut p = base.as_os_str().to_os_string();
        p.push(format!(".{gen}"));
        PathBuf::from(p)
    }
}

/// Save a backup with integrity checksum and rotating generations.
///
/// Rotation: current -> .1 -> .2 (oldest .2 is discarded). The new backup is
/// written atomically via a `.tmp` file.
pub fn save(path: &Path, state: &KernelState) -> Result<()> {
    for gen in (1..GENERATIONS).rev() {
        let src = generation_path(path, gen - 1);
        let dst = generation_path(path, gen);
        if src.exists() {
            let _ = fs::rename(&src, &dst);
        }
    }

    let data = serde_json::to_value(state)?;
    let data_str = serde_json::to_string_pretty(&data)?;
    let checksum = sha256_hex(&data_str);

    let envelope = BackupEnvelope { checksum, data };
    let json = serde_json::to_string_pretty(&envelope)?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &json)?;
    fs::rename(&tmp, path)?;

    tracing::debug!(path = %path.display(), low = state.low, percent = state.percent, "checkpoint saved");
    Ok(())
}

/// Load the newest valid backup, falling back to older generations on
/// corruption.
pub fn load(path: &Path) -> Option<KernelState> {
    for gen in 0..GENERATIONS {
        let p = generation_path(path, gen);
        if let Some(state) = load_single(&p) {
            if gen > 0 {
                tracing::warn!(generation = gen, path = %p.display(), "recovered backup from older generation");
            }
            return Some(state);
        }
    }
    None
}

/// Try to load and verify a single backup file.
fn load_single(path: &Path) -> Option<KernelState> {
    let raw = fs::read_to_string(path).ok()?;
    let envelope: BackupEnvelope = serde_json::from_str(&raw).ok()?;

    let data_str = serde_json::to_string_pretty(&envelope.data).ok()?;
    let expected = sha256_hex(&data_str);
    if expected != envelope.checksum {
        tracing::warn!(
            path = %path.display(),
            expected = &expected[..12.min(expected.len())],
            got = &envelope.checksum[..12.min(envelope.checksum.len())],
            "backup integrity check failed"
        );
        return None;
    }

    serde_json::from_value(envelope.data).ok()
}

/// Clear all backup files (current + all generations).
pub fn clear(path: &Path) {
    for gen in 0..GENERATIONS {
        let _ = fs::remove_file(generation_path(path, gen));
    }
    let _ = fs::remove_file(path.with_extension("tmp"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state(low: u64) -> KernelState {
        KernelState {
            x: "1000000000000".to_string(),
            y: 12345,
            z: 81000,
            k: 7,
            low,
            thread_dist: 1 << 23,
            partial_sum: "42".to_string(),
            percent: 12.5,
            elapsed_secs: 30.0,
        }
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");

        let state = sample_state(1000);
        save(&path, &state).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn rotation_keeps_generations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");

        for n in 1..=3u64 {
            save(&path, &sample_state(n * 1000)).unwrap();
        }

        assert!(path.exists());
        assert!(generation_path(&path, 1).exists());
        assert!(generation_path(&path, 2).exists());

        assert_eq!(load_single(&path).unwrap().low, 3000);
        assert_eq!(load_single(&generation_path(&path, 1)).unwrap().low, 2000);
        assert_eq!(load_single(&generation_path(&path, 2)).unwrap().low, 1000);
    }

    #[test]
    fn corrupted_current_falls_back_to_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");

        save(&path, &sample_state(10)).unwrap();
        save(&path, &sample_state(20)).unwrap();

        // corrupt the current generation
        fs::write(&path, "not valid json").unwrap();

        let recovered = load(&path).unwrap();
        assert_eq!(recovered.low, 10);
    }

    #[test]
    fn clear_removes_every_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        for n in 1..=3u64 {
            save(&path, &sample_state(n)).unwrap();
        }
        clear(&path);
        assert!(!path.exists());
        assert!(!generation_path(&path, 1).exists());
        assert!(!generation_path(&path, 2).exists());
    }

    #[test]
    fn matches_header_checks_every_field() {
        let state = sample_state(10);
        assert!(state.matches_header(1_000_000_000_000u128, 12345, 81000, 7));
        assert!(!state.matches_header(999, 12345, 81000, 7));
        assert!(!state.matches_header(1_000_000_000_000u128, 1, 81000, 7));
    }
}
