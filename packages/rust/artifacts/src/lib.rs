//! File-backed artifact store for pipeline runs.
//!
//! Every stage output is a named artifact written under one base directory.
//! The directory is cleared at the start of each run and stays on disk after
//! the run so it can be inspected or served as a static site:
//!
//! ```text
//! <output_dir>/
//! ├── project_plan.txt
//! ├── data.json
//! ├── index.html
//! ├── list.html
//! ├── detail.html
//! ├── evaluation_report.txt
//! └── run_manifest.json
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use sitesmith_shared::{ArtifactKey, CURRENT_SCHEMA_VERSION, Result, SitesmithError};

/// Run metadata file name. Not an artifact; no stage reads it.
pub const MANIFEST_FILE_NAME: &str = "run_manifest.json";

// ---------------------------------------------------------------------------
// Manifest types
// ---------------------------------------------------------------------------

/// Checksum entry for one artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub key: ArtifactKey,
    pub file: String,
    pub size_bytes: usize,
    pub sha256: String,
}

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every stage produced its artifact.
    Completed,
    /// The run reached the end but at least one stage produced nothing.
    CompletedWithFailures,
    /// A stage's required input was missing and the run stopped.
    Halted,
}

/// Per-stage line in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
    pub stage: String,
    pub artifact: ArtifactKey,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The `run_manifest.json` written at the end of every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub run_id: String,
    pub case: String,
    pub title: String,
    pub tool_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    /// The data artifact is a placeholder, not fetched records.
    pub data_synthetic: bool,
    pub stages: Vec<StageEntry>,
    pub artifacts: Vec<ArtifactEntry>,
}

impl RunManifest {
    pub fn new(run_id: String, case: String, title: String, started_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            run_id,
            case,
            title,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            started_at,
            finished_at: started_at,
            status: RunStatus::Completed,
            data_synthetic: false,
            stages: Vec::new(),
            artifacts: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ArtifactStore
// ---------------------------------------------------------------------------

/// Reads and writes named artifacts under one base directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The base directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `key` lives on disk.
    pub fn path_of(&self, key: ArtifactKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Remove every artifact from a previous run and recreate the directory.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn reset(&self) -> Result<()> {
        if self.root.parent().is_none() {
            return Err(SitesmithError::config(format!(
                "refusing to clear output directory {:?}",
                self.root
            )));
        }

        if self.root.exists() {
            std::fs::remove_dir_all(&self.root).map_err(|e| SitesmithError::io(&self.root, e))?;
        }
        std::fs::create_dir_all(&self.root).map_err(|e| SitesmithError::io(&self.root, e))?;

        info!("artifact store reset");
        Ok(())
    }

    /// Persist `content` under `key`.
    ///
    /// Writes to a temp file, syncs it, then renames over the target so a
    /// reader never observes a half-written artifact.
    pub fn write(&self, key: ArtifactKey, content: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root).map_err(|e| SitesmithError::io(&self.root, e))?;

        let target = self.path_of(key);
        write_atomic(&self.root, key.file_name(), &target, content.as_bytes())?;

        debug!(artifact = %key, size = content.len(), "wrote artifact");
        Ok(target)
    }

    /// Read `key`; `Ok(None)` when the artifact was never written.
    pub fn read(&self, key: ArtifactKey) -> Result<Option<String>> {
        let path = self.path_of(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SitesmithError::io(path, e)),
        }
    }

    pub fn exists(&self, key: ArtifactKey) -> bool {
        self.path_of(key).is_file()
    }

    /// Checksums for every artifact currently on disk, in pipeline order.
    pub fn inventory(&self) -> Result<Vec<ArtifactEntry>> {
        let mut entries = Vec::new();
        for key in ArtifactKey::ALL {
            let path = self.path_of(key);
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(SitesmithError::io(path, e)),
            };

            entries.push(ArtifactEntry {
                key,
                file: key.file_name().to_string(),
                size_bytes: bytes.len(),
                sha256: sha256_hex(&bytes),
            });
        }
        Ok(entries)
    }

    /// Write `run_manifest.json`.
    pub fn write_manifest(&self, manifest: &RunManifest) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root).map_err(|e| SitesmithError::io(&self.root, e))?;

        let json = serde_json::to_string_pretty(manifest).map_err(|e| {
            SitesmithError::validation(format!("JSON serialization failed: {e}"))
        })?;
        let target = self.root.join(MANIFEST_FILE_NAME);
        write_atomic(&self.root, MANIFEST_FILE_NAME, &target, json.as_bytes())?;

        debug!(path = %target.display(), "wrote run manifest");
        Ok(target)
    }

    /// Load `run_manifest.json` from a previous run.
    pub fn read_manifest(&self) -> Result<RunManifest> {
        let path = self.root.join(MANIFEST_FILE_NAME);
        let content =
            std::fs::read_to_string(&path).map_err(|e| SitesmithError::io(&path, e))?;
        let manifest: RunManifest = serde_json::from_str(&content).map_err(|e| {
            SitesmithError::validation(format!("invalid {MANIFEST_FILE_NAME}: {e}"))
        })?;

        if manifest.schema_version != CURRENT_SCHEMA_VERSION {
            return Err(SitesmithError::validation(format!(
                "unsupported schema_version: {} (expected {})",
                manifest.schema_version, CURRENT_SCHEMA_VERSION
            )));
        }
        Ok(manifest)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_atomic(dir: &Path, file_name: &str, target: &Path, bytes: &[u8]) -> Result<()> {
    let temp = dir.join(format!(".{file_name}.tmp"));

    let mut file = std::fs::File::create(&temp).map_err(|e| SitesmithError::io(&temp, e))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| SitesmithError::io(&temp, e))?;
    drop(file);

    std::fs::rename(&temp, target).map_err(|e| SitesmithError::io(target, e))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> ArtifactStore {
        let dir = std::env::temp_dir().join(format!("sitesmith-{tag}-{}", uuid::Uuid::now_v7()));
        ArtifactStore::new(dir)
    }

    #[test]
    fn write_then_read() {
        let store = temp_store("rw");
        store.write(ArtifactKey::ProjectPlan, "1. do things").unwrap();

        assert!(store.exists(ArtifactKey::ProjectPlan));
        assert_eq!(
            store.read(ArtifactKey::ProjectPlan).unwrap().as_deref(),
            Some("1. do things")
        );
        assert!(store.root().join("project_plan.txt").is_file());
        // No temp file left behind
        assert!(!store.root().join(".project_plan.txt.tmp").exists());

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[test]
    fn read_missing_is_none() {
        let store = temp_store("missing");
        assert_eq!(store.read(ArtifactKey::Data).unwrap(), None);
        assert!(!store.exists(ArtifactKey::Data));
    }

    #[test]
    fn reset_clears_previous_run() {
        let store = temp_store("reset");
        store.write(ArtifactKey::IndexHtml, "<html></html>").unwrap();
        std::fs::write(store.root().join("stray.txt"), "left over").unwrap();

        store.reset().unwrap();

        assert!(store.root().is_dir());
        assert!(!store.exists(ArtifactKey::IndexHtml));
        assert!(!store.root().join("stray.txt").exists());

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[test]
    fn reset_refuses_filesystem_root() {
        let store = ArtifactStore::new("/");
        assert!(store.reset().unwrap_err().is_configuration());
    }

    #[test]
    fn inventory_lists_written_artifacts_in_order() {
        let store = temp_store("inventory");
        store.write(ArtifactKey::ListHtml, "<ul></ul>").unwrap();
        store.write(ArtifactKey::ProjectPlan, "hello world").unwrap();

        let entries = store.inventory().unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![ArtifactKey::ProjectPlan, ArtifactKey::ListHtml]);

        assert_eq!(entries[0].size_bytes, 11);
        assert_eq!(
            entries[0].sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[test]
    fn manifest_roundtrip() {
        let store = temp_store("manifest");
        store.write(ArtifactKey::Data, "[]").unwrap();

        let mut manifest = RunManifest::new(
            "run-1".into(),
            "arxiv_cs_daily".into(),
            "Arxiv CS DAILY".into(),
            Utc::now(),
        );
        manifest.status = RunStatus::CompletedWithFailures;
        manifest.data_synthetic = true;
        manifest.stages.push(StageEntry {
            stage: "html:list".into(),
            artifact: ArtifactKey::ListHtml,
            succeeded: false,
            reason: Some("service unavailable".into()),
        });
        manifest.artifacts = store.inventory().unwrap();
        store.write_manifest(&manifest).unwrap();

        let loaded = store.read_manifest().unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.status, RunStatus::CompletedWithFailures);
        assert!(loaded.data_synthetic);
        assert_eq!(loaded.stages.len(), 1);
        assert_eq!(loaded.artifacts.len(), 1);
        assert_eq!(loaded.artifacts[0].file, "data.json");

        let _ = std::fs::remove_dir_all(store.root());
    }
}
