//! File-backed case store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<case_id>/case.json                  mutable head
//! <root>/<case_id>/artifacts/0001-interview.json   write-once payloads
//! ```
//!
//! Artifact files are written atomically (temp file then rename) and never
//! rewritten. The case head is the only file that changes in place, and it
//! too goes through the atomic path so a crash never leaves a torn head.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use kinsight_model::{ArtifactId, ArtifactKind, CaseId, KinsightError};

use crate::case::{ArtifactRecord, Case};

pub struct CaseStore {
    root: Utf8PathBuf,
}

impl CaseStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, KinsightError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn case_dir(&self, case_id: &CaseId) -> Utf8PathBuf {
        // CaseId is a validated slug, so joining cannot escape the root.
        self.root.join(case_id.as_str())
    }

    fn head_path(&self, case_id: &CaseId) -> Utf8PathBuf {
        self.case_dir(case_id).join("case.json")
    }

    pub fn case_exists(&self, case_id: &CaseId) -> bool {
        self.head_path(case_id).is_file()
    }

    /// Create a new case. Fails if the case already exists.
    pub fn create_case(
        &self,
        case_id: CaseId,
        child_ref: &str,
    ) -> Result<Case, KinsightError> {
        if self.case_exists(&case_id) {
            return Err(KinsightError::Store(format!(
                "case {case_id} already exists"
            )));
        }
        let dir = self.case_dir(&case_id);
        std::fs::create_dir_all(dir.join("artifacts"))?;
        let case = Case::new(case_id, child_ref);
        self.save_head(&case)?;
        info!(case_id = %case.case_id, "created case");
        Ok(case)
    }

    pub fn load_case(&self, case_id: &CaseId) -> Result<Case, KinsightError> {
        let path = self.head_path(case_id);
        let bytes = std::fs::read(&path).map_err(|e| {
            KinsightError::Store(format!("cannot read case {case_id}: {e}"))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist the mutable head. Artifact files are untouched.
    pub fn save_head(&self, case: &Case) -> Result<(), KinsightError> {
        let path = self.head_path(&case.case_id);
        let json = to_canonical_json(case)?;
        atomic_write(&path, json.as_bytes())?;
        Ok(())
    }

    /// Append a new immutable artifact and record it in the head.
    ///
    /// If the most recent artifact of the same kind has an identical payload
    /// hash the call is a no-op and the existing record is returned, so a
    /// retried submission never duplicates evidence.
    pub fn append_artifact<T: Serialize>(
        &self,
        case: &mut Case,
        kind: ArtifactKind,
        payload: &T,
        label: Option<String>,
    ) -> Result<ArtifactRecord, KinsightError> {
        let json = to_canonical_json(payload)?;
        let hash = blake3::hash(json.as_bytes());
        let first8 = hash.to_hex().as_str()[..8].to_string();

        if let Some(prev) = case.latest(kind)
            && prev.blake3_first8 == first8
        {
            debug!(case_id = %case.case_id, kind = kind.as_str(),
                   "identical payload already stored, skipping append");
            return Ok(prev.clone());
        }

        let seq = case.take_seq();
        let id = ArtifactId::new(kind, seq);
        let rel = format!("artifacts/{seq:04}-{}.json", kind.as_str());
        let path = self.case_dir(&case.case_id).join(&rel);
        if path.exists() {
            return Err(KinsightError::Store(format!(
                "artifact file {rel} already exists; artifacts are write-once"
            )));
        }
        atomic_write(&path, json.as_bytes())?;

        let record = ArtifactRecord {
            id: id.clone(),
            kind,
            created_at: chrono::Utc::now(),
            blake3_first8: first8,
            path: rel,
            label,
        };
        case.artifacts.push(record.clone());
        self.save_head(case)?;
        info!(case_id = %case.case_id, artifact = %id, "stored artifact");
        Ok(record)
    }

    /// Read an artifact payload back by id.
    pub fn read_artifact<T: DeserializeOwned>(
        &self,
        case: &Case,
        id: &ArtifactId,
    ) -> Result<T, KinsightError> {
        let record = case
            .artifacts
            .iter()
            .find(|a| &a.id == id)
            .ok_or_else(|| {
                KinsightError::Store(format!("unknown artifact {id}"))
            })?;
        let path = self.case_dir(&case.case_id).join(&record.path);
        let bytes = std::fs::read(&path).map_err(|e| {
            KinsightError::Store(format!("cannot read artifact {id}: {e}"))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Serialize with a trailing newline and LF line endings only.
fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, KinsightError> {
    let mut json = serde_json::to_string_pretty(value)?;
    if json.contains('\r') {
        json = json.replace("\r\n", "\n").replace('\r', "\n");
    }
    json.push('\n');
    Ok(json)
}

/// Write via a temp file in the target directory, then rename into place.
fn atomic_write(path: &Utf8Path, bytes: &[u8]) -> Result<(), KinsightError> {
    let dir = path
        .parent()
        .ok_or_else(|| KinsightError::Store(format!("no parent for {path}")))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| KinsightError::Store(format!("persist {path}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinsight_model::Stage;

    fn temp_store() -> (tempfile::TempDir, CaseStore) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = CaseStore::open(root).unwrap();
        (dir, store)
    }

    fn case_id(s: &str) -> CaseId {
        CaseId::new(s).unwrap()
    }

    #[test]
    fn create_and_reload_roundtrips_head() {
        let (_dir, store) = temp_store();
        let mut case = store.create_case(case_id("case-a"), "child").unwrap();
        case.current_stage = Stage::AwaitingVideos;
        store.save_head(&case).unwrap();

        let loaded = store.load_case(&case_id("case-a")).unwrap();
        assert_eq!(loaded, case);
    }

    #[test]
    fn duplicate_case_creation_fails() {
        let (_dir, store) = temp_store();
        store.create_case(case_id("case-a"), "child").unwrap();
        assert!(store.create_case(case_id("case-a"), "child").is_err());
    }

    #[test]
    fn append_assigns_sequential_ids_and_files() {
        let (_dir, store) = temp_store();
        let mut case = store.create_case(case_id("case-a"), "child").unwrap();

        let a = store
            .append_artifact(&mut case, ArtifactKind::Interview, &serde_json::json!({"v": 1}), None)
            .unwrap();
        let b = store
            .append_artifact(&mut case, ArtifactKind::VideoAnalysis, &serde_json::json!({"v": 2}), Some("g-play".into()))
            .unwrap();

        assert_eq!(a.id.to_string(), "interview-0001");
        assert_eq!(b.id.to_string(), "video-analysis-0002");
        assert_eq!(b.label.as_deref(), Some("g-play"));

        let payload: serde_json::Value = store.read_artifact(&case, &b.id).unwrap();
        assert_eq!(payload, serde_json::json!({"v": 2}));
    }

    #[test]
    fn identical_repeat_append_is_idempotent() {
        let (_dir, store) = temp_store();
        let mut case = store.create_case(case_id("case-a"), "child").unwrap();
        let payload = serde_json::json!({"v": 1});

        let first = store
            .append_artifact(&mut case, ArtifactKind::Interview, &payload, None)
            .unwrap();
        let second = store
            .append_artifact(&mut case, ArtifactKind::Interview, &payload, None)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(case.artifacts.len(), 1);
    }

    #[test]
    fn artifact_files_are_never_rewritten() {
        let (_dir, store) = temp_store();
        let mut case = store.create_case(case_id("case-a"), "child").unwrap();
        let rec = store
            .append_artifact(&mut case, ArtifactKind::Interview, &serde_json::json!({"v": 1}), None)
            .unwrap();

        let path = store.case_dir(&case.case_id).join(&rec.path);
        let before = std::fs::read_to_string(&path).unwrap();

        // A different payload of the same kind gets a new file.
        store
            .append_artifact(&mut case, ArtifactKind::Interview, &serde_json::json!({"v": 2}), None)
            .unwrap();
        let after = std::fs::read_to_string(&path).unwrap();
        assert_eq!(before, after);
        assert_eq!(case.artifacts.len(), 2);
    }
}
