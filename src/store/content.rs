//! Flat JSON-per-key document storage.
//!
//! Every document lives in one file under the store root. Any string is a
//! valid key: keys made only of ASCII alphanumerics, `-`, `_`, `.` and `@`
//! (not starting with `.`) are used as the file stem directly, everything
//! else is stored under `~{base64url(key)}`. Keys whose encoded name would not
//! fit in a file name are stored under `#{sha256(key)}`; those documents are
//! readable by key but not listed by [`ContentStore::keys`].
//!
//! Writes go to a temp file in the same directory and are then renamed over
//! the target, so a concurrent reader sees either the old document or the new
//! one, never a torn write. A failed write leaves the previous document in
//! place.
//!
//! # Example
//!
//! ```rust
//! use cleanbites::store::ContentStore;
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = ContentStore::new(dir.path().join("docs"));
//! store.put("auth0|greeting", &json!({"hello": "world"})).unwrap();
//! let doc: Option<serde_json::Value> = store.get("auth0|greeting").unwrap();
//! assert_eq!(doc.unwrap()["hello"], "world");
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{CleanBitesError, Result};

/// File extension for stored documents.
const EXTENSION: &str = "json";

/// Prefix of in-flight temp files. Starts with `.` so it can never collide
/// with a stored document's name.
const TEMP_PREFIX: &str = ".tmp-";

/// Stem prefix for base64url-encoded keys.
const ENCODED_PREFIX: char = '~';

/// Stem prefix for digest-named keys.
const DIGEST_PREFIX: char = '#';

/// Longest file stem written, leaving room for the extension within the
/// common 255-byte file name limit.
const MAX_STEM_LEN: usize = 240;

/// Key → JSON document store rooted at a directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

/// Whether `key` can be used as a file stem unchanged.
fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_STEM_LEN
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
}

/// File stem for `key`.
fn stem_for(key: &str) -> String {
    if is_plain_key(key) {
        return key.to_string();
    }
    let encoded = URL_SAFE_NO_PAD.encode(key.as_bytes());
    if encoded.len() < MAX_STEM_LEN {
        return format!("{ENCODED_PREFIX}{encoded}");
    }
    let digest = Sha256::digest(key.as_bytes());
    format!("{DIGEST_PREFIX}{}", hex::encode(&digest[..]))
}

/// Key stored under `stem`, or `None` for digest names and foreign files.
fn key_for(stem: &str) -> Option<String> {
    if let Some(encoded) = stem.strip_prefix(ENCODED_PREFIX) {
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        return String::from_utf8(bytes).ok();
    }
    is_plain_key(stem).then(|| stem.to_string())
}

impl ContentStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`. Always a direct child of the root.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{EXTENSION}", stem_for(key)))
    }

    /// Serialize `document` and write it under `key`, replacing any existing
    /// document.
    pub fn put<T: Serialize + ?Sized>(&self, key: &str, document: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(document)
            .map_err(|e| CleanBitesError::Validation(format!("document is not serializable: {e}")))?;

        std::fs::create_dir_all(&self.root)?;

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".json")
            .tempfile_in(&self.root)?;
        temp.write_all(&data)?;
        temp.as_file().sync_all()?;

        let final_path = self.path_for(key);
        temp.persist(&final_path).map_err(|e| e.error)?;
        debug!(key = %key, bytes = data.len(), "Stored document");
        Ok(())
    }

    /// Read and parse the document stored under `key`.
    ///
    /// Returns `Ok(None)` when there is no such document.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| CleanBitesError::Decode(format!("document '{key}': {e}")))
    }

    /// Whether a document is stored under `key`.
    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Delete the document under `key`. Returns `false` if there was none.
    pub fn remove(&self, key: &str) -> Result<bool> {
        remove_path(&self.path_for(key))
    }

    /// Stored document files, skipping temp files and anything else.
    fn document_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with(DIGEST_PREFIX) || key_for(stem).is_some() {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// All stored keys, sorted. Digest-named documents are omitted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .document_paths()?
            .iter()
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()))
            .filter_map(key_for)
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Number of stored documents.
    pub fn len(&self) -> Result<usize> {
        Ok(self.document_paths()?.len())
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Delete every stored document and return how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.document_paths()? {
            if remove_path(&path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn remove_path(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn test_store() -> (TempDir, ContentStore) {
        let tmp = TempDir::new().unwrap();
        let store = ContentStore::new(tmp.path().join("docs"));
        (tmp, store)
    }

    #[test]
    fn test_put_get_roundtrip() {
        let (_tmp, store) = test_store();
        store.put("k1", &json!({"a": 1})).unwrap();
        let doc: Value = store.get("k1").unwrap().unwrap();
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (_tmp, store) = test_store();
        let doc: Option<Value> = store.get("nope").unwrap();
        assert!(doc.is_none());
    }

    #[test]
    fn test_root_created_on_first_put() {
        let (_tmp, store) = test_store();
        assert!(!store.root().exists());
        store.put("k", &json!(null)).unwrap();
        assert!(store.root().is_dir());
    }

    #[test]
    fn test_put_overwrites_fully() {
        let (_tmp, store) = test_store();
        store.put("k", &json!({"a": 1, "b": 2})).unwrap();
        store.put("k", &json!({"a": 3})).unwrap();
        let doc: Value = store.get("k").unwrap().unwrap();
        assert_eq!(doc, json!({"a": 3}));
    }

    #[test]
    fn test_exists() {
        let (_tmp, store) = test_store();
        assert!(!store.exists("k"));
        store.put("k", &json!([1, 2, 3])).unwrap();
        assert!(store.exists("k"));
        assert!(!store.exists("../k"));
        assert!(!store.exists("auth0|k"));
    }

    #[test]
    fn test_corrupt_document_is_decode_error() {
        let (_tmp, store) = test_store();
        std::fs::create_dir_all(store.root()).unwrap();
        std::fs::write(store.root().join("bad.json"), "{not json").unwrap();
        let result: Result<Option<Value>> = store.get("bad");
        assert!(matches!(result, Err(CleanBitesError::Decode(_))));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (_tmp, store) = test_store();
        for i in 0..5 {
            store.put("k", &json!({ "i": i })).unwrap();
        }
        let names: Vec<String> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["k.json".to_string()]);
    }

    #[test]
    fn test_plain_keys_used_as_file_names() {
        let (_tmp, store) = test_store();
        for key in ["user_2abcDEF", "a1b2c3", "me@example.com", "v1.2-x"] {
            assert_eq!(store.path_for(key), store.root().join(format!("{key}.json")));
        }
    }

    #[test]
    fn test_opaque_ids_round_trip() {
        let (_tmp, store) = test_store();
        let long = "x".repeat(129);
        let huge = "y".repeat(4096);
        let keys = [
            "auth0|64f1c2",
            "google-oauth2|1043",
            "user 1",
            "ünïcødé",
            "",
            long.as_str(),
            huge.as_str(),
        ];
        for (i, key) in keys.iter().enumerate() {
            assert!(!store.exists(key));
            assert!(store.get::<Value>(key).unwrap().is_none(), "{key:?}");
            store.put(key, &json!({ "i": i })).unwrap();
            assert!(store.exists(key), "{key:?}");
            let doc: Value = store.get(key).unwrap().unwrap();
            assert_eq!(doc["i"], i, "{key:?}");
        }
        assert_eq!(store.len().unwrap(), keys.len());
        for key in keys {
            assert!(store.remove(key).unwrap(), "{key:?}");
            assert!(!store.exists(key));
        }
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_traversal_keys_stay_inside_root() {
        let (tmp, store) = test_store();
        for key in ["..", "../escape", "a/b", "a\\b", ".hidden", "/etc/passwd"] {
            let path = store.path_for(key);
            assert_eq!(path.parent(), Some(store.root()), "{key:?}");
            store.put(key, &json!(key)).unwrap();
            let doc: Value = store.get(key).unwrap().unwrap();
            assert_eq!(doc, json!(key));
        }
        assert!(!tmp.path().join("escape.json").exists());
    }

    #[test]
    fn test_encoded_names_do_not_collide_with_plain_keys() {
        let (_tmp, store) = test_store();
        let encoded = store.path_for("a|b");
        let stem = encoded.file_stem().unwrap().to_str().unwrap().to_string();
        store.put("a|b", &json!(1)).unwrap();
        store.put(&stem, &json!(2)).unwrap();
        assert_eq!(store.get::<Value>("a|b").unwrap(), Some(json!(1)));
        assert_eq!(store.get::<Value>(&stem).unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_failed_serialization_keeps_previous_document() {
        use std::collections::HashMap;

        let (_tmp, store) = test_store();
        store.put("k", &json!({"v": 1})).unwrap();

        // Non-string map keys cannot be written as JSON.
        let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
        bad.insert((1, 2), 3);
        let err = store.put("k", &bad).unwrap_err();
        assert!(matches!(err, CleanBitesError::Validation(_)));

        assert_eq!(store.get::<Value>("k").unwrap(), Some(json!({"v": 1})));
        assert_eq!(store.keys().unwrap(), vec!["k"]);
    }

    #[test]
    fn test_failed_rename_leaves_other_documents_intact() {
        let (_tmp, store) = test_store();
        store.put("kept", &json!({"v": 1})).unwrap();
        // A directory where the target file would go makes the rename fail,
        // regardless of the caller's privileges.
        std::fs::create_dir(store.path_for("blocked")).unwrap();
        std::fs::write(store.path_for("blocked").join("inner"), "x").unwrap();

        let err = store.put("blocked", &json!({"v": 2})).unwrap_err();
        assert!(matches!(err, CleanBitesError::Io(_)));

        assert_eq!(store.get::<Value>("kept").unwrap(), Some(json!({"v": 1})));
        let temp_files = std::fs::read_dir(store.root())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with(TEMP_PREFIX)
            })
            .count();
        assert_eq!(temp_files, 0);
    }

    #[test]
    fn test_remove_keys_and_clear() {
        let (_tmp, store) = test_store();
        assert!(store.keys().unwrap().is_empty());
        store.put("b", &json!(1)).unwrap();
        store.put("a", &json!(2)).unwrap();
        store.put("c", &json!(3)).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["a", "b", "c"]);

        assert!(store.remove("b").unwrap());
        assert!(!store.remove("b").unwrap());
        assert_eq!(store.len().unwrap(), 2);

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_keys_ignores_foreign_files() {
        let (_tmp, store) = test_store();
        store.put("real", &json!(1)).unwrap();
        std::fs::write(store.root().join("notes.txt"), "x").unwrap();
        std::fs::write(store.root().join(".tmp-abc.json"), "{}").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["real"]);
    }
}
