use crate::config::Number;
use crate::error::{Result, StoreError};
use crate::persist::{self, CategoryLog, CATEGORY_EXT, LEGACY_CATEGORY_EXT};
use crate::vector_entry::{Payload, VectorEntry};
use crate::vector_store::{SearchResult, VectorStore};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

struct Category {
    store: VectorStore,
    log: CategoryLog,
}

/// Owns every category's in-memory store together with its on-disk log.
///
/// The file is the source of truth: `append` writes the record to disk first
/// and only then adds it to memory, so a failed write leaves both unchanged.
pub struct CategoryRegistry {
    dir: PathBuf,
    categories: HashMap<String, Category>,
}

impl CategoryRegistry {
    /// Loads every `*.jsonl` file in `dir`, creating the directory if needed.
    /// Legacy `*.json` files are loaded too unless a `.jsonl` file of the same
    /// name exists. Empty files are skipped; a malformed file aborts
    /// initialization.
    pub fn initialize(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut files = Vec::new();
        for dir_entry in fs::read_dir(&dir)? {
            let path = dir_entry?.path();
            if !path.is_file() {
                continue;
            }
            let legacy = match path.extension().and_then(|e| e.to_str()) {
                Some(CATEGORY_EXT) => false,
                Some(LEGACY_CATEGORY_EXT) => true,
                _ => continue,
            };
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            files.push((name, legacy, path));
        }
        // Current-format files sort ahead of legacy files with the same name.
        files.sort();

        let mut categories = HashMap::new();
        for (name, legacy, path) in files {
            if categories.contains_key(&name) {
                warn!(category = %name, path = %path.display(), "ignoring legacy file shadowed by a .jsonl file");
                continue;
            }

            let entries = persist::load_entries(&path)?;
            if entries.is_empty() {
                debug!(category = %name, "skipping empty category file");
                continue;
            }

            let mut store = VectorStore::new();
            for VectorEntry { vector, data } in entries {
                store.store(vector, data);
            }
            info!(category = %name, entries = store.len(), legacy, "loaded category");

            let log = CategoryLog::open(path)?;
            categories.insert(name, Category { store, log });
        }

        info!(dir = %dir.display(), categories = categories.len(), "registry initialized");
        Ok(Self { dir, categories })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the category's store, creating an empty store and file on first use.
    pub fn get_or_create(&mut self, category: &str) -> Result<&mut VectorStore> {
        validate_name(category)?;
        if !self.categories.contains_key(category) {
            let log = CategoryLog::open(persist::category_path(&self.dir, category))?;
            info!(category, path = %log.path().display(), "created category");
            self.categories.insert(
                category.to_string(),
                Category {
                    store: VectorStore::new(),
                    log,
                },
            );
        }
        self.categories
            .get_mut(category)
            .map(|c| &mut c.store)
            .ok_or_else(|| StoreError::UnknownCategory(category.to_string()))
    }

    /// Persists `(vector, data)` to the category's log, then stores it in memory.
    pub fn append(&mut self, category: &str, vector: Vec<Number>, data: impl Into<Payload>) -> Result<()> {
        self.get_or_create(category)?;
        let slot = self
            .categories
            .get_mut(category)
            .ok_or_else(|| StoreError::UnknownCategory(category.to_string()))?;

        let entry = VectorEntry::new(vector, data);
        slot.log.append(&entry)?;
        slot.store.store(entry.vector, entry.data);
        Ok(())
    }

    pub fn get(&self, category: &str) -> Option<&VectorStore> {
        self.categories.get(category).map(|c| &c.store)
    }

    pub fn len(&self, category: &str) -> usize {
        self.get(category).map_or(0, VectorStore::len)
    }

    pub fn categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.categories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn retrieve(&self, category: &str, query_vector: &[Number], top_n: usize) -> Result<Vec<SearchResult>> {
        self.get(category)
            .ok_or_else(|| StoreError::UnknownCategory(category.to_string()))?
            .retrieve(query_vector, top_n)
    }

    /// Flushes every open category file and releases the handles.
    pub fn shutdown(self) -> Result<()> {
        for (name, category) in &self.categories {
            category.log.sync()?;
            debug!(category = %name, "category log synced");
        }
        info!(categories = self.categories.len(), "registry shut down");
        Ok(())
    }
}

fn validate_name(category: &str) -> Result<()> {
    let invalid = category.is_empty()
        || category == "."
        || category == ".."
        || category.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StoreError::InvalidCategory(category.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn get_or_create_makes_an_empty_file_once() {
        let tmp = TempDir::new().unwrap();
        let mut registry = CategoryRegistry::initialize(tmp.path()).unwrap();

        assert!(registry.get_or_create("fresh").unwrap().is_empty());
        registry.append("fresh", vec![1.0, 0.0], "payload one").unwrap();
        assert_eq!(registry.get_or_create("fresh").unwrap().len(), 1);

        let path = tmp.path().join("fresh.jsonl");
        assert_eq!(persist::load_entries(&path).unwrap().len(), 1);
    }

    #[test]
    fn bad_names_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut registry = CategoryRegistry::initialize(tmp.path()).unwrap();
        for name in ["", ".", "..", "a/b", "a\\b"] {
            assert!(
                matches!(registry.get_or_create(name), Err(StoreError::InvalidCategory(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn unknown_category_retrieval_fails() {
        let tmp = TempDir::new().unwrap();
        let registry = CategoryRegistry::initialize(tmp.path()).unwrap();
        assert!(matches!(
            registry.retrieve("nope", &[1.0], 5),
            Err(StoreError::UnknownCategory(_))
        ));
    }

    #[test]
    fn empty_and_foreign_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("empty.jsonl"), "").unwrap();
        fs::write(tmp.path().join("readme.txt"), "not a category").unwrap();
        fs::write(tmp.path().join("real.jsonl"), "{\"vector\":[1,2],\"data\":\"x\"}\n").unwrap();

        let registry = CategoryRegistry::initialize(tmp.path()).unwrap();
        assert_eq!(registry.categories(), vec!["real".to_string()]);
        assert_eq!(registry.len("real"), 1);
    }

    #[test]
    fn corrupt_file_fails_initialization() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("broken.jsonl"), "not json at all\n").unwrap();
        assert!(matches!(
            CategoryRegistry::initialize(tmp.path()),
            Err(StoreError::CorruptPersistence { .. })
        ));
    }

    #[test]
    fn legacy_json_files_are_loaded_and_extended() {
        let tmp = TempDir::new().unwrap();
        let legacy = tmp.path().join("history.json");
        fs::write(&legacy, "{\"vector\":[1,0],\"data\":\"old entry\"},\n").unwrap();

        let mut registry = CategoryRegistry::initialize(tmp.path()).unwrap();
        assert_eq!(registry.categories(), vec!["history".to_string()]);
        registry.append("history", vec![0.0, 1.0], "new entry").unwrap();
        registry.shutdown().unwrap();

        assert!(!tmp.path().join("history.jsonl").exists());
        assert_eq!(persist::load_entries(&legacy).unwrap().len(), 2);
    }

    #[test]
    fn jsonl_file_wins_over_legacy_json_of_same_name() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.json"), "{\"vector\":[1],\"data\":\"stale\"},\n").unwrap();
        fs::write(
            tmp.path().join("notes.jsonl"),
            "{\"vector\":[1],\"data\":\"a\"}\n{\"vector\":[2],\"data\":\"b\"}\n",
        )
        .unwrap();

        let registry = CategoryRegistry::initialize(tmp.path()).unwrap();
        assert_eq!(registry.len("notes"), 2);
    }
}
