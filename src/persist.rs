//! Per-category append-only log.
//!
//! One JSON record per line: `{"vector":[...],"data":"..."}`. Lines written by
//! older tools end in a trailing comma; the loader accepts both forms.

use crate::error::{Result, StoreError};
use crate::vector_entry::VectorEntry;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CATEGORY_EXT: &str = "jsonl";
/// Extension used by older tools for the same line format.
pub const LEGACY_CATEGORY_EXT: &str = "json";

pub fn category_path(dir: &Path, category: &str) -> PathBuf {
    dir.join(format!("{}.{}", category, CATEGORY_EXT))
}

/// Parses every record in a category file. A missing or empty file yields no
/// entries; any unparsable line fails the whole load.
pub fn load_entries(path: &Path) -> Result<Vec<VectorEntry>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    content
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let record = line.trim();
            let record = record.strip_suffix(',').unwrap_or(record).trim_end();
            (!record.is_empty()).then_some((index + 1, record))
        })
        .map(|(line, record)| {
            serde_json::from_str::<VectorEntry>(record).map_err(|e| {
                StoreError::CorruptPersistence {
                    path: path.to_path_buf(),
                    line,
                    reason: e.to_string(),
                }
            })
        })
        .collect()
}

/// Open append handle on one category file.
#[derive(Debug)]
pub struct CategoryLog {
    path: PathBuf,
    file: File,
    // Last byte on disk is not a newline; the next record starts one.
    unterminated: bool,
}

impl CategoryLog {
    /// Opens the file for appending, creating it empty if absent. Existing
    /// content is never truncated.
    pub fn open(path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let unterminated = ends_without_newline(&mut file)?;
        if unterminated {
            debug!(path = %path.display(), "last record has no line break");
        }
        Ok(Self {
            path,
            file,
            unterminated,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one record and syncs it. On failure the file is cut back to its
    /// previous length so no partial line survives.
    pub fn append(&mut self, entry: &VectorEntry) -> Result<()> {
        let mut line = String::new();
        if self.unterminated {
            line.push('\n');
        }
        line.push_str(&serde_json::to_string(entry).map_err(io::Error::from)?);
        line.push('\n');

        let previous_len = self.file.metadata()?.len();
        let written = self
            .file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.sync_data());

        if let Err(e) = written {
            warn!(path = %self.path.display(), error = %e, "append failed, rolling back");
            if let Err(rollback) = self.file.set_len(previous_len) {
                warn!(path = %self.path.display(), error = %rollback, "rollback failed");
            }
            return Err(e.into());
        }
        self.unterminated = false;

        debug!(path = %self.path.display(), bytes = line.len(), "record appended");
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

fn ends_without_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn legacy_trailing_comma_line_loads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("legacy.jsonl");
        fs::write(&path, "{\"vector\":[1,2],\"data\":\"x\"},\n").unwrap();

        let entries = load_entries(&path).unwrap();
        assert_eq!(entries, vec![VectorEntry::new(vec![1.0, 2.0], "x")]);
    }

    #[test]
    fn missing_and_empty_files_have_no_entries() {
        let tmp = TempDir::new().unwrap();
        assert!(load_entries(&tmp.path().join("absent.jsonl")).unwrap().is_empty());

        let empty = tmp.path().join("empty.jsonl");
        fs::write(&empty, "").unwrap();
        assert!(load_entries(&empty).unwrap().is_empty());
    }

    #[test]
    fn garbage_line_reports_its_line_number() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.jsonl");
        fs::write(
            &path,
            "{\"vector\":[1],\"data\":\"ok\"}\n\n{\"vector\":[1],\"data\":\n",
        )
        .unwrap();

        match load_entries(&path) {
            Err(StoreError::CorruptPersistence { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected corrupt persistence, got {other:?}"),
        }
    }

    #[test]
    fn appended_records_are_one_per_line() {
        let tmp = TempDir::new().unwrap();
        let path = category_path(tmp.path(), "notes");
        let mut log = CategoryLog::open(path.clone()).unwrap();
        log.append(&VectorEntry::new(vec![0.5, -1.0], "first")).unwrap();
        log.append(&VectorEntry::new(vec![2.0, 3.0], "second, with \"quotes\"\nand a newline"))
            .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.ends_with('\n'));

        let entries = load_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].data.as_text(), "second, with \"quotes\"\nand a newline");
    }

    #[test]
    fn reopening_does_not_truncate() {
        let tmp = TempDir::new().unwrap();
        let path = category_path(tmp.path(), "keep");
        CategoryLog::open(path.clone())
            .unwrap()
            .append(&VectorEntry::new(vec![1.0], "kept"))
            .unwrap();
        CategoryLog::open(path.clone()).unwrap();
        assert_eq!(load_entries(&path).unwrap().len(), 1);
    }

    #[test]
    fn append_after_unterminated_record_starts_a_new_line() {
        let tmp = TempDir::new().unwrap();
        let path = category_path(tmp.path(), "edited");
        fs::write(&path, "{\"vector\":[1,2],\"data\":\"x\"}").unwrap();

        let mut log = CategoryLog::open(path.clone()).unwrap();
        log.append(&VectorEntry::new(vec![3.0, 4.0], "y")).unwrap();
        log.append(&VectorEntry::new(vec![5.0, 6.0], "z")).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 3);
        let texts: Vec<String> = load_entries(&path)
            .unwrap()
            .iter()
            .map(|e| e.data.as_text().to_string())
            .collect();
        assert_eq!(texts, vec!["x", "y", "z"]);
    }

    #[test]
    fn legacy_comma_without_line_break_still_appends_cleanly() {
        let tmp = TempDir::new().unwrap();
        let path = category_path(tmp.path(), "legacy");
        fs::write(&path, "{\"vector\":[1,2],\"data\":\"x\"},").unwrap();

        CategoryLog::open(path.clone())
            .unwrap()
            .append(&VectorEntry::new(vec![3.0, 4.0], "y"))
            .unwrap();
        assert_eq!(load_entries(&path).unwrap().len(), 2);
    }
}
