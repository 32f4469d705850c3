//! Directory-scoped corpus persistence: one pretty-printed JSON file per
//! debate topic and stance (`<topic>_<stance>.json`).
//!
//! Writes go through a temp file in the target directory that is renamed over
//! the final name, so a failed run never leaves half-written output behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::corpus::{ArgumentPair, Corpus};
use crate::error::GoldError;

pub const CORPUS_EXTENSION: &str = "json";

/// Loads every `*.json` file of `dir` (sorted by name) into a corpus keyed by
/// file stem.
pub fn load_corpus(dir: &Path) -> Result<Corpus, GoldError> {
    let mut corpus = Corpus::new();
    for path in corpus_files(dir)? {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| GoldError::malformed("corpus file name", path.display().to_string()))?
            .to_string();
        let raw = std::fs::read_to_string(&path)?;
        let pairs: Vec<ArgumentPair> = serde_json::from_str(&raw)
            .map_err(|e| GoldError::Serde(format!("{}: {e}", path.display())))?;
        debug!(file = %path.display(), pairs = pairs.len(), "Loaded corpus file");
        corpus.insert(stem, pairs);
    }
    info!(
        dir = %dir.display(),
        files = corpus.files.len(),
        pairs = corpus.pair_count(),
        "Loaded corpus"
    );
    Ok(corpus)
}

/// Writes one file per corpus entry into `dir`, creating it if needed.
pub fn save_corpus(corpus: &Corpus, dir: &Path) -> Result<(), GoldError> {
    std::fs::create_dir_all(dir)?;
    for (file, pairs) in &corpus.files {
        let path = dir.join(format!("{file}.{CORPUS_EXTENSION}"));
        write_json_atomic(&path, pairs)?;
    }
    info!(dir = %dir.display(), files = corpus.files.len(), "Saved corpus");
    Ok(())
}

/// Serializes `value` as pretty JSON and atomically replaces `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), GoldError> {
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    write_atomic(path, &body)
}

/// Atomically replaces `path` with `body`.
pub fn write_atomic(path: &Path, body: &[u8]) -> Result<(), GoldError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(body)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| GoldError::Io(e.error))?;
    Ok(())
}

fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>, GoldError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == CORPUS_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
