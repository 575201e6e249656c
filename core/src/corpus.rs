use crate::{DocIndex, Document, Error, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Immutable, ordered snapshot of the documents an index was built from.
///
/// Cloning is cheap; both indices share one allocation.
#[derive(Debug, Clone)]
pub struct Corpus {
    docs: Arc<[Document]>,
}

impl Corpus {
    pub fn new(docs: Vec<Document>) -> Self { Self { docs: docs.into() } }

    /// Load from a JSON array, a single JSON object, a JSONL file, or a
    /// directory of such files (walked in sorted path order).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut files: Vec<PathBuf> = Vec::new();
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
                let p = entry.path();
                if p.is_file() {
                    if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                        if matches!(ext, "json" | "jsonl") {
                            files.push(p.to_path_buf());
                        }
                    }
                }
            }
        } else if path.is_file() {
            files.push(path.to_path_buf());
        } else {
            return Err(Error::Corpus(format!("{} does not exist", path.display())));
        }

        let mut docs = Vec::new();
        for file in files {
            if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                read_jsonl(&file, &mut docs)?;
            } else {
                read_json(&file, &mut docs)?;
            }
        }
        tracing::info!(num_docs = docs.len(), path = %path.display(), "loaded corpus");
        Ok(Self::new(docs))
    }

    pub fn len(&self) -> usize { self.docs.len() }
    pub fn is_empty(&self) -> bool { self.docs.is_empty() }
    pub fn get(&self, idx: DocIndex) -> Option<&Document> { self.docs.get(idx) }
    pub fn iter(&self) -> std::slice::Iter<'_, Document> { self.docs.iter() }
    pub fn as_slice(&self) -> &[Document] { &self.docs }

    /// First document whose `offering_id` equals `offering_id` exactly.
    pub fn find_offering(&self, offering_id: &str) -> Option<DocIndex> {
        self.docs.iter().position(|d| d.offering_id.as_deref() == Some(offering_id))
    }

    /// Distinct non-empty values of a field, sorted.
    pub fn distinct<F>(&self, get: F) -> Vec<String>
    where
        F: Fn(&Document) -> &str,
    {
        let values: BTreeSet<&str> = self.docs.iter().map(get).filter(|v| !v.is_empty()).collect();
        values.into_iter().map(str::to_string).collect()
    }
}

impl Default for Corpus {
    fn default() -> Self { Self::new(Vec::new()) }
}

impl From<Vec<Document>> for Corpus {
    fn from(docs: Vec<Document>) -> Self { Self::new(docs) }
}

fn read_jsonl(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        docs.push(serde_json::from_str(&line)?);
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: Value = serde_json::from_reader(reader)?;
    match json {
        Value::Array(arr) => {
            for v in arr {
                docs.push(serde_json::from_value(v)?);
            }
        }
        Value::Object(_) => docs.push(serde_json::from_value(json)?),
        _ => return Err(Error::Corpus(format!("{}: expected an array or object of course records", file.display()))),
    }
    Ok(())
}
