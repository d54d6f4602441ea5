use directories::ProjectDirs;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{FetchError, SourceDoc, SourceProvider};

/// On-disk copies of fetched documents, one file per document
pub struct SourceCache {
    cache_dir: PathBuf,
}

impl SourceCache {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self, FetchError> {
        let cache_dir = match custom_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("", "", "arkdata-to-sqlite")
                .map(|dirs| dirs.cache_dir().to_path_buf())
                .ok_or_else(|| {
                    FetchError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "could not determine cache directory",
                    ))
                })?,
        };

        fs::create_dir_all(&cache_dir)?;

        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn path(&self, doc: SourceDoc) -> PathBuf {
        self.cache_dir.join(doc.file_name())
    }

    pub fn is_cached(&self, doc: SourceDoc) -> bool {
        self.path(doc).is_file()
    }

    pub fn load(&self, doc: SourceDoc) -> Result<Value, FetchError> {
        read_json(&self.path(doc))
    }

    /// Written to a `.part` file first, then renamed into place
    pub fn store(&self, doc: SourceDoc, body: &str) -> Result<(), FetchError> {
        let path = self.path(doc);
        let tmp = path.with_extension("json.part");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        debug!(%doc, path = %path.display(), "cached source document");
        Ok(())
    }

    /// Drop one cached document, if present
    pub fn evict(&self, doc: SourceDoc) -> Result<(), FetchError> {
        let path = self.path(doc);
        if path.exists() {
            fs::remove_file(&path)?;
            debug!(%doc, path = %path.display(), "evicted cached source document");
        }
        Ok(())
    }

    /// Remove every cached document
    pub fn clear(&self) -> Result<(), FetchError> {
        for doc in SourceDoc::ALL {
            let path = self.path(doc);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// Documents read from `<dir>/<doc>.json`, for offline runs
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SourceProvider for DirSource {
    fn fetch(&self, doc: SourceDoc) -> Result<Value, FetchError> {
        let path = self.dir.join(doc.file_name());
        if !path.is_file() {
            return Err(FetchError::NotFound(doc));
        }
        read_json(&path)
    }
}

fn read_json(path: &Path) -> Result<Value, FetchError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
