//! Where source documents come from.
//!
//! The pipeline only sees [`SourceProvider`]; the network, a local directory
//! and in-memory fixtures all plug in behind it.

pub mod cache;
pub mod client;
pub mod retry;

pub use cache::{DirSource, SourceCache};
pub use client::HttpSource;
pub use retry::RetryPolicy;

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Failure to obtain one source document
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// A downloaded body that did not parse, usually a cut-off transfer
    #[error("malformed body from {url}: {source}")]
    Malformed {
        url: String,
        source: serde_json::Error,
    },

    #[error("document `{0}` not found")]
    NotFound(SourceDoc),

    #[error("document `{doc}` has no `{field}` object")]
    Shape { doc: SourceDoc, field: &'static str },
}

impl FetchError {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(_) | FetchError::Io(_) | FetchError::Malformed { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Json(_) | FetchError::NotFound(_) | FetchError::Shape { .. } => false,
        }
    }
}

/// The gamedata export documents the pipeline reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceDoc {
    RangeTable,
    ItemTable,
    ZoneTable,
    CharacterTable,
    SkillTable,
    SkinTable,
    UniequipTable,
    StageTable,
}

impl SourceDoc {
    pub const ALL: [SourceDoc; 8] = [
        SourceDoc::RangeTable,
        SourceDoc::ItemTable,
        SourceDoc::ZoneTable,
        SourceDoc::CharacterTable,
        SourceDoc::SkillTable,
        SourceDoc::SkinTable,
        SourceDoc::UniequipTable,
        SourceDoc::StageTable,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SourceDoc::RangeTable => "range_table",
            SourceDoc::ItemTable => "item_table",
            SourceDoc::ZoneTable => "zone_table",
            SourceDoc::CharacterTable => "character_table",
            SourceDoc::SkillTable => "skill_table",
            SourceDoc::SkinTable => "skin_table",
            SourceDoc::UniequipTable => "uniequip_table",
            SourceDoc::StageTable => "stage_table",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }

    /// Field holding the keyed records; `None` when the document root is
    /// the record map itself
    pub fn root_field(self) -> Option<&'static str> {
        match self {
            SourceDoc::ItemTable => Some("items"),
            SourceDoc::ZoneTable => Some("zones"),
            SourceDoc::SkinTable => Some("charSkins"),
            SourceDoc::UniequipTable => Some("equipDict"),
            SourceDoc::StageTable => Some("stages"),
            SourceDoc::RangeTable | SourceDoc::CharacterTable | SourceDoc::SkillTable => None,
        }
    }

    /// Take the keyed record map out of a parsed document
    pub fn into_records(self, doc: Value) -> Result<Map<String, Value>, FetchError> {
        let field = self.root_field();
        let slice = match field {
            Some(f) => match doc {
                Value::Object(mut root) => root.remove(f),
                _ => None,
            },
            None => Some(doc),
        };

        match slice {
            Some(Value::Object(records)) => Ok(records),
            _ => Err(FetchError::Shape {
                doc: self,
                field: field.unwrap_or("<root>"),
            }),
        }
    }
}

impl fmt::Display for SourceDoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything that can hand over a parsed source document
pub trait SourceProvider {
    fn fetch(&self, doc: SourceDoc) -> Result<Value, FetchError>;
}

impl<P: SourceProvider + ?Sized> SourceProvider for &P {
    fn fetch(&self, doc: SourceDoc) -> Result<Value, FetchError> {
        (**self).fetch(doc)
    }
}

/// In-memory documents
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    docs: HashMap<SourceDoc, Value>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, doc: SourceDoc, value: Value) -> Self {
        self.docs.insert(doc, value);
        self
    }

    pub fn insert(&mut self, doc: SourceDoc, value: Value) {
        self.docs.insert(doc, value);
    }
}

impl SourceProvider for StaticSource {
    fn fetch(&self, doc: SourceDoc) -> Result<Value, FetchError> {
        self.docs.get(&doc).cloned().ok_or(FetchError::NotFound(doc))
    }
}

/// The record maps a run loads from, with the documents that could not be
/// obtained
#[derive(Debug, Default)]
pub struct SourceSet {
    records: HashMap<SourceDoc, Map<String, Value>>,
    unavailable: HashMap<SourceDoc, String>,
}

impl SourceSet {
    /// Fetch every document in `docs`. A document that fails, has the wrong
    /// shape or holds no records is marked unavailable; nothing is fabricated
    /// in its place.
    pub fn collect(provider: &impl SourceProvider, docs: &[SourceDoc]) -> Self {
        let mut set = Self::default();

        for &doc in docs {
            if set.records.contains_key(&doc) || set.unavailable.contains_key(&doc) {
                continue;
            }

            match provider.fetch(doc).and_then(|value| doc.into_records(value)) {
                Ok(records) if records.is_empty() => {
                    warn!(%doc, "source document is empty");
                    set.unavailable.insert(doc, "empty".to_string());
                }
                Ok(records) => {
                    info!(%doc, records = records.len(), "source document ready");
                    set.records.insert(doc, records);
                }
                Err(e) => {
                    warn!(%doc, error = %e, "source document unavailable");
                    set.unavailable.insert(doc, e.to_string());
                }
            }
        }

        set
    }

    pub fn get(&self, doc: SourceDoc) -> Option<&Map<String, Value>> {
        self.records.get(&doc)
    }

    /// Why `doc` is missing, if it is
    pub fn unavailable(&self, doc: SourceDoc) -> Option<&str> {
        self.unavailable.get(&doc).map(String::as_str)
    }

    pub fn available(&self) -> usize {
        self.records.len()
    }
}
