//! Core data types for the document archive.
//!
//! A document lives in two places: the registry holds its catalog row
//! (title, digest, counts, timestamps, tag associations, metadata), and its
//! shard holds the structural payload (original text plus the paragraph/token
//! analysis tree).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fixed width of a token's feature vector.
///
/// UniDic-style analyzers emit up to this many feature slots; unset slots are
/// stored as empty strings, never omitted, so downstream consumers can index
/// positionally.
pub const FEATURE_WIDTH: usize = 25;

/// Category assigned to tags created outside the recognized taxonomy.
pub const DEFAULT_CATEGORY: &str = "general";

/// Numeric identifier of a document in the registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DocumentId(u64);

impl DocumentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The minimal analyzed unit of text: a surface form plus its feature vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Surface form as it appears in the text.
    pub surface: String,
    /// Ordered feature slots, padded with empty strings to [`FEATURE_WIDTH`].
    pub features: Vec<String>,
}

impl Token {
    /// Build a token, padding (or extending past) the fixed feature width.
    ///
    /// Analyzers that emit more than [`FEATURE_WIDTH`] slots keep all of them;
    /// shorter vectors are padded so slot indices stay stable.
    pub fn new(surface: impl Into<String>, mut features: Vec<String>) -> Self {
        if features.len() < FEATURE_WIDTH {
            features.resize(FEATURE_WIDTH, String::new());
        }
        Self {
            surface: surface.into(),
            features,
        }
    }
}

/// One paragraph of the analyzed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Zero-based position within the document.
    pub index: u32,
    /// Raw paragraph text.
    pub content: String,
    /// Tokens in reading order.
    pub tokens: Vec<Token>,
}

/// Structural payload stored in a document's shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardPayload {
    /// Immutable original text.
    pub content: String,
    /// Analysis tree, ordered by paragraph index.
    pub paragraphs: Vec<Paragraph>,
}

/// Registry catalog row for a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRow {
    pub id: DocumentId,
    pub title: String,
    /// Shard locator, derived from (sanitized title, id).
    pub locator: String,
    /// Hex content digest over (content, dictionary).
    pub digest: String,
    /// Dictionary the analysis was produced with.
    pub dictionary: String,
    /// Paragraph count, computed once at write time from the stored shard.
    pub paragraph_count: u64,
    /// Token count, computed once at write time from the stored shard.
    pub token_count: u64,
    /// Epoch milliseconds.
    pub created_at: u64,
    /// Epoch milliseconds; bumped by every registry-side mutation.
    pub updated_at: u64,
}

/// A tag's name and category, as surfaced on document summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagLabel {
    pub name: String,
    pub category: String,
}

/// A tag in the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    /// Globally unique name.
    pub name: String,
    /// Open category string; [`DEFAULT_CATEGORY`] unless assigned.
    pub category: String,
}

impl Tag {
    pub fn label(&self) -> TagLabel {
        TagLabel {
            name: self.name.clone(),
            category: self.category.clone(),
        }
    }
}

/// A tag classification grouping (era, style, author, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCategory {
    /// Unique machine name.
    pub name: String,
    /// Human-readable display label.
    pub display_name: String,
    pub description: String,
}

/// A tag together with the number of documents holding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagUsage {
    pub id: u64,
    pub name: String,
    pub category: String,
    pub doc_count: u64,
}

/// Summary record returned by list operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub title: String,
    pub dictionary: String,
    pub paragraph_count: u64,
    pub token_count: u64,
    pub created_at: u64,
    pub updated_at: u64,
    pub tags: Vec<TagLabel>,
    pub metadata: BTreeMap<String, String>,
}

/// Full record returned by get operations: summary plus shard payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub summary: DocumentSummary,
    pub content: String,
    pub paragraphs: Vec<Paragraph>,
}
