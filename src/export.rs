//! Bulk export to a static JSON tree.
//!
//! The layout mirrors what a static web frontend consumes: one
//! `documents/NNN.json` per document holding the full text and analysis tree,
//! plus a single `index.json` with every catalog summary and the tag
//! vocabulary with usage counts. Documents whose shard cannot be read are
//! logged and skipped rather than failing the whole export.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::archive::Archive;
use crate::error::{ExportError, ExportResult, ShardError};
use crate::model::{Paragraph, TagUsage};

/// Per-document export payload.
#[derive(Debug, Serialize)]
struct DocumentExport<'a> {
    content: &'a str,
    paragraphs: &'a [Paragraph],
}

/// One catalog entry in `index.json`.
#[derive(Debug, Serialize)]
struct IndexEntry {
    id: u64,
    title: String,
    dictionary: String,
    paragraph_count: u64,
    token_count: u64,
    created_at: u64,
    updated_at: u64,
    tags: Vec<String>,
    /// Tag name → category, for the tags this document holds.
    tag_categories: BTreeMap<String, String>,
    metadata: BTreeMap<String, String>,
}

/// Top-level structure of `index.json`.
#[derive(Debug, Serialize)]
struct ExportIndex {
    documents: Vec<IndexEntry>,
    tags: Vec<TagUsage>,
}

/// Counts from one export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportReport {
    pub exported: usize,
    /// Documents skipped because their shard was missing or corrupt.
    pub skipped: usize,
}

fn io_err(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn write_json(path: &Path, value: &impl Serialize) -> ExportResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ExportError::Serialization {
        message: e.to_string(),
    })?;
    std::fs::write(path, json).map_err(|e| io_err(path, e))
}

/// Export every document and the tag vocabulary to `out_dir`.
pub fn export_archive(archive: &Archive, out_dir: &Path) -> ExportResult<ExportReport> {
    let documents_dir = out_dir.join("documents");
    std::fs::create_dir_all(&documents_dir).map_err(|e| io_err(&documents_dir, e))?;

    let mut entries = Vec::new();
    let mut skipped = 0;

    let mut rows = archive.registry().document_rows()?;
    rows.sort_by_key(|row| row.id);
    for row in rows {
        let payload = match archive.shards().read(&row.locator) {
            Ok(payload) => payload,
            Err(ShardError::Missing { .. } | ShardError::Corrupt { .. }) => {
                warn!(id = %row.id, locator = %row.locator, "skipping document with unreadable shard");
                skipped += 1;
                continue;
            }
            Err(ShardError::Io { locator, source }) => {
                return Err(ExportError::Io {
                    path: locator,
                    source,
                });
            }
            Err(ShardError::Serialization { message }) => {
                return Err(ExportError::Serialization { message });
            }
        };

        let doc_path = documents_dir.join(format!("{:03}.json", row.id.get()));
        write_json(
            &doc_path,
            &DocumentExport {
                content: &payload.content,
                paragraphs: &payload.paragraphs,
            },
        )?;

        let tags = archive.registry().tags_for(row.id)?;
        entries.push(IndexEntry {
            id: row.id.get(),
            title: row.title,
            dictionary: row.dictionary,
            paragraph_count: row.paragraph_count,
            token_count: row.token_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            tags: tags.iter().map(|t| t.name.clone()).collect(),
            tag_categories: tags
                .iter()
                .map(|t| (t.name.clone(), t.category.clone()))
                .collect(),
            metadata: archive.registry().metadata_for(row.id)?,
        });
    }

    let index = ExportIndex {
        documents: entries,
        tags: archive.taxonomy().all_tags()?,
    };
    write_json(&out_dir.join("index.json"), &index)?;

    let report = ExportReport {
        exported: index.documents.len(),
        skipped,
    };
    info!(exported = report.exported, skipped = report.skipped, "export finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::archive::ImportRequest;
    use crate::model::Token;

    fn request(title: &str, content: &str, tags: &[&str]) -> ImportRequest {
        ImportRequest {
            title: title.into(),
            content: content.into(),
            dictionary: "unidic-chuko".into(),
            paragraphs: vec![Paragraph {
                index: 0,
                content: content.into(),
                tokens: vec![Token::new(content, vec!["名詞".into()])],
            }],
            tags: tags.iter().map(|t| t.to_string()).collect(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn export_writes_documents_and_index() {
        let data = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let archive = Archive::open_at(data.path()).unwrap();

        let a = archive.import(request("春歌", "花の色は", &["和歌"])).unwrap();
        archive.import(request("物語", "いづれの御時にか", &[])).unwrap();

        let report = export_archive(&archive, out.path()).unwrap();
        assert_eq!(report.exported, 2);
        assert_eq!(report.skipped, 0);

        let doc_path = out
            .path()
            .join("documents")
            .join(format!("{:03}.json", a.id.get()));
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(doc_path).unwrap()).unwrap();
        assert_eq!(doc["content"], "花の色は");
        assert_eq!(doc["paragraphs"][0]["tokens"][0]["surface"], "花の色は");

        let index: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.path().join("index.json")).unwrap())
                .unwrap();
        assert_eq!(index["documents"].as_array().unwrap().len(), 2);
        let first = &index["documents"][0];
        assert_eq!(first["title"], "春歌");
        assert_eq!(first["tags"][0], "和歌");
        // Seeded vocabulary appears alongside the tags in use.
        assert!(index["tags"].as_array().unwrap().len() > 1);
    }

    #[test]
    fn unreadable_shard_is_skipped_not_fatal() {
        let data = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let archive = Archive::open_at(data.path()).unwrap();

        let kept = archive.import(request("kept", "花の色は", &[])).unwrap();
        let broken = archive.import(request("broken", "移りにけりな", &[])).unwrap();

        // Corrupt the second shard out-of-band.
        let locator = archive
            .registry()
            .locate(broken.id)
            .unwrap();
        std::fs::write(
            archive.paths().shards_dir().join(format!("{locator}.shard")),
            b"garbage",
        )
        .unwrap();

        let report = export_archive(&archive, out.path()).unwrap();
        assert_eq!(report.exported, 1);
        assert_eq!(report.skipped, 1);

        let index: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.path().join("index.json")).unwrap())
                .unwrap();
        assert_eq!(index["documents"].as_array().unwrap().len(), 1);
        assert_eq!(index["documents"][0]["id"], kept.id.get());
    }

    #[test]
    fn export_of_empty_archive_writes_index() {
        let data = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let archive = Archive::open_at(data.path()).unwrap();

        let report = export_archive(&archive, out.path()).unwrap();
        assert_eq!(report.exported, 0);
        assert!(out.path().join("index.json").is_file());
    }

    #[test]
    fn replace_tags_reflected_in_export() {
        let data = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let archive = Archive::open_at(data.path()).unwrap();

        let doc = archive.import(request("t", "花の色は", &["A", "B"])).unwrap();
        let replacement: BTreeSet<String> = ["C".to_string()].into();
        archive.replace_tags(doc.id, &replacement).unwrap();

        export_archive(&archive, out.path()).unwrap();
        let index: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.path().join("index.json")).unwrap())
                .unwrap();
        let tags = index["documents"][0]["tags"].as_array().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0], "C");
    }
}
