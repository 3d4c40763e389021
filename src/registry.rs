//! Authoritative document catalog backed by redb.
//!
//! The registry owns every uniqueness constraint in the archive: one row per
//! document, one document per content digest, globally unique tag names, and
//! unique (document, metadata-key) pairs. All writes go through single redb
//! transactions, so multi-table mutations (create, cascade delete, tag
//! replacement) commit or abort as a unit. Reads use MVCC snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::digest::ContentDigest;
use crate::error::{RegistryError, RegistryResult};
use crate::model::{DEFAULT_CATEGORY, DocumentId, DocumentRow, DocumentSummary, Tag};

/// Document id → bincode-encoded [`DocumentRow`].
const DOCUMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("documents");

/// Hex content digest → document id. Enforces at most one stored copy per
/// identical (content, dictionary) pair.
const DIGESTS: TableDefinition<&str, u64> = TableDefinition::new("digests");

/// Tag id → bincode-encoded [`Tag`].
pub(crate) const TAGS: TableDefinition<u64, &[u8]> = TableDefinition::new("tags");

/// Tag name → tag id. Enforces global tag-name uniqueness.
pub(crate) const TAG_NAMES: TableDefinition<&str, u64> = TableDefinition::new("tag_names");

/// Category name → bincode-encoded [`TagCategory`].
pub(crate) const CATEGORIES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("tag_categories");

/// (document id, tag id) association set.
pub(crate) const DOC_TAGS: TableDefinition<(u64, u64), ()> =
    TableDefinition::new("document_tags");

/// (document id, key) → value. Free-form metadata, unique per pair.
const DOC_META: TableDefinition<(u64, &str), &str> = TableDefinition::new("document_metadata");

/// Monotonic id counters ("document", "tag").
pub(crate) const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

pub(crate) fn db_err(e: impl std::fmt::Display) -> RegistryError {
    RegistryError::Db {
        message: e.to_string(),
    }
}

fn encode_err(e: impl std::fmt::Display) -> RegistryError {
    RegistryError::Serialization {
        message: e.to_string(),
    }
}

/// Current time in epoch milliseconds.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The registry store. Cheap to clone via the shared database handle.
pub struct Registry {
    db: Arc<Database>,
}

impl Registry {
    /// Open or create the registry database at the given file path.
    ///
    /// All tables are created up front so later read transactions never
    /// observe a missing table.
    pub fn open(path: &Path) -> RegistryResult<Self> {
        let db = Database::create(path).map_err(|e| RegistryError::Db {
            message: format!("failed to open registry at {}: {e}", path.display()),
        })?;
        let txn = db.begin_write().map_err(db_err)?;
        {
            txn.open_table(DOCUMENTS).map_err(db_err)?;
            txn.open_table(DIGESTS).map_err(db_err)?;
            txn.open_table(TAGS).map_err(db_err)?;
            txn.open_table(TAG_NAMES).map_err(db_err)?;
            txn.open_table(CATEGORIES).map_err(db_err)?;
            txn.open_table(DOC_TAGS).map_err(db_err)?;
            txn.open_table(DOC_META).map_err(db_err)?;
            txn.open_table(COUNTERS).map_err(db_err)?;
        }
        txn.commit().map_err(db_err)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Shared handle to the underlying database (taxonomy tables live here too).
    pub(crate) fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    /// Allocate the next document id. Persisted, monotonic; a crash between
    /// allocation and insert leaves a gap, never a reuse.
    pub fn allocate_document_id(&self) -> RegistryResult<DocumentId> {
        let txn = self.db.begin_write().map_err(db_err)?;
        let next = {
            let mut counters = txn.open_table(COUNTERS).map_err(db_err)?;
            let next = counters
                .get("document")
                .map_err(db_err)?
                .map(|g| g.value())
                .unwrap_or(0)
                + 1;
            counters.insert("document", next).map_err(db_err)?;
            next
        };
        txn.commit().map_err(db_err)?;
        Ok(DocumentId::new(next))
    }

    /// Look up a document id by content digest.
    pub fn find_by_digest(&self, digest: &ContentDigest) -> RegistryResult<Option<DocumentId>> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let digests = txn.open_table(DIGESTS).map_err(db_err)?;
        let found = digests
            .get(digest.as_str())
            .map_err(db_err)?
            .map(|g| DocumentId::new(g.value()));
        Ok(found)
    }

    /// Insert a fully prepared document row plus its initial tags and
    /// metadata in one transaction.
    ///
    /// Fails with [`RegistryError::DigestConflict`] if the digest is already
    /// registered — the caller resolves the conflict by reading the existing
    /// record; it is the intended recovery path, not a user-facing failure.
    pub fn insert_document(
        &self,
        row: &DocumentRow,
        tags: &BTreeSet<String>,
        metadata: &BTreeMap<String, String>,
    ) -> RegistryResult<()> {
        let txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut digests = txn.open_table(DIGESTS).map_err(db_err)?;
            if let Some(existing) = digests.get(row.digest.as_str()).map_err(db_err)? {
                let existing = existing.value();
                return Err(RegistryError::DigestConflict {
                    digest: row.digest.clone(),
                    existing,
                });
            }
            digests
                .insert(row.digest.as_str(), row.id.get())
                .map_err(db_err)?;

            let mut documents = txn.open_table(DOCUMENTS).map_err(db_err)?;
            let encoded = bincode::serialize(row).map_err(encode_err)?;
            documents
                .insert(row.id.get(), encoded.as_slice())
                .map_err(db_err)?;

            let mut tag_table = txn.open_table(TAGS).map_err(db_err)?;
            let mut tag_names = txn.open_table(TAG_NAMES).map_err(db_err)?;
            let mut counters = txn.open_table(COUNTERS).map_err(db_err)?;
            let mut doc_tags = txn.open_table(DOC_TAGS).map_err(db_err)?;
            for name in tags {
                let tag_id = ensure_tag_in_txn(
                    &mut tag_table,
                    &mut tag_names,
                    &mut counters,
                    name,
                    DEFAULT_CATEGORY,
                )?;
                doc_tags.insert((row.id.get(), tag_id), ()).map_err(db_err)?;
            }

            let mut doc_meta = txn.open_table(DOC_META).map_err(db_err)?;
            for (key, value) in metadata {
                doc_meta
                    .insert((row.id.get(), key.as_str()), value.as_str())
                    .map_err(db_err)?;
            }
        }
        txn.commit().map_err(db_err)?;
        Ok(())
    }

    /// Fetch a document's catalog row.
    pub fn row(&self, id: DocumentId) -> RegistryResult<DocumentRow> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let documents = txn.open_table(DOCUMENTS).map_err(db_err)?;
        let guard = documents
            .get(id.get())
            .map_err(db_err)?
            .ok_or(RegistryError::DocumentNotFound { id: id.get() })?;
        bincode::deserialize(guard.value()).map_err(encode_err)
    }

    /// Resolve a document's shard locator.
    pub fn locate(&self, id: DocumentId) -> RegistryResult<String> {
        Ok(self.row(id)?.locator)
    }

    /// Update the document's title. The shard locator is fixed at creation
    /// and deliberately not re-derived.
    pub fn update_title(&self, id: DocumentId, title: &str) -> RegistryResult<()> {
        let txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut documents = txn.open_table(DOCUMENTS).map_err(db_err)?;
            let mut row: DocumentRow = {
                let guard = documents
                    .get(id.get())
                    .map_err(db_err)?
                    .ok_or(RegistryError::DocumentNotFound { id: id.get() })?;
                bincode::deserialize(guard.value()).map_err(encode_err)?
            };
            row.title = title.to_string();
            row.updated_at = now_millis().max(row.updated_at + 1);
            let encoded = bincode::serialize(&row).map_err(encode_err)?;
            documents
                .insert(id.get(), encoded.as_slice())
                .map_err(db_err)?;
        }
        txn.commit().map_err(db_err)?;
        Ok(())
    }

    /// Upsert each metadata key. Keys absent from the map are left alone.
    pub fn update_metadata(
        &self,
        id: DocumentId,
        metadata: &BTreeMap<String, String>,
    ) -> RegistryResult<()> {
        let txn = self.db.begin_write().map_err(db_err)?;
        {
            bump_updated_at(&txn, id)?;
            let mut doc_meta = txn.open_table(DOC_META).map_err(db_err)?;
            for (key, value) in metadata {
                doc_meta
                    .insert((id.get(), key.as_str()), value.as_str())
                    .map_err(db_err)?;
            }
        }
        txn.commit().map_err(db_err)?;
        Ok(())
    }

    /// Replace the document's tag set wholesale: associations not in the new
    /// set are detached, new names are created under the default category.
    pub fn replace_tags(&self, id: DocumentId, tags: &BTreeSet<String>) -> RegistryResult<()> {
        let txn = self.db.begin_write().map_err(db_err)?;
        {
            bump_updated_at(&txn, id)?;

            let mut doc_tags = txn.open_table(DOC_TAGS).map_err(db_err)?;
            let stale: Vec<(u64, u64)> = doc_tags
                .iter()
                .map_err(db_err)?
                .filter_map(|item| item.ok().map(|(k, _)| k.value()))
                .filter(|(doc, _)| *doc == id.get())
                .collect();
            for key in stale {
                doc_tags.remove(key).map_err(db_err)?;
            }

            let mut tag_table = txn.open_table(TAGS).map_err(db_err)?;
            let mut tag_names = txn.open_table(TAG_NAMES).map_err(db_err)?;
            let mut counters = txn.open_table(COUNTERS).map_err(db_err)?;
            for name in tags {
                let tag_id = ensure_tag_in_txn(
                    &mut tag_table,
                    &mut tag_names,
                    &mut counters,
                    name,
                    DEFAULT_CATEGORY,
                )?;
                doc_tags.insert((id.get(), tag_id), ()).map_err(db_err)?;
            }
        }
        txn.commit().map_err(db_err)?;
        Ok(())
    }

    /// Delete a document, cascading to its tag associations, metadata, and
    /// digest entry. Returns the shard locator if the document existed, so
    /// the caller can destroy the shard; `Ok(None)` for an absent id.
    pub fn delete(&self, id: DocumentId) -> RegistryResult<Option<String>> {
        let txn = self.db.begin_write().map_err(db_err)?;
        let locator = {
            let mut documents = txn.open_table(DOCUMENTS).map_err(db_err)?;
            let row: Option<DocumentRow> = match documents.remove(id.get()).map_err(db_err)? {
                Some(guard) => Some(bincode::deserialize(guard.value()).map_err(encode_err)?),
                None => None,
            };
            let Some(row) = row else {
                return Ok(None);
            };

            let mut digests = txn.open_table(DIGESTS).map_err(db_err)?;
            digests.remove(row.digest.as_str()).map_err(db_err)?;

            let mut doc_tags = txn.open_table(DOC_TAGS).map_err(db_err)?;
            let stale: Vec<(u64, u64)> = doc_tags
                .iter()
                .map_err(db_err)?
                .filter_map(|item| item.ok().map(|(k, _)| k.value()))
                .filter(|(doc, _)| *doc == id.get())
                .collect();
            for key in stale {
                doc_tags.remove(key).map_err(db_err)?;
            }

            let mut doc_meta = txn.open_table(DOC_META).map_err(db_err)?;
            let stale_meta: Vec<(u64, String)> = doc_meta
                .iter()
                .map_err(db_err)?
                .filter_map(|item| {
                    item.ok()
                        .map(|(k, _)| (k.value().0, k.value().1.to_string()))
                })
                .filter(|(doc, _)| *doc == id.get())
                .collect();
            for (doc, key) in stale_meta {
                doc_meta.remove((doc, key.as_str())).map_err(db_err)?;
            }

            row.locator
        };
        txn.commit().map_err(db_err)?;
        Ok(Some(locator))
    }

    /// All catalog rows, unordered.
    pub fn document_rows(&self) -> RegistryResult<Vec<DocumentRow>> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let documents = txn.open_table(DOCUMENTS).map_err(db_err)?;
        let mut rows = Vec::new();
        for item in documents.iter().map_err(db_err)? {
            let (_, value) = item.map_err(db_err)?;
            rows.push(bincode::deserialize(value.value()).map_err(encode_err)?);
        }
        Ok(rows)
    }

    /// Tags associated with a document.
    pub fn tags_for(&self, id: DocumentId) -> RegistryResult<Vec<Tag>> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let doc_tags = txn.open_table(DOC_TAGS).map_err(db_err)?;
        let tag_table = txn.open_table(TAGS).map_err(db_err)?;

        let mut tags = Vec::new();
        for item in doc_tags.iter().map_err(db_err)? {
            let (key, _) = item.map_err(db_err)?;
            let (doc, tag_id) = key.value();
            if doc != id.get() {
                continue;
            }
            if let Some(guard) = tag_table.get(tag_id).map_err(db_err)? {
                tags.push(bincode::deserialize(guard.value()).map_err(encode_err)?);
            }
        }
        tags.sort_by(|a: &Tag, b: &Tag| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        Ok(tags)
    }

    /// Metadata key/value pairs of a document.
    pub fn metadata_for(&self, id: DocumentId) -> RegistryResult<BTreeMap<String, String>> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let doc_meta = txn.open_table(DOC_META).map_err(db_err)?;
        let mut metadata = BTreeMap::new();
        for item in doc_meta.iter().map_err(db_err)? {
            let (key, value) = item.map_err(db_err)?;
            let (doc, meta_key) = key.value();
            if doc == id.get() {
                metadata.insert(meta_key.to_string(), value.value().to_string());
            }
        }
        Ok(metadata)
    }

    /// Assemble the summary record for a document.
    pub fn summary(&self, id: DocumentId) -> RegistryResult<DocumentSummary> {
        let row = self.row(id)?;
        let tags = self.tags_for(id)?;
        let metadata = self.metadata_for(id)?;
        Ok(summary_from_parts(row, tags, metadata))
    }
}

pub(crate) fn summary_from_parts(
    row: DocumentRow,
    tags: Vec<Tag>,
    metadata: BTreeMap<String, String>,
) -> DocumentSummary {
    DocumentSummary {
        id: row.id,
        title: row.title,
        dictionary: row.dictionary,
        paragraph_count: row.paragraph_count,
        token_count: row.token_count,
        created_at: row.created_at,
        updated_at: row.updated_at,
        tags: tags.iter().map(Tag::label).collect(),
        metadata,
    }
}

/// Look up a tag by name inside a write transaction, creating it under the
/// given category when absent. Returns the tag id.
fn ensure_tag_in_txn(
    tag_table: &mut redb::Table<'_, u64, &'static [u8]>,
    tag_names: &mut redb::Table<'_, &'static str, u64>,
    counters: &mut redb::Table<'_, &'static str, u64>,
    name: &str,
    category: &str,
) -> RegistryResult<u64> {
    if let Some(existing) = tag_names.get(name).map_err(db_err)? {
        return Ok(existing.value());
    }
    let next = counters
        .get("tag")
        .map_err(db_err)?
        .map(|g| g.value())
        .unwrap_or(0)
        + 1;
    counters.insert("tag", next).map_err(db_err)?;

    let tag = Tag {
        id: next,
        name: name.to_string(),
        category: category.to_string(),
    };
    let encoded = bincode::serialize(&tag).map_err(encode_err)?;
    tag_table.insert(next, encoded.as_slice()).map_err(db_err)?;
    tag_names.insert(name, next).map_err(db_err)?;
    Ok(next)
}

/// Bump a document's `updated_at` inside an open write transaction.
///
/// The clock is forced strictly past the previous value so back-to-back
/// mutations within one millisecond still order correctly.
fn bump_updated_at(txn: &redb::WriteTransaction, id: DocumentId) -> RegistryResult<()> {
    let mut documents = txn.open_table(DOCUMENTS).map_err(db_err)?;
    let mut row: DocumentRow = {
        let guard = documents
            .get(id.get())
            .map_err(db_err)?
            .ok_or(RegistryError::DocumentNotFound { id: id.get() })?;
        bincode::deserialize(guard.value()).map_err(encode_err)?
    };
    row.updated_at = now_millis().max(row.updated_at + 1);
    let encoded = bincode::serialize(&row).map_err(encode_err)?;
    documents
        .insert(id.get(), encoded.as_slice())
        .map_err(db_err)?;
    Ok(())
}
