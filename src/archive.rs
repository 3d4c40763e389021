//! The archive facade.
//!
//! [`Archive`] binds the registry, the shard store, and the tag taxonomy into
//! one coherent surface. Document creation follows a strict order: the shard
//! is provisioned and fully populated first, then the registry row is
//! committed in a single transaction. A crash in between leaves an
//! unreferenced shard file and nothing in the catalog; such orphans are swept
//! on the next open. At no point does the catalog list a document whose shard
//! is not readable.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::digest::ContentDigest;
use crate::error::{ArchiveError, FumikuraResult, RegistryError};
use crate::model::{DocumentId, DocumentRecord, DocumentRow, DocumentSummary, Paragraph};
use crate::paths::FumiPaths;
use crate::query::{self, DocumentFilter};
use crate::registry::{self, Registry};
use crate::shard::{FileShardStore, ShardStore, derive_locator};
use crate::taxonomy::TagTaxonomy;

/// On-disk archive configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Override for the archive root; XDG data dir when unset.
    pub data_dir: Option<std::path::PathBuf>,
}

impl ArchiveConfig {
    /// Load the config file if it exists; defaults otherwise.
    pub fn load(path: &Path) -> FumikuraResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ArchiveError::Config {
                    path: path.display().to_string(),
                    message: e.to_string(),
                }
                .into());
            }
        };
        toml::from_str(&text).map_err(|e| {
            ArchiveError::Config {
                path: path.display().to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Resolve the directory layout this config points at.
    pub fn paths(&self) -> FumikuraResult<FumiPaths> {
        match &self.data_dir {
            Some(dir) => Ok(FumiPaths::at(dir.clone())),
            None => Ok(FumiPaths::resolve()?),
        }
    }
}

/// Everything needed to store one analyzed document.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub title: String,
    /// Original text, stored verbatim in the shard.
    pub content: String,
    /// Dictionary id the analysis was produced with.
    pub dictionary: String,
    /// Analysis tree, ordered by paragraph index.
    pub paragraphs: Vec<Paragraph>,
    pub tags: BTreeSet<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Result of an import: the document's id and whether an existing copy was
/// reused instead of storing a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    pub id: DocumentId,
    pub deduplicated: bool,
}

/// One opened archive: registry, shard store, and taxonomy over a shared
/// directory layout.
pub struct Archive {
    paths: FumiPaths,
    registry: Registry,
    shards: FileShardStore,
    taxonomy: TagTaxonomy,
}

impl Archive {
    /// Open (or initialize) the archive at the given layout.
    ///
    /// Seeds the tag taxonomy and sweeps shards left orphaned by an
    /// interrupted import.
    pub fn open(paths: FumiPaths) -> FumikuraResult<Self> {
        paths.ensure_dirs()?;
        let registry = Registry::open(&paths.registry_file())?;
        let taxonomy = TagTaxonomy::new(registry.database());
        taxonomy.seed()?;
        let shards = FileShardStore::open(paths.shards_dir())?;

        let archive = Self {
            paths,
            registry,
            shards,
            taxonomy,
        };
        archive.sweep_orphan_shards()?;
        Ok(archive)
    }

    /// Open the archive at an explicit data directory.
    pub fn open_at(data_dir: impl Into<std::path::PathBuf>) -> FumikuraResult<Self> {
        Self::open(FumiPaths::at(data_dir))
    }

    /// Remove shard files no registry row references. These only arise from
    /// a crash between shard publish and registry commit.
    fn sweep_orphan_shards(&self) -> FumikuraResult<()> {
        let referenced: BTreeSet<String> = self
            .registry
            .document_rows()?
            .into_iter()
            .map(|row| row.locator)
            .collect();
        for locator in self.shards.locators()? {
            if !referenced.contains(&locator) {
                warn!(%locator, "sweeping orphan shard");
                self.shards.destroy(&locator)?;
            }
        }
        Ok(())
    }

    /// Directory layout of this archive.
    pub fn paths(&self) -> &FumiPaths {
        &self.paths
    }

    /// The tag taxonomy of this archive.
    pub fn taxonomy(&self) -> &TagTaxonomy {
        &self.taxonomy
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn shards(&self) -> &dyn ShardStore {
        &self.shards
    }

    /// Check whether an identical (content, dictionary) pair is already stored.
    pub fn check_existing(
        &self,
        content: &str,
        dictionary: &str,
    ) -> FumikuraResult<Option<DocumentId>> {
        let digest = ContentDigest::compute(content, dictionary);
        Ok(self.registry.find_by_digest(&digest)?)
    }

    /// Store an analyzed document.
    ///
    /// Identical content under the same dictionary resolves to the already
    /// stored document instead of creating a second copy; the existing
    /// document is returned untouched (its tags and metadata are not merged
    /// with the request's).
    pub fn import(&self, request: ImportRequest) -> FumikuraResult<ImportOutcome> {
        if request.title.trim().is_empty() {
            return Err(ArchiveError::EmptyTitle.into());
        }
        if request.content.trim().is_empty() {
            return Err(ArchiveError::EmptyContent.into());
        }

        let digest = ContentDigest::compute(&request.content, &request.dictionary);
        if let Some(existing) = self.registry.find_by_digest(&digest)? {
            debug!(id = %existing, "import deduplicated against existing document");
            return Ok(ImportOutcome {
                id: existing,
                deduplicated: true,
            });
        }

        let id = self.registry.allocate_document_id()?;
        let locator = derive_locator(&request.title, id);

        // Shard first, registry second. The registry commit is what makes
        // the document exist; a failure before it leaves only an orphan
        // shard file for the next open to sweep.
        self.shards.create(&locator)?;
        let payload = crate::model::ShardPayload {
            content: request.content,
            paragraphs: request.paragraphs,
        };
        self.shards.populate(&locator, &payload)?;

        let token_count: u64 = payload
            .paragraphs
            .iter()
            .map(|p| p.tokens.len() as u64)
            .sum();
        let now = registry::now_millis();
        let row = DocumentRow {
            id,
            title: request.title,
            locator: locator.clone(),
            digest: digest.as_str().to_string(),
            dictionary: request.dictionary,
            paragraph_count: payload.paragraphs.len() as u64,
            token_count,
            created_at: now,
            updated_at: now,
        };

        match self
            .registry
            .insert_document(&row, &request.tags, &request.metadata)
        {
            Ok(()) => {
                info!(%id, %locator, "document stored");
                Ok(ImportOutcome {
                    id,
                    deduplicated: false,
                })
            }
            Err(RegistryError::DigestConflict { existing, .. }) => {
                // A concurrent import won the digest. Drop our shard and
                // resolve to the winner.
                self.shards.destroy(&locator)?;
                debug!(id = existing, "import lost digest race, resolving to winner");
                Ok(ImportOutcome {
                    id: DocumentId::new(existing),
                    deduplicated: true,
                })
            }
            Err(e) => {
                self.shards.destroy(&locator)?;
                Err(e.into())
            }
        }
    }

    /// Fetch the full document record: catalog summary plus shard payload.
    pub fn document(&self, id: DocumentId) -> FumikuraResult<DocumentRecord> {
        let summary = self.registry.summary(id)?;
        let locator = self.registry.locate(id)?;
        let payload = self.shards.read(&locator)?;
        Ok(DocumentRecord {
            summary,
            content: payload.content,
            paragraphs: payload.paragraphs,
        })
    }

    /// Fetch a document's catalog summary without touching its shard.
    pub fn summary(&self, id: DocumentId) -> FumikuraResult<DocumentSummary> {
        Ok(self.registry.summary(id)?)
    }

    /// List documents matching the filter, most recently updated first.
    pub fn list(&self, filter: &DocumentFilter) -> FumikuraResult<Vec<DocumentSummary>> {
        Ok(query::list_documents(&self.registry, filter)?)
    }

    /// Rename a document. The shard locator stays as derived at creation.
    pub fn update_title(&self, id: DocumentId, title: &str) -> FumikuraResult<()> {
        if title.trim().is_empty() {
            return Err(ArchiveError::EmptyTitle.into());
        }
        Ok(self.registry.update_title(id, title)?)
    }

    /// Upsert metadata keys on a document.
    pub fn update_metadata(
        &self,
        id: DocumentId,
        metadata: &BTreeMap<String, String>,
    ) -> FumikuraResult<()> {
        Ok(self.registry.update_metadata(id, metadata)?)
    }

    /// Replace a document's tag set wholesale.
    pub fn replace_tags(&self, id: DocumentId, tags: &BTreeSet<String>) -> FumikuraResult<()> {
        Ok(self.registry.replace_tags(id, tags)?)
    }

    /// Promote the document's `era` metadata value into the taxonomy and
    /// attach it as a tag. Returns whether an era value was present.
    ///
    /// The storage core never does this implicitly; callers setting an era
    /// through metadata invoke it explicitly.
    pub fn promote_era(&self, id: DocumentId) -> FumikuraResult<bool> {
        self.registry.row(id)?;
        let metadata = self.registry.metadata_for(id)?;
        let Some(era) = metadata.get("era") else {
            return Ok(false);
        };
        self.taxonomy.ensure_tag(era, "era")?;
        let mut tags: BTreeSet<String> = self
            .registry
            .tags_for(id)?
            .into_iter()
            .map(|t| t.name)
            .collect();
        if tags.insert(era.clone()) {
            self.registry.replace_tags(id, &tags)?;
        }
        Ok(true)
    }

    /// Delete a document and its shard. Returns whether anything was removed.
    ///
    /// The registry row goes first, so a failure mid-delete can leave an
    /// orphan shard but never a cataloged document without one.
    pub fn delete(&self, id: DocumentId) -> FumikuraResult<bool> {
        match self.registry.delete(id)? {
            Some(locator) => {
                self.shards.destroy(&locator)?;
                info!(%id, "document deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
