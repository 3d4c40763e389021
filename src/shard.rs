//! Per-document shard storage.
//!
//! A shard is the isolated storage unit holding one document's original text
//! and its paragraph/token tree. Shards are write-once: they are provisioned,
//! populated exactly once, then only read or destroyed. The [`ShardStore`]
//! trait keeps the storage medium pluggable; [`FileShardStore`] realizes it
//! as one bincode file per document with a stage-then-publish write so a
//! reader sees either nothing or the complete document.

use std::path::{Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

use crate::error::{ShardError, ShardResult};
use crate::model::{DocumentId, ShardPayload};

/// Maximum length (in chars) of the sanitized-title part of a locator.
const LOCATOR_TITLE_LEN: usize = 50;

/// Suffix of published shard files.
const SHARD_SUFFIX: &str = ".shard";

/// Suffix of provisioned-but-unpublished shard files.
const STAGING_SUFFIX: &str = ".staging";

/// Storage-unit contract: provision, populate once, read, destroy.
pub trait ShardStore: Send + Sync {
    /// Provision an empty shard under the locator. The provisioned state is
    /// never visible to readers.
    fn create(&self, locator: &str) -> ShardResult<()>;

    /// Publish the full payload in a single atomic step. After a failure
    /// mid-write, readers still see nothing under the locator.
    fn populate(&self, locator: &str, payload: &ShardPayload) -> ShardResult<()>;

    /// Read a published shard. [`ShardError::Missing`] if never published.
    fn read(&self, locator: &str) -> ShardResult<ShardPayload>;

    /// Physically remove the shard. Idempotent: destroying an absent shard
    /// is not an error.
    fn destroy(&self, locator: &str) -> ShardResult<()>;

    /// Whether a published shard exists under the locator.
    fn exists(&self, locator: &str) -> bool;

    /// All published locators, for reconciliation and export.
    fn locators(&self) -> ShardResult<Vec<String>>;
}

/// Derive a shard locator from a title and the document's numeric id.
///
/// The title is NFC-normalized, then reduced to ASCII alphanumerics,
/// underscore, CJK ideographs, hiragana, and katakana; everything else maps
/// to `_`, and the result is truncated to a bounded length. The id prefix
/// guarantees two titles that sanitize identically still get distinct
/// locators.
pub fn derive_locator(title: &str, id: DocumentId) -> String {
    let safe: String = title
        .nfc()
        .map(|c| if is_locator_char(c) { c } else { '_' })
        .take(LOCATOR_TITLE_LEN)
        .collect();
    format!("doc_{}_{safe}", id.get())
}

fn is_locator_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c == '_'
        || ('\u{4e00}'..='\u{9fff}').contains(&c) // CJK ideographs
        || ('\u{3040}'..='\u{309f}').contains(&c) // hiragana
        || ('\u{30a0}'..='\u{30ff}').contains(&c) // katakana
}

/// One file per shard under a flat directory.
#[derive(Debug)]
pub struct FileShardStore {
    dir: PathBuf,
}

impl FileShardStore {
    /// Open a shard store rooted at the given directory, creating it if needed.
    ///
    /// Staging files are in-flight writes; any still present at open time
    /// belong to an interrupted import and are removed.
    pub fn open(dir: impl Into<PathBuf>) -> ShardResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| ShardError::Io {
            locator: dir.display().to_string(),
            source: e,
        })?;
        let store = Self { dir };
        store.clear_stale_staging()?;
        Ok(store)
    }

    fn clear_stale_staging(&self) -> ShardResult<()> {
        let dir_err = |e: std::io::Error| ShardError::Io {
            locator: self.dir.display().to_string(),
            source: e,
        };
        for entry in std::fs::read_dir(&self.dir).map_err(dir_err)? {
            let entry = entry.map_err(dir_err)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(STAGING_SUFFIX) {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(dir_err(e)),
                }
            }
        }
        Ok(())
    }

    fn published_path(&self, locator: &str) -> PathBuf {
        self.dir.join(format!("{locator}{SHARD_SUFFIX}"))
    }

    fn staging_path(&self, locator: &str) -> PathBuf {
        self.dir.join(format!("{locator}{STAGING_SUFFIX}"))
    }

    /// Directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ShardStore for FileShardStore {
    fn create(&self, locator: &str) -> ShardResult<()> {
        std::fs::write(self.staging_path(locator), b"").map_err(|e| ShardError::Io {
            locator: locator.into(),
            source: e,
        })
    }

    fn populate(&self, locator: &str, payload: &ShardPayload) -> ShardResult<()> {
        let encoded = bincode::serialize(payload).map_err(|e| ShardError::Serialization {
            message: format!("encode shard payload: {e}"),
        })?;

        // Stage the complete payload, then publish with a rename. The rename
        // is the only step that makes the shard visible.
        let staging = self.staging_path(locator);
        std::fs::write(&staging, &encoded).map_err(|e| ShardError::Io {
            locator: locator.into(),
            source: e,
        })?;
        std::fs::rename(&staging, self.published_path(locator)).map_err(|e| ShardError::Io {
            locator: locator.into(),
            source: e,
        })?;
        Ok(())
    }

    fn read(&self, locator: &str) -> ShardResult<ShardPayload> {
        let path = self.published_path(locator);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ShardError::Missing {
                    locator: locator.into(),
                });
            }
            Err(e) => {
                return Err(ShardError::Io {
                    locator: locator.into(),
                    source: e,
                });
            }
        };
        bincode::deserialize(&bytes).map_err(|e| ShardError::Corrupt {
            locator: locator.into(),
            message: e.to_string(),
        })
    }

    fn destroy(&self, locator: &str) -> ShardResult<()> {
        for path in [self.published_path(locator), self.staging_path(locator)] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(ShardError::Io {
                        locator: locator.into(),
                        source: e,
                    });
                }
            }
        }
        Ok(())
    }

    fn exists(&self, locator: &str) -> bool {
        self.published_path(locator).is_file()
    }

    fn locators(&self) -> ShardResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| ShardError::Io {
            locator: self.dir.display().to_string(),
            source: e,
        })?;
        let mut locators = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ShardError::Io {
                locator: self.dir.display().to_string(),
                source: e,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(locator) = name.strip_suffix(SHARD_SUFFIX) {
                locators.push(locator.to_string());
            }
        }
        locators.sort();
        Ok(locators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Paragraph, Token};

    fn payload(content: &str) -> ShardPayload {
        ShardPayload {
            content: content.into(),
            paragraphs: vec![Paragraph {
                index: 0,
                content: content.into(),
                tokens: vec![Token::new(content, vec!["名詞".into()])],
            }],
        }
    }

    #[test]
    fn locator_keeps_japanese_and_replaces_punctuation() {
        let loc = derive_locator("古今和歌集！", DocumentId::new(3));
        assert_eq!(loc, "doc_3_古今和歌集_");
    }

    #[test]
    fn identical_sanitized_titles_get_distinct_locators() {
        let a = derive_locator("古今和歌集！", DocumentId::new(1));
        let b = derive_locator("古今和歌集？", DocumentId::new(2));
        assert_ne!(a, b);
    }

    #[test]
    fn locator_title_is_bounded() {
        let long = "あ".repeat(200);
        let loc = derive_locator(&long, DocumentId::new(9));
        assert_eq!(loc.chars().count(), "doc_9_".chars().count() + LOCATOR_TITLE_LEN);
    }

    #[test]
    fn populate_then_read_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileShardStore::open(dir.path()).unwrap();

        store.create("doc_1_test").unwrap();
        store.populate("doc_1_test", &payload("花の色は")).unwrap();

        let read = store.read("doc_1_test").unwrap();
        assert_eq!(read.content, "花の色は");
        assert_eq!(read.paragraphs.len(), 1);
    }

    #[test]
    fn provisioned_shard_is_not_visible() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileShardStore::open(dir.path()).unwrap();

        store.create("doc_2_staged").unwrap();
        assert!(!store.exists("doc_2_staged"));
        assert!(matches!(
            store.read("doc_2_staged"),
            Err(ShardError::Missing { .. })
        ));
        assert!(store.locators().unwrap().is_empty());
    }

    #[test]
    fn destroy_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileShardStore::open(dir.path()).unwrap();

        store.populate("doc_3_x", &payload("x")).unwrap();
        store.destroy("doc_3_x").unwrap();
        store.destroy("doc_3_x").unwrap();
        assert!(!store.exists("doc_3_x"));
    }

    #[test]
    fn reopen_clears_abandoned_staging_files() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let store = FileShardStore::open(dir.path()).unwrap();
            store.populate("doc_1_kept", &payload("kept")).unwrap();
            // An interrupted import leaves a provisioned-but-unpublished file.
            store.create("doc_2_abandoned").unwrap();
        }
        assert!(dir.path().join("doc_2_abandoned.staging").is_file());

        let store = FileShardStore::open(dir.path()).unwrap();
        assert!(!dir.path().join("doc_2_abandoned.staging").is_file());
        assert_eq!(store.locators().unwrap(), vec!["doc_1_kept"]);
        assert_eq!(store.read("doc_1_kept").unwrap().content, "kept");
    }

    #[test]
    fn corrupt_payload_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileShardStore::open(dir.path()).unwrap();

        std::fs::write(dir.path().join("doc_4_bad.shard"), b"not bincode").unwrap();
        assert!(matches!(
            store.read("doc_4_bad"),
            Err(ShardError::Corrupt { .. })
        ));
    }

    #[test]
    fn locators_lists_published_only() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileShardStore::open(dir.path()).unwrap();

        store.populate("doc_1_a", &payload("a")).unwrap();
        store.populate("doc_2_b", &payload("b")).unwrap();
        store.create("doc_3_c").unwrap();

        assert_eq!(store.locators().unwrap(), vec!["doc_1_a", "doc_2_b"]);
    }
}
