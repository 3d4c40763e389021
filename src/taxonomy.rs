//! Categorized tag vocabulary.
//!
//! Tags live in the registry database but have their own lifecycle: a fixed
//! starter vocabulary is seeded idempotently at startup, free-form tags are
//! created on demand under the default category, and ad-hoc tags can later be
//! promoted into a recognized category without touching their document
//! associations. Pruning only ever removes tags no document holds.

use std::collections::BTreeMap;
use std::sync::Arc;

use redb::{Database, ReadableTable};

use crate::error::{TaxonomyError, TaxonomyResult};
use crate::model::{Tag, TagCategory, TagUsage};
use crate::registry::{CATEGORIES, COUNTERS, DOC_TAGS, TAG_NAMES, TAGS};

/// Starter categories: (name, display label, description).
const SEED_CATEGORIES: &[(&str, &str, &str)] = &[
    ("era", "時代", "文本所属的历史时代"),
    ("style", "文体", "文本的文体风格"),
    ("author", "作者", "文本的作者"),
    ("genre", "类型", "文本的体裁类型"),
    ("source", "出典", "文本的出处来源"),
];

/// Starter tags: (name, category).
const SEED_TAGS: &[(&str, &str)] = &[
    ("上代", "era"),
    ("平安前期(781-900)", "era"),
    ("平安中期(901-1072)", "era"),
    ("平安後期(1073-1159)", "era"),
    ("源平時代(1160-1221)", "era"),
    ("鎌倉時代", "era"),
    ("室町時代", "era"),
    ("戦国時代", "era"),
    ("江戸時代", "era"),
    ("近代", "era"),
    ("和歌", "style"),
    ("物語", "style"),
    ("日記", "style"),
    ("随筆", "style"),
    ("漢文", "style"),
    ("仮名文", "style"),
    ("説話", "style"),
    ("軍記", "style"),
];

/// Era tags superseded by the dated vocabulary; pruned when unused.
const LEGACY_ERA_TAGS: &[&str] = &["奈良時代", "平安時代", "明治時代", "中古", "中世", "近世"];

fn db_err(e: impl std::fmt::Display) -> TaxonomyError {
    TaxonomyError::Db {
        message: e.to_string(),
    }
}

fn encode_err(e: impl std::fmt::Display) -> TaxonomyError {
    TaxonomyError::Serialization {
        message: e.to_string(),
    }
}

/// Manages the tag vocabulary and its categories.
pub struct TagTaxonomy {
    db: Arc<Database>,
}

impl TagTaxonomy {
    pub(crate) fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Seed the starter vocabulary. Idempotent; safe to call on every startup.
    ///
    /// Also retires the legacy era vocabulary and deprecated genre tags, but
    /// only where no document association exists.
    pub fn seed(&self) -> TaxonomyResult<()> {
        let txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut categories = txn.open_table(CATEGORIES).map_err(db_err)?;
            for (name, display_name, description) in SEED_CATEGORIES {
                if categories.get(*name).map_err(db_err)?.is_none() {
                    let row = TagCategory {
                        name: (*name).into(),
                        display_name: (*display_name).into(),
                        description: (*description).into(),
                    };
                    let encoded = bincode::serialize(&row).map_err(encode_err)?;
                    categories.insert(*name, encoded.as_slice()).map_err(db_err)?;
                }
            }

            let mut tags = txn.open_table(TAGS).map_err(db_err)?;
            let mut tag_names = txn.open_table(TAG_NAMES).map_err(db_err)?;
            let mut counters = txn.open_table(COUNTERS).map_err(db_err)?;
            for (name, category) in SEED_TAGS {
                if tag_names.get(*name).map_err(db_err)?.is_none() {
                    insert_tag(&mut tags, &mut tag_names, &mut counters, name, category)?;
                }
            }

            // Retire legacy vocabulary. In-use tags are kept regardless.
            let doc_tags = txn.open_table(DOC_TAGS).map_err(db_err)?;
            let used = used_tag_ids(&doc_tags)?;

            let mut retire: Vec<Tag> = Vec::new();
            for item in tags.iter().map_err(db_err)? {
                let (_, value) = item.map_err(db_err)?;
                let tag: Tag = bincode::deserialize(value.value()).map_err(encode_err)?;
                let legacy =
                    LEGACY_ERA_TAGS.contains(&tag.name.as_str()) || tag.category == "genre";
                if legacy && !used.contains_key(&tag.id) {
                    retire.push(tag);
                }
            }
            for tag in retire {
                tags.remove(tag.id).map_err(db_err)?;
                tag_names.remove(tag.name.as_str()).map_err(db_err)?;
            }
        }
        txn.commit().map_err(db_err)?;
        Ok(())
    }

    /// Create the tag if absent; if present under a different category,
    /// recategorize it in place. Document associations are untouched either
    /// way.
    pub fn ensure_tag(&self, name: &str, category: &str) -> TaxonomyResult<Tag> {
        let txn = self.db.begin_write().map_err(db_err)?;
        let tag = {
            let mut tags = txn.open_table(TAGS).map_err(db_err)?;
            let mut tag_names = txn.open_table(TAG_NAMES).map_err(db_err)?;
            let mut counters = txn.open_table(COUNTERS).map_err(db_err)?;

            let existing_id = tag_names.get(name).map_err(db_err)?.map(|g| g.value());
            match existing_id {
                Some(id) => {
                    let mut tag: Tag = {
                        let guard = tags.get(id).map_err(db_err)?.ok_or_else(|| {
                            TaxonomyError::Db {
                                message: format!("tag name index points at missing tag {id}"),
                            }
                        })?;
                        bincode::deserialize(guard.value()).map_err(encode_err)?
                    };
                    if tag.category != category {
                        tag.category = category.to_string();
                        let encoded = bincode::serialize(&tag).map_err(encode_err)?;
                        tags.insert(id, encoded.as_slice()).map_err(db_err)?;
                    }
                    tag
                }
                None => insert_tag(&mut tags, &mut tag_names, &mut counters, name, category)?,
            }
        };
        txn.commit().map_err(db_err)?;
        Ok(tag)
    }

    /// Delete the named tags, skipping any with document associations.
    /// Returns the number actually removed.
    pub fn prune<S: AsRef<str>>(&self, candidates: &[S]) -> TaxonomyResult<usize> {
        let txn = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut tags = txn.open_table(TAGS).map_err(db_err)?;
            let mut tag_names = txn.open_table(TAG_NAMES).map_err(db_err)?;
            let doc_tags = txn.open_table(DOC_TAGS).map_err(db_err)?;
            let used = used_tag_ids(&doc_tags)?;

            let mut removed = 0;
            for name in candidates {
                let name = name.as_ref();
                let Some(id) = tag_names.get(name).map_err(db_err)?.map(|g| g.value()) else {
                    continue;
                };
                if used.contains_key(&id) {
                    continue;
                }
                tags.remove(id).map_err(db_err)?;
                tag_names.remove(name).map_err(db_err)?;
                removed += 1;
            }
            removed
        };
        txn.commit().map_err(db_err)?;
        Ok(removed)
    }

    /// All tags with their document usage counts, ordered by category then name.
    pub fn all_tags(&self) -> TaxonomyResult<Vec<TagUsage>> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let tags = txn.open_table(TAGS).map_err(db_err)?;
        let doc_tags = txn.open_table(DOC_TAGS).map_err(db_err)?;
        let used = used_tag_ids(&doc_tags)?;

        let mut usages = Vec::new();
        for item in tags.iter().map_err(db_err)? {
            let (_, value) = item.map_err(db_err)?;
            let tag: Tag = bincode::deserialize(value.value()).map_err(encode_err)?;
            let doc_count = used.get(&tag.id).copied().unwrap_or(0);
            usages.push(TagUsage {
                id: tag.id,
                name: tag.name,
                category: tag.category,
                doc_count,
            });
        }
        usages.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        Ok(usages)
    }

    /// All tag categories, ordered by name.
    pub fn categories(&self) -> TaxonomyResult<Vec<TagCategory>> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let categories = txn.open_table(CATEGORIES).map_err(db_err)?;
        let mut out = Vec::new();
        for item in categories.iter().map_err(db_err)? {
            let (_, value) = item.map_err(db_err)?;
            out.push(bincode::deserialize(value.value()).map_err(encode_err)?);
        }
        out.sort_by(|a: &TagCategory, b: &TagCategory| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Look up a tag by name.
    pub fn get(&self, name: &str) -> TaxonomyResult<Option<Tag>> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let tags = txn.open_table(TAGS).map_err(db_err)?;
        let tag_names = txn.open_table(TAG_NAMES).map_err(db_err)?;
        let Some(id) = tag_names.get(name).map_err(db_err)?.map(|g| g.value()) else {
            return Ok(None);
        };
        let Some(guard) = tags.get(id).map_err(db_err)? else {
            return Ok(None);
        };
        Ok(Some(bincode::deserialize(guard.value()).map_err(encode_err)?))
    }
}

fn insert_tag(
    tags: &mut redb::Table<'_, u64, &'static [u8]>,
    tag_names: &mut redb::Table<'_, &'static str, u64>,
    counters: &mut redb::Table<'_, &'static str, u64>,
    name: &str,
    category: &str,
) -> TaxonomyResult<Tag> {
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
    tags.insert(next, encoded.as_slice()).map_err(db_err)?;
    tag_names.insert(name, next).map_err(db_err)?;
    Ok(tag)
}

/// Per-tag association counts from the document-tag table.
fn used_tag_ids(
    doc_tags: &impl ReadableTable<(u64, u64), ()>,
) -> TaxonomyResult<BTreeMap<u64, u64>> {
    let mut used = BTreeMap::new();
    for item in doc_tags.iter().map_err(db_err)? {
        let (key, _) = item.map_err(db_err)?;
        let (_, tag_id) = key.value();
        *used.entry(tag_id).or_insert(0) += 1;
    }
    Ok(used)
}
