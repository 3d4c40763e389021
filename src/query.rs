//! Listing and filtering over the registry catalog.

use crate::error::{RegistryError, RegistryResult};
use crate::model::DocumentSummary;
use crate::registry::Registry;

/// Filter over the document catalog.
///
/// Tag names combine disjunctively (a document matches if it holds any of
/// them); the category filter combines conjunctively with the tag filter,
/// and when both are given a single tag must satisfy both predicates. An
/// empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    /// Match documents holding at least one of these tag names.
    pub tags: Option<Vec<String>>,
    /// Match documents holding at least one tag in this category.
    pub category: Option<String>,
}

impl DocumentFilter {
    pub fn is_empty(&self) -> bool {
        self.tags.is_none() && self.category.is_none()
    }

    fn matches(&self, summary: &DocumentSummary) -> bool {
        match (&self.tags, &self.category) {
            (Some(tags), Some(category)) => summary.tags.iter().any(|label| {
                tags.iter().any(|t| t == &label.name) && &label.category == category
            }),
            (Some(tags), None) => summary
                .tags
                .iter()
                .any(|label| tags.iter().any(|t| t == &label.name)),
            (None, Some(category)) => {
                summary.tags.iter().any(|label| &label.category == category)
            }
            (None, None) => true,
        }
    }
}

/// List document summaries matching the filter, most recently updated first.
/// Ties on `updated_at` fall back to descending id.
pub fn list_documents(
    registry: &Registry,
    filter: &DocumentFilter,
) -> RegistryResult<Vec<DocumentSummary>> {
    let mut summaries = Vec::new();
    for row in registry.document_rows()? {
        // Each summary read runs in its own snapshot, so a document deleted
        // after the catalog scan simply drops out of the listing.
        let summary = match registry.summary(row.id) {
            Ok(summary) => summary,
            Err(RegistryError::DocumentNotFound { .. }) => continue,
            Err(e) => return Err(e),
        };
        if filter.matches(&summary) {
            summaries.push(summary);
        }
    }
    summaries.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::model::{DocumentId, DocumentRow};

    fn seeded_registry() -> (tempfile::TempDir, Registry) {
        let dir = tempfile::TempDir::new().unwrap();
        let registry = Registry::open(&dir.path().join("registry.redb")).unwrap();

        let docs: [(u64, u64, &[&str]); 3] = [
            (1, 1000, &["和歌", "平安"]),
            (2, 2000, &["物語"]),
            (3, 3000, &["和歌"]),
        ];
        for (id, updated_at, tags) in docs {
            let row = DocumentRow {
                id: DocumentId::new(id),
                title: format!("doc-{id}"),
                locator: format!("doc_{id}_t"),
                digest: format!("digest-{id}"),
                dictionary: "unidic-chuko".into(),
                paragraph_count: 1,
                token_count: 1,
                created_at: updated_at,
                updated_at,
            };
            let tags: BTreeSet<String> = tags.iter().map(|t| t.to_string()).collect();
            registry
                .insert_document(&row, &tags, &BTreeMap::new())
                .unwrap();
        }
        (dir, registry)
    }

    #[test]
    fn empty_filter_lists_all_newest_first() {
        let (_dir, registry) = seeded_registry();
        let all = list_documents(&registry, &DocumentFilter::default()).unwrap();
        let ids: Vec<u64> = all.iter().map(|s| s.id.get()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn tag_filter_is_disjunctive() {
        let (_dir, registry) = seeded_registry();
        let filter = DocumentFilter {
            tags: Some(vec!["和歌".into(), "物語".into()]),
            category: None,
        };
        let ids: Vec<u64> = list_documents(&registry, &filter)
            .unwrap()
            .iter()
            .map(|s| s.id.get())
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn category_filter_conjoins_with_tags() {
        let (_dir, registry) = seeded_registry();
        // All tags were created under the default category, so filtering on a
        // category nothing holds yields an empty result even when the tag
        // filter alone would match.
        let filter = DocumentFilter {
            tags: Some(vec!["和歌".into()]),
            category: Some("era".into()),
        };
        assert!(list_documents(&registry, &filter).unwrap().is_empty());

        let filter = DocumentFilter {
            tags: Some(vec!["和歌".into()]),
            category: Some(crate::model::DEFAULT_CATEGORY.into()),
        };
        let ids: Vec<u64> = list_documents(&registry, &filter)
            .unwrap()
            .iter()
            .map(|s| s.id.get())
            .collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn both_filters_must_hit_the_same_tag() {
        let dir = tempfile::TempDir::new().unwrap();
        let registry = Registry::open(&dir.path().join("registry.redb")).unwrap();
        let taxonomy = crate::taxonomy::TagTaxonomy::new(registry.database());
        taxonomy.ensure_tag("上代", "era").unwrap();

        let row = DocumentRow {
            id: DocumentId::new(1),
            title: "萬葉集".into(),
            locator: "doc_1_萬葉集".into(),
            digest: "d1".into(),
            dictionary: "unidic-chuko".into(),
            paragraph_count: 1,
            token_count: 1,
            created_at: 1000,
            updated_at: 1000,
        };
        let tags: BTreeSet<String> = ["和歌".to_string(), "上代".to_string()].into();
        registry
            .insert_document(&row, &tags, &BTreeMap::new())
            .unwrap();

        // 和歌 sits in the default category and 上代 in era. No single tag
        // is both named 和歌 and categorized era, so the combined filter
        // must not match.
        let filter = DocumentFilter {
            tags: Some(vec!["和歌".into()]),
            category: Some("era".into()),
        };
        assert!(list_documents(&registry, &filter).unwrap().is_empty());

        let filter = DocumentFilter {
            tags: Some(vec!["上代".into()]),
            category: Some("era".into()),
        };
        assert_eq!(list_documents(&registry, &filter).unwrap().len(), 1);
    }

    #[test]
    fn unmatched_tag_yields_empty() {
        let (_dir, registry) = seeded_registry();
        let filter = DocumentFilter {
            tags: Some(vec!["軍記".into()]),
            category: None,
        };
        assert!(list_documents(&registry, &filter).unwrap().is_empty());
    }
}
