//! Durability tests: everything must survive a close/reopen cycle.

use std::collections::BTreeMap;

use fumikura::archive::{Archive, ImportRequest};
use fumikura::model::{Paragraph, ShardPayload, Token};
use fumikura::query::DocumentFilter;
use fumikura::shard::{FileShardStore, ShardStore};

fn request(title: &str, content: &str, tags: &[&str]) -> ImportRequest {
    ImportRequest {
        title: title.into(),
        content: content.into(),
        dictionary: "unidic-chuko".into(),
        paragraphs: vec![Paragraph {
            index: 0,
            content: content.into(),
            tokens: vec![Token::new(content, vec!["名詞".to_string()])],
        }],
        tags: tags.iter().map(|t| t.to_string()).collect(),
        metadata: BTreeMap::new(),
    }
}

#[test]
fn documents_survive_reopen() {
    let dir = tempfile::TempDir::new().unwrap();

    let id = {
        let archive = Archive::open_at(dir.path()).unwrap();
        let mut req = request("花の色は", "花の色は移りにけりな", &["和歌"]);
        req.metadata = [("author".to_string(), "小野小町".to_string())].into();
        archive.import(req).unwrap().id
    };

    let archive = Archive::open_at(dir.path()).unwrap();
    let record = archive.document(id).unwrap();
    assert_eq!(record.summary.title, "花の色は");
    assert_eq!(record.content, "花の色は移りにけりな");
    assert_eq!(record.summary.tags[0].name, "和歌");
    assert_eq!(
        record.summary.metadata.get("author").map(String::as_str),
        Some("小野小町")
    );
}

#[test]
fn dedup_works_across_reopen() {
    let dir = tempfile::TempDir::new().unwrap();

    let first = {
        let archive = Archive::open_at(dir.path()).unwrap();
        archive.import(request("t", "same content", &[])).unwrap()
    };

    let archive = Archive::open_at(dir.path()).unwrap();
    let second = archive.import(request("t2", "same content", &[])).unwrap();
    assert_eq!(first.id, second.id);
    assert!(second.deduplicated);
}

#[test]
fn document_ids_are_never_reused() {
    let dir = tempfile::TempDir::new().unwrap();

    let deleted = {
        let archive = Archive::open_at(dir.path()).unwrap();
        let outcome = archive.import(request("gone", "c1", &[])).unwrap();
        archive.delete(outcome.id).unwrap();
        outcome.id
    };

    let archive = Archive::open_at(dir.path()).unwrap();
    let fresh = archive.import(request("new", "c2", &[])).unwrap();
    assert!(fresh.id.get() > deleted.get());
}

#[test]
fn orphan_shards_are_swept_on_reopen() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let archive = Archive::open_at(dir.path()).unwrap();
        archive.import(request("kept", "c1", &[])).unwrap();
    }

    // Plant a shard no registry row references, as a crash between shard
    // publish and registry commit would leave behind.
    {
        let shards = FileShardStore::open(dir.path().join("shards")).unwrap();
        shards
            .populate(
                "doc_42_orphan",
                &ShardPayload {
                    content: "orphan".into(),
                    paragraphs: Vec::new(),
                },
            )
            .unwrap();
        assert_eq!(shards.locators().unwrap().len(), 2);
    }

    let _archive = Archive::open_at(dir.path()).unwrap();
    let shards = FileShardStore::open(dir.path().join("shards")).unwrap();
    let locators = shards.locators().unwrap();
    assert_eq!(locators.len(), 1);
    assert!(locators[0].starts_with("doc_1_"));
}

#[test]
fn abandoned_staging_files_are_cleared_on_reopen() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let archive = Archive::open_at(dir.path()).unwrap();
        archive.import(request("kept", "c1", &[])).unwrap();
    }

    // A crash before a shard's publish rename leaves a staging file behind.
    let staging = dir.path().join("shards").join("doc_7_half.staging");
    std::fs::write(&staging, b"partial").unwrap();

    let _archive = Archive::open_at(dir.path()).unwrap();
    assert!(!staging.exists());

    let shards = FileShardStore::open(dir.path().join("shards")).unwrap();
    assert_eq!(shards.locators().unwrap().len(), 1);
}

#[test]
fn taxonomy_seeding_is_stable_across_reopens() {
    let dir = tempfile::TempDir::new().unwrap();

    let baseline = {
        let archive = Archive::open_at(dir.path()).unwrap();
        archive.taxonomy().all_tags().unwrap().len()
    };

    for _ in 0..3 {
        let archive = Archive::open_at(dir.path()).unwrap();
        assert_eq!(archive.taxonomy().all_tags().unwrap().len(), baseline);
    }
}

#[test]
fn promoted_tag_category_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let archive = Archive::open_at(dir.path()).unwrap();
        archive.import(request("t", "c", &["勅撰集"])).unwrap();
        archive.taxonomy().ensure_tag("勅撰集", "source").unwrap();
    }

    let archive = Archive::open_at(dir.path()).unwrap();
    let tag = archive.taxonomy().get("勅撰集").unwrap().unwrap();
    assert_eq!(tag.category, "source");
}

#[test]
fn mutation_order_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();

    let (first, second) = {
        let archive = Archive::open_at(dir.path()).unwrap();
        let first = archive.import(request("一", "c1", &[])).unwrap();
        let second = archive.import(request("二", "c2", &[])).unwrap();
        archive.update_title(first.id, "改題").unwrap();
        (first, second)
    };

    let archive = Archive::open_at(dir.path()).unwrap();
    let ids: Vec<u64> = archive
        .list(&DocumentFilter::default())
        .unwrap()
        .iter()
        .map(|s| s.id.get())
        .collect();
    assert_eq!(ids, vec![first.id.get(), second.id.get()]);
}
