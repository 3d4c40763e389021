// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # fumikura
//!
//! A content-addressed archive for morphologically analyzed classical
//! Japanese texts.
//!
//! ## Architecture
//!
//! - **Registry** (`registry`): authoritative catalog in redb, single-txn writes
//! - **Shards** (`shard`): one write-once file per document with the text and
//!   its paragraph/token analysis tree
//! - **Digest** (`digest`): SHA-256 content identity over (text, dictionary)
//!   driving import deduplication
//! - **Taxonomy** (`taxonomy`): categorized tag vocabulary with a seeded
//!   starter set
//! - **Export** (`export`): static JSON tree for web frontends
//!
//! ## Library usage
//!
//! ```no_run
//! use std::collections::{BTreeMap, BTreeSet};
//! use fumikura::archive::{Archive, ImportRequest};
//! use fumikura::provider::{self, SurfaceProvider};
//!
//! let archive = Archive::open_at(".fumikura").unwrap();
//! let content = "花の色は移りにけりないたづらに".to_string();
//! let paragraphs = provider::analyze(&SurfaceProvider, &content, "unidic-chuko").unwrap();
//! let outcome = archive.import(ImportRequest {
//!     title: "小倉百人一首 九".into(),
//!     content,
//!     dictionary: "unidic-chuko".into(),
//!     paragraphs,
//!     tags: BTreeSet::from(["和歌".to_string()]),
//!     metadata: BTreeMap::new(),
//! }).unwrap();
//! println!("stored as {}", outcome.id);
//! ```

pub mod archive;
pub mod digest;
pub mod error;
pub mod export;
pub mod model;
pub mod paths;
pub mod provider;
pub mod query;
pub mod registry;
pub mod shard;
pub mod taxonomy;
