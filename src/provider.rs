//! Morphological analysis plumbing.
//!
//! The archive stores analysis output but does not bundle an analyzer
//! backend. [`Analyzer`] is the seam: callers plug in a backend per
//! dictionary, and [`CachingProvider`] memoizes instances because loading a
//! dictionary is expensive. [`SurfaceAnalyzer`] is the built-in fallback that
//! segments on whitespace and leaves every feature slot empty.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{AnalyzeError, AnalyzeResult};
use crate::model::{Paragraph, Token};

/// A selectable analysis dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryInfo {
    /// Machine id, as stored on documents and folded into content digests.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Short description of the dictionary's coverage.
    pub description: &'static str,
}

/// Dictionaries the archive recognizes.
pub const DICTIONARIES: &[DictionaryInfo] = &[
    DictionaryInfo {
        id: "unidic-chuko",
        name: "UniDic 中古",
        description: "中古日本語辞書（平安時代）",
    },
    DictionaryInfo {
        id: "unidic-kindaibungo",
        name: "UniDic 近代文語",
        description: "近代文語辞書（明治・大正）",
    },
    DictionaryInfo {
        id: "unidic-waka",
        name: "UniDic 和歌",
        description: "和歌辞書",
    },
];

/// Look up a recognized dictionary by id.
pub fn dictionary(id: &str) -> AnalyzeResult<&'static DictionaryInfo> {
    DICTIONARIES
        .iter()
        .find(|d| d.id == id)
        .ok_or_else(|| AnalyzeError::UnknownDictionary {
            dictionary: id.to_string(),
        })
}

/// Split raw text into paragraphs on blank lines.
///
/// Line endings are normalized first. Text without any blank line comes back
/// as a single paragraph; leading and trailing blank runs produce nothing.
pub fn split_paragraphs(content: &str) -> Vec<String> {
    let normalized = content.replace("\r\n", "\n");
    let paragraphs: Vec<String> = normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if paragraphs.is_empty() && !normalized.trim().is_empty() {
        vec![normalized.trim().to_string()]
    } else {
        paragraphs
    }
}

/// A tokenizer for one dictionary.
pub trait Analyzer: Send + Sync {
    /// Tokenize one paragraph of text.
    fn tokenize(&self, text: &str) -> AnalyzeResult<Vec<Token>>;
}

/// Source of analyzers, keyed by dictionary id.
pub trait AnalyzerProvider: Send + Sync {
    fn analyzer(&self, dictionary: &str) -> AnalyzeResult<Arc<dyn Analyzer>>;
}

/// Analyze full text into the paragraph/token tree stored in a shard.
pub fn analyze(
    provider: &dyn AnalyzerProvider,
    content: &str,
    dictionary_id: &str,
) -> AnalyzeResult<Vec<Paragraph>> {
    dictionary(dictionary_id)?;
    let analyzer = provider.analyzer(dictionary_id)?;
    let mut paragraphs = Vec::new();
    for (index, text) in split_paragraphs(content).into_iter().enumerate() {
        let tokens = analyzer.tokenize(&text)?;
        paragraphs.push(Paragraph {
            index: index as u32,
            content: text,
            tokens,
        });
    }
    Ok(paragraphs)
}

/// Memoizing provider wrapper. Dictionary load happens once per id; later
/// requests share the cached instance across threads.
pub struct CachingProvider<P> {
    inner: P,
    cache: DashMap<String, Arc<dyn Analyzer>>,
}

impl<P: AnalyzerProvider> CachingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }
}

impl<P: AnalyzerProvider> AnalyzerProvider for CachingProvider<P> {
    fn analyzer(&self, dictionary: &str) -> AnalyzeResult<Arc<dyn Analyzer>> {
        if let Some(cached) = self.cache.get(dictionary) {
            return Ok(Arc::clone(&cached));
        }
        let analyzer = self.inner.analyzer(dictionary)?;
        self.cache
            .insert(dictionary.to_string(), Arc::clone(&analyzer));
        Ok(analyzer)
    }
}

/// Fallback backend: whitespace segmentation, empty feature slots.
///
/// Produces structurally valid analysis trees without any dictionary data, so
/// the archive stays usable where no morphological backend is installed.
pub struct SurfaceAnalyzer;

impl Analyzer for SurfaceAnalyzer {
    fn tokenize(&self, text: &str) -> AnalyzeResult<Vec<Token>> {
        Ok(text
            .split_whitespace()
            .map(|surface| Token::new(surface, Vec::new()))
            .collect())
    }
}

/// Provider handing out [`SurfaceAnalyzer`] for every recognized dictionary.
pub struct SurfaceProvider;

impl AnalyzerProvider for SurfaceProvider {
    fn analyzer(&self, dictionary_id: &str) -> AnalyzeResult<Arc<dyn Analyzer>> {
        dictionary(dictionary_id)?;
        Ok(Arc::new(SurfaceAnalyzer))
    }
}
