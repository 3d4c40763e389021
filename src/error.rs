//! Rich diagnostic error types for the fumikura archive.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the fumikura archive.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum FumikuraError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Shard(#[from] ShardError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Taxonomy(#[from] TaxonomyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Analyze(#[from] AnalyzeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] crate::paths::PathError),
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("document not found: {id}")]
    #[diagnostic(
        code(fumikura::registry::not_found),
        help(
            "No document with this ID exists in the registry. \
             List available documents with `fumikura list`."
        )
    )]
    DocumentNotFound { id: u64 },

    #[error("digest already registered: {digest} (document {existing})")]
    #[diagnostic(
        code(fumikura::registry::conflict),
        help(
            "An identical (content, dictionary) pair is already stored. \
             This is the dedup arbitration path — read the existing document \
             instead of importing again."
        )
    )]
    DigestConflict { digest: String, existing: u64 },

    #[error("registry transaction error: {message}")]
    #[diagnostic(
        code(fumikura::registry::db),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption — try running with a fresh data directory. \
             If the problem persists, file a bug report."
        )
    )]
    Db { message: String },

    #[error("registry serialization error: {message}")]
    #[diagnostic(
        code(fumikura::registry::serde),
        help(
            "Failed to encode or decode a registry row. This usually means the \
             stored data format has changed between versions. Try re-importing."
        )
    )]
    Serialization { message: String },
}

/// Convenience alias for registry operation results.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

// ---------------------------------------------------------------------------
// Shard errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ShardError {
    #[error("shard not found: \"{locator}\"")]
    #[diagnostic(
        code(fumikura::shard::not_found),
        help(
            "No published shard exists under this locator. If the registry still \
             lists the document, the shard file was removed out-of-band."
        )
    )]
    Missing { locator: String },

    #[error("shard corrupt: \"{locator}\": {message}")]
    #[diagnostic(
        code(fumikura::shard::corrupt),
        help(
            "The shard file exists but its payload could not be decoded. \
             The file was likely truncated or modified on disk. \
             Delete the document and re-import it."
        )
    )]
    Corrupt { locator: String, message: String },

    #[error("shard I/O error for \"{locator}\": {source}")]
    #[diagnostic(
        code(fumikura::shard::io),
        help(
            "A filesystem operation on the shard directory failed. Check that it \
             exists, has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    #[error("shard serialization error: {message}")]
    #[diagnostic(
        code(fumikura::shard::serde),
        help("Failed to encode the shard payload. File a bug report if this persists.")
    )]
    Serialization { message: String },
}

/// Convenience alias for shard operation results.
pub type ShardResult<T> = std::result::Result<T, ShardError>;

// ---------------------------------------------------------------------------
// Taxonomy errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TaxonomyError {
    #[error("taxonomy transaction error: {message}")]
    #[diagnostic(
        code(fumikura::taxonomy::db),
        help("The tag tables could not be read or written. See the inner message.")
    )]
    Db { message: String },

    #[error("taxonomy serialization error: {message}")]
    #[diagnostic(
        code(fumikura::taxonomy::serde),
        help("A tag or category row could not be encoded or decoded.")
    )]
    Serialization { message: String },
}

/// Convenience alias for taxonomy operation results.
pub type TaxonomyResult<T> = std::result::Result<T, TaxonomyError>;

// ---------------------------------------------------------------------------
// Archive (facade) errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ArchiveError {
    #[error("empty title: a document must have a non-empty title")]
    #[diagnostic(
        code(fumikura::archive::empty_title),
        help("Pass a title, or let the importer derive one from the source file name.")
    )]
    EmptyTitle,

    #[error("empty content: nothing to store")]
    #[diagnostic(
        code(fumikura::archive::empty_content),
        help("The supplied text was empty after trimming. Check the input file.")
    )]
    EmptyContent,

    #[error("data directory error: {path}")]
    #[diagnostic(
        code(fumikura::archive::data_dir),
        help(
            "The data directory could not be created or accessed. \
             Ensure the path exists and has read/write permissions."
        )
    )]
    DataDir { path: String },

    #[error("invalid config file {path}: {message}")]
    #[diagnostic(
        code(fumikura::archive::config),
        help("The config file is not valid TOML. Fix or delete it to use defaults.")
    )]
    Config { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("export I/O error at {path}: {source}")]
    #[diagnostic(
        code(fumikura::export::io),
        help("Could not write to the output directory. Check permissions and disk space.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("export serialization error: {message}")]
    #[diagnostic(
        code(fumikura::export::serde),
        help("A document record could not be rendered as JSON.")
    )]
    Serialization { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Taxonomy(#[from] TaxonomyError),
}

/// Convenience alias for export operation results.
pub type ExportResult<T> = std::result::Result<T, ExportError>;

// ---------------------------------------------------------------------------
// Analyzer provider errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AnalyzeError {
    #[error("unknown dictionary: \"{dictionary}\"")]
    #[diagnostic(
        code(fumikura::analyze::unknown_dictionary),
        help("List installed dictionaries with `fumikura dictionaries`.")
    )]
    UnknownDictionary { dictionary: String },

    #[error("analyzer backend error: {message}")]
    #[diagnostic(
        code(fumikura::analyze::backend),
        help("The morphological analyzer failed. Check that its dictionary files are intact.")
    )]
    Backend { message: String },
}

/// Convenience alias for analyzer results.
pub type AnalyzeResult<T> = std::result::Result<T, AnalyzeError>;

/// Convenience alias for functions returning fumikura results.
pub type FumikuraResult<T> = std::result::Result<T, FumikuraError>;
