//! XDG-compliant path resolution for fumikura.
//!
//! The archive keeps one registry database plus a directory of independent
//! shard files under the data directory.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(fumikura::paths::no_home),
        help("Set the HOME environment variable or ensure a valid user profile exists.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(fumikura::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Directory layout of one archive.
#[derive(Debug, Clone)]
pub struct FumiPaths {
    /// `$XDG_CONFIG_HOME/fumikura/`
    pub config_dir: PathBuf,
    /// Archive root: registry database plus shard directory.
    pub data_dir: PathBuf,
}

impl FumiPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join("fumikura");

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join("fumikura");

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Layout rooted at an explicit directory (tests, `--data-dir`).
    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            config_dir: data_dir.join("config"),
            data_dir,
        }
    }

    /// Path to the registry database file.
    pub fn registry_file(&self) -> PathBuf {
        self.data_dir.join("registry.redb")
    }

    /// Directory holding one shard file per document.
    pub fn shards_dir(&self) -> PathBuf {
        self.data_dir.join("shards")
    }

    /// Path to the global config file.
    pub fn global_config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Create all base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.shards_dir()] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Whether an archive already exists at this layout.
    pub fn exists(&self) -> bool {
        self.registry_file().is_file()
    }
}

impl AsRef<Path> for FumiPaths {
    fn as_ref(&self) -> &Path {
        &self.data_dir
    }
}
