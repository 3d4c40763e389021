//! fumikura CLI: content-addressed archive for analyzed classical Japanese texts.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use fumikura::archive::{Archive, ArchiveConfig, ImportRequest};
use fumikura::export::export_archive;
use fumikura::model::DocumentId;
use fumikura::paths::FumiPaths;
use fumikura::provider::{self, CachingProvider, SurfaceProvider};
use fumikura::query::DocumentFilter;

#[derive(Parser)]
#[command(name = "fumikura", version, about = "Archive for analyzed classical Japanese texts")]
struct Cli {
    /// Data directory for the archive (registry + shards).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new archive data directory.
    Init,

    /// Analyze a text file and store it as a document.
    Import {
        /// Path to the text file.
        file: PathBuf,

        /// Document title; file stem when omitted.
        #[arg(long)]
        title: Option<String>,

        /// Analysis dictionary id.
        #[arg(long, default_value = "unidic-chuko")]
        dictionary: String,

        /// Comma-separated tag names.
        #[arg(long)]
        tags: Option<String>,

        /// Metadata entries as key=value. Repeatable.
        #[arg(long = "meta")]
        metadata: Vec<String>,
    },

    /// List documents, most recently updated first.
    List {
        /// Only documents holding at least one of these tags. Repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Only documents holding a tag in this category.
        #[arg(long)]
        category: Option<String>,
    },

    /// Show one document.
    Show {
        /// Document id.
        id: u64,

        /// Print the full original text instead of the summary.
        #[arg(long)]
        text: bool,
    },

    /// Change a document's title.
    Rename {
        /// Document id.
        id: u64,
        title: String,
    },

    /// Replace a document's tag set.
    Tag {
        /// Document id.
        id: u64,

        /// Comma-separated tag names; an empty string clears all tags.
        tags: String,
    },

    /// Set metadata entries on a document.
    Meta {
        /// Document id.
        id: u64,

        /// Entries as key=value.
        entries: Vec<String>,
    },

    /// Delete a document and its shard.
    Delete {
        /// Document id.
        id: u64,
    },

    /// Inspect the tag vocabulary.
    Tags {
        #[command(subcommand)]
        action: TagAction,
    },

    /// Export everything as a static JSON tree.
    Export {
        /// Output directory.
        #[arg(long, default_value = "export")]
        out: PathBuf,
    },

    /// List recognized analysis dictionaries.
    Dictionaries,
}

#[derive(Subcommand)]
enum TagAction {
    /// List all tags with usage counts.
    List,
    /// Create a tag, or move an existing one into a category.
    Ensure {
        name: String,
        #[arg(long, default_value = "general")]
        category: String,
    },
    /// List tag categories.
    Categories,
    /// Delete the named tags. Tags still held by a document are kept.
    Prune {
        names: Vec<String>,
    },
}

fn parse_meta(entries: &[String]) -> Result<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            miette::bail!("metadata entry must be key=value, got \"{entry}\"");
        };
        metadata.insert(key.to_string(), value.to_string());
    }
    Ok(metadata)
}

fn parse_tags(tags: &str) -> BTreeSet<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn open_archive(data_dir: Option<PathBuf>) -> Result<Archive> {
    let paths = match data_dir {
        Some(dir) => FumiPaths::at(dir),
        None => {
            let default = FumiPaths::resolve().into_diagnostic()?;
            let config = ArchiveConfig::load(&default.global_config_file())?;
            config.paths()?
        }
    };
    Ok(Archive::open(paths)?)
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let archive = open_archive(cli.data_dir)?;
            println!("Initialized fumikura archive at {}", archive.paths().data_dir.display());
        }

        Commands::Import {
            file,
            title,
            dictionary,
            tags,
            metadata,
        } => {
            let archive = open_archive(cli.data_dir)?;
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let title = title.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string())
            });

            let analyzers = CachingProvider::new(SurfaceProvider);
            let paragraphs = provider::analyze(&analyzers, &content, &dictionary)?;

            let metadata = parse_meta(&metadata)?;
            let outcome = archive.import(ImportRequest {
                title,
                content,
                dictionary,
                paragraphs,
                tags: tags.as_deref().map(parse_tags).unwrap_or_default(),
                metadata,
            })?;
            if !outcome.deduplicated {
                archive.promote_era(outcome.id)?;
            }

            if outcome.deduplicated {
                println!("Already stored as document {}", outcome.id);
            } else {
                println!("Stored as document {}", outcome.id);
            }
        }

        Commands::List { tags, category } => {
            let archive = open_archive(cli.data_dir)?;
            let filter = DocumentFilter {
                tags: (!tags.is_empty()).then_some(tags),
                category,
            };
            let summaries = archive.list(&filter)?;
            if summaries.is_empty() {
                println!("No documents.");
            } else {
                println!("Documents ({}):", summaries.len());
                for s in &summaries {
                    let tags: Vec<&str> = s.tags.iter().map(|t| t.name.as_str()).collect();
                    println!(
                        "  {}. \"{}\" [{}] {} paragraphs, {} tokens, tags: {}",
                        s.id,
                        s.title,
                        s.dictionary,
                        s.paragraph_count,
                        s.token_count,
                        if tags.is_empty() { "-".into() } else { tags.join(", ") }
                    );
                }
            }
        }

        Commands::Show { id, text } => {
            let archive = open_archive(cli.data_dir)?;
            let record = archive.document(DocumentId::new(id))?;
            if text {
                println!("{}", record.content);
            } else {
                let s = &record.summary;
                println!("Document: \"{}\"", s.title);
                println!("  id:          {}", s.id);
                println!("  dictionary:  {}", s.dictionary);
                println!("  paragraphs:  {}", s.paragraph_count);
                println!("  tokens:      {}", s.token_count);
                println!("  created_at:  {}", s.created_at);
                println!("  updated_at:  {}", s.updated_at);
                if !s.tags.is_empty() {
                    println!("  tags:");
                    for tag in &s.tags {
                        println!("    {} [{}]", tag.name, tag.category);
                    }
                }
                if !s.metadata.is_empty() {
                    println!("  metadata:");
                    for (key, value) in &s.metadata {
                        println!("    {key}: {value}");
                    }
                }
            }
        }

        Commands::Rename { id, title } => {
            let archive = open_archive(cli.data_dir)?;
            archive.update_title(DocumentId::new(id), &title)?;
            println!("Renamed document {id}");
        }

        Commands::Tag { id, tags } => {
            let archive = open_archive(cli.data_dir)?;
            let tags = parse_tags(&tags);
            archive.replace_tags(DocumentId::new(id), &tags)?;
            println!("Document {id} now has {} tags", tags.len());
        }

        Commands::Meta { id, entries } => {
            let archive = open_archive(cli.data_dir)?;
            let metadata = parse_meta(&entries)?;
            archive.update_metadata(DocumentId::new(id), &metadata)?;
            if metadata.contains_key("era") {
                archive.promote_era(DocumentId::new(id))?;
            }
            println!("Updated {} metadata entries on document {id}", metadata.len());
        }

        Commands::Delete { id } => {
            let archive = open_archive(cli.data_dir)?;
            if archive.delete(DocumentId::new(id))? {
                println!("Deleted document {id}");
            } else {
                println!("No document {id}");
            }
        }

        Commands::Tags { action } => {
            let archive = open_archive(cli.data_dir)?;
            match action {
                TagAction::List => {
                    let tags = archive.taxonomy().all_tags()?;
                    println!("Tags ({}):", tags.len());
                    for tag in &tags {
                        println!("  {} [{}] used by {}", tag.name, tag.category, tag.doc_count);
                    }
                }
                TagAction::Ensure { name, category } => {
                    let tag = archive.taxonomy().ensure_tag(&name, &category)?;
                    println!("Tag \"{}\" is in category {}", tag.name, tag.category);
                }
                TagAction::Prune { names } => {
                    let removed = archive.taxonomy().prune(&names)?;
                    println!("Removed {removed} of {} tags", names.len());
                }
                TagAction::Categories => {
                    for category in archive.taxonomy().categories()? {
                        println!(
                            "  {} ({}): {}",
                            category.name, category.display_name, category.description
                        );
                    }
                }
            }
        }

        Commands::Export { out } => {
            let archive = open_archive(cli.data_dir)?;
            let report = export_archive(&archive, &out)?;
            println!(
                "Exported {} documents to {} ({} skipped)",
                report.exported,
                out.display(),
                report.skipped
            );
        }

        Commands::Dictionaries => {
            println!("Dictionaries:");
            for dict in provider::DICTIONARIES {
                println!("  {} / {}: {}", dict.id, dict.name, dict.description);
            }
        }
    }

    Ok(())
}
