//! AtlasDoc CLI
//!
//! Command-line interface for inspecting and editing a store file.

use std::process;

use atlasdoc::{AtlasError, DocInfo, Document, Store, StoreConfig, WalkSignal};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasDoc CLI
#[derive(Parser, Debug)]
#[command(name = "atlasdoc")]
#[command(about = "CLI for AtlasDoc document stores")]
#[command(version)]
struct Args {
    /// Store file
    #[arg(short, long, default_value = "./atlasdoc.db")]
    file: String,

    /// Create the store file if it does not exist
    #[arg(short, long)]
    create: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show document counts and file positions
    Info,

    /// Get a document by id
    Get {
        /// The document id
        id: String,
    },

    /// Store a document and commit
    Set {
        /// The document id
        id: String,

        /// The document body
        value: String,
    },

    /// Delete a document and commit
    Del {
        /// The document id
        id: String,
    },

    /// List entries in key order
    Dump {
        /// First key to list
        #[arg(short, long, default_value = "")]
        start: String,

        /// Print document bodies (skips deleted entries)
        #[arg(short, long)]
        docs: bool,

        /// Stop after this many entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlasdoc=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> atlasdoc::Result<()> {
    let config = StoreConfig::builder()
        .path(&args.file)
        .create_if_missing(args.create)
        .build();
    let store = Store::open_with(config)?;

    match args.command {
        Commands::Info => {
            let info = store.info()?;
            println!("doc_count:       {}", info.doc_count);
            println!("deleted_count:   {}", info.deleted_count);
            println!("space_used:      {}", info.space_used);
            println!("header_position: {}", info.header_position);
            println!("last_sequence:   {}", info.last_sequence);
            println!("file_size:       {}", info.file_size);
        }
        Commands::Get { id } => match store.get(&id) {
            Ok((doc, info)) => {
                println!("{}", doc.value_str());
                tracing::debug!(seq = info.sequence(), rev = info.rev_seq(), "fetched {}", id);
            }
            Err(AtlasError::NotFound) => {
                eprintln!("not found: {}", id);
                store.close();
                process::exit(2);
            }
            Err(e) => return Err(e),
        },
        Commands::Set { id, value } => {
            store.set(DocInfo::new(&id), Document::new(&id, &value))?;
            store.commit()?;
        }
        Commands::Del { id } => {
            store.delete(&id)?;
            store.commit()?;
        }
        Commands::Dump { start, docs, limit } => {
            let limit = limit.unwrap_or(usize::MAX);
            let mut printed = 0usize;

            if docs {
                store.walk_docs(&start, |_, info, doc| {
                    if printed >= limit {
                        return WalkSignal::Stop;
                    }
                    println!("{}\t{}", info.id_str(), doc.value_str());
                    printed += 1;
                    WalkSignal::Continue
                })?;
            } else {
                store.walk(&start, |_, info| {
                    if printed >= limit {
                        return WalkSignal::Stop;
                    }
                    println!(
                        "{}\tseq={}\trev={}\tdeleted={}\tsize={}",
                        info.id_str(),
                        info.sequence(),
                        info.rev_seq(),
                        info.is_deleted(),
                        info.size()
                    );
                    printed += 1;
                    WalkSignal::Continue
                })?;
            }
        }
    }

    store.close();
    Ok(())
}
