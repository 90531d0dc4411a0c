//! AtlasDoc CLI
//!
//! Command-line interface for inspecting and editing a store directory.

use std::path::PathBuf;
use std::process;

use atlasdoc::{Config, DocError, Engine, Fields, Record, RecordId};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasDoc CLI
#[derive(Parser, Debug)]
#[command(name = "atlasdoc-cli")]
#[command(about = "CLI for the AtlasDoc embedded document store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./atlasdoc_data")]
    data_dir: PathBuf,

    /// Field to maintain in the secondary index (repeatable)
    #[arg(short, long = "index-field")]
    index_field: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert a record and print its id
    Insert {
        /// Field mapping as a JSON object
        json: String,
    },

    /// Print a record by id
    Get {
        /// The record id
        id: String,
    },

    /// Merge fields into an existing record
    Update {
        /// The record id
        id: String,

        /// Fields to overwrite, as a JSON object
        json: String,
    },

    /// Delete a record
    Delete {
        /// The record id
        id: String,
    },

    /// Print records whose field equals a value
    Query {
        /// Indexed field name
        field: String,

        /// Value as JSON (e.g. 30, "alice@example.com", true)
        value: String,
    },

    /// Print every live record
    All,

    /// Print the number of live records
    Count,

    /// Merge, rewrite and reindex; prints the number of records retained
    Compact,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlasdoc=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("AtlasDoc CLI v{}", atlasdoc::VERSION);

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> atlasdoc::Result<()> {
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .index_fields(args.index_field)
        .build();
    let mut engine = Engine::open(config)?;

    match args.command {
        Commands::Insert { json } => {
            let id = engine.insert(parse_fields(&json)?)?;
            println!("{}", id);
        }
        Commands::Get { id } => match engine.get(&RecordId::new(id.clone())?)? {
            Some(record) => print_record(&record)?,
            None => {
                tracing::warn!(id = %id, "record not found");
                process::exit(2);
            }
        },
        Commands::Update { id, json } => {
            let updated = engine.update(&RecordId::new(id)?, parse_fields(&json)?)?;
            println!("{}", updated);
        }
        Commands::Delete { id } => {
            let deleted = engine.delete(&RecordId::new(id)?)?;
            println!("{}", deleted);
        }
        Commands::Query { field, value } => {
            let value: Value = serde_json::from_str(&value)?;
            for record in engine.query(&field, &value)? {
                print_record(&record)?;
            }
        }
        Commands::All => {
            for record in engine.all()? {
                print_record(&record)?;
            }
        }
        Commands::Count => println!("{}", engine.count()?),
        Commands::Compact => println!("{}", engine.compact()?),
    }

    engine.close()
}

fn parse_fields(json: &str) -> atlasdoc::Result<Fields> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(fields) => Ok(fields),
        other => Err(DocError::Codec(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn print_record(record: &Record) -> atlasdoc::Result<()> {
    println!("{}", atlasdoc::record::encode_line(record)?);
    Ok(())
}
