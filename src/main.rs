use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use tagsync::mapping::ValueKind;
use tagsync::{
    describe_dialects, read_metadata_with, supported_keys, write_metadata_with, Artwork, CanonicalKey, Config,
    MetadataRecord, MetadataValue, PartialDate,
};

#[derive(Parser, Debug)]
#[command(version, about = "Read and write MP3 tags through one canonical record")]
struct PrgmArgs {
    /// Configuration file (default: ~/.tagsync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the keys that round-trip
    Keys,

    /// Print the canonical record of a file
    Read {
        file: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write fields into a file
    Write {
        file: PathBuf,

        /// key=value, repeatable. Lists use ';', artwork takes @image-file
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// JSON record to start from, as printed by `read --json`
        #[arg(long, value_name = "JSON")]
        from: Option<PathBuf>,
    },

    /// Write a sample configuration file
    InitConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = PrgmArgs::parse();

    let filter = if args.verbose {
        EnvFilter::new("tagsync=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tagsync=info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match args.command {
        Command::Keys => {
            for key in supported_keys() {
                println!("{}", key);
            }
        }
        Command::Read { file, json } => {
            let config = load_config(args.config.as_deref())?;
            let (record, outcome) = read_metadata_with(&file, &config.tagger);
            if let Some(e) = outcome.error() {
                eprintln!("{}", e);
                std::process::exit(outcome.status_code());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                for (key, value) in record.iter() {
                    println!("{:<14} {}", key, value);
                }
            }
        }
        Command::Write { file, set, from } => {
            let config = load_config(args.config.as_deref())?;
            let mut record = match from {
                Some(path) => serde_json::from_str::<MetadataRecord>(&std::fs::read_to_string(path)?)?,
                None => MetadataRecord::new(),
            };
            for assignment in &set {
                let (key, value) = parse_assignment(assignment)?;
                record.set(key, value);
            }

            let outcome = write_metadata_with(&record, &file, &config.tagger);
            if let Some(e) = outcome.error() {
                eprintln!("{}", e);
                std::process::exit(outcome.status_code());
            }
        }
        Command::InitConfig => {
            let path = match args.config {
                Some(path) => path,
                None => Config::get_config_path()?,
            };
            Config::create_sample(&path)?;
            println!("Sample config written to {}", path.display());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(Config::load_from(path)?),
        None => Ok(Config::load().unwrap_or_else(|e| {
            warn!("Using default configuration: {}", e);
            Config::default()
        })),
    }
}

/// Parses `key=value` using the canonical kind of `key`.
fn parse_assignment(assignment: &str) -> Result<(CanonicalKey, MetadataValue), Box<dyn std::error::Error>> {
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", assignment))?;
    let key: CanonicalKey = key.parse()?;
    let kind = describe_dialects()
        .field(key)
        .map(|spec| spec.kind)
        .ok_or_else(|| format!("{} is not mapped", key))?;

    let value = match kind {
        ValueKind::Text => MetadataValue::Text(raw.to_string()),
        ValueKind::Integer => MetadataValue::Integer(raw.trim().parse()?),
        ValueKind::Date => MetadataValue::Date(raw.parse::<PartialDate>()?),
        ValueKind::MultiValue => MetadataValue::List(
            raw.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        ValueKind::Position => {
            let (number, total) = match raw.split_once('/') {
                Some((n, t)) => (n.trim().parse()?, Some(t.trim().parse()?)),
                None => (raw.trim().parse()?, None),
            };
            MetadataValue::Position { number, total }
        }
        ValueKind::Binary => {
            let path = raw.strip_prefix('@').ok_or("artwork expects @path/to/image")?;
            let data = std::fs::read(path)?;
            let mime_type = image::guess_format(&data)?.to_mime_type().to_string();
            MetadataValue::Binary(Artwork { mime_type, description: String::new(), data })
        }
    };

    Ok((key, value))
}
