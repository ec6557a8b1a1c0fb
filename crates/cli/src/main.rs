//! Command-line interface for archive format resolution.
//!
//! Detects the format of a file, or opens it with the built-in engine and
//! reports which nested containers were unwrapped on the way.

use clap::{Parser, Subcommand};
use opener::{
    detect_path, open_multi_volume_archive, open_path, BuiltinEngine, FileVolumeSet,
    FormatRegistry, OpenError, OpenOptions, OpenedArchive,
};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "arcopen")]
#[command(version, about = "Resolve and open archives from the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the format of a file
    Detect {
        /// File to inspect
        file: PathBuf,

        /// Trust the file extension instead of the content
        #[arg(long)]
        by_extension: bool,

        /// JSON format registry to use instead of the built-in one
        #[arg(long)]
        registry: Option<PathBuf>,
    },

    /// Open an archive, unwrapping nested containers, and list it
    Open {
        /// Archive file (first volume with --multi-volume)
        file: PathBuf,

        /// Password for encrypted archives
        #[arg(long)]
        password: Option<String>,

        /// Trust the file extension for the outermost level
        #[arg(long)]
        by_extension: bool,

        /// JSON format registry to use instead of the built-in one
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Treat the file as the first volume of a split archive
        #[arg(long)]
        multi_volume: bool,

        /// Formats accepted inside self-extracting executables
        #[arg(long = "sfx", value_name = "FORMAT")]
        sfx_handlers: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Detect {
            file,
            by_extension,
            registry,
        } => handle_detect(&file, by_extension, registry.as_deref()),
        Commands::Open {
            file,
            password,
            by_extension,
            registry,
            multi_volume,
            sfx_handlers,
            json,
        } => {
            let options = OpenOptions {
                password,
                detect_by_signature: !by_extension,
                sfx_handlers: (!sfx_handlers.is_empty()).then_some(sfx_handlers),
            };
            handle_open(&file, &options, registry.as_deref(), multi_volume, json)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let code = match e.downcast_ref::<OpenError>() {
            Some(OpenError::PasswordRequired) => 2,
            _ => 1,
        };
        process::exit(code);
    }
}

fn load_registry(path: Option<&Path>) -> Result<FormatRegistry, OpenError> {
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading format registry");
            FormatRegistry::load(path)
        }
        None => Ok(FormatRegistry::builtin()),
    }
}

fn handle_detect(
    file: &Path,
    by_extension: bool,
    registry: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = load_registry(registry)?;
    let options = OpenOptions {
        detect_by_signature: !by_extension,
        ..OpenOptions::default()
    };

    let format = detect_path(&registry, file, &options)?;
    println!("{}", format.name);
    Ok(())
}

fn handle_open(
    file: &Path,
    options: &OpenOptions,
    registry: Option<&Path>,
    multi_volume: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = load_registry(registry)?;
    let engine = BuiltinEngine::new();

    let archive = if multi_volume {
        let mut volumes = FileVolumeSet::new(file)?;
        open_multi_volume_archive(&engine, &registry, &mut volumes, options)?
    } else {
        open_path(&engine, &registry, file, options)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&archive.info()?)?);
    } else {
        print_archive(file, &archive)?;
    }
    Ok(())
}

fn print_archive(file: &Path, archive: &OpenedArchive) -> Result<(), OpenError> {
    let info = archive.info()?;

    println!("Archive: {}", file.display());
    for link in &info.chain {
        println!(
            "  {} -> item {} ({})",
            link.outer_format, link.main_subfile, link.path
        );
    }
    if let Some(name) = &info.sub_archive_name {
        println!("Opened:  {}", name);
    }
    println!("Format:  {}", info.format);
    if let Some(size) = info.physical_size {
        println!("Size:    {} bytes", size);
    }
    println!("Entries: {}", info.entries);
    if info.encrypted {
        println!("Encrypted: yes");
    }
    println!();

    for entry in &info.entry_list {
        let kind = if entry.is_directory { "d" } else { "-" };
        println!("{} {:>12}  {}", kind, entry.size, entry.path);
    }
    Ok(())
}
