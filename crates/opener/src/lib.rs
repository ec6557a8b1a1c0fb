//! # Opener
//!
//! Resolves which archive format applies to an opaque stream and unwraps
//! nested single-member containers until a directly browsable archive is
//! reached.
//!
//! Reading archive contents is delegated to an [`ArchiveEngine`]. This crate
//! decides *which* handler to use and *how deep* to go:
//!
//! - formats are matched by extension or by signature against a
//!   [`FormatRegistry`], in registry order
//! - an executable container is searched for an embedded self-extracting
//!   payload instead of being opened as-is
//! - when an opened archive designates a main subfile (e.g., the tar inside
//!   a `.tar.gz`), that member is opened in turn, verified by signature
//!
//! ## Example
//!
//! ```rust,no_run
//! use opener::{open_path, BuiltinEngine, FormatRegistry, OpenOptions};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = BuiltinEngine::new();
//! let registry = FormatRegistry::builtin();
//!
//! let archive = open_path(&engine, &registry, Path::new("logs.tar.gz"), &OpenOptions::default())?;
//! println!("Format: {}", archive.format().name);
//! for link in archive.chain() {
//!     println!("  unwrapped {} from {}", link.path, link.outer_format);
//! }
//! # Ok(())
//! # }
//! ```

pub mod builtin;
pub mod callback;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod open;
pub mod probe;
pub mod registry;
pub mod sfx;
pub mod types;
pub mod volume;

// Re-export main types
pub use builtin::BuiltinEngine;
pub use callback::{CredentialSource, Credentials, OpenCallback, SubArchiveNameSink, VolumeSource};
pub use engine::{
    ArchiveEngine, ArchiveHandler, ArchiveProperty, CodecDescriptor, CodecsInfo, ItemProperty,
    ItemStreamSource, PropValue, SetCodecsInfo,
};
pub use error::{EngineError, OpenError};
pub use matcher::{match_format, DetectMode};
pub use open::{
    extension_of, open_archive, open_archive_with_credentials, open_multi_volume_archive,
    open_named_archive, OpenedArchive, MAX_CHECK_START_POSITION, MAX_NESTING_DEPTH,
};
pub use probe::InStream;
pub use registry::{ClassId, FormatDescriptor, FormatRegistry, Signature};
pub use types::{ArchiveEntry, ArchiveInfo, NestingLink, OpenOptions};
pub use volume::FileVolumeSet;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Open the archive at `path`, unwrapping nested containers.
///
/// The file name's extension is the hint used when
/// `options.detect_by_signature` is off.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, or any error of
/// [`open_archive`].
pub fn open_path<E: ArchiveEngine + ?Sized>(
    engine: &E,
    registry: &FormatRegistry,
    path: &Path,
    options: &OpenOptions,
) -> Result<OpenedArchive, OpenError> {
    let file = File::open(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    open_named_archive(engine, registry, Box::new(BufReader::new(file)), &name, options)
}

/// Resolve the format of the file at `path` without opening it.
///
/// # Errors
///
/// Returns `FormatNotFound`, `NoFormatAvailable`, or an I/O error.
pub fn detect_path<'r>(
    registry: &'r FormatRegistry,
    path: &Path,
    options: &OpenOptions,
) -> Result<&'r FormatDescriptor, OpenError> {
    let mut file = BufReader::new(File::open(path)?);
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let allow_list = open::sfx_allow_list(registry, options);

    match_format(
        registry,
        &allow_list,
        &mut file,
        extension,
        DetectMode::from_signature_flag(options.detect_by_signature),
    )
}
