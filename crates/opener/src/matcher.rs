//! Signature matcher: picks the format descriptor that applies to a stream.

use crate::error::OpenError;
use crate::probe::{probe, InStream};
use crate::registry::{FormatDescriptor, FormatRegistry};
use crate::sfx::scan_for_embedded_archive;
use std::io::SeekFrom;
use tracing::debug;

/// How the format of a stream is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectMode {
    /// Trust the extension hint; no I/O is performed.
    Extension,

    /// Compare registered signatures against the stream content.
    Signature,
}

impl DetectMode {
    pub fn from_signature_flag(by_signature: bool) -> Self {
        if by_signature {
            DetectMode::Signature
        } else {
            DetectMode::Extension
        }
    }
}

/// Resolve the format of `stream`.
///
/// The first descriptor in registry order that matches wins. A signature
/// match on the generic executable format is replaced by the result of the
/// SFX scan over `sfx_handlers`.
///
/// # Errors
///
/// - `FormatNotFound` when nothing matched
/// - `NoFormatAvailable` when the stream is an executable without an
///   allow-listed payload
/// - `Io` when the stream position could not be saved or restored
pub fn match_format<'r, S, N>(
    registry: &'r FormatRegistry,
    sfx_handlers: &[N],
    stream: &mut S,
    extension: &str,
    mode: DetectMode,
) -> Result<&'r FormatDescriptor, OpenError>
where
    S: InStream + ?Sized,
    N: AsRef<str>,
{
    match mode {
        DetectMode::Extension => match_by_extension(registry, extension),
        DetectMode::Signature => {
            let format = match_by_signature(registry, stream)?;
            if !format.is_executable() {
                return Ok(format);
            }

            debug!("executable container matched, looking for SFX payload");
            scan_for_embedded_archive(registry, sfx_handlers, stream)?
                .ok_or_else(|| OpenError::NoFormatAvailable(format.name.clone()))
        }
    }
}

/// First descriptor listing `extension`, compared case-insensitively.
pub fn match_by_extension<'r>(
    registry: &'r FormatRegistry,
    extension: &str,
) -> Result<&'r FormatDescriptor, OpenError> {
    let found = registry.iter().find(|f| f.matches_extension(extension));
    match found {
        Some(format) => {
            debug!(format = %format.name, extension, "matched by extension");
            Ok(format)
        }
        None => Err(OpenError::FormatNotFound),
    }
}

/// First descriptor whose signature bytes equal the stream bytes at the
/// signature's offset. Descriptors without signatures are skipped; windows
/// that cannot be read simply do not match.
pub fn match_by_signature<'r, S: InStream + ?Sized>(
    registry: &'r FormatRegistry,
    stream: &mut S,
) -> Result<&'r FormatDescriptor, OpenError> {
    for format in registry.iter().filter(|f| !f.signatures.is_empty()) {
        for signature in &format.signatures {
            let window = probe(
                stream,
                SeekFrom::Start(signature.offset),
                signature.bytes.len(),
            )?;

            if window.as_deref() == Some(signature.bytes.as_slice()) {
                debug!(format = %format.name, offset = signature.offset, "matched by signature");
                return Ok(format);
            }
        }
    }

    Err(OpenError::FormatNotFound)
}
