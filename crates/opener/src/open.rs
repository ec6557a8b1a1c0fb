//! Archive open orchestration: resolve a format, open it through the engine,
//! and keep unwrapping while the opened archive designates a main subfile.

use crate::callback::{CredentialSource, Credentials, OpenCallback, VolumeSource};
use crate::engine::{ArchiveEngine, ArchiveHandler, ArchiveProperty, ItemProperty, PropValue};
use crate::error::OpenError;
use crate::matcher::{match_format, DetectMode};
use crate::probe::InStream;
use crate::registry::{FormatDescriptor, FormatRegistry};
use crate::sfx::DEFAULT_SFX_HANDLERS;
use crate::types::{ArchiveEntry, ArchiveInfo, NestingLink, OpenOptions};
use std::fmt;
use tracing::{debug, warn};

/// How far into a stream a handler may look for its header.
pub const MAX_CHECK_START_POSITION: u64 = 1 << 22;

/// Maximum number of unwrap steps below the outermost archive.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Archive opened at the innermost level the resolver could reach.
pub struct OpenedArchive {
    handler: Box<dyn ArchiveHandler>,
    format: FormatDescriptor,
    chain: Vec<NestingLink>,
    sub_archive_name: Option<String>,
}

impl OpenedArchive {
    /// Format of the innermost opened archive.
    pub fn format(&self) -> &FormatDescriptor {
        &self.format
    }

    /// Unwrap steps taken, outermost first. Empty when nothing was nested.
    pub fn chain(&self) -> &[NestingLink] {
        &self.chain
    }

    /// Display name of the innermost archive when it was reached by
    /// unwrapping (e.g., `outer.tar` for `outer.tar.gz`).
    pub fn sub_archive_name(&self) -> Option<&str> {
        self.sub_archive_name.as_deref()
    }

    pub fn handler(&self) -> &dyn ArchiveHandler {
        self.handler.as_ref()
    }

    pub fn handler_mut(&mut self) -> &mut dyn ArchiveHandler {
        self.handler.as_mut()
    }

    pub fn into_handler(self) -> Box<dyn ArchiveHandler> {
        self.handler
    }

    pub fn item_count(&self) -> Result<u32, OpenError> {
        Ok(self.handler.item_count()?)
    }

    /// Size of the archive data in its stream, when the handler reports it.
    pub fn physical_size(&self) -> Result<Option<u64>, OpenError> {
        Ok(self
            .handler
            .archive_property(ArchiveProperty::PhysicalSize)?
            .and_then(|v| v.as_u64()))
    }

    /// List the entries of the opened archive.
    pub fn entries(&self) -> Result<Vec<ArchiveEntry>, OpenError> {
        let count = self.handler.item_count()?;
        let mut entries = Vec::with_capacity(count as usize);

        for index in 0..count {
            let prop = |p| self.handler.item_property(index, p);

            entries.push(ArchiveEntry {
                path: self.handler.item_path(index)?,
                is_directory: prop(ItemProperty::IsDir)?
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                size: prop(ItemProperty::Size)?
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
                compressed_size: prop(ItemProperty::PackedSize)?.and_then(|v| v.as_u64()),
                encrypted: prop(ItemProperty::Encrypted)?
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            });
        }

        Ok(entries)
    }

    /// Summary suitable for display or JSON output.
    pub fn info(&self) -> Result<ArchiveInfo, OpenError> {
        let entry_list = self.entries()?;
        Ok(ArchiveInfo {
            format: self.format.name.clone(),
            chain: self.chain.clone(),
            sub_archive_name: self.sub_archive_name.clone(),
            physical_size: self.physical_size()?,
            entries: entry_list.len() as u64,
            encrypted: entry_list.iter().any(|e| e.encrypted),
            entry_list,
        })
    }
}

impl fmt::Debug for OpenedArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedArchive")
            .field("format", &self.format.name)
            .field("chain", &self.chain)
            .field("sub_archive_name", &self.sub_archive_name)
            .finish_non_exhaustive()
    }
}

/// Open `stream` and unwrap nested single-member containers.
///
/// `extension` is the hint used when `options.detect_by_signature` is off;
/// it only applies to the outermost level.
///
/// # Errors
///
/// - `FormatNotFound` / `NoFormatAvailable` when the outermost stream cannot
///   be classified
/// - `PasswordRequired` when the engine asked for a password that was not
///   supplied or was rejected
/// - `Engine` with the engine's code unchanged for any other engine failure
/// - `TooDeeplyNested` past [`MAX_NESTING_DEPTH`] unwrap steps
pub fn open_archive<E: ArchiveEngine + ?Sized>(
    engine: &E,
    registry: &FormatRegistry,
    stream: Box<dyn InStream>,
    extension: &str,
    options: &OpenOptions,
) -> Result<OpenedArchive, OpenError> {
    let credentials = Credentials::new(options.password.as_deref());
    let callback = OpenCallback::new(Box::new(credentials), None);
    resolve(engine, registry, stream, extension, options, callback)
}

/// Like [`open_archive`], asking `credentials` for the password instead of
/// using `options.password`.
pub fn open_archive_with_credentials<E: ArchiveEngine + ?Sized>(
    engine: &E,
    registry: &FormatRegistry,
    stream: Box<dyn InStream>,
    extension: &str,
    options: &OpenOptions,
    credentials: &dyn CredentialSource,
) -> Result<OpenedArchive, OpenError> {
    let callback = OpenCallback::new(Box::new(credentials), None);
    resolve(engine, registry, stream, extension, options, callback)
}

/// Like [`open_archive`], taking the stream's file name instead of a bare
/// extension. The name is also reported to handlers that derive member names
/// from their archive's name.
pub fn open_named_archive<E: ArchiveEngine + ?Sized>(
    engine: &E,
    registry: &FormatRegistry,
    stream: Box<dyn InStream>,
    name: &str,
    options: &OpenOptions,
) -> Result<OpenedArchive, OpenError> {
    let credentials = Credentials::new(options.password.as_deref());
    let callback = OpenCallback::new(Box::new(credentials), None).with_archive_name(name);
    resolve(engine, registry, stream, extension_of(name), options, callback)
}

/// Open a split archive whose volumes are served by `volumes`.
///
/// The first volume is the initial stream; the engine requests the others
/// through the open callback.
pub fn open_multi_volume_archive<E: ArchiveEngine + ?Sized>(
    engine: &E,
    registry: &FormatRegistry,
    volumes: &mut dyn VolumeSource,
    options: &OpenOptions,
) -> Result<OpenedArchive, OpenError> {
    let first = volumes.first_volume_name();
    if !volumes.move_to_volume(&first) {
        return Err(OpenError::VolumeNotFound(first));
    }

    let stream = volumes.open_current_volume()?;
    let extension = extension_of(&first).to_string();

    let credentials = Credentials::new(options.password.as_deref());
    let callback = OpenCallback::new(Box::new(credentials), Some(volumes));
    resolve(engine, registry, stream, &extension, options, callback)
}

/// Extension of the last path component, without the dot.
pub fn extension_of(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(pos) => &name[pos + 1..],
        None => "",
    }
}

/// Mutable state threaded through one resolution.
struct ResolutionContext {
    extension: String,
    mode: DetectMode,
    chain: Vec<NestingLink>,
}

impl ResolutionContext {
    /// Nested levels are always verified by signature.
    fn descend(&mut self, link: NestingLink) {
        self.extension = extension_of(&link.path).to_string();
        self.mode = DetectMode::Signature;
        self.chain.push(link);
    }
}

fn resolve<E: ArchiveEngine + ?Sized>(
    engine: &E,
    registry: &FormatRegistry,
    mut stream: Box<dyn InStream>,
    extension: &str,
    options: &OpenOptions,
    mut callback: OpenCallback<'_>,
) -> Result<OpenedArchive, OpenError> {
    let allow_list = sfx_allow_list(registry, options);
    let mut ctx = ResolutionContext {
        extension: extension.to_string(),
        mode: DetectMode::from_signature_flag(options.detect_by_signature),
        chain: Vec::new(),
    };

    let mut format = match_format(registry, &allow_list, stream.as_mut(), &ctx.extension, ctx.mode)?;
    let mut handler = open_handler(engine, format, stream, &mut callback)?;

    while let Some((mut inner, link)) = main_subfile_stream(handler.as_mut(), &format.name)? {
        if ctx.chain.len() >= MAX_NESTING_DEPTH {
            return Err(OpenError::TooDeeplyNested {
                limit: MAX_NESTING_DEPTH,
            });
        }

        let path = link.path.clone();
        ctx.descend(link);

        let inner_format =
            match match_format(registry, &allow_list, inner.as_mut(), &ctx.extension, ctx.mode) {
                Ok(f) => f,
                Err(e @ (OpenError::FormatNotFound | OpenError::NoFormatAvailable(_))) => {
                    warn!(path = %path, error = %e, "main subfile is not a known archive, stopping");
                    ctx.chain.pop();
                    break;
                }
                Err(e) => return Err(e),
            };

        debug!(
            outer = %format.name,
            inner = %inner_format.name,
            path = %path,
            "unwrapping main subfile"
        );

        callback.name_sink().set_sub_archive_name(&path);

        // The outer handler is released once the inner one has opened
        handler = open_handler(engine, inner_format, inner, &mut callback)?;
        format = inner_format;
    }

    Ok(OpenedArchive {
        handler,
        format: format.clone(),
        sub_archive_name: if ctx.chain.is_empty() {
            None
        } else {
            callback.sub_archive_name().map(str::to_string)
        },
        chain: ctx.chain,
    })
}

/// SFX allow-list: the caller's, else the registry document's, else the
/// built-in one.
pub(crate) fn sfx_allow_list<'a>(registry: &'a FormatRegistry, options: &'a OpenOptions) -> Vec<&'a str> {
    match options.sfx_handlers.as_deref().or(registry.sfx_handlers()) {
        Some(names) => names.iter().map(String::as_str).collect(),
        None => DEFAULT_SFX_HANDLERS.to_vec(),
    }
}

fn open_handler<E: ArchiveEngine + ?Sized>(
    engine: &E,
    format: &FormatDescriptor,
    stream: Box<dyn InStream>,
    callback: &mut OpenCallback<'_>,
) -> Result<Box<dyn ArchiveHandler>, OpenError> {
    let mut handler = engine.create_handler(&format.class_id)?;

    if let Some(sink) = handler.codecs_sink() {
        sink.set_codecs_info(engine.codecs_info())?;
    }

    handler.open(stream, MAX_CHECK_START_POSITION, callback)?;
    Ok(handler)
}

/// Stream and link for the main subfile of `handler`, if it designates a
/// usable one. Every "no" answer ends the unwrap without an error.
fn main_subfile_stream(
    handler: &mut dyn ArchiveHandler,
    format_name: &str,
) -> Result<Option<(Box<dyn InStream>, NestingLink)>, OpenError> {
    let index = match handler.archive_property(ArchiveProperty::MainSubfile)? {
        Some(PropValue::U32(index)) => index,
        other => {
            debug!(format = format_name, value = ?other, "no main subfile");
            return Ok(None);
        }
    };

    let count = handler.item_count()?;
    if index >= count {
        debug!(format = format_name, index, count, "main subfile index out of range");
        return Ok(None);
    }

    let Some(source) = handler.item_streams() else {
        debug!(format = format_name, "handler cannot produce item streams");
        return Ok(None);
    };

    let stream = match source.item_stream(index) {
        Ok(Some(stream)) => stream,
        Ok(None) => {
            debug!(format = format_name, index, "no stream for main subfile");
            return Ok(None);
        }
        Err(e) => {
            warn!(format = format_name, index, error = %e, "main subfile stream failed");
            return Ok(None);
        }
    };

    let path = handler.item_path(index)?;

    Ok(Some((
        stream,
        NestingLink {
            outer_format: format_name.to_string(),
            main_subfile: index,
            path,
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("dir.d/archive"), "");
        assert_eq!(extension_of("C:\\x.y\\setup.EXE"), "EXE");
        assert_eq!(extension_of("trailing."), "");
        assert_eq!(extension_of(""), "");
    }
}
