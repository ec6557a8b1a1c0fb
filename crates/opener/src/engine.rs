//! Contract with the external codec engine.
//!
//! The resolver never reads archive contents itself. It asks an
//! [`ArchiveEngine`] for a handler bound to a format, opens it, and inspects
//! a few properties. Optional engine features are exposed as capability
//! accessors returning `None` when unsupported.

use crate::callback::OpenCallback;
use crate::error::EngineError;
use crate::probe::InStream;
use crate::registry::ClassId;
use std::sync::Arc;

/// Archive-level properties the resolver asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveProperty {
    /// Index of the single embedded item that is the real payload
    MainSubfile,
    /// Size of the archive data in the stream
    PhysicalSize,
}

/// Per-item properties used for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemProperty {
    Path,
    Size,
    PackedSize,
    IsDir,
    Encrypted,
}

/// Property value as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    U32(u32),
    U64(u64),
    Bool(bool),
    Str(String),
}

impl PropValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PropValue::U32(v) => Some(u64::from(*v)),
            PropValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// Codec known to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecDescriptor {
    pub id: u64,
    pub name: String,
}

/// Codec table handed to handlers that accept external codecs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecsInfo {
    pub codecs: Vec<CodecDescriptor>,
}

/// Factory for format handlers.
pub trait ArchiveEngine {
    /// Instantiate a handler bound to the format identified by `class_id`.
    fn create_handler(&self, class_id: &ClassId) -> Result<Box<dyn ArchiveHandler>, EngineError>;

    /// Codec table offered to handlers with [`ArchiveHandler::codecs_sink`].
    fn codecs_info(&self) -> Arc<CodecsInfo> {
        Arc::new(CodecsInfo::default())
    }
}

/// One format handler instance.
///
/// `open` takes ownership of the stream; the handler keeps it for as long as
/// it needs to read archive data.
pub trait ArchiveHandler {
    /// Open the archive in `stream`. `max_check_start_position` bounds how far
    /// into the stream the handler may look for its header.
    fn open(
        &mut self,
        stream: Box<dyn InStream>,
        max_check_start_position: u64,
        callback: &mut OpenCallback<'_>,
    ) -> Result<(), EngineError>;

    fn archive_property(&self, property: ArchiveProperty) -> Result<Option<PropValue>, EngineError>;

    fn item_count(&self) -> Result<u32, EngineError>;

    fn item_property(&self, index: u32, property: ItemProperty) -> Result<Option<PropValue>, EngineError>;

    /// Item path, falling back to an empty string when the item has none.
    fn item_path(&self, index: u32) -> Result<String, EngineError> {
        Ok(self
            .item_property(index, ItemProperty::Path)?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    /// Item stream capability.
    fn item_streams(&mut self) -> Option<&mut dyn ItemStreamSource> {
        None
    }

    /// Codec injection capability.
    fn codecs_sink(&mut self) -> Option<&mut dyn SetCodecsInfo> {
        None
    }
}

/// Produces a readable, seekable view of a single item.
pub trait ItemStreamSource {
    /// The returned stream must not borrow from the handler: the handler may
    /// be dropped while the stream is still in use.
    fn item_stream(&mut self, index: u32) -> Result<Option<Box<dyn InStream>>, EngineError>;
}

/// Accepts an external codec table before the archive is opened.
pub trait SetCodecsInfo {
    fn set_codecs_info(&mut self, info: Arc<CodecsInfo>) -> Result<(), EngineError>;
}
