//! Built-in reference engine backed by pure codec crates.
//!
//! Serves the formats listed by [`crate::FormatRegistry::builtin`]:
//! `gzip`, `bzip2` and `xz` as single-member wrappers that designate their
//! member as main subfile, and `tar` and `zip` as terminal archives.

mod compressed;
mod tar_handler;
mod zip_handler;

pub use compressed::{Codec, CompressedHandler};
pub use tar_handler::TarHandler;
pub use zip_handler::ZipHandler;

use crate::engine::{ArchiveEngine, ArchiveHandler, ItemProperty, PropValue};
use crate::error::EngineError;
use crate::registry::ClassId;

/// Default cap on the unpacked size of a wrapper's member (1 GiB).
pub const DEFAULT_UNPACK_LIMIT: u64 = 1024 * 1024 * 1024;

/// Engine for the built-in format table.
#[derive(Debug, Clone)]
pub struct BuiltinEngine {
    unpack_limit: u64,
}

impl Default for BuiltinEngine {
    fn default() -> Self {
        Self {
            unpack_limit: DEFAULT_UNPACK_LIMIT,
        }
    }
}

impl BuiltinEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the unpacked size of single-member wrappers, which are held in
    /// memory while nested archives are opened from them.
    pub fn with_unpack_limit(mut self, limit: u64) -> Self {
        self.unpack_limit = limit;
        self
    }
}

impl ArchiveEngine for BuiltinEngine {
    fn create_handler(&self, class_id: &ClassId) -> Result<Box<dyn ArchiveHandler>, EngineError> {
        let handler: Box<dyn ArchiveHandler> = match class_id.as_str() {
            "builtin.gzip" => Box::new(CompressedHandler::new(Codec::Gzip, self.unpack_limit)),
            "builtin.bzip2" => Box::new(CompressedHandler::new(Codec::Bzip2, self.unpack_limit)),
            "builtin.xz" => Box::new(CompressedHandler::new(Codec::Xz, self.unpack_limit)),
            "builtin.tar" => Box::new(TarHandler::new()),
            "builtin.zip" => Box::new(ZipHandler::new()),
            _ => return Err(EngineError::class_not_available(class_id)),
        };
        Ok(handler)
    }
}

/// Listing record kept by the built-in handlers.
#[derive(Debug, Clone)]
struct Item {
    path: String,
    is_dir: bool,
    size: u64,
    packed_size: Option<u64>,
    encrypted: bool,
}

fn item_property(items: &[Item], index: u32, property: ItemProperty) -> Result<Option<PropValue>, EngineError> {
    let item = items
        .get(index as usize)
        .ok_or_else(|| EngineError::fail(format!("item index {} out of range", index)))?;

    Ok(match property {
        ItemProperty::Path => Some(PropValue::Str(item.path.clone())),
        ItemProperty::Size => Some(PropValue::U64(item.size)),
        ItemProperty::PackedSize => item.packed_size.map(PropValue::U64),
        ItemProperty::IsDir => Some(PropValue::Bool(item.is_dir)),
        ItemProperty::Encrypted => Some(PropValue::Bool(item.encrypted)),
    })
}

fn item_count(items: &[Item]) -> Result<u32, EngineError> {
    u32::try_from(items.len()).map_err(|_| EngineError::data("too many items"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_class_not_available() {
        let engine = BuiltinEngine::new();
        let err = engine.create_handler(&ClassId::new("builtin.pe")).err().unwrap();
        assert_eq!(err.code, EngineError::E_CLASS_NOT_AVAILABLE);
    }

    #[test]
    fn test_item_property_out_of_range() {
        let items = vec![Item {
            path: "a".into(),
            is_dir: false,
            size: 1,
            packed_size: None,
            encrypted: false,
        }];
        assert_eq!(
            item_property(&items, 0, ItemProperty::Path).unwrap(),
            Some(PropValue::Str("a".into()))
        );
        assert_eq!(item_property(&items, 0, ItemProperty::PackedSize).unwrap(), None);
        assert!(item_property(&items, 1, ItemProperty::Path).is_err());
    }
}
