//! TAR archive handler.

use super::{item_count, item_property, Item};
use crate::callback::OpenCallback;
use crate::engine::{ArchiveHandler, ArchiveProperty, ItemProperty, PropValue};
use crate::error::EngineError;
use crate::probe::InStream;
use std::io::{Seek, SeekFrom};

/// Terminal handler listing the members of a tar stream.
#[derive(Default)]
pub struct TarHandler {
    items: Vec<Item>,
    physical_size: u64,
}

impl TarHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArchiveHandler for TarHandler {
    fn open(
        &mut self,
        mut stream: Box<dyn InStream>,
        _max_check_start_position: u64,
        callback: &mut OpenCallback<'_>,
    ) -> Result<(), EngineError> {
        self.physical_size = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;
        callback.set_total(None, Some(self.physical_size));

        let mut archive = tar::Archive::new(stream);
        let mut items = Vec::new();

        for entry_result in archive.entries()? {
            let entry = entry_result?;
            let header = entry.header();

            items.push(Item {
                path: entry.path()?.to_string_lossy().into_owned(),
                is_dir: header.entry_type().is_dir(),
                size: entry.size(),
                packed_size: None,
                encrypted: false,
            });
            callback.set_completed(Some(items.len() as u64), None);
        }

        self.items = items;
        Ok(())
    }

    fn archive_property(&self, property: ArchiveProperty) -> Result<Option<PropValue>, EngineError> {
        Ok(match property {
            ArchiveProperty::MainSubfile => None,
            ArchiveProperty::PhysicalSize => Some(PropValue::U64(self.physical_size)),
        })
    }

    fn item_count(&self) -> Result<u32, EngineError> {
        item_count(&self.items)
    }

    fn item_property(&self, index: u32, property: ItemProperty) -> Result<Option<PropValue>, EngineError> {
        item_property(&self.items, index, property)
    }
}
