//! ZIP archive handler, including zip payloads behind an executable stub.

use super::{item_count, item_property, Item};
use crate::callback::OpenCallback;
use crate::engine::{ArchiveHandler, ArchiveProperty, ItemProperty, PropValue};
use crate::error::EngineError;
use crate::probe::InStream;
use std::io::{Seek, SeekFrom};

/// Terminal handler listing the members of a zip archive.
#[derive(Default)]
pub struct ZipHandler {
    items: Vec<Item>,
    physical_size: u64,
}

impl ZipHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

fn zip_error(e: zip::result::ZipError) -> EngineError {
    match e {
        zip::result::ZipError::Io(io) => io.into(),
        other => EngineError::data(other.to_string()),
    }
}

impl ArchiveHandler for ZipHandler {
    fn open(
        &mut self,
        mut stream: Box<dyn InStream>,
        _max_check_start_position: u64,
        callback: &mut OpenCallback<'_>,
    ) -> Result<(), EngineError> {
        self.physical_size = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;

        let mut archive = zip::ZipArchive::new(stream).map_err(zip_error)?;
        callback.set_total(Some(archive.len() as u64), None);

        let mut items = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            // Raw access lists encrypted entries without a password
            let entry = archive.by_index_raw(i).map_err(zip_error)?;

            items.push(Item {
                path: entry.name().to_string(),
                is_dir: entry.is_dir(),
                size: entry.size(),
                packed_size: Some(entry.compressed_size()),
                encrypted: entry.encrypted(),
            });
        }

        callback.set_completed(Some(items.len() as u64), None);
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
