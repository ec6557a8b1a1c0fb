//! Single-member compression wrappers (gzip, bzip2, xz).

use super::{item_count, item_property, Item};
use crate::callback::OpenCallback;
use crate::engine::{ArchiveHandler, ArchiveProperty, ItemProperty, ItemStreamSource, PropValue};
use crate::error::EngineError;
use crate::open::extension_of;
use crate::probe::InStream;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

/// Compression codec of a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Bzip2,
    Xz,
}

/// Handler exposing the unpacked payload of a wrapper as item 0.
pub struct CompressedHandler {
    codec: Codec,
    unpack_limit: u64,
    packed_size: u64,
    items: Vec<Item>,
    data: Option<Arc<[u8]>>,
}

impl CompressedHandler {
    pub fn new(codec: Codec, unpack_limit: u64) -> Self {
        Self {
            codec,
            unpack_limit,
            packed_size: 0,
            items: Vec::new(),
            data: None,
        }
    }

    /// Unpack the whole member, returning it with the name stored in the
    /// wrapper header, if any. Concatenated gzip members and bzip2 streams
    /// (pigz, bgzip, pbzip2 output) unpack as one member.
    fn unpack(&self, stream: Box<dyn InStream>) -> Result<(Vec<u8>, Option<String>), EngineError> {
        match self.codec {
            Codec::Gzip => {
                let mut decoder = flate2::read::MultiGzDecoder::new(stream);
                let data = read_limited(&mut decoder, self.unpack_limit)?;
                let name = decoder
                    .header()
                    .and_then(|h| h.filename())
                    .map(|f| String::from_utf8_lossy(f).into_owned());
                Ok((data, name))
            }
            Codec::Bzip2 => {
                let mut decoder = bzip2::read::MultiBzDecoder::new(stream);
                Ok((read_limited(&mut decoder, self.unpack_limit)?, None))
            }
            Codec::Xz => {
                let mut input = BufReader::new(stream);
                let mut output = LimitedWriter::new(self.unpack_limit);
                lzma_rs::xz_decompress(&mut input, &mut output)
                    .map_err(|e| EngineError::data(format!("xz: {:?}", e)))?;
                Ok((output.into_inner(), None))
            }
        }
    }
}

impl ArchiveHandler for CompressedHandler {
    fn open(
        &mut self,
        mut stream: Box<dyn InStream>,
        _max_check_start_position: u64,
        callback: &mut OpenCallback<'_>,
    ) -> Result<(), EngineError> {
        self.packed_size = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;
        callback.set_total(Some(1), Some(self.packed_size));

        let (data, stored_name) = self.unpack(stream)?;
        let path = stored_name
            .unwrap_or_else(|| member_name(callback.name_property().as_deref().unwrap_or("")));

        callback.set_completed(Some(1), Some(self.packed_size));

        self.items = vec![Item {
            path,
            is_dir: false,
            size: data.len() as u64,
            packed_size: Some(self.packed_size),
            encrypted: false,
        }];
        self.data = Some(Arc::from(data));
        Ok(())
    }

    fn archive_property(&self, property: ArchiveProperty) -> Result<Option<PropValue>, EngineError> {
        if self.data.is_none() {
            return Ok(None);
        }
        Ok(match property {
            ArchiveProperty::MainSubfile => Some(PropValue::U32(0)),
            ArchiveProperty::PhysicalSize => Some(PropValue::U64(self.packed_size)),
        })
    }

    fn item_count(&self) -> Result<u32, EngineError> {
        item_count(&self.items)
    }

    fn item_property(&self, index: u32, property: ItemProperty) -> Result<Option<PropValue>, EngineError> {
        item_property(&self.items, index, property)
    }

    fn item_streams(&mut self) -> Option<&mut dyn ItemStreamSource> {
        Some(self)
    }
}

impl ItemStreamSource for CompressedHandler {
    fn item_stream(&mut self, index: u32) -> Result<Option<Box<dyn InStream>>, EngineError> {
        match (&self.data, index) {
            (Some(data), 0) => Ok(Some(Box::new(Cursor::new(Arc::clone(data))))),
            _ => Ok(None),
        }
    }
}

/// Member name derived from the wrapper's own name: `a.tar.gz` → `a.tar`,
/// `a.tgz` → `a.tar`.
fn member_name(archive_name: &str) -> String {
    let extension = extension_of(archive_name);
    if extension.is_empty() {
        return archive_name.to_string();
    }

    let stem = &archive_name[..archive_name.len() - extension.len() - 1];
    match extension.to_ascii_lowercase().as_str() {
        "tgz" | "tpz" | "tbz" | "tbz2" | "txz" => format!("{}.tar", stem),
        _ => stem.to_string(),
    }
}

fn read_limited<R: Read>(reader: &mut R, limit: u64) -> Result<Vec<u8>, EngineError> {
    let mut data = Vec::new();
    reader
        .by_ref()
        .take(limit.saturating_add(1))
        .read_to_end(&mut data)?;

    if data.len() as u64 > limit {
        return Err(EngineError::data(format!(
            "unpacked size exceeds limit of {} bytes",
            limit
        )));
    }
    Ok(data)
}

/// Output buffer refusing writes past a fixed size.
struct LimitedWriter {
    buf: Vec<u8>,
    limit: u64,
}

impl LimitedWriter {
    fn new(limit: u64) -> Self {
        Self {
            buf: Vec::new(),
            limit,
        }
    }

    fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl Write for LimitedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() as u64 + data.len() as u64 > self.limit {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("unpacked size exceeds limit of {} bytes", self.limit),
            ));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
