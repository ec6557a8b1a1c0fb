//! Format registry: the ordered table of archive formats the resolver knows.
//!
//! Registry order is priority. When two formats share an extension, or their
//! signatures overlap, the earlier descriptor wins, so loaders must keep the
//! order of their source document.

use crate::error::OpenError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Format name the engine uses for generic executable containers.
pub const EXECUTABLE_FORMAT_NAME: &str = "PE";

/// Opaque handler identifier passed back to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub String);

impl ClassId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Byte pattern expected at a fixed offset from the start of the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Offset of the pattern from the start of the stream
    #[serde(default)]
    pub offset: u64,

    /// Pattern bytes (hex encoded in registry documents)
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

impl Signature {
    pub fn new(offset: u64, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            bytes: bytes.into(),
        }
    }
}

/// Identity of one supported archive kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Engine format name (e.g., "zip", "gzip", "PE")
    pub name: String,

    /// Handler identifier understood by the engine
    pub class_id: ClassId,

    /// Recognized file extensions, without the leading dot
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Signatures usable for content detection
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

impl FormatDescriptor {
    pub fn new(name: impl Into<String>, class_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_id: ClassId::new(class_id),
            extensions: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Adds extensions, builder style.
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions
            .extend(extensions.iter().map(|e| e.to_string()));
        self
    }

    /// Adds a signature, builder style.
    pub fn with_signature(mut self, offset: u64, bytes: &[u8]) -> Self {
        self.signatures.push(Signature::new(offset, bytes));
        self
    }

    /// Case-insensitive exact comparison against the known extensions.
    pub fn matches_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    pub fn is_executable(&self) -> bool {
        self.name == EXECUTABLE_FORMAT_NAME
    }
}

/// Registry document as stored on disk.
#[derive(Debug, Deserialize)]
struct RegistryDocument {
    formats: Vec<FormatDescriptor>,
    #[serde(default)]
    sfx_handlers: Option<Vec<String>>,
}

/// Read-only ordered list of format descriptors.
///
/// Never mutated after construction, so one registry can be shared by
/// concurrent resolutions behind a plain reference or `Arc`.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    formats: Vec<FormatDescriptor>,
    sfx_handlers: Option<Vec<String>>,
}

impl FormatRegistry {
    /// Builds a registry from descriptors, keeping their order.
    pub fn new(formats: Vec<FormatDescriptor>) -> Result<Self, OpenError> {
        validate(&formats)?;
        Ok(Self {
            formats,
            sfx_handlers: None,
        })
    }

    /// Parses a JSON registry document.
    pub fn from_json<R: Read>(reader: R) -> Result<Self, OpenError> {
        let doc: RegistryDocument = serde_json::from_reader(reader)?;
        validate(&doc.formats)?;
        Ok(Self {
            formats: doc.formats,
            sfx_handlers: doc.sfx_handlers,
        })
    }

    /// Loads a JSON registry document from disk.
    pub fn load(path: &Path) -> Result<Self, OpenError> {
        let file = File::open(path)?;
        Self::from_json(BufReader::new(file))
    }

    /// Table matching the formats served by [`crate::builtin::BuiltinEngine`].
    pub fn builtin() -> Self {
        // The tar magic sits behind the first member's name, which can start
        // with any short magic: keep tar ahead of the offset-0 compressors.
        let bzip2 = (b'1'..=b'9').fold(
            FormatDescriptor::new("bzip2", "builtin.bzip2")
                .with_extensions(&["bz2", "bzip2", "tbz2", "tbz"]),
            |format, level| format.with_signature(0, &[b'B', b'Z', b'h', level]),
        );

        let formats = vec![
            FormatDescriptor::new("zip", "builtin.zip")
                .with_extensions(&["zip", "jar", "xpi", "odt", "ods", "docx", "xlsx", "epub"])
                .with_signature(0, b"PK\x03\x04")
                .with_signature(0, b"PK\x05\x06"),
            FormatDescriptor::new("tar", "builtin.tar")
                .with_extensions(&["tar", "ova"])
                .with_signature(257, b"ustar"),
            bzip2,
            FormatDescriptor::new("gzip", "builtin.gzip")
                .with_extensions(&["gz", "gzip", "tgz", "tpz"])
                .with_signature(0, &[0x1F, 0x8B, 0x08]),
            FormatDescriptor::new("xz", "builtin.xz")
                .with_extensions(&["xz", "txz"])
                .with_signature(0, &[0xFD, b'7', b'z', b'X', b'Z', 0x00]),
            FormatDescriptor::new(EXECUTABLE_FORMAT_NAME, "builtin.pe")
                .with_extensions(&["exe", "dll", "sys"])
                .with_signature(0, b"MZ"),
        ];

        Self {
            formats,
            sfx_handlers: None,
        }
    }

    pub fn formats(&self) -> &[FormatDescriptor] {
        &self.formats
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormatDescriptor> {
        self.formats.iter()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|f| f.name == name)
    }

    /// SFX payload allow-list carried by the registry document, if any.
    pub fn sfx_handlers(&self) -> Option<&[String]> {
        self.sfx_handlers.as_deref()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

fn validate(formats: &[FormatDescriptor]) -> Result<(), OpenError> {
    for format in formats {
        if format.name.is_empty() {
            return Err(OpenError::InvalidRegistry(
                "format with empty name".to_string(),
            ));
        }
        if format.signatures.iter().any(|s| s.bytes.is_empty()) {
            return Err(OpenError::InvalidRegistry(format!(
                "format {} declares an empty signature",
                format.name
            )));
        }
    }
    Ok(())
}

// Hex (de)serialization for signature bytes
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim()).map_err(serde::de::Error::custom)
    }
}
