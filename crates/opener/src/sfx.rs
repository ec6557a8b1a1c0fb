//! Self-extracting executable scan.
//!
//! An SFX stub carries its archive payload somewhere inside the first
//! megabyte, at a position that depends on the stub. Allowed payload formats
//! are searched for anywhere in that window rather than at their declared
//! offsets.

use crate::probe::{probe_head, InStream};
use crate::registry::{FormatDescriptor, FormatRegistry};
use memchr::memmem;
use std::io;
use tracing::debug;

/// Header window read from an executable (RAR's `MAXSFXSIZE`).
pub const MAX_SFX_HEADER_SIZE: usize = 0x10_0000;

/// Upper bound on any haystack handed to the substring search.
pub const MAX_SEARCH_SIZE: usize = 100 * 1024 * 1024;

/// Payload formats searched for by default.
pub const DEFAULT_SFX_HANDLERS: &[&str] = &["7z", "Rar", "Rar5", "zip", "Cab", "Arj"];

/// Find the first allow-listed format whose signature occurs in the
/// executable's header window.
///
/// Candidates are tried in registry order; `allowed` only filters, it does not
/// reorder. Names are compared exactly.
///
/// # Errors
///
/// Returns an error only if the stream position cannot be saved or restored.
pub fn scan_for_embedded_archive<'r, S, N>(
    registry: &'r FormatRegistry,
    allowed: &[N],
    stream: &mut S,
) -> io::Result<Option<&'r FormatDescriptor>>
where
    S: InStream + ?Sized,
    N: AsRef<str>,
{
    let header = probe_head(stream, MAX_SFX_HEADER_SIZE)?;
    debug!(window = header.len(), "scanning executable header for payload");

    let candidates = registry
        .iter()
        .filter(|f| allowed.iter().any(|name| name.as_ref() == f.name));

    for format in candidates {
        for signature in &format.signatures {
            if find_bounded(&header, &signature.bytes).is_some() {
                debug!(format = %format.name, "found embedded archive signature");
                return Ok(Some(format));
            }
        }
    }

    Ok(None)
}

/// Substring search that refuses oversized haystacks and empty needles.
pub fn find_bounded(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() || haystack.len() > MAX_SEARCH_SIZE {
        return None;
    }
    memmem::find(haystack, needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn registry() -> FormatRegistry {
        FormatRegistry::new(vec![
            FormatDescriptor::new("PE", "pe").with_signature(0, b"MZ"),
            FormatDescriptor::new("Rar", "rar").with_signature(0, b"Rar!\x1a\x07\x00"),
            FormatDescriptor::new("zip", "zip").with_signature(0, b"PK\x03\x04"),
            FormatDescriptor::new("gzip", "gz").with_signature(0, &[0x1F, 0x8B, 0x08]),
        ])
        .unwrap()
    }

    fn stub_with(payload: &[u8], at: usize) -> Vec<u8> {
        let mut data = vec![0u8; at];
        data[..2].copy_from_slice(b"MZ");
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_find_bounded() {
        assert_eq!(find_bounded(b"xxPKyy", b"PK"), Some(2));
        assert_eq!(find_bounded(b"xx", b"PK"), None);
        assert_eq!(find_bounded(b"P", b"PK"), None);
        assert_eq!(find_bounded(b"anything", b""), None);
    }

    #[test]
    fn test_scan_finds_payload_at_any_offset() {
        let registry = registry();
        let mut stream = Cursor::new(stub_with(b"PK\x03\x04rest", 0x4321));
        let found = scan_for_embedded_archive(&registry, DEFAULT_SFX_HANDLERS, &mut stream).unwrap();
        assert_eq!(found.map(|f| f.name.as_str()), Some("zip"));
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_scan_uses_registry_order() {
        let registry = registry();
        let mut data = stub_with(b"PK\x03\x04", 64);
        data.extend_from_slice(b"Rar!\x1a\x07\x00");
        let mut stream = Cursor::new(data);
        let found = scan_for_embedded_archive(&registry, &["zip", "Rar"], &mut stream).unwrap();
        assert_eq!(found.map(|f| f.name.as_str()), Some("Rar"));
    }

    #[test]
    fn test_scan_ignores_formats_outside_allow_list() {
        let registry = registry();
        let mut stream = Cursor::new(stub_with(&[0x1F, 0x8B, 0x08, 0x00], 128));
        let found = scan_for_embedded_archive(&registry, DEFAULT_SFX_HANDLERS, &mut stream).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_scan_ignores_payload_beyond_window() {
        let registry = registry();
        let mut stream = Cursor::new(stub_with(b"PK\x03\x04", MAX_SFX_HEADER_SIZE));
        let found = scan_for_embedded_archive(&registry, DEFAULT_SFX_HANDLERS, &mut stream).unwrap();
        assert!(found.is_none());
    }
}
