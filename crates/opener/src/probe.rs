//! Stream probing: reading bounded byte windows without disturbing the
//! caller's read position.

use std::io::{self, Read, Seek, SeekFrom};
use tracing::debug;

/// Seekable byte stream accepted by the resolver and the engine.
pub trait InStream: Read + Seek {}

impl<T: Read + Seek + ?Sized> InStream for T {}

/// Read exactly `len` bytes at `pos`, restoring the stream position afterwards.
///
/// The position observed by the caller is the same before and after the call
/// on every path that returns `Ok`.
///
/// # Returns
///
/// - `Ok(Some(bytes))` when the full window was read
/// - `Ok(None)` when the window is unavailable: the seek failed, a read
///   failed, or the stream ended before `len` bytes
///
/// # Errors
///
/// Returns an error only when the current position cannot be saved or
/// restored, since the stream is then in an unknown state.
pub fn probe<S: InStream + ?Sized>(
    stream: &mut S,
    pos: SeekFrom,
    len: usize,
) -> io::Result<Option<Vec<u8>>> {
    let mut window = vec![0u8; len];
    let (filled, complete) = with_restored_position(stream, |s| {
        s.seek(pos).map_err(|e| (0, e))?;
        read_full(s, &mut window)
    })?;

    if !complete || filled < len {
        debug!(wanted = len, got = filled, "probe window unavailable");
        return Ok(None);
    }

    Ok(Some(window))
}

/// Read up to `max_len` bytes from the start of the stream, restoring the
/// position afterwards. A short stream yields a short window.
pub fn probe_head<S: InStream + ?Sized>(stream: &mut S, max_len: usize) -> io::Result<Vec<u8>> {
    let mut window = vec![0u8; max_len];
    let (filled, _) = with_restored_position(stream, |s| {
        s.seek(SeekFrom::Start(0)).map_err(|e| (0, e))?;
        read_full(s, &mut window)
    })?;
    window.truncate(filled);
    Ok(window)
}

/// Runs `op` between a save and a restore of the stream position.
///
/// The outcome of `op` is reported as `(bytes, completed)`; a failure inside
/// `op` counts as incomplete with whatever was read so far.
fn with_restored_position<S, F>(stream: &mut S, op: F) -> io::Result<(usize, bool)>
where
    S: InStream + ?Sized,
    F: FnOnce(&mut S) -> Result<usize, (usize, io::Error)>,
{
    let saved = stream.stream_position()?;

    let outcome = match op(stream) {
        Ok(n) => (n, true),
        Err((n, e)) => {
            debug!(error = %e, "probe read failed");
            (n, false)
        }
    };

    stream.seek(SeekFrom::Start(saved))?;
    Ok(outcome)
}

/// Reads until `buf` is full or the stream stops making progress.
fn read_full<S: InStream + ?Sized>(stream: &mut S, buf: &mut [u8]) -> Result<usize, (usize, io::Error)> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err((filled, e)),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_probe_reads_window() {
        let mut cursor = Cursor::new(b"0123456789".to_vec());
        let bytes = probe(&mut cursor, SeekFrom::Start(3), 4).unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"3456"[..]));
    }

    #[test]
    fn test_probe_short_stream() {
        let mut cursor = Cursor::new(b"abc".to_vec());
        cursor.set_position(1);
        assert_eq!(probe(&mut cursor, SeekFrom::Start(0), 8).unwrap(), None);
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_probe_past_end() {
        let mut cursor = Cursor::new(b"abc".to_vec());
        assert_eq!(probe(&mut cursor, SeekFrom::Start(100), 1).unwrap(), None);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_probe_zero_length() {
        let mut cursor = Cursor::new(Vec::new());
        assert_eq!(probe(&mut cursor, SeekFrom::Start(0), 0).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_probe_head_truncates() {
        let mut cursor = Cursor::new(b"MZ\x90\x00".to_vec());
        cursor.set_position(2);
        let head = probe_head(&mut cursor, 1024).unwrap();
        assert_eq!(head, b"MZ\x90\x00");
        assert_eq!(cursor.position(), 2);
    }
}
