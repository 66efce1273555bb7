//! Scanning one file: tolerant line decoding and a single batched append.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Decodes UTF-8, dropping invalid byte sequences.
fn decode_ignoring_invalid(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            let mut out = String::with_capacity(bytes.len());
            let mut rest = bytes;
            loop {
                match std::str::from_utf8(rest) {
                    Ok(s) => {
                        out.push_str(s);
                        break;
                    }
                    Err(e) => {
                        let valid = e.valid_up_to();
                        out.push_str(std::str::from_utf8(&rest[..valid]).unwrap_or_default());
                        let skip = e.error_len().unwrap_or(rest.len() - valid);
                        rest = &rest[valid + skip..];
                    }
                }
            }
            Cow::Owned(out)
        }
    }
}

/// Collects the lines of `path` containing `needle_lower` (already lowercased),
/// ignoring case. Line terminators are stripped. Read errors end the scan early
/// and keep what was collected.
pub(super) fn matching_lines(path: &Path, needle_lower: &str, halt: &AtomicBool) -> std::io::Result<Vec<String>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();
    let mut lines = Vec::new();
    loop {
        if halt.load(Ordering::Relaxed) {
            break;
        }
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(file = %path.display(), "read error mid-file: {}", e);
                break;
            }
        }
        let mut raw: &[u8] = &buf;
        if let Some(stripped) = raw.strip_suffix(b"\n") {
            raw = stripped;
        }
        if let Some(stripped) = raw.strip_suffix(b"\r") {
            raw = stripped;
        }
        let line = decode_ignoring_invalid(raw);
        if line.to_lowercase().contains(needle_lower) {
            lines.push(line.into_owned());
        }
    }
    Ok(lines)
}

/// Scans one file and appends its matches to `sink` under the lock.
///
/// Returns the number of lines written. The lock is held only for this
/// file's batch.
pub(super) fn scan_file(path: &Path, needle_lower: &str, sink: &Mutex<File>, halt: &AtomicBool) -> u64 {
    let lines = match matching_lines(path, needle_lower, halt) {
        Ok(lines) => lines,
        Err(e) => {
            tracing::debug!(file = %path.display(), "skipping unreadable file: {}", e);
            return 0;
        }
    };
    if lines.is_empty() || halt.load(Ordering::Relaxed) {
        return 0;
    }

    let mut batch = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in &lines {
        batch.push_str(line);
        batch.push('\n');
    }

    let mut out = match sink.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match out.write_all(batch.as_bytes()).and_then(|_| out.flush()) {
        Ok(()) => lines.len() as u64,
        Err(e) => {
            tracing::warn!(file = %path.display(), "failed to append matches: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sequences_are_dropped() {
        assert_eq!(decode_ignoring_invalid(b"ab\xffcd"), "abcd");
        assert_eq!(decode_ignoring_invalid(b"\xe2\x82"), "");
        assert_eq!(decode_ignoring_invalid("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn matching_is_case_insensitive_and_strips_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"First NEEDLE line\r\nnothing\nneedle\xff again\n").unwrap();
        let halt = AtomicBool::new(false);
        let lines = matching_lines(&path, "needle", &halt).unwrap();
        assert_eq!(lines, vec!["First NEEDLE line".to_string(), "needle again".to_string()]);
    }

    #[test]
    fn halted_scan_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "needle\n").unwrap();
        let out_path = dir.path().join("out.txt");
        let sink = Mutex::new(File::create(&out_path).unwrap());
        let halt = AtomicBool::new(true);
        assert_eq!(scan_file(&path, "needle", &sink, &halt), 0);
        assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "");
    }

    #[test]
    fn vanished_file_scans_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, "needle\n").unwrap();
        std::fs::remove_file(&path).unwrap();
        let out_path = dir.path().join("out.txt");
        let sink = Mutex::new(File::create(&out_path).unwrap());
        let halt = AtomicBool::new(false);
        assert_eq!(scan_file(&path, "needle", &sink, &halt), 0);
        assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "");
    }
}
