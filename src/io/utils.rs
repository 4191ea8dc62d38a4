use std::io::{self, prelude::*};

/// A wrapper around a non-seekable stream that reads a prefix up front so it can
/// be inspected, then replays it before continuing with the rest of the stream.
pub struct PreBufferedStream<R: io::Read> {
    stream: R,
    buffer: Vec<u8>,
    position: usize,
}

const DEFAULT_BUFFER_SIZE: usize = 8192;

impl<R: io::Read> PreBufferedStream<R> {
    pub fn new(stream: R) -> io::Result<Self> {
        Self::new_with_buffer_size(stream, DEFAULT_BUFFER_SIZE)
    }

    /// Read up to `buffer_size` bytes of `stream` into the prefix buffer
    pub fn new_with_buffer_size(stream: R, buffer_size: usize) -> io::Result<Self> {
        let mut buffer = Vec::with_capacity(buffer_size);
        let mut stream = stream;
        (&mut stream)
            .take(buffer_size as u64)
            .read_to_end(&mut buffer)?;
        Ok(Self {
            stream,
            buffer,
            position: 0,
        })
    }

    /// The bytes read up front, regardless of how much has been consumed since
    pub fn prefix(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> R {
        self.stream
    }
}

impl<R: io::Read> io::Read for PreBufferedStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position < self.buffer.len() {
            let rest = &self.buffer[self.position..];
            let n = rest.len().min(buf.len());
            buf[..n].copy_from_slice(&rest[..n]);
            self.position += n;
            Ok(n)
        } else {
            self.stream.read(buf)
        }
    }
}

/// Read at most `max_lines` lines and `max_bytes` bytes from `stream` for
/// content sniffing. Bytes that are not UTF-8 are replaced, line terminators
/// are stripped.
pub fn sniff_lines<R: BufRead>(
    stream: &mut R,
    max_lines: usize,
    max_bytes: usize,
) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    let mut budget = max_bytes as u64;
    while lines.len() < max_lines && budget > 0 {
        buf.clear();
        let n = stream.by_ref().take(budget).read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        budget = budget.saturating_sub(n as u64);
        let line = String::from_utf8_lossy(&buf);
        lines.push(line.trim_end_matches(['\n', '\r']).to_string());
    }
    Ok(lines)
}
