use anyhow::{Context, Result};
use memchr::memrchr;
use std::io::{ErrorKind, Read};

/// Splits a byte source into owned chunks that each hold only whole records.
///
/// Every read goes into one reusable block buffer. Bytes after the last newline
/// of a read are carried over in `leftover` and prefixed to the next chunk, so
/// a record is never split across two chunks. At end of source a non-empty
/// leftover (a last record without trailing newline) is emitted as the final
/// chunk.
pub struct Chunker<R> {
    source: R,
    buf: Vec<u8>,
    leftover: Vec<u8>,
    done: bool,
    chunks_emitted: u64,
    bytes_read: u64,
}

impl<R: Read> Chunker<R> {
    pub fn new(source: R, block_bytes: usize) -> Self {
        Self {
            source,
            buf: vec![0u8; block_bytes.max(1)],
            leftover: Vec::new(),
            done: false,
            chunks_emitted: 0,
            bytes_read: 0,
        }
    }

    pub fn chunks_emitted(&self) -> u64 { self.chunks_emitted }

    pub fn bytes_read(&self) -> u64 { self.bytes_read }

    fn emit(&mut self, chunk: Vec<u8>) -> Vec<u8> {
        self.chunks_emitted += 1;
        chunk
    }
}

impl<R: Read> Iterator for Chunker<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let n = match self.source.read(&mut self.buf) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    let at = self.bytes_read;
                    return Some(Err(e).with_context(|| format!("read source at byte {}", at)));
                }
            };
            if n == 0 {
                self.done = true;
                if self.leftover.is_empty() {
                    return None;
                }
                let tail = std::mem::take(&mut self.leftover);
                return Some(Ok(self.emit(tail)));
            }
            self.bytes_read += n as u64;
            let fresh = &self.buf[..n];
            match memrchr(b'\n', fresh) {
                Some(nl) => {
                    let mut chunk = std::mem::take(&mut self.leftover);
                    chunk.extend_from_slice(&fresh[..=nl]);
                    self.leftover.extend_from_slice(&fresh[nl + 1..]);
                    return Some(Ok(self.emit(chunk)));
                }
                None => self.leftover.extend_from_slice(fresh),
            }
        }
        None
    }
}

impl<R: Read> std::iter::FusedIterator for Chunker<R> {}
