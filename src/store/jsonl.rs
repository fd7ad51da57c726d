//! JSON Lines iteration in both directions
//!
//! [`ReverseLines`] walks a file from the end toward the start, reading
//! fixed-size blocks and keeping only the current partial line buffered.
//! Memory use is bounded by the longest line plus one block, regardless of
//! file size, so "the last N records" never loads the whole log. Work is
//! linear in the bytes read, however long the lines are.
//!
//! A file whose last byte is not `\n` ends in a fragment, usually a line a
//! concurrent writer has not finished. [`JsonLines`] drops such a fragment
//! when it fails to parse instead of reporting it.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use serde_json::Value;

use super::{StoreError, StoreResult};

/// Block size for backward reads
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// A raw line and whether it was terminated by `\n`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub bytes: Vec<u8>,
    pub terminated: bool,
}

/// Lines of a seekable source, last line first
///
/// Each byte is read, scanned for `\n` and copied into its line once. A line
/// spanning several blocks is kept as a list of chunks until its start is
/// found, then joined.
pub struct ReverseLines<R> {
    reader: R,
    /// Offset of the first byte of `block` in the source
    pos: u64,
    /// Most recently read block; bytes past `block_end` are already consumed
    block: Vec<u8>,
    block_end: usize,
    /// Pieces of the line in progress, latest bytes first
    partial: Vec<Vec<u8>>,
    block_size: usize,
    /// Whether the next line yielded is the final one of the source
    at_tail: bool,
    tail_terminated: bool,
    done: bool,
}

impl<R: Read + Seek> ReverseLines<R> {
    pub fn new(reader: R) -> io::Result<Self> {
        Self::with_block_size(reader, DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(mut reader: R, block_size: usize) -> io::Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        let tail_terminated = if len == 0 {
            true
        } else {
            reader.seek(SeekFrom::Start(len - 1))?;
            let mut last = [0u8; 1];
            reader.read_exact(&mut last)?;
            last[0] == b'\n'
        };

        // Drop the final newline so the first split yields the last line
        let pos = if tail_terminated && len > 0 { len - 1 } else { len };

        Ok(Self {
            reader,
            pos,
            block: Vec::new(),
            block_end: 0,
            partial: Vec::new(),
            block_size: block_size.max(1),
            at_tail: true,
            tail_terminated,
            done: len == 0,
        })
    }

    /// Replace `block` with the previous block of the source
    fn read_block(&mut self) -> io::Result<()> {
        let read_len = (self.block_size as u64).min(self.pos) as usize;
        self.pos -= read_len as u64;
        self.reader.seek(SeekFrom::Start(self.pos))?;

        self.block.clear();
        self.block.resize(read_len, 0);
        self.reader.read_exact(&mut self.block)?;
        self.block_end = read_len;
        Ok(())
    }

    /// Join `head` with the buffered pieces into one line
    fn take_line(&mut self, head_start: usize) -> Vec<u8> {
        let head = &self.block[head_start..self.block_end];
        let len = head.len() + self.partial.iter().map(Vec::len).sum::<usize>();
        let mut line = Vec::with_capacity(len);
        line.extend_from_slice(head);
        for piece in self.partial.drain(..).rev() {
            line.extend_from_slice(&piece);
        }
        line
    }

    fn emit(&mut self, bytes: Vec<u8>) -> RawLine {
        let terminated = !self.at_tail || self.tail_terminated;
        self.at_tail = false;
        RawLine { bytes, terminated }
    }
}

impl<R: Read + Seek> Iterator for ReverseLines<R> {
    type Item = io::Result<RawLine>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(idx) = self.block[..self.block_end].iter().rposition(|&b| b == b'\n') {
                let line = self.take_line(idx + 1);
                self.block_end = idx;
                return Some(Ok(self.emit(line)));
            }

            // No line start in what is left of this block
            if self.block_end > 0 {
                self.block.truncate(self.block_end);
                self.partial.push(std::mem::take(&mut self.block));
                self.block_end = 0;
            }

            if self.pos == 0 {
                // Whatever is left is the first line of the source
                self.done = true;
                let line = self.take_line(0);
                return Some(Ok(self.emit(line)));
            }
            if let Err(e) = self.read_block() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

/// Lines of a buffered source, first line first
pub struct ForwardLines<R> {
    reader: R,
    done: bool,
}

impl<R: BufRead> ForwardLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for ForwardLines<R> {
    type Item = io::Result<RawLine>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut bytes = Vec::new();
        match self.reader.read_until(b'\n', &mut bytes) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                let terminated = bytes.last() == Some(&b'\n');
                if terminated {
                    bytes.pop();
                }
                Some(Ok(RawLine { bytes, terminated }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Direction of a scan over the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Parsed JSON records over a line iterator
///
/// Blank lines are skipped. A line that fails to parse yields
/// `StoreError::Json`, except an unterminated final fragment, which is
/// dropped.
pub struct JsonLines<I> {
    lines: I,
}

impl<I> JsonLines<I>
where
    I: Iterator<Item = io::Result<RawLine>>,
{
    pub fn new(lines: I) -> Self {
        Self { lines }
    }
}

impl<I> Iterator for JsonLines<I>
where
    I: Iterator<Item = io::Result<RawLine>>,
{
    type Item = StoreResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(StoreError::Io(e))),
            };
            if line.bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<Value>(&line.bytes) {
                Ok(value) => return Some(Ok(value)),
                Err(e) if !line.terminated => {
                    tracing::debug!(error = %e, "ignoring partial trailing line");
                    continue;
                }
                Err(e) => return Some(Err(StoreError::Json(e))),
            }
        }
    }
}

/// Open `path` and iterate its records in `direction`
pub fn open_records(
    path: &Path,
    direction: Direction,
) -> StoreResult<Box<dyn Iterator<Item = StoreResult<Value>>>> {
    let file = File::open(path)?;
    Ok(match direction {
        Direction::Forward => Box::new(JsonLines::new(ForwardLines::new(BufReader::new(file)))),
        Direction::Reverse => Box::new(JsonLines::new(ReverseLines::new(file)?)),
    })
}
