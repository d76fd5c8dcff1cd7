use std::io::{sink, Read, Result as IoResult, Sink, Write};
use byteorder::ReadBytesExt;

use crate::Result;

/// Serialization into a byte writer.
pub trait WriteTo {
    /// Writes `self` to `writer`.
    fn write_to<W: Write>(&self, writer: W) -> Result<()>;
}

/// A writer that counts the bytes passed through it.
#[derive(Debug)]
pub struct ByteCounter<T> {
    inner: T,
    count: u64,
}
impl<T> ByteCounter<T> {
    /// Makes a new `ByteCounter` instance.
    pub fn new(inner: T) -> Self {
        ByteCounter { inner, count: 0 }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Returns the number of bytes written so far.
    pub fn count(&self) -> u64 {
        self.count
    }
}
impl ByteCounter<Sink> {
    /// Makes a `ByteCounter` that discards the bytes.
    pub fn with_sink() -> Self {
        Self::new(sink())
    }
}
impl<T: Write> Write for ByteCounter<T> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        let size = self.inner.write(buf)?;
        self.count += size as u64;
        Ok(size)
    }
    fn flush(&mut self) -> IoResult<()> {
        self.inner.flush()
    }
}

/// A byte buffer made of chunks that are only joined by `build`.
///
/// Sizes of nested parts are known before anything is copied,
/// so a box header can be written ahead of its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayBuilder {
    /// Bytes.
    Chunk(Vec<u8>),

    /// A concatenation of builders.
    Concat(Vec<ArrayBuilder>),
}
impl ArrayBuilder {
    /// Makes an empty concatenation.
    pub fn new() -> Self {
        ArrayBuilder::Concat(Vec::new())
    }

    /// Appends `part` to the builder.
    ///
    /// A `Chunk` is turned into a concatenation first.
    pub fn push<T: Into<ArrayBuilder>>(&mut self, part: T) {
        let part = part.into();
        match self {
            ArrayBuilder::Concat(parts) => parts.push(part),
            ArrayBuilder::Chunk(bytes) => {
                let head = ArrayBuilder::Chunk(std::mem::take(bytes));
                *self = ArrayBuilder::Concat(vec![head, part]);
            }
        }
    }

    /// Returns the number of bytes `build` will produce.
    pub fn byte_len(&self) -> usize {
        match self {
            ArrayBuilder::Chunk(bytes) => bytes.len(),
            ArrayBuilder::Concat(parts) => parts.iter().map(ArrayBuilder::byte_len).sum(),
        }
    }

    /// Returns `true` if the builder holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }

    /// Joins every chunk into a single buffer.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.byte_len());
        self.copy_into(&mut buf);
        buf
    }

    fn copy_into(&self, buf: &mut Vec<u8>) {
        match self {
            ArrayBuilder::Chunk(bytes) => buf.extend_from_slice(bytes),
            ArrayBuilder::Concat(parts) => {
                for part in parts {
                    part.copy_into(buf);
                }
            }
        }
    }
}
impl Default for ArrayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
impl From<Vec<u8>> for ArrayBuilder {
    fn from(f: Vec<u8>) -> Self {
        ArrayBuilder::Chunk(f)
    }
}
impl From<&[u8]> for ArrayBuilder {
    fn from(f: &[u8]) -> Self {
        ArrayBuilder::Chunk(f.to_vec())
    }
}

/// MSB-first bit reader used by the codec configuration parsers.
#[derive(Debug)]
pub(crate) struct BitReader<R> {
    stream: R,
    byte: u8,
    bit_offset: usize,
}
impl<R: Read> BitReader<R> {
    pub fn new(stream: R) -> Self {
        BitReader {
            stream,
            byte: 0,
            bit_offset: 8,
        }
    }

    pub fn read_bit(&mut self) -> Result<u8> {
        if self.bit_offset == 8 {
            self.byte = track_io!(self.stream.read_u8())?;
            self.bit_offset = 0;
        }
        let bit = (self.byte >> (7 - self.bit_offset)) & 0b1;
        self.bit_offset += 1;
        Ok(bit)
    }

    /// Reads `n` (at most 64) bits as a big-endian number.
    pub fn read_bits(&mut self, n: usize) -> Result<u64> {
        let mut v = 0;
        for _ in 0..n {
            v = (v << 1) | u64::from(track!(self.read_bit())?);
        }
        Ok(v)
    }
}
