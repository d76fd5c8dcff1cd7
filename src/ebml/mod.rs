//! Lazy EBML element tree reader.
//!
//! An EBML document is a sequence of elements, each made of an id, a data size and the data itself.
//! Nothing is read until it is visited: parsing an [`Element`] only fetches its header,
//! and a [`Stream`] parses sibling elements one at a time on demand.
use std::fmt;
use std::sync::{Arc, OnceLock};
use parking_lot::Mutex;

use crate::source::ByteRange;
use crate::vint::VarInt;
use crate::{ErrorKind, Result};

pub use self::schema::{
    ElementSpec, ElementType, Many, Query, SchemaChildren, SchemaElement, ValueKind, CRC32,
    UNKNOWN, VOID,
};
pub use self::xml::XmlOptions;

pub(crate) use self::schema::define_elements;

mod schema;
mod xml;

/// Maximum number of bytes read to decode an element header (id and size).
pub const MAX_HEADER_LEN: u64 = 24;

/// Options of `Stream`.
#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    /// Ranges of at most this many bytes are read into memory at once
    /// before their children are parsed.
    ///
    /// `0` disables buffering.
    pub buffer_threshold: u64,
}
impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            buffer_threshold: 64 * 1024,
        }
    }
}

/// An EBML element.
///
/// Cloning is cheap and clones share the lazily built child stream.
#[derive(Clone)]
pub struct Element(Arc<ElementInner>);

struct ElementInner {
    id: VarInt,
    data_size: VarInt,
    data: ByteRange,
    position: u64,
    options: StreamOptions,
    children: OnceLock<Stream>,
}
impl Element {
    /// Parses the element at the head of `range`.
    ///
    /// Only the header is read.
    /// An element whose size is "unknown" extends to the end of `range`.
    pub fn parse(range: &ByteRange) -> Result<Self> {
        track!(Self::parse_at(range, 0, StreamOptions::default()))
    }

    pub(crate) fn parse_at(range: &ByteRange, position: u64, options: StreamOptions) -> Result<Self> {
        let head = track!(range.read_head(MAX_HEADER_LEN))?;
        let id = track!(header_varint(&head))?;
        let data_size = track!(header_varint(&head[id.len()..]))?;

        let data_start = (id.len() + data_size.len()) as u64;
        let data_end = if data_size.is_unknown() {
            range.len()
        } else {
            data_start.saturating_add(data_size.number())
        };
        track_assert!(
            data_end <= range.len(),
            ErrorKind::TruncatedData,
            "Element {:?} declares {} bytes, but only {} are available",
            id,
            data_end - data_start,
            range.len() - data_start
        );
        let data = track!(range.slice(data_start, data_end))?;
        Ok(Element(Arc::new(ElementInner {
            id,
            data_size,
            data,
            position,
            options,
            children: OnceLock::new(),
        })))
    }

    /// Returns the id of the element.
    pub fn id(&self) -> VarInt {
        self.0.id
    }

    /// Returns the declared data size of the element.
    pub fn data_size(&self) -> VarInt {
        self.0.data_size
    }

    /// Returns the data part of the element.
    pub fn data(&self) -> &ByteRange {
        &self.0.data
    }

    /// Returns the size of the id and size fields.
    pub fn header_size(&self) -> u64 {
        (self.0.id.len() + self.0.data_size.len()) as u64
    }

    /// Returns the total size of the element.
    pub fn size(&self) -> u64 {
        self.header_size() + self.0.data.len()
    }

    /// Returns the offset of the element within the range it was parsed from.
    pub fn position(&self) -> u64 {
        self.0.position
    }

    /// Reads the data part of the element.
    pub fn read(&self) -> Result<Vec<u8>> {
        track!(self.0.data.read())
    }

    /// Returns the stream of the child elements.
    ///
    /// The stream is built on first access and shared by every clone of this element.
    pub fn stream(&self) -> &Stream {
        self.0
            .children
            .get_or_init(|| Stream::with_options(self.0.data.clone(), self.0.options))
    }

    /// Returns the child elements.
    pub fn children(&self) -> Children {
        self.stream().children()
    }
}
impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.0.id)
            .field("data_size", &self.0.data_size)
            .field("position", &self.0.position)
            .field("data", &self.0.data)
            .finish()
    }
}

fn header_varint(buf: &[u8]) -> Result<VarInt> {
    track_assert!(!buf.is_empty(), ErrorKind::TruncatedHeader);
    let len = track_assert_some!(VarInt::declared_len(buf[0]), ErrorKind::MalformedVarInt);
    track_assert!(
        buf.len() >= len,
        ErrorKind::TruncatedHeader,
        "declared={}, available={}",
        len,
        buf.len()
    );
    track!(VarInt::from_bytes(buf))
}

/// A lazily parsed sequence of sibling elements.
///
/// Every parsed element is cached, so iterating again replays the cache
/// and resumes parsing where the furthest iteration stopped.
///
/// A remainder that is too short for the element it declares ends the stream.
#[derive(Clone)]
pub struct Stream(Arc<StreamInner>);

struct StreamInner {
    range: ByteRange,
    options: StreamOptions,
    state: Mutex<StreamState>,
}

#[derive(Default)]
struct StreamState {
    source: Option<ByteRange>,
    elements: Vec<Element>,
    offset: u64,
    finished: bool,
}
impl Stream {
    /// Makes a new `Stream` with the default options.
    pub fn new(range: ByteRange) -> Self {
        Self::with_options(range, StreamOptions::default())
    }

    /// Makes a new `Stream` with the given options.
    pub fn with_options(range: ByteRange, options: StreamOptions) -> Self {
        Stream(Arc::new(StreamInner {
            range,
            options,
            state: Mutex::new(StreamState::default()),
        }))
    }

    /// Returns the range of the stream.
    pub fn range(&self) -> &ByteRange {
        &self.0.range
    }

    /// Returns the options of the stream.
    pub fn options(&self) -> StreamOptions {
        self.0.options
    }

    /// Returns the `index`-th element, parsing up to it if needed.
    pub fn get(&self, index: usize) -> Result<Option<Element>> {
        let mut state = self.0.state.lock();
        while state.elements.len() <= index {
            if state.finished {
                return Ok(None);
            }
            track!(self.parse_next(&mut state))?;
        }
        Ok(Some(state.elements[index].clone()))
    }

    /// Returns an iterator over the elements of the stream.
    pub fn children(&self) -> Children {
        Children {
            stream: self.clone(),
            index: 0,
            done: false,
        }
    }

    /// Returns the number of elements parsed so far.
    pub fn parsed_len(&self) -> usize {
        self.0.state.lock().elements.len()
    }

    /// Returns `true` if every element of the stream has been parsed.
    pub fn is_exhausted(&self) -> bool {
        self.0.state.lock().finished
    }

    fn parse_next(&self, state: &mut StreamState) -> Result<()> {
        let total = self.0.range.len();
        if state.offset >= total {
            return track!(Self::finish(state));
        }

        let source = match state.source {
            Some(ref source) => source.clone(),
            None => {
                let threshold = self.0.options.buffer_threshold;
                let source = if threshold > 0 && total <= threshold {
                    ByteRange::from_vec(track!(self.0.range.read())?)
                } else {
                    self.0.range.clone()
                };
                state.source = Some(source.clone());
                source
            }
        };

        let rest = track!(source.slice_from(state.offset))?;
        match Element::parse_at(&rest, state.offset, self.0.options) {
            Ok(element) => {
                debug_assert_eq!(
                    state.elements.last().map_or(0, |e| e.position() + e.size()),
                    element.position()
                );
                state.offset += element.size();
                state.elements.push(element);
                Ok(())
            }
            Err(e) if matches!(*e.kind(), ErrorKind::TruncatedHeader | ErrorKind::TruncatedData) => {
                tracing::warn!(
                    "Ignoring {} trailing bytes at {:?}: {}",
                    total - state.offset,
                    self.0.range,
                    e
                );
                track!(Self::finish(state))
            }
            Err(e) => Err(track!(e)),
        }
    }

    fn finish(state: &mut StreamState) -> Result<()> {
        let consumed: u64 = state.elements.iter().map(Element::size).sum();
        track_assert_eq!(consumed, state.offset, ErrorKind::Other);
        state.finished = true;
        state.source = None;
        Ok(())
    }
}
impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Stream({:?})", self.0.range)
    }
}

/// An iterator over the elements of a `Stream`.
///
/// It ends after the first error.
#[derive(Debug)]
pub struct Children {
    stream: Stream,
    index: usize,
    done: bool,
}
impl Iterator for Children {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.stream.get(self.index) {
            Ok(Some(element)) => {
                self.index += 1;
                Some(Ok(element))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(track!(e)))
            }
        }
    }
}
