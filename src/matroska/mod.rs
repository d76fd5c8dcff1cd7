//! Matroska element types.
//!
//! # References
//!
//! - [Matroska Element Specification](https://www.matroska.org/technical/elements.html)
use std::fmt;

use crate::ebml::{
    define_elements, Element, ElementSpec, ElementType, SchemaElement, Stream,
    StreamOptions, XmlOptions, CRC32, UNKNOWN, VOID,
};
use crate::source::ByteRange;
use crate::{ErrorKind, Result};

pub use self::block::{BlockFlags, BlockHeader, DecodedBlock, Lacing};
pub use self::cluster::{Block, BlockGroup, Cluster, SimpleBlock, Timestamp};
pub use self::cues::{CuePoint, CueTrackPositions, Cues};
pub use self::encoding::{ContentDecoder, ContentEncoding, ContentEncodings, DecodePipeline};
pub use self::info::Info;
pub use self::seekhead::{Seek, SeekHead};
pub use self::tags::{Attachments, Chapters, SimpleTag, Tag, Tags};
pub use self::tracks::{Audio, TrackEntry, TrackKind, TrackType, Tracks, Video};

use self::cluster::CLUSTER;
use self::cues::CUES;
use self::info::INFO;
use self::seekhead::SEEK_HEAD;
use self::tags::{ATTACHMENTS, CHAPTERS, TAGS};
use self::tracks::TRACKS;

pub mod block;
pub mod cluster;
pub mod cues;
pub mod encoding;
pub mod info;
pub mod seekhead;
pub mod tags;
pub mod tracks;

define_elements! {
    /// EBML header.
    EBMLHead(EBML_HEAD) = 0x1A45_DFA3, Some(0), Master [
        EBML_VERSION, EBML_READ_VERSION, EBML_MAX_ID_LENGTH, EBML_MAX_SIZE_LENGTH,
        DOC_TYPE, DOC_TYPE_VERSION, DOC_TYPE_READ_VERSION,
    ];
    /// EBML version used to create the file.
    EBMLVersion(EBML_VERSION) = 0x4286, Some(1), Uint;
    /// Minimum EBML version a reader needs.
    EBMLReadVersion(EBML_READ_VERSION) = 0x42F7, Some(1), Uint;
    /// Maximum length of element ids.
    EBMLMaxIDLength(EBML_MAX_ID_LENGTH) = 0x42F2, Some(1), Uint;
    /// Maximum length of element sizes.
    EBMLMaxSizeLength(EBML_MAX_SIZE_LENGTH) = 0x42F3, Some(1), Uint;
    /// Document type (`matroska` or `webm`).
    DocType(DOC_TYPE) = 0x4282, Some(1), Utf8;
    /// Version of the document type.
    DocTypeVersion(DOC_TYPE_VERSION) = 0x4287, Some(1), Uint;
    /// Minimum document type version a reader needs.
    DocTypeReadVersion(DOC_TYPE_READ_VERSION) = 0x4285, Some(1), Uint;

    /// The root element that holds all other top-level (level 1) elements.
    Segment(SEGMENT, multiple) = 0x1853_8067, Some(0), Master [
        SEEK_HEAD, INFO, TRACKS, CLUSTER, CUES, TAGS, CHAPTERS, ATTACHMENTS,
    ];
}

impl EBMLHead {
    /// Returns the document type.
    pub fn doc_type(&self) -> Result<String> {
        track!(self.one::<DocType>().and_then(|e| e.read_utf8()))
    }
}

impl Segment {
    /// Returns the `Info` element.
    pub fn info(&self) -> Result<Info> {
        let info = track!(self.locate::<Info>(false))?;
        let info = track_assert_some!(info, ErrorKind::ElementNotFound, "No Info");
        Ok(info)
    }

    /// Returns the `Tracks` element.
    pub fn tracks(&self) -> Result<Tracks> {
        let tracks = track!(self.locate::<Tracks>(false))?;
        let tracks = track_assert_some!(tracks, ErrorKind::ElementNotFound, "No Tracks");
        Ok(tracks)
    }

    /// Returns the `Tags` element, if any.
    pub fn tags(&self) -> Result<Option<Tags>> {
        track!(self.locate::<Tags>(false))
    }

    /// Returns the `Cues` element, if any.
    ///
    /// The SeekHead entries before the first Cluster are consulted first.
    /// Unless `fast` is `true`, the children preceding the first Cluster are scanned
    /// when no entry points at the Cues.
    pub fn cues(&self, fast: bool) -> Result<Option<Cues>> {
        track!(self.locate::<Cues>(fast))
    }

    fn locate<T: ElementType + FromTopLevel>(&self, fast: bool) -> Result<Option<T>> {
        for seek_head in track!(self.query::<SeekHead>().before::<Cluster>().many())? {
            let seek_head = track!(seek_head)?;
            for seek in track!(seek_head.seeks())? {
                let seek = track!(seek)?;
                if track!(seek.seek_id())? != T::spec().id {
                    continue;
                }
                let target = track!(seek.resolve(self))?;
                let name = target.name();
                let found = track_assert_some!(
                    T::from_top_level(target),
                    ErrorKind::SchemaViolation,
                    "SeekHead points at {} where {} is expected",
                    name,
                    T::spec().name
                );
                return Ok(Some(found));
            }
        }
        if fast {
            return Ok(None);
        }
        track!(self.query::<T>().before::<Cluster>().maybe_one())
    }

    /// Parses the level 1 element at `position` (relative to the Segment data).
    pub fn resolve(&self, position: u64) -> Result<TopLevelElement> {
        let range = track!(self.data().slice_from(position))?;
        let element = track!(Element::parse_at(&range, position, self.stream().options()))?;
        let id = element.id().id();
        let parent = Some(self.schema());
        Ok(match id {
            id if id == SEEK_HEAD.id => TopLevelElement::SeekHead(track!(ElementType::from_element(element, parent))?),
            id if id == INFO.id => TopLevelElement::Info(track!(ElementType::from_element(element, parent))?),
            id if id == TRACKS.id => TopLevelElement::Tracks(track!(ElementType::from_element(element, parent))?),
            id if id == CLUSTER.id => TopLevelElement::Cluster(track!(ElementType::from_element(element, parent))?),
            id if id == CUES.id => TopLevelElement::Cues(track!(ElementType::from_element(element, parent))?),
            id if id == TAGS.id => TopLevelElement::Tags(track!(ElementType::from_element(element, parent))?),
            id if id == CHAPTERS.id => TopLevelElement::Chapters(track!(ElementType::from_element(element, parent))?),
            id if id == ATTACHMENTS.id => TopLevelElement::Attachments(track!(ElementType::from_element(element, parent))?),
            _ => track_panic!(
                ErrorKind::SchemaViolation,
                "0x{:X} at {} is not a child of Segment",
                id,
                position
            ),
        })
    }

    /// Returns the clusters from the start of the Segment.
    pub fn clusters(&self) -> Result<SeekClusters> {
        track!(self.seek_clusters(0))
    }

    /// Returns the clusters from `position` (relative to the Segment data).
    ///
    /// Other level 1 elements between clusters are skipped.
    /// Cluster headers are parsed as the iterator advances and nothing is memoized,
    /// so a cluster is released as soon as the caller drops it.
    pub fn seek_clusters(&self, position: u64) -> Result<SeekClusters> {
        let range = track!(self.data().slice_from(position))?;
        Ok(SeekClusters {
            segment: self.clone(),
            range,
            base: position,
            offset: 0,
            done: false,
        })
    }

    /// Returns the position of the first cluster (relative to the Segment data).
    pub fn first_cluster_position(&self) -> Result<Option<u64>> {
        for child in self.element().children() {
            let child = track!(child)?;
            if child.id().id() == CLUSTER.id {
                return Ok(Some(child.position()));
            }
        }
        Ok(None)
    }
}

/// Lazy sequence of the clusters following a position in a Segment.
///
/// It ends after the first error.
#[derive(Debug)]
pub struct SeekClusters {
    segment: Segment,
    range: ByteRange,
    base: u64,
    offset: u64,
    done: bool,
}
impl SeekClusters {
    /// Returns the position of the next element to parse (relative to the Segment data).
    pub fn position(&self) -> u64 {
        self.base + self.offset
    }

    fn parse_next(&mut self) -> Result<Option<(u64, Cluster)>> {
        let options = self.segment.stream().options();
        while self.offset < self.range.len() {
            let position = SeekClusters::position(self);
            let rest = track!(self.range.slice_from(self.offset))?;
            let element = match Element::parse_at(&rest, position, options) {
                Ok(element) => element,
                Err(e) if matches!(*e.kind(), ErrorKind::TruncatedHeader | ErrorKind::TruncatedData) => {
                    tracing::warn!(
                        "Ignoring {} trailing bytes of the Segment at {}: {}",
                        self.range.len() - self.offset,
                        position,
                        e
                    );
                    return Ok(None);
                }
                Err(e) => return Err(track!(e)),
            };
            self.offset += element.size();
            if element.id().id() != CLUSTER.id {
                continue;
            }
            let cluster = track!(Cluster::from_element(element, Some(self.segment.schema())))?;
            return Ok(Some((position, cluster)));
        }
        Ok(None)
    }
}
impl Iterator for SeekClusters {
    type Item = Result<(u64, Cluster)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parse_next() {
            Ok(Some(item)) => Some(Ok(item)),
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

/// A level 1 element.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum TopLevelElement {
    SeekHead(SeekHead),
    Info(Info),
    Tracks(Tracks),
    Cluster(Cluster),
    Cues(Cues),
    Tags(Tags),
    Chapters(Chapters),
    Attachments(Attachments),
}
impl TopLevelElement {
    /// Returns the element name.
    pub fn name(&self) -> &'static str {
        self.schema().name()
    }

    /// Returns the untyped view of the element.
    pub fn schema(&self) -> &SchemaElement {
        match self {
            TopLevelElement::SeekHead(e) => e.schema(),
            TopLevelElement::Info(e) => e.schema(),
            TopLevelElement::Tracks(e) => e.schema(),
            TopLevelElement::Cluster(e) => e.schema(),
            TopLevelElement::Cues(e) => e.schema(),
            TopLevelElement::Tags(e) => e.schema(),
            TopLevelElement::Chapters(e) => e.schema(),
            TopLevelElement::Attachments(e) => e.schema(),
        }
    }
}

/// Conversion out of `TopLevelElement`.
pub trait FromTopLevel: Sized {
    /// Returns the element if it has this type.
    fn from_top_level(e: TopLevelElement) -> Option<Self>;
}
macro_rules! impl_from_top_level {
    ($($name:ident),*) => {$(
        impl FromTopLevel for $name {
            fn from_top_level(e: TopLevelElement) -> Option<Self> {
                match e {
                    TopLevelElement::$name(e) => Some(e),
                    _ => None,
                }
            }
        }
    )*};
}
impl_from_top_level!(SeekHead, Info, Tracks, Cluster, Cues, Tags, Chapters, Attachments);

/// A Matroska document: an EBML header followed by one or more Segments.
#[derive(Clone)]
pub struct MatroskaFile {
    stream: Stream,
}
impl MatroskaFile {
    /// Makes a new `MatroskaFile` with the default stream options.
    pub fn new(range: ByteRange) -> Self {
        Self::with_options(range, StreamOptions::default())
    }

    /// Makes a new `MatroskaFile` with the given stream options.
    ///
    /// The options are inherited by every nested element.
    pub fn with_options(range: ByteRange, options: StreamOptions) -> Self {
        MatroskaFile {
            stream: Stream::with_options(range, options),
        }
    }

    /// Returns the top-level elements.
    pub fn children(&self) -> impl Iterator<Item = Result<SchemaElement>> {
        self.stream.children().map(|child| {
            let element = track!(child)?;
            let spec = root_spec(element.id().id());
            track!(SchemaElement::new(spec, element, None))
        })
    }

    /// Returns the EBML header.
    pub fn ebml_head(&self) -> Result<EBMLHead> {
        track!(self.first::<EBMLHead>())
    }

    /// Returns the first Segment.
    pub fn segment(&self) -> Result<Segment> {
        track!(self.first::<Segment>())
    }

    fn first<T: ElementType>(&self) -> Result<T> {
        for child in self.stream.children() {
            let child = track!(child)?;
            if child.id().id() == T::spec().id {
                return track!(T::from_element(child, None));
            }
        }
        track_panic!(ErrorKind::ElementNotFound, "No {}", T::spec().name)
    }

    /// Renders the document as XML.
    pub fn to_xml(&self, options: &XmlOptions) -> Result<String> {
        let mut lines = Vec::new();
        for child in self.children() {
            let child = track!(child)?;
            track!(child.to_xml_lines(options, 0, &mut lines))?;
        }
        Ok(lines.join("\n"))
    }
}
impl fmt::Debug for MatroskaFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MatroskaFile({:?})", self.stream.range())
    }
}

fn root_spec(id: u64) -> &'static ElementSpec {
    [&EBML_HEAD, &SEGMENT, &VOID, &CRC32]
        .iter()
        .copied()
        .find(|spec| spec.id == id)
        .unwrap_or(&UNKNOWN)
}
