//! Content encodings (per-track transforms of the stored bytes).
use super::tracks::TrackEntry;
use crate::ebml::define_elements;
use crate::{ErrorKind, Result};

const COMP_ALGOS: &[(u64, &str)] = &[
    (0, "zlib"),
    (1, "bzlib"),
    (2, "lzo1x"),
    (3, "header-stripping"),
];

define_elements! {
    /// Settings for the encodings of a track.
    ContentEncodings(CONTENT_ENCODINGS) = 0x6D80, Some(3), Master [CONTENT_ENCODING];
    /// A single encoding step.
    ContentEncoding(CONTENT_ENCODING, multiple) = 0x6240, Some(4), Master [
        CONTENT_ENCODING_ORDER, CONTENT_ENCODING_SCOPE, CONTENT_ENCODING_TYPE,
        CONTENT_COMPRESSION, CONTENT_ENCRYPTION,
    ];
    /// Position of the step in the chain.
    ContentEncodingOrder(CONTENT_ENCODING_ORDER) = 0x5031, Some(5), Uint;
    /// What the step applies to (bit 1: frames, bit 2: codec private data).
    ContentEncodingScope(CONTENT_ENCODING_SCOPE) = 0x5032, Some(5), Uint;
    /// Kind of the step (0: compression, 1: encryption).
    ContentEncodingType(CONTENT_ENCODING_TYPE) = 0x5033, Some(5), Uint;
    /// Compression settings.
    ContentCompression(CONTENT_COMPRESSION) = 0x5034, Some(5), Master [
        CONTENT_COMP_ALGO, CONTENT_COMP_SETTINGS,
    ];
    /// Compression algorithm.
    ContentCompAlgo(CONTENT_COMP_ALGO) = 0x4254, Some(6), Enum(COMP_ALGOS);
    /// Algorithm specific settings (the stripped bytes for header stripping).
    ContentCompSettings(CONTENT_COMP_SETTINGS) = 0x4255, Some(6), Bytes;
    /// Encryption settings.
    ContentEncryption(CONTENT_ENCRYPTION) = 0x5035, Some(5), Master;
}

const SCOPE_FRAMES: u64 = 0x01;
const SCOPE_PRIVATE: u64 = 0x02;

impl ContentEncodings {
    /// Returns the encoding steps in document order.
    pub fn encodings(&self) -> Result<Vec<ContentEncoding>> {
        track!(self.many::<ContentEncoding>())?.collect()
    }
}

impl ContentEncoding {
    /// Returns the position of the step, `0` if absent.
    pub fn order(&self) -> Result<u64> {
        match track!(self.maybe_one::<ContentEncodingOrder>())? {
            Some(e) => track!(e.read_uint()),
            None => Ok(0),
        }
    }

    /// Returns the scope bits, `1` (frames) if absent.
    pub fn scope(&self) -> Result<u64> {
        match track!(self.maybe_one::<ContentEncodingScope>())? {
            Some(e) => track!(e.read_uint()),
            None => Ok(SCOPE_FRAMES),
        }
    }

    /// Makes the decoder that undoes this step.
    ///
    /// Only header stripping can be undone; anything else fails with `UnsupportedEncoding`.
    pub fn decoder(&self) -> Result<ContentDecoder> {
        let kind = match track!(self.maybe_one::<ContentEncodingType>())? {
            Some(e) => track!(e.read_uint())?,
            None => 0,
        };
        track_assert_eq!(kind, 0, ErrorKind::UnsupportedEncoding, "Encrypted content");
        track_assert!(
            track!(self.maybe_one::<ContentEncryption>())?.is_none(),
            ErrorKind::UnsupportedEncoding,
            "Encrypted content"
        );

        let compression = track!(self.maybe_one::<ContentCompression>())?;
        let compression = track_assert_some!(
            compression,
            ErrorKind::UnsupportedEncoding,
            "Compression settings are missing"
        );
        let algo = match track!(compression.maybe_one::<ContentCompAlgo>())? {
            Some(e) => track!(e.read_uint())?,
            None => 0,
        };
        let name = COMP_ALGOS
            .iter()
            .find(|&&(code, _)| code == algo)
            .map_or("unknown", |&(_, name)| name);
        track_assert_eq!(
            algo,
            3,
            ErrorKind::UnsupportedEncoding,
            "Unsupported compression algorithm: {}",
            name
        );
        let stripped = match track!(compression.maybe_one::<ContentCompSettings>())? {
            Some(e) => track!(e.read_bytes())?,
            None => Vec::new(),
        };
        Ok(ContentDecoder {
            order: track!(self.order())?,
            scope: track!(self.scope())?,
            stripped,
        })
    }

    /// Undoes this step on `data`.
    pub fn decode(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        let decoder = track!(self.decoder())?;
        Ok(decoder.decode(data))
    }
}

/// Undoes a header stripping step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDecoder {
    order: u64,
    scope: u64,
    stripped: Vec<u8>,
}
impl ContentDecoder {
    /// Returns the position of the step.
    pub fn order(&self) -> u64 {
        self.order
    }

    /// Returns the scope bits.
    pub fn scope(&self) -> u64 {
        self.scope
    }

    /// Prepends the stripped bytes to `data`.
    pub fn decode(&self, data: Vec<u8>) -> Vec<u8> {
        if self.stripped.is_empty() {
            return data;
        }
        let mut decoded = Vec::with_capacity(self.stripped.len() + data.len());
        decoded.extend_from_slice(&self.stripped);
        decoded.extend_from_slice(&data);
        decoded
    }
}

/// The chain of steps that undoes the encodings of a track,
/// applied in ascending `ContentEncodingOrder`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodePipeline {
    decoders: Vec<ContentDecoder>,
}
impl DecodePipeline {
    /// Builds the chain of `encodings`.
    pub fn new(encodings: &ContentEncodings) -> Result<Self> {
        let mut decoders = Vec::new();
        for encoding in track!(encodings.encodings())? {
            decoders.push(track!(encoding.decoder())?);
        }
        decoders.sort_by_key(|d| d.order);
        Ok(DecodePipeline { decoders })
    }

    /// Builds the chain of `track`.
    pub fn from_track(track: &TrackEntry) -> Result<Self> {
        track!(track.decode_pipeline())
    }

    /// Returns `true` if nothing has to be undone.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Undoes the frame encodings.
    pub fn decode_frame(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        Ok(self.apply(data, SCOPE_FRAMES))
    }

    /// Undoes the codec private data encodings.
    pub fn decode_private(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        Ok(self.apply(data, SCOPE_PRIVATE))
    }

    fn apply(&self, data: Vec<u8>, scope: u64) -> Vec<u8> {
        self.decoders
            .iter()
            .filter(|d| d.scope & scope != 0)
            .fold(data, |data, d| d.decode(data))
    }
}
