use trackable::error::{ErrorKind as TrackableErrorKind, TrackableError};

/// This crate specific `Error` type.
#[derive(Debug, Clone, TrackableError)]
pub struct Error(TrackableError<ErrorKind>);

/// Possible error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A variable-length integer has no length marker or is shorter than it declares.
    MalformedVarInt,

    /// Not enough bytes are left for the id or size of an element.
    TruncatedHeader,

    /// The declared data of an element runs past the end of its parent.
    TruncatedData,

    /// An element does not have the id or nesting level its type requires.
    SchemaViolation,

    /// A required child element is absent.
    ElementNotFound,

    /// A content encoding (compression or encryption) that cannot be decoded.
    UnsupportedEncoding,

    /// A track codec that cannot be remuxed.
    UnsupportedCodec,

    /// No video track with a supported codec exists.
    NoSuitableVideoTrack,

    /// A laced block whose frame size table is inconsistent.
    InvalidLacing,

    /// Input data or arguments are invalid.
    InvalidInput,

    /// A value cannot be represented in the output format.
    Unsupported,

    /// I/O failures and internal inconsistencies.
    Other,
}
impl TrackableErrorKind for ErrorKind {}
