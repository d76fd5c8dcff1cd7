//! A library for reading Matroska (EBML) files lazily from a random-access byte source
//! and remuxing their audio/video tracks into fragmented MP4 playable via Media Source Extensions.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> mkv_fmp4::Result<()> {
//! use mkv_fmp4::muxer::Muxer;
//! use mkv_fmp4::source::{ByteRange, FileSource};
//!
//! let source = FileSource::open("movie.mkv")?;
//! let muxer = Muxer::new(ByteRange::new(source));
//! let init = muxer.initialization_segment()?;
//! for fragment in muxer.stream_from(0.0)? {
//!     let bytes = fragment?.into_bytes()?;
//!     # let _ = (&init, bytes);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - [ISO BMFF Byte Stream Format]
//! - [Matroska Element Specification]
//!
//! [ISO BMFF Byte Stream Format]: https://w3c.github.io/media-source/isobmff-byte-stream-format.html
//! [Matroska Element Specification]: https://www.matroska.org/technical/elements.html
#![warn(missing_docs)]
#[macro_use]
extern crate trackable;

macro_rules! track_io {
    ($expr:expr) => {
        $expr.map_err(|e: ::std::io::Error| {
            use trackable::error::ErrorKindExt;
            track!($crate::Error::from($crate::ErrorKind::Other.cause(e)))
        })
    };
}

pub use crate::error::{Error, ErrorKind};

pub mod aac;
pub mod avc;
pub mod cache;
pub mod ebml;
pub mod fmp4;
pub mod hevc;
pub mod io;
pub mod isobmff;
pub mod matroska;
pub mod muxer;
pub mod source;
pub mod vint;

mod error;

/// This crate specific `Result` type.
pub type Result<T> = std::result::Result<T, Error>;
