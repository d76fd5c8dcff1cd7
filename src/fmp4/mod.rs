//! Fragmented MP4 (ISO BMFF) boxes.
//!
//! # References
//!
//! - ISO/IEC 14496-12 (ISO base media file format)
//! - [ISO BMFF Byte Stream Format](https://w3c.github.io/mse-byte-stream-format-isobmff/)
use std::fmt;
use std::io::Write;
use std::str;
use byteorder::{BigEndian, WriteBytesExt};

use crate::io::{ByteCounter, WriteTo};
use crate::{ErrorKind, Result};

macro_rules! write_u8 {
    ($w:expr, $n:expr) => {{
        use byteorder::WriteBytesExt;
        track_io!($w.write_u8($n))?;
    }};
}
macro_rules! write_u16 {
    ($w:expr, $n:expr) => {{
        use byteorder::{BigEndian, WriteBytesExt};
        track_io!($w.write_u16::<BigEndian>($n))?;
    }};
}
macro_rules! write_i16 {
    ($w:expr, $n:expr) => {{
        use byteorder::{BigEndian, WriteBytesExt};
        track_io!($w.write_i16::<BigEndian>($n))?;
    }};
}
macro_rules! write_u24 {
    ($w:expr, $n:expr) => {{
        use byteorder::{BigEndian, WriteBytesExt};
        track_io!($w.write_uint::<BigEndian>($n as u64, 3))?;
    }};
}
macro_rules! write_u32 {
    ($w:expr, $n:expr) => {{
        use byteorder::{BigEndian, WriteBytesExt};
        track_io!($w.write_u32::<BigEndian>($n))?;
    }};
}
macro_rules! write_i32 {
    ($w:expr, $n:expr) => {{
        use byteorder::{BigEndian, WriteBytesExt};
        track_io!($w.write_i32::<BigEndian>($n))?;
    }};
}
macro_rules! write_u64 {
    ($w:expr, $n:expr) => {{
        use byteorder::{BigEndian, WriteBytesExt};
        track_io!($w.write_u64::<BigEndian>($n))?;
    }};
}
macro_rules! write_all {
    ($w:expr, $n:expr) => {
        track_io!($w.write_all($n))?;
    };
}
macro_rules! write_zeroes {
    ($w:expr, $n:expr) => {
        track_io!($w.write_all(&[0; $n][..]))?;
    };
}
macro_rules! write_box {
    ($w:expr, $b:expr) => {
        track!($b.write_box_to(&mut $w))?;
    };
}
macro_rules! write_boxes {
    ($w:expr, $bs:expr) => {
        for b in $bs {
            track!(b.write_box_to(&mut $w))?;
        }
    };
}

pub use self::initialization::{
    AudioSampleEntry, CodecConfigurationBox, DataEntryUrlBox, DataInformationBox,
    DataReferenceBox, FileTypeBox, HandlerReferenceBox, InitializationSegment, MediaBox, MediaHeaderBox, MediaInformationBox,
    MovieBox, MovieExtendsBox, MovieExtendsHeaderBox, MovieHeaderBox, Mpeg4EsDescriptorBox,
    SampleDescriptionBox, SampleEntry, SampleTableBox, SoundMediaHeaderBox, TrackBox,
    TrackExtendsBox, TrackHeaderBox, VideoMediaHeaderBox, VisualSampleEntry,
};
pub use self::media::{
    MediaDataBox, MediaSegment, MovieFragmentBox, MovieFragmentHeaderBox, SampleFlags,
    TrackFragmentBaseMediaDecodeTimeBox, TrackFragmentBox, TrackFragmentHeaderBox, TrackRunBox,
    TrunEntry,
};

mod initialization;
mod media;

/// A box that knows its own type and header.
pub trait WriteBoxTo: WriteTo {
    /// Returns the type of the box.
    fn box_type(&self) -> BoxType;

    /// Returns the size of the box, header included.
    ///
    /// The payload is measured by writing it to a counting sink.
    fn box_size(&self) -> Result<u32> {
        let mut writer = ByteCounter::with_sink();
        track!(self.write_to(&mut writer))?;

        let mut size = BoxHeader::SIZE as u64 + writer.count();
        if self.full_box_header().is_some() {
            size += 4;
        }
        track_assert!(
            size <= u64::from(u32::MAX),
            ErrorKind::Unsupported,
            "Too large box: {:?} ({} bytes)",
            self.box_type(),
            size
        );
        Ok(size as u32)
    }

    /// Returns the header of the box.
    fn box_header(&self) -> Result<BoxHeader> {
        Ok(BoxHeader {
            kind: self.box_type(),
            size: track!(self.box_size())?,
        })
    }

    /// Returns the version and flags if this is a full box.
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        None
    }

    /// Writes the whole box (header and payload) to `writer`.
    fn write_box_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track!(track!(self.box_header())?.write_to(&mut writer))?;
        if let Some(x) = self.full_box_header() {
            track!(x.write_to(&mut writer))?;
        }
        track!(self.write_to(writer))?;
        Ok(())
    }

    /// Serializes the whole box.
    fn to_box_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        track!(self.write_box_to(&mut buf))?;
        Ok(buf)
    }
}

/// The size and type of a box.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoxHeader {
    /// Size of the box, header included.
    pub size: u32,

    /// Type of the box.
    pub kind: BoxType,
}
impl BoxHeader {
    /// Size of a compact box header.
    pub const SIZE: u32 = 8;

    /// Returns the size of the payload.
    pub fn data_size(&self) -> u32 {
        self.size - Self::SIZE
    }
}
impl WriteTo for BoxHeader {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_assert_ne!(self.size, 1, ErrorKind::Unsupported);
        track_assert_ne!(self.size, 0, ErrorKind::Unsupported);
        track_assert!(self.size >= Self::SIZE, ErrorKind::InvalidInput);
        track_assert_ne!(self.kind.0, *b"uuid", ErrorKind::Unsupported);

        track_io!(writer.write_u32::<BigEndian>(self.size))?;
        track_io!(writer.write_all(&self.kind.0))?;
        Ok(())
    }
}

/// The version and flags of a full box.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FullBoxHeader {
    /// Version.
    pub version: u8,

    /// Flags (24 bits).
    pub flags: u32,
}
impl FullBoxHeader {
    /// Makes a new `FullBoxHeader` instance.
    pub fn new(version: u8, flags: u32) -> Self {
        FullBoxHeader { version, flags }
    }
}
impl WriteTo for FullBoxHeader {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_assert!(self.flags <= 0xFF_FFFF, ErrorKind::InvalidInput);
        track_io!(writer.write_u8(self.version))?;
        track_io!(writer.write_uint::<BigEndian>(u64::from(self.flags), 3))?;
        Ok(())
    }
}

macro_rules! four_cc {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; 4]);
        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if let Ok(s) = str::from_utf8(&self.0) {
                    write!(f, concat!(stringify!($name), "(b{:?})"), s)
                } else {
                    write!(f, concat!(stringify!($name), "({:?})"), self.0)
                }
            }
        }
    };
}

four_cc!(
    /// Four character code of a box.
    BoxType
);
four_cc!(
    /// Four character code of a file brand.
    Brand
);
four_cc!(
    /// Four character code of a sample entry (e.g., `avc1`).
    SampleFormat
);
four_cc!(
    /// Four character code of a track handler (`vide` or `soun`).
    HandlerType
);
