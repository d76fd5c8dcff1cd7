//! A reader of serialized ISO BMFF boxes.
//!
//! Only the layouts this crate writes are interpreted; everything else is exposed as raw payload.
use std::io::Read;
use byteorder::{BigEndian, ReadBytesExt};

use crate::fmp4::{
    BoxHeader, BoxType, FullBoxHeader, MovieFragmentHeaderBox, TrackFragmentBaseMediaDecodeTimeBox,
    TrackRunBox, TrunEntry,
};
use crate::{ErrorKind, Result};

impl BoxHeader {
    /// Reads a compact box header.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let size = track_io!(reader.read_u32::<BigEndian>())?;
        let mut kind = [0; 4];
        track_io!(reader.read_exact(&mut kind))?;
        track_assert_ne!(size, 1, ErrorKind::Unsupported);
        track_assert_ne!(size, 0, ErrorKind::Unsupported);
        track_assert!(size >= BoxHeader::SIZE, ErrorKind::InvalidInput);
        track_assert_ne!(&kind, b"uuid", ErrorKind::Unsupported);
        Ok(BoxHeader {
            size,
            kind: BoxType(kind),
        })
    }
}

impl FullBoxHeader {
    /// Reads the version and flags of a full box.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let n = track_io!(reader.read_u32::<BigEndian>())?;
        Ok(FullBoxHeader::new((n >> 24) as u8, n & 0xFF_FFFF))
    }
}

/// A box borrowed from a serialized buffer.
#[derive(Debug, Clone, Copy)]
pub struct RawBox<'a> {
    /// Type of the box.
    pub kind: BoxType,

    /// Offset of the box header in the buffer passed to `read_boxes`.
    pub offset: usize,

    /// Size of the box, header included.
    pub size: usize,

    /// Payload of the box.
    pub data: &'a [u8],
}
impl<'a> RawBox<'a> {
    /// Returns the boxes nested in the payload.
    pub fn children(&self) -> Result<Vec<RawBox<'a>>> {
        let mut boxes = track!(read_boxes(self.data))?;
        for b in &mut boxes {
            b.offset += self.offset + BoxHeader::SIZE as usize;
        }
        Ok(boxes)
    }

    /// Returns the nested boxes of the given type.
    pub fn children_of(&self, kind: &[u8; 4]) -> Result<Vec<RawBox<'a>>> {
        let children = track!(self.children())?;
        Ok(children.into_iter().filter(|b| &b.kind.0 == kind).collect())
    }

    /// Returns the first nested box of the given type.
    pub fn child(&self, kind: &[u8; 4]) -> Result<RawBox<'a>> {
        let children = track!(self.children_of(kind))?;
        let b = track_assert_some!(
            children.into_iter().next(),
            ErrorKind::InvalidInput,
            "No {:?} box in {:?}",
            BoxType(*kind),
            self.kind
        );
        Ok(b)
    }

    /// Follows a path of box types, taking the first match at each step.
    pub fn descend(&self, path: &[&[u8; 4]]) -> Result<RawBox<'a>> {
        let mut current = *self;
        for kind in path {
            current = track!(current.child(kind))?;
        }
        Ok(current)
    }

    /// Splits the payload of a full box into its header and the rest.
    pub fn full_box(&self) -> Result<(FullBoxHeader, &'a [u8])> {
        track_assert!(self.data.len() >= 4, ErrorKind::InvalidInput);
        let header = track!(FullBoxHeader::read_from(self.data))?;
        Ok((header, &self.data[4..]))
    }
}

/// Splits `bytes` into consecutive boxes.
pub fn read_boxes(bytes: &[u8]) -> Result<Vec<RawBox>> {
    let mut boxes = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let header = track!(BoxHeader::read_from(&bytes[offset..]))?;
        let end = offset + header.size as usize;
        track_assert!(
            end <= bytes.len(),
            ErrorKind::InvalidInput,
            "Box {:?} at {} overruns its parent",
            header.kind,
            offset
        );
        boxes.push(RawBox {
            kind: header.kind,
            offset,
            size: header.size as usize,
            data: &bytes[offset + BoxHeader::SIZE as usize..end],
        });
        offset = end;
    }
    Ok(boxes)
}

impl MovieFragmentHeaderBox {
    /// Reads an `mfhd` box.
    pub fn read_box(b: &RawBox) -> Result<Self> {
        track_assert_eq!(&b.kind.0, b"mfhd", ErrorKind::InvalidInput);
        let (_, mut data) = track!(b.full_box())?;
        let sequence_number = track_io!(data.read_u32::<BigEndian>())?;
        Ok(MovieFragmentHeaderBox { sequence_number })
    }
}

impl TrackFragmentBaseMediaDecodeTimeBox {
    /// Reads a `tfdt` box of either version.
    pub fn read_box(b: &RawBox) -> Result<Self> {
        track_assert_eq!(&b.kind.0, b"tfdt", ErrorKind::InvalidInput);
        let (header, mut data) = track!(b.full_box())?;
        let base_media_decode_time = if header.version == 1 {
            track_io!(data.read_u64::<BigEndian>())?
        } else {
            u64::from(track_io!(data.read_u32::<BigEndian>())?)
        };
        Ok(TrackFragmentBaseMediaDecodeTimeBox {
            base_media_decode_time,
        })
    }
}

impl TrackRunBox {
    /// Reads a `trun` box.
    ///
    /// Composition offsets of version 0 boxes are read as signed values too.
    pub fn read_box(b: &RawBox) -> Result<Self> {
        track_assert_eq!(&b.kind.0, b"trun", ErrorKind::InvalidInput);
        let (header, mut data) = track!(b.full_box())?;
        let flags = header.flags;

        let sample_count = track_io!(data.read_u32::<BigEndian>())?;
        let data_offset = if flags & 0x00_0001 != 0 {
            Some(track_io!(data.read_i32::<BigEndian>())?)
        } else {
            None
        };
        let first_sample_flags = if flags & 0x00_0004 != 0 {
            Some(track_io!(data.read_u32::<BigEndian>())?)
        } else {
            None
        };
        let mut entries = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            let mut e = TrunEntry::default();
            if flags & 0x00_0100 != 0 {
                e.sample_duration = Some(track_io!(data.read_u32::<BigEndian>())?);
            }
            if flags & 0x00_0200 != 0 {
                e.sample_size = Some(track_io!(data.read_u32::<BigEndian>())?);
            }
            if flags & 0x00_0400 != 0 {
                e.sample_flags = Some(track_io!(data.read_u32::<BigEndian>())?);
            }
            if flags & 0x00_0800 != 0 {
                e.sample_composition_time_offset = Some(track_io!(data.read_i32::<BigEndian>())?);
            }
            entries.push(e);
        }
        Ok(TrackRunBox {
            data_offset,
            first_sample_flags,
            entries,
        })
    }
}
