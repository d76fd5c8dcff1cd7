//! Binary layout of `SimpleBlock` and `Block` payloads.
//!
//! ```text
//! track number (vint) | timestamp (i16) | flags (u8) | [frame count - 1 (u8) | lace sizes] | frames
//! ```
use byteorder::{BigEndian, ByteOrder};
use trackable::error::ErrorKindExt;

use crate::vint::VarInt;
use crate::{Error, ErrorKind, Result};

/// How the frames of a block are packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lacing {
    /// A single frame.
    None,

    /// Sizes coded as sums of bytes, where `0xFF` means "add 255 and continue".
    Xiph,

    /// Every frame has the same size.
    FixedSize,

    /// The first size is a vint and each following size is a signed vint delta.
    Ebml,
}

/// The flags byte of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockFlags(pub u8);
impl BlockFlags {
    /// Keyframe bit (meaningful for `SimpleBlock` only).
    pub fn is_keyframe(self) -> bool {
        self.0 & 0x80 != 0
    }

    /// Invisible bit.
    pub fn is_invisible(self) -> bool {
        self.0 & 0x08 != 0
    }

    /// Discardable bit (meaningful for `SimpleBlock` only).
    pub fn is_discardable(self) -> bool {
        self.0 & 0x01 != 0
    }

    /// Lacing mode.
    pub fn lacing(self) -> Lacing {
        match (self.0 & 0x06) >> 1 {
            0 => Lacing::None,
            1 => Lacing::Xiph,
            2 => Lacing::FixedSize,
            _ => Lacing::Ebml,
        }
    }
}

/// The decoded header of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Number of the track the frames belong to.
    pub track_number: u64,

    /// Timestamp relative to the enclosing cluster.
    pub timestamp: i16,

    /// Flags.
    pub flags: BlockFlags,

    /// Size of every frame, in order.
    pub frame_sizes: Vec<usize>,

    /// Bytes taken by the header, lace table included.
    pub header_size: usize,
}
impl BlockHeader {
    /// Decodes the header (and lace table) at the head of `data`,
    /// which must hold the whole block.
    ///
    /// The frame sizes always add up to `data.len() - header_size`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let track = track!(VarInt::from_bytes(data))?;
        let mut pos = track.len();
        track_assert!(data.len() >= pos + 3, ErrorKind::InvalidInput, "Too short block");
        let timestamp = BigEndian::read_i16(&data[pos..]);
        let flags = BlockFlags(data[pos + 2]);
        pos += 3;

        let lacing = flags.lacing();
        let frame_sizes = if lacing == Lacing::None {
            vec![data.len() - pos]
        } else {
            track_assert!(pos < data.len(), ErrorKind::InvalidLacing, "No frame count");
            let count = usize::from(data[pos]) + 1;
            pos += 1;
            track!(read_lace_sizes(data, &mut pos, lacing, count))?
        };
        Ok(BlockHeader {
            track_number: track.number(),
            timestamp,
            flags,
            frame_sizes,
            header_size: pos,
        })
    }
}

fn read_lace_sizes(data: &[u8], pos: &mut usize, lacing: Lacing, count: usize) -> Result<Vec<usize>> {
    let mut sizes = Vec::with_capacity(count);
    match lacing {
        Lacing::None => unreachable!(),
        Lacing::FixedSize => {
            let remaining = data.len() - *pos;
            track_assert_eq!(
                remaining % count,
                0,
                ErrorKind::InvalidLacing,
                "{} bytes cannot be split into {} frames",
                remaining,
                count
            );
            sizes.resize(count, remaining / count);
            return Ok(sizes);
        }
        Lacing::Xiph => {
            for _ in 1..count {
                let mut size = 0;
                loop {
                    let b = *track_assert_some!(data.get(*pos), ErrorKind::InvalidLacing);
                    *pos += 1;
                    size += usize::from(b);
                    if b != 0xFF {
                        break;
                    }
                }
                sizes.push(size);
            }
        }
        Lacing::Ebml => {
            if count > 1 {
                let first = track!(lace_varint(data, pos))?;
                let mut size = track!(first.to_usize())?;
                sizes.push(size);
                for _ in 2..count {
                    let delta = track!(lace_varint(data, pos))?.signed_number();
                    let next = size as i64 + delta;
                    track_assert!(next >= 0, ErrorKind::InvalidLacing, "Negative frame size");
                    size = next as usize;
                    sizes.push(size);
                }
            }
        }
    }

    let explicit: usize = sizes.iter().sum();
    let remaining = data.len() - *pos;
    track_assert!(
        explicit <= remaining,
        ErrorKind::InvalidLacing,
        "Lace sizes ({} bytes) exceed the block payload ({} bytes)",
        explicit,
        remaining
    );
    sizes.push(remaining - explicit);
    Ok(sizes)
}

fn lace_varint(data: &[u8], pos: &mut usize) -> Result<VarInt> {
    let v = track!(VarInt::from_bytes(&data[*pos..])
        .map_err(|e| Error::from(ErrorKind::InvalidLacing.takes_over(e))))?;
    *pos += v.len();
    Ok(v)
}

/// A block read into memory.
#[derive(Debug, Clone)]
pub struct DecodedBlock {
    header: BlockHeader,
    keyframe: bool,
    data: Vec<u8>,
}
impl DecodedBlock {
    /// Decodes a `SimpleBlock` payload.
    pub fn from_simple_block(data: Vec<u8>) -> Result<Self> {
        let header = track!(BlockHeader::parse(&data))?;
        let keyframe = header.flags.is_keyframe();
        Ok(DecodedBlock {
            header,
            keyframe,
            data,
        })
    }

    /// Decodes a `Block` payload whose keyframe status is known from its group.
    pub fn from_block(data: Vec<u8>, keyframe: bool) -> Result<Self> {
        let header = track!(BlockHeader::parse(&data))?;
        Ok(DecodedBlock {
            header,
            keyframe,
            data,
        })
    }

    /// Returns the header.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Returns the track number.
    pub fn track_number(&self) -> u64 {
        self.header.track_number
    }

    /// Returns the timestamp relative to the enclosing cluster.
    pub fn timestamp(&self) -> i16 {
        self.header.timestamp
    }

    /// Returns `true` if the block can be decoded without other blocks.
    pub fn is_keyframe(&self) -> bool {
        self.keyframe
    }

    /// Returns the frames of the block.
    pub fn frames(&self) -> impl Iterator<Item = &[u8]> {
        let mut offset = self.header.header_size;
        self.header.frame_sizes.iter().map(move |&size| {
            let frame = &self.data[offset..offset + size];
            offset += size;
            frame
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(flags: u8, table: &[u8], frames: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0x81, 0x00, 0x10, flags];
        data.extend_from_slice(table);
        for f in frames {
            data.extend_from_slice(f);
        }
        data
    }

    fn check(data: &[u8], expected: &[usize]) {
        let header = track_try_unwrap!(BlockHeader::parse(data));
        assert_eq!(header.track_number, 1);
        assert_eq!(header.timestamp, 16);
        assert_eq!(header.frame_sizes, expected);
        assert_eq!(
            header.frame_sizes.iter().sum::<usize>(),
            data.len() - header.header_size
        );
    }

    #[test]
    fn no_lacing() {
        let data = block(0x80, &[], &[vec![7; 10]]);
        check(&data, &[10]);
        let b = track_try_unwrap!(DecodedBlock::from_simple_block(data));
        assert!(b.is_keyframe());
        assert_eq!(b.frames().collect::<Vec<_>>(), vec![&[7u8; 10][..]]);
    }

    #[test]
    fn xiph_lacing() {
        let frames = vec![vec![1; 300], vec![2; 255], vec![3; 4]];
        // 300 = 255 + 45, 255 = 255 + 0
        let data = block(0x02, &[2, 0xFF, 45, 0xFF, 0], &frames);
        check(&data, &[300, 255, 4]);

        let b = track_try_unwrap!(DecodedBlock::from_simple_block(data));
        assert!(!b.is_keyframe());
        let decoded = b.frames().map(|f| f.to_vec()).collect::<Vec<_>>();
        assert_eq!(decoded, frames);
    }

    #[test]
    fn fixed_size_lacing() {
        let data = block(0x84, &[3], &[vec![1; 5], vec![2; 5], vec![3; 5], vec![4; 5]]);
        check(&data, &[5, 5, 5, 5]);

        let uneven = block(0x84, &[3], &[vec![0; 7]]);
        let e = BlockHeader::parse(&uneven).err().unwrap();
        assert_eq!(*e.kind(), ErrorKind::InvalidLacing);
    }

    #[test]
    fn ebml_lacing() {
        let sizes = [400usize, 350, 352, 10];
        let frames = sizes.iter().map(|&n| vec![9; n]).collect::<Vec<_>>();
        let mut table = vec![3];
        table.extend_from_slice(VarInt::from_u64(400).unwrap().as_bytes());
        // -50 and +2 as 2-byte signed vints (bias 8191)
        table.extend_from_slice(VarInt::with_length(8191 - 50, 2).unwrap().as_bytes());
        table.extend_from_slice(VarInt::with_length(8191 + 2, 2).unwrap().as_bytes());
        let data = block(0x06, &table, &frames);
        check(&data, &sizes);

        let header = BlockHeader::parse(&data).unwrap();
        for i in 1..sizes.len() - 1 {
            let delta = header.frame_sizes[i] as i64 - header.frame_sizes[i - 1] as i64;
            assert_eq!(header.frame_sizes[i - 1] as i64 + delta, sizes[i] as i64);
        }
    }

    #[test]
    fn oversized_lace_table() {
        let data = block(0x02, &[1, 200], &[vec![0; 10]]);
        let e = BlockHeader::parse(&data).err().unwrap();
        assert_eq!(*e.kind(), ErrorKind::InvalidLacing);

        let data = block(0x02, &[1, 0xFF], &[]);
        let e = BlockHeader::parse(&data).err().unwrap();
        assert_eq!(*e.kind(), ErrorKind::InvalidLacing);
    }

    #[test]
    fn inconsistent_lace_sizes_are_rejected() {
        let invalid = [
            // Xiph: 300 bytes declared for the first of two frames, 10 available
            block(0x02, &[1, 0xFF, 45], &[vec![0; 10]]),
            // fixed size: 7 bytes for 2 frames
            block(0x04, &[1], &[vec![0; 7]]),
            // EBML: 100 + 100 bytes declared, 10 available
            block(0x06, &[2, 0xE4, 0xBF], &[vec![0; 10]]),
            // EBML: 10 followed by a delta of -20
            block(0x06, &[2, 0x8A, 0xAB], &[vec![0; 30]]),
            // EBML: no room for the first size
            block(0x06, &[1], &[]),
        ];
        for data in &invalid {
            let e = BlockHeader::parse(data).err().map(|e| *e.kind());
            assert_eq!(e, Some(ErrorKind::InvalidLacing), "{:02X?}", data);
        }
    }

    #[test]
    fn flags() {
        let f = BlockFlags(0x80 | 0x08 | 0x06 | 0x01);
        assert!(f.is_keyframe());
        assert!(f.is_invisible());
        assert!(f.is_discardable());
        assert_eq!(f.lacing(), Lacing::Ebml);
        assert_eq!(BlockFlags(0x00).lacing(), Lacing::None);
    }
}
