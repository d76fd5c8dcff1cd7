use std::io::Write;

use super::{BoxType, FullBoxHeader, WriteBoxTo};
use crate::io::{ArrayBuilder, WriteTo};
use crate::{ErrorKind, Result};

/// [ISO BMFF Byte Stream Format: 4. Media Segments][media_segment]
///
/// [media_segment]: https://w3c.github.io/mse-byte-stream-format-isobmff/#iso-media-segments
#[derive(Debug)]
pub struct MediaSegment {
    /// The fragment header.
    pub moof_box: MovieFragmentBox,

    /// The sample data.
    pub mdat_boxes: Vec<MediaDataBox>,
}
impl MediaSegment {
    /// Makes an empty `MediaSegment` with the given sequence number.
    pub fn new(sequence_number: u32) -> Self {
        MediaSegment {
            moof_box: MovieFragmentBox::new(sequence_number),
            mdat_boxes: Vec::new(),
        }
    }

    /// Returns the sequence number.
    pub fn sequence_number(&self) -> u32 {
        self.moof_box.mfhd_box.sequence_number
    }

    /// Converts the segment into a builder without copying the sample data.
    pub fn into_builder(self) -> Result<ArrayBuilder> {
        track_assert!(!self.mdat_boxes.is_empty(), ErrorKind::InvalidInput);
        let mut builder = ArrayBuilder::from(track!(self.moof_box.to_box_bytes())?);
        for mdat in self.mdat_boxes {
            builder.push(track!(mdat.into_builder())?);
        }
        Ok(builder)
    }

    /// Serializes the segment (`moof` followed by `mdat`).
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        Ok(track!(self.into_builder())?.build())
    }
}
impl WriteTo for MediaSegment {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_assert!(!self.mdat_boxes.is_empty(), ErrorKind::InvalidInput);
        write_box!(writer, self.moof_box);
        write_boxes!(writer, &self.mdat_boxes);
        Ok(())
    }
}

/// `mdat` box.
///
/// The samples are kept apart until the box is serialized.
#[derive(Debug, Default)]
pub struct MediaDataBox {
    /// Sample data in track-run order.
    pub chunks: Vec<Vec<u8>>,
}
impl MediaDataBox {
    /// Returns the size of the payload.
    pub fn data_size(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Converts the box into a builder without copying the sample data.
    pub fn into_builder(self) -> Result<ArrayBuilder> {
        let mut header = Vec::with_capacity(8);
        track!(track!(self.box_header())?.write_to(&mut header))?;
        let mut builder = ArrayBuilder::from(header);
        for chunk in self.chunks {
            builder.push(chunk);
        }
        Ok(builder)
    }
}
impl WriteBoxTo for MediaDataBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"mdat")
    }
    fn box_size(&self) -> Result<u32> {
        let size = 8 + self.data_size() as u64;
        track_assert!(size <= u64::from(u32::MAX), ErrorKind::Unsupported);
        Ok(size as u32)
    }
}
impl WriteTo for MediaDataBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        for chunk in &self.chunks {
            write_all!(writer, chunk);
        }
        Ok(())
    }
}

/// `moof` box.
#[derive(Debug)]
pub struct MovieFragmentBox {
    /// Fragment header.
    pub mfhd_box: MovieFragmentHeaderBox,

    /// One entry per track present in the fragment.
    pub traf_boxes: Vec<TrackFragmentBox>,
}
impl MovieFragmentBox {
    /// Makes an empty `MovieFragmentBox` instance.
    pub fn new(sequence_number: u32) -> Self {
        MovieFragmentBox {
            mfhd_box: MovieFragmentHeaderBox { sequence_number },
            traf_boxes: Vec::new(),
        }
    }
}
impl WriteBoxTo for MovieFragmentBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"moof")
    }
}
impl WriteTo for MovieFragmentBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_assert!(!self.traf_boxes.is_empty(), ErrorKind::InvalidInput);
        write_box!(writer, self.mfhd_box);
        write_boxes!(writer, &self.traf_boxes);
        Ok(())
    }
}

/// `mfhd` box.
#[derive(Debug)]
pub struct MovieFragmentHeaderBox {
    /// Sequence number (starts from 1).
    pub sequence_number: u32,
}
impl WriteBoxTo for MovieFragmentHeaderBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"mfhd")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(0, 0))
    }
}
impl WriteTo for MovieFragmentHeaderBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_assert_ne!(self.sequence_number, 0, ErrorKind::InvalidInput);
        write_u32!(writer, self.sequence_number);
        Ok(())
    }
}

/// `traf` box.
#[derive(Debug)]
pub struct TrackFragmentBox {
    /// Track fragment header.
    pub tfhd_box: TrackFragmentHeaderBox,

    /// Decode time of the first sample.
    pub tfdt_box: TrackFragmentBaseMediaDecodeTimeBox,

    /// The samples.
    pub trun_box: TrackRunBox,
}
impl TrackFragmentBox {
    /// Makes an empty `TrackFragmentBox` instance.
    pub fn new(track_id: u32) -> Self {
        TrackFragmentBox {
            tfhd_box: TrackFragmentHeaderBox::new(track_id),
            tfdt_box: TrackFragmentBaseMediaDecodeTimeBox {
                base_media_decode_time: 0,
            },
            trun_box: TrackRunBox::new(),
        }
    }
}
impl WriteBoxTo for TrackFragmentBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"traf")
    }
}
impl WriteTo for TrackFragmentBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_box!(writer, self.tfhd_box);
        write_box!(writer, self.tfdt_box);
        write_box!(writer, self.trun_box);
        Ok(())
    }
}

/// `trun` box (version 1, so composition offsets are signed).
#[derive(Debug)]
pub struct TrackRunBox {
    /// Offset of the first sample, relative to the start of the enclosing `moof`.
    pub data_offset: Option<i32>,

    /// Overrides the flags of the first sample.
    pub first_sample_flags: Option<u32>,

    /// The samples.
    ///
    /// Every entry must have the same optional fields.
    pub entries: Vec<TrunEntry>,
}
impl TrackRunBox {
    /// Makes an empty `TrackRunBox` instance.
    pub fn new() -> Self {
        TrackRunBox {
            data_offset: None,
            first_sample_flags: None,
            entries: Vec::new(),
        }
    }
}
impl Default for TrackRunBox {
    fn default() -> Self {
        Self::new()
    }
}
impl WriteBoxTo for TrackRunBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"trun")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        let head = self.entries.first().cloned().unwrap_or_default();
        Some(FullBoxHeader::new(1, self.flags_of(&head)))
    }
}
impl TrackRunBox {
    fn flags_of(&self, head: &TrunEntry) -> u32 {
        (self.data_offset.is_some() as u32 * 0x00_0001)
            | (self.first_sample_flags.is_some() as u32 * 0x00_0004)
            | head.field_flags()
    }
}
impl WriteTo for TrackRunBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_u32!(writer, self.entries.len() as u32);
        if let Some(x) = self.data_offset {
            write_i32!(writer, x);
        }
        if let Some(x) = self.first_sample_flags {
            write_u32!(writer, x);
        }
        let head_flags = self.entries.first().map_or(0, TrunEntry::field_flags);
        for e in &self.entries {
            track_assert_eq!(
                e.field_flags(),
                head_flags,
                ErrorKind::InvalidInput,
                "Every trun entry must have the same fields"
            );
            if let Some(x) = e.sample_duration {
                write_u32!(writer, x);
            }
            if let Some(x) = e.sample_size {
                write_u32!(writer, x);
            }
            if let Some(x) = e.sample_flags {
                write_u32!(writer, x);
            }
            if let Some(x) = e.sample_composition_time_offset {
                write_i32!(writer, x);
            }
        }
        Ok(())
    }
}

/// A sample of `TrackRunBox`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct TrunEntry {
    /// Duration in the media timescale.
    pub sample_duration: Option<u32>,

    /// Size in bytes.
    pub sample_size: Option<u32>,

    /// Packed `SampleFlags`.
    pub sample_flags: Option<u32>,

    /// PTS minus DTS.
    pub sample_composition_time_offset: Option<i32>,
}
impl TrunEntry {
    fn field_flags(&self) -> u32 {
        (self.sample_duration.is_some() as u32 * 0x00_0100)
            | (self.sample_size.is_some() as u32 * 0x00_0200)
            | (self.sample_flags.is_some() as u32 * 0x00_0400)
            | (self.sample_composition_time_offset.is_some() as u32 * 0x00_0800)
    }
}

/// `tfdt` box (version 1).
#[derive(Debug)]
pub struct TrackFragmentBaseMediaDecodeTimeBox {
    /// Decode time of the first sample in the media timescale.
    pub base_media_decode_time: u64,
}
impl WriteBoxTo for TrackFragmentBaseMediaDecodeTimeBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"tfdt")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(1, 0))
    }
}
impl WriteTo for TrackFragmentBaseMediaDecodeTimeBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_u64!(writer, self.base_media_decode_time);
        Ok(())
    }
}

/// Sample dependency flags.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleFlags {
    // reserved(4)
    pub is_leading: u8,            // u2
    pub sample_depends_on: u8,     // u2
    pub sample_is_depended_on: u8, // u2
    pub sample_has_redundancy: u8, // u2
    pub sample_padding_value: u8,  // u3
    pub sample_is_non_sync_sample: bool,
    pub sample_degradation_priority: u16,
}
impl SampleFlags {
    /// Flags of a sync sample (depends on no other sample).
    pub fn keyframe() -> Self {
        SampleFlags {
            sample_depends_on: 2,
            ..Default::default()
        }
    }

    /// Flags of a sample that depends on others.
    pub fn delta_frame() -> Self {
        SampleFlags {
            sample_depends_on: 1,
            sample_is_non_sync_sample: true,
            ..Default::default()
        }
    }

    /// Packs the flags.
    pub fn to_u32(&self) -> u32 {
        (u32::from(self.is_leading & 0b11) << 26)
            | (u32::from(self.sample_depends_on & 0b11) << 24)
            | (u32::from(self.sample_is_depended_on & 0b11) << 22)
            | (u32::from(self.sample_has_redundancy & 0b11) << 20)
            | (u32::from(self.sample_padding_value & 0b111) << 17)
            | ((self.sample_is_non_sync_sample as u32) << 16)
            | u32::from(self.sample_degradation_priority)
    }
}

/// `tfhd` box.
#[derive(Debug)]
pub struct TrackFragmentHeaderBox {
    pub track_id: u32,
    pub duration_is_empty: bool,
    pub default_base_is_moof: bool,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<u32>,
}
impl TrackFragmentHeaderBox {
    /// Makes a header whose data offsets are relative to the enclosing `moof`.
    pub fn new(track_id: u32) -> Self {
        TrackFragmentHeaderBox {
            track_id,
            duration_is_empty: false,
            default_base_is_moof: true,
            base_data_offset: None,
            sample_description_index: None,
            default_sample_duration: None,
            default_sample_size: None,
            default_sample_flags: None,
        }
    }
}
impl WriteBoxTo for TrackFragmentHeaderBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"tfhd")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        let flags = (self.base_data_offset.is_some() as u32 * 0x00_0001)
            | (self.sample_description_index.is_some() as u32 * 0x00_0002)
            | (self.default_sample_duration.is_some() as u32 * 0x00_0008)
            | (self.default_sample_size.is_some() as u32 * 0x00_0010)
            | (self.default_sample_flags.is_some() as u32 * 0x00_0020)
            | (self.duration_is_empty as u32 * 0x01_0000)
            | (self.default_base_is_moof as u32 * 0x02_0000);
        Some(FullBoxHeader::new(0, flags))
    }
}
impl WriteTo for TrackFragmentHeaderBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_u32!(writer, self.track_id);
        if let Some(x) = self.base_data_offset {
            write_u64!(writer, x);
        }
        if let Some(x) = self.sample_description_index {
            write_u32!(writer, x);
        }
        if let Some(x) = self.default_sample_duration {
            write_u32!(writer, x);
        }
        if let Some(x) = self.default_sample_size {
            write_u32!(writer, x);
        }
        if let Some(x) = self.default_sample_flags {
            write_u32!(writer, x);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};

    fn segment() -> MediaSegment {
        let mut traf = TrackFragmentBox::new(1);
        traf.tfdt_box.base_media_decode_time = 1 << 33;
        traf.trun_box.data_offset = Some(0);
        traf.trun_box.entries.push(TrunEntry {
            sample_duration: Some(40),
            sample_size: Some(3),
            sample_flags: Some(SampleFlags::keyframe().to_u32()),
            sample_composition_time_offset: Some(-2),
        });
        let mut segment = MediaSegment::new(7);
        segment.moof_box.traf_boxes.push(traf);
        segment.mdat_boxes.push(MediaDataBox {
            chunks: vec![vec![1, 2], vec![3]],
        });
        segment
    }

    #[test]
    fn box_sizes_match_serialized_lengths() {
        let segment = segment();
        let moof = track_try_unwrap!(segment.moof_box.to_box_bytes());
        assert_eq!(BigEndian::read_u32(&moof) as usize, moof.len());
        assert_eq!(&moof[4..8], b"moof");
        assert_eq!(track_try_unwrap!(segment.moof_box.box_size()) as usize, moof.len());

        let mut written = Vec::new();
        track_try_unwrap!(segment.write_to(&mut written));
        let built = track_try_unwrap!(segment.into_bytes());
        assert_eq!(written, built);

        let mdat = &built[moof.len()..];
        assert_eq!(BigEndian::read_u32(mdat), 11);
        assert_eq!(&mdat[4..], b"mdat\x01\x02\x03");
    }

    #[test]
    fn trun_layout() {
        let segment = segment();
        let trun = &segment.moof_box.traf_boxes[0].trun_box;
        let bytes = track_try_unwrap!(trun.to_box_bytes());
        assert_eq!(&bytes[4..8], b"trun");
        // version 1, data offset, duration, size, flags and composition offset
        assert_eq!(&bytes[8..12], &[1, 0x00, 0x0F, 0x01]);
        assert_eq!(BigEndian::read_u32(&bytes[12..]), 1);
        assert_eq!(BigEndian::read_i32(&bytes[16..]), 0);
        assert_eq!(BigEndian::read_u32(&bytes[20..]), 40);
        assert_eq!(BigEndian::read_u32(&bytes[24..]), 3);
        assert_eq!(BigEndian::read_u32(&bytes[28..]), 0x0200_0000);
        assert_eq!(BigEndian::read_i32(&bytes[32..]), -2);
        assert_eq!(bytes.len(), 36);
    }

    #[test]
    fn tfdt_is_64bit() {
        let segment = segment();
        let tfdt = &segment.moof_box.traf_boxes[0].tfdt_box;
        let bytes = track_try_unwrap!(tfdt.to_box_bytes());
        assert_eq!(bytes.len(), 20);
        assert_eq!(bytes[8], 1);
        assert_eq!(BigEndian::read_u64(&bytes[12..]), 1 << 33);
    }

    #[test]
    fn tfhd_default_base_is_moof() {
        let bytes = track_try_unwrap!(TrackFragmentHeaderBox::new(2).to_box_bytes());
        assert_eq!(&bytes[8..12], &[0, 0x02, 0x00, 0x00]);
        assert_eq!(BigEndian::read_u32(&bytes[12..]), 2);
    }

    #[test]
    fn sample_flags() {
        assert_eq!(SampleFlags::keyframe().to_u32(), 0x0200_0000);
        assert_eq!(SampleFlags::delta_frame().to_u32(), 0x0101_0000);
    }

    #[test]
    fn mixed_trun_entries_are_rejected() {
        let mut trun = TrackRunBox::new();
        trun.entries.push(TrunEntry {
            sample_size: Some(1),
            ..Default::default()
        });
        trun.entries.push(TrunEntry::default());
        let e = trun.to_box_bytes().err().unwrap();
        assert_eq!(*e.kind(), ErrorKind::InvalidInput);
    }
}
