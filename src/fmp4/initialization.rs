use std::io::Write;

use super::{BoxType, Brand, FullBoxHeader, HandlerType, SampleFormat, WriteBoxTo};
use crate::io::WriteTo;
use crate::{ErrorKind, Result};

const IDENTITY_MATRIX: [i32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

/// Packed ISO 639-2 code of `und`.
const LANGUAGE_UNDETERMINED: u16 = 0x55C4;

/// [ISO BMFF Byte Stream Format: 3. Initialization Segments][init_segment]
///
/// [init_segment]: https://w3c.github.io/mse-byte-stream-format-isobmff/#iso-init-segments
#[derive(Debug)]
pub struct InitializationSegment {
    /// File type.
    pub ftyp_box: FileTypeBox,

    /// Movie header and track descriptions.
    pub moov_box: MovieBox,
}
impl InitializationSegment {
    /// Serializes the segment (`ftyp` followed by `moov`).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        track!(self.write_to(&mut buf))?;
        Ok(buf)
    }
}
impl WriteTo for InitializationSegment {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_box!(writer, self.ftyp_box);
        write_box!(writer, self.moov_box);
        Ok(())
    }
}

/// `ftyp` box.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileTypeBox {
    pub major_brand: Brand,
    pub minor_version: u32,
    pub compatible_brands: Vec<Brand>,
}
impl WriteBoxTo for FileTypeBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"ftyp")
    }
}
impl WriteTo for FileTypeBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_all!(writer, &self.major_brand.0);
        write_u32!(writer, self.minor_version);
        for brand in &self.compatible_brands {
            write_all!(writer, &brand.0);
        }
        Ok(())
    }
}
impl Default for FileTypeBox {
    fn default() -> Self {
        FileTypeBox {
            major_brand: Brand(*b"isom"),
            minor_version: 512,
            compatible_brands: vec![
                Brand(*b"isom"),
                Brand(*b"iso2"),
                Brand(*b"mp41"),
                Brand(*b"mp42"),
            ],
        }
    }
}

/// `moov` box.
#[derive(Debug)]
pub struct MovieBox {
    pub mvhd_box: MovieHeaderBox,
    pub trak_boxes: Vec<TrackBox>,
    pub mvex_box: MovieExtendsBox,
}
impl MovieBox {
    /// Makes a movie without tracks.
    pub fn new(timescale: u32, duration: u64) -> Self {
        MovieBox {
            mvhd_box: MovieHeaderBox::new(timescale, duration),
            trak_boxes: Vec::new(),
            mvex_box: MovieExtendsBox::new(duration),
        }
    }

    /// Adds a track and its fragment defaults.
    pub fn push_track(&mut self, trak_box: TrackBox) {
        let track_id = trak_box.tkhd_box.track_id;
        self.mvex_box.trex_boxes.push(TrackExtendsBox::new(track_id));
        self.trak_boxes.push(trak_box);
        self.mvhd_box.next_track_id = self.mvhd_box.next_track_id.max(track_id + 1);
    }
}
impl WriteBoxTo for MovieBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"moov")
    }
}
impl WriteTo for MovieBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_assert!(!self.trak_boxes.is_empty(), ErrorKind::InvalidInput);

        write_box!(writer, self.mvhd_box);
        write_boxes!(writer, &self.trak_boxes);
        write_box!(writer, self.mvex_box);
        Ok(())
    }
}

/// `mvhd` box (version 1).
#[derive(Debug)]
pub struct MovieHeaderBox {
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub rate: i32,   // fixed point 16.16
    pub volume: i16, // fixed point 8.8
    pub matrix: [i32; 9],
    pub next_track_id: u32,
}
impl MovieHeaderBox {
    /// Makes a new `MovieHeaderBox` instance.
    pub fn new(timescale: u32, duration: u64) -> Self {
        MovieHeaderBox {
            creation_time: 0,
            modification_time: 0,
            timescale,
            duration,
            rate: 0x0001_0000,
            volume: 0x0100,
            matrix: IDENTITY_MATRIX,
            next_track_id: 1,
        }
    }
}
impl WriteBoxTo for MovieHeaderBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"mvhd")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(1, 0))
    }
}
impl WriteTo for MovieHeaderBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_assert_ne!(self.timescale, 0, ErrorKind::InvalidInput);
        write_u64!(writer, self.creation_time);
        write_u64!(writer, self.modification_time);
        write_u32!(writer, self.timescale);
        write_u64!(writer, self.duration);
        write_i32!(writer, self.rate);
        write_i16!(writer, self.volume);
        write_zeroes!(writer, 2);
        write_zeroes!(writer, 4 * 2);
        for &x in &self.matrix {
            write_i32!(writer, x);
        }
        write_zeroes!(writer, 4 * 6);
        write_u32!(writer, self.next_track_id);
        Ok(())
    }
}

/// `mehd` box (version 1).
#[derive(Debug)]
pub struct MovieExtendsHeaderBox {
    /// Duration of the whole fragmented movie.
    pub fragment_duration: u64,
}
impl WriteBoxTo for MovieExtendsHeaderBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"mehd")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(1, 0))
    }
}
impl WriteTo for MovieExtendsHeaderBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_u64!(writer, self.fragment_duration);
        Ok(())
    }
}

/// `trex` box.
#[derive(Debug)]
pub struct TrackExtendsBox {
    pub track_id: u32,
    pub default_sample_description_index: u32,
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
    pub default_sample_flags: u32,
}
impl TrackExtendsBox {
    /// Makes a new `TrackExtendsBox` instance.
    pub fn new(track_id: u32) -> Self {
        TrackExtendsBox {
            track_id,
            default_sample_description_index: 1,
            default_sample_duration: 0,
            default_sample_size: 0,
            default_sample_flags: 0,
        }
    }
}
impl WriteBoxTo for TrackExtendsBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"trex")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(0, 0))
    }
}
impl WriteTo for TrackExtendsBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_u32!(writer, self.track_id);
        write_u32!(writer, self.default_sample_description_index);
        write_u32!(writer, self.default_sample_duration);
        write_u32!(writer, self.default_sample_size);
        write_u32!(writer, self.default_sample_flags);
        Ok(())
    }
}

/// `mvex` box.
#[derive(Debug)]
pub struct MovieExtendsBox {
    pub mehd_box: Option<MovieExtendsHeaderBox>,
    pub trex_boxes: Vec<TrackExtendsBox>,
}
impl MovieExtendsBox {
    /// Makes a new `MovieExtendsBox` instance.
    pub fn new(fragment_duration: u64) -> Self {
        MovieExtendsBox {
            mehd_box: Some(MovieExtendsHeaderBox { fragment_duration }),
            trex_boxes: Vec::new(),
        }
    }
}
impl WriteBoxTo for MovieExtendsBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"mvex")
    }
}
impl WriteTo for MovieExtendsBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        if let Some(ref x) = self.mehd_box {
            write_box!(writer, x);
        }
        write_boxes!(writer, &self.trex_boxes);
        Ok(())
    }
}

/// `trak` box.
#[derive(Debug)]
pub struct TrackBox {
    pub tkhd_box: TrackHeaderBox,
    pub mdia_box: MediaBox,
}
impl TrackBox {
    /// Makes a video track.
    pub fn video(track_id: u32, timescale: u32, duration: u64, entry: &VisualSampleEntry) -> Result<Self> {
        let mut tkhd_box = TrackHeaderBox::new(track_id, duration, true);
        tkhd_box.width = u32::from(entry.width) << 16;
        tkhd_box.height = u32::from(entry.height) << 16;
        let sample_entry = track!(entry.to_sample_entry())?;
        Ok(TrackBox {
            tkhd_box,
            mdia_box: MediaBox::new(timescale, duration, true, sample_entry),
        })
    }

    /// Makes an audio track.
    pub fn audio(track_id: u32, timescale: u32, duration: u64, entry: &AudioSampleEntry) -> Result<Self> {
        let sample_entry = track!(entry.to_sample_entry())?;
        Ok(TrackBox {
            tkhd_box: TrackHeaderBox::new(track_id, duration, false),
            mdia_box: MediaBox::new(timescale, duration, false, sample_entry),
        })
    }
}
impl WriteBoxTo for TrackBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"trak")
    }
}
impl WriteTo for TrackBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_box!(writer, self.tkhd_box);
        write_box!(writer, self.mdia_box);
        Ok(())
    }
}

/// `tkhd` box (version 1).
#[derive(Debug)]
pub struct TrackHeaderBox {
    pub track_enabled: bool,
    pub track_in_movie: bool,
    pub track_in_preview: bool,
    pub track_size_is_aspect_ratio: bool,
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: i16, // fixed point 8.8
    pub matrix: [i32; 9],
    pub width: u32,  // fixed point 16.16
    pub height: u32, // fixed point 16.16
}
impl TrackHeaderBox {
    /// Makes a new `TrackHeaderBox` instance.
    pub fn new(track_id: u32, duration: u64, is_video: bool) -> Self {
        TrackHeaderBox {
            track_enabled: true,
            track_in_movie: true,
            track_in_preview: false,
            track_size_is_aspect_ratio: false,
            creation_time: 0,
            modification_time: 0,
            track_id,
            duration,
            layer: 0,
            alternate_group: 0,
            volume: if is_video { 0 } else { 0x0100 },
            matrix: IDENTITY_MATRIX,
            width: 0,
            height: 0,
        }
    }
}
impl WriteBoxTo for TrackHeaderBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"tkhd")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        let flags = (self.track_enabled as u32 * 0x00_0001)
            | (self.track_in_movie as u32 * 0x00_0002)
            | (self.track_in_preview as u32 * 0x00_0004)
            | (self.track_size_is_aspect_ratio as u32 * 0x00_0008);
        Some(FullBoxHeader::new(1, flags))
    }
}
impl WriteTo for TrackHeaderBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_assert_ne!(self.track_id, 0, ErrorKind::InvalidInput);
        write_u64!(writer, self.creation_time);
        write_u64!(writer, self.modification_time);
        write_u32!(writer, self.track_id);
        write_zeroes!(writer, 4);
        write_u64!(writer, self.duration);
        write_zeroes!(writer, 4 * 2);
        write_i16!(writer, self.layer);
        write_i16!(writer, self.alternate_group);
        write_i16!(writer, self.volume);
        write_zeroes!(writer, 2);
        for &x in &self.matrix {
            write_i32!(writer, x);
        }
        write_u32!(writer, self.width);
        write_u32!(writer, self.height);
        Ok(())
    }
}

/// `mdia` box.
#[derive(Debug)]
pub struct MediaBox {
    pub mdhd_box: MediaHeaderBox,
    pub hdlr_box: HandlerReferenceBox,
    pub minf_box: MediaInformationBox,
}
impl MediaBox {
    /// Makes a new `MediaBox` instance.
    pub fn new(timescale: u32, duration: u64, is_video: bool, sample_entry: SampleEntry) -> Self {
        MediaBox {
            mdhd_box: MediaHeaderBox::new(timescale, duration),
            hdlr_box: HandlerReferenceBox::new(is_video),
            minf_box: MediaInformationBox::new(is_video, sample_entry),
        }
    }
}
impl WriteBoxTo for MediaBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"mdia")
    }
}
impl WriteTo for MediaBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_box!(writer, self.mdhd_box);
        write_box!(writer, self.hdlr_box);
        write_box!(writer, self.minf_box);
        Ok(())
    }
}

/// `mdhd` box (version 1).
#[derive(Debug)]
pub struct MediaHeaderBox {
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub language: u16,
}
impl MediaHeaderBox {
    /// Makes a new `MediaHeaderBox` instance.
    pub fn new(timescale: u32, duration: u64) -> Self {
        MediaHeaderBox {
            creation_time: 0,
            modification_time: 0,
            timescale,
            duration,
            language: LANGUAGE_UNDETERMINED,
        }
    }
}
impl WriteBoxTo for MediaHeaderBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"mdhd")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(1, 0))
    }
}
impl WriteTo for MediaHeaderBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_assert_ne!(self.timescale, 0, ErrorKind::InvalidInput);
        write_u64!(writer, self.creation_time);
        write_u64!(writer, self.modification_time);
        write_u32!(writer, self.timescale);
        write_u64!(writer, self.duration);
        write_u16!(writer, self.language);
        write_zeroes!(writer, 2);
        Ok(())
    }
}

/// `hdlr` box.
#[derive(Debug)]
pub struct HandlerReferenceBox {
    pub handler_type: HandlerType,
    pub name: String,
}
impl HandlerReferenceBox {
    /// Makes a `vide` or `soun` handler.
    pub fn new(is_video: bool) -> Self {
        if is_video {
            HandlerReferenceBox {
                handler_type: HandlerType(*b"vide"),
                name: "VideoHandler".to_owned(),
            }
        } else {
            HandlerReferenceBox {
                handler_type: HandlerType(*b"soun"),
                name: "SoundHandler".to_owned(),
            }
        }
    }
}
impl WriteBoxTo for HandlerReferenceBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"hdlr")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(0, 0))
    }
}
impl WriteTo for HandlerReferenceBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_assert!(!self.name.contains('\0'), ErrorKind::InvalidInput);
        write_zeroes!(writer, 4);
        write_all!(writer, &self.handler_type.0);
        write_zeroes!(writer, 4 * 3);
        write_all!(writer, self.name.as_bytes());
        write_zeroes!(writer, 1);
        Ok(())
    }
}

/// `minf` box.
#[derive(Debug)]
pub struct MediaInformationBox {
    pub vmhd_box: Option<VideoMediaHeaderBox>,
    pub smhd_box: Option<SoundMediaHeaderBox>,
    pub dinf_box: DataInformationBox,
    pub stbl_box: SampleTableBox,
}
impl MediaInformationBox {
    /// Makes a new `MediaInformationBox` instance.
    pub fn new(is_video: bool, sample_entry: SampleEntry) -> Self {
        MediaInformationBox {
            vmhd_box: if is_video {
                Some(VideoMediaHeaderBox::new())
            } else {
                None
            },
            smhd_box: if !is_video {
                Some(SoundMediaHeaderBox { balance: 0 })
            } else {
                None
            },
            dinf_box: DataInformationBox::new(),
            stbl_box: SampleTableBox::new(sample_entry),
        }
    }
}
impl WriteBoxTo for MediaInformationBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"minf")
    }
}
impl WriteTo for MediaInformationBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        if let Some(ref x) = self.vmhd_box {
            write_box!(writer, x);
        }
        if let Some(ref x) = self.smhd_box {
            write_box!(writer, x);
        }
        write_box!(writer, self.dinf_box);
        write_box!(writer, self.stbl_box);
        Ok(())
    }
}

/// `vmhd` box.
#[derive(Debug)]
pub struct VideoMediaHeaderBox {
    pub graphicsmode: u16,
    pub opcolor: [u16; 3],
}
impl VideoMediaHeaderBox {
    /// Makes a new `VideoMediaHeaderBox` instance.
    pub fn new() -> Self {
        VideoMediaHeaderBox {
            graphicsmode: 0,
            opcolor: [0, 0, 0],
        }
    }
}
impl Default for VideoMediaHeaderBox {
    fn default() -> Self {
        Self::new()
    }
}
impl WriteBoxTo for VideoMediaHeaderBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"vmhd")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(0, 1))
    }
}
impl WriteTo for VideoMediaHeaderBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_u16!(writer, self.graphicsmode);
        for &x in &self.opcolor {
            write_u16!(writer, x);
        }
        Ok(())
    }
}

/// `smhd` box.
#[derive(Debug)]
pub struct SoundMediaHeaderBox {
    pub balance: i16,
}
impl WriteBoxTo for SoundMediaHeaderBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"smhd")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(0, 0))
    }
}
impl WriteTo for SoundMediaHeaderBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_i16!(writer, self.balance);
        write_zeroes!(writer, 2);
        Ok(())
    }
}

/// `dinf` box.
#[derive(Debug)]
pub struct DataInformationBox {
    pub dref_box: DataReferenceBox,
}
impl DataInformationBox {
    /// Makes a `dinf` that refers to the file itself.
    pub fn new() -> Self {
        DataInformationBox {
            dref_box: DataReferenceBox {
                url_box: DataEntryUrlBox { location: None },
            },
        }
    }
}
impl Default for DataInformationBox {
    fn default() -> Self {
        Self::new()
    }
}
impl WriteBoxTo for DataInformationBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"dinf")
    }
}
impl WriteTo for DataInformationBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_box!(writer, self.dref_box);
        Ok(())
    }
}

/// `stbl` box.
///
/// Samples live in the fragments, so every table except `stsd` is empty.
#[derive(Debug)]
pub struct SampleTableBox {
    pub stsd_box: SampleDescriptionBox,
}
impl SampleTableBox {
    /// Makes a new `SampleTableBox` instance.
    pub fn new(sample_entry: SampleEntry) -> Self {
        SampleTableBox {
            stsd_box: SampleDescriptionBox {
                sample_entries: vec![sample_entry],
            },
        }
    }
}
impl WriteBoxTo for SampleTableBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"stbl")
    }
}
impl WriteTo for SampleTableBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_box!(writer, self.stsd_box);
        write_box!(writer, EmptyTableBox(BoxType(*b"stts"), 1));
        write_box!(writer, EmptyTableBox(BoxType(*b"stsc"), 1));
        write_box!(writer, EmptyTableBox(BoxType(*b"stsz"), 2));
        write_box!(writer, EmptyTableBox(BoxType(*b"stco"), 1));
        Ok(())
    }
}

/// A full box made of the given number of zero `u32` fields.
#[derive(Debug)]
struct EmptyTableBox(BoxType, usize);
impl WriteBoxTo for EmptyTableBox {
    fn box_type(&self) -> BoxType {
        self.0
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(0, 0))
    }
}
impl WriteTo for EmptyTableBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        for _ in 0..self.1 {
            write_u32!(writer, 0);
        }
        Ok(())
    }
}

/// `dref` box.
#[derive(Debug)]
pub struct DataReferenceBox {
    pub url_box: DataEntryUrlBox,
}
impl WriteBoxTo for DataReferenceBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"dref")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(0, 0))
    }
}
impl WriteTo for DataReferenceBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_u32!(writer, 1);
        write_box!(writer, self.url_box);
        Ok(())
    }
}

/// `stsd` box.
#[derive(Debug)]
pub struct SampleDescriptionBox {
    pub sample_entries: Vec<SampleEntry>,
}
impl WriteBoxTo for SampleDescriptionBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"stsd")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(0, 0))
    }
}
impl WriteTo for SampleDescriptionBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_u32!(writer, self.sample_entries.len() as u32);
        write_boxes!(writer, &self.sample_entries);
        Ok(())
    }
}
impl WriteBoxTo for SampleEntry {
    fn box_type(&self) -> BoxType {
        BoxType(self.format.0)
    }
}
impl WriteTo for SampleEntry {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_zeroes!(writer, 6);
        write_u16!(writer, self.data_reference_index);
        write_all!(writer, &self.data);
        Ok(())
    }
}

/// `url ` box.
#[derive(Debug)]
pub struct DataEntryUrlBox {
    /// `None` means that the media data is in the same file.
    pub location: Option<String>,
}
impl WriteBoxTo for DataEntryUrlBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"url ")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        let flags = if self.location.is_some() {
            0
        } else {
            0x00_0001
        };
        Some(FullBoxHeader::new(0, flags))
    }
}
impl WriteTo for DataEntryUrlBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        if let Some(ref x) = self.location {
            write_all!(writer, x.as_bytes());
            write_zeroes!(writer, 1);
        }
        Ok(())
    }
}

/// A sample entry of `stsd`: the format and the format specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleEntry {
    pub format: SampleFormat,
    pub data_reference_index: u16,
    pub data: Vec<u8>,
}

/// A codec configuration box (e.g., `avcC`) whose payload is copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodecConfigurationBox {
    pub kind: BoxType,
    pub data: Vec<u8>,
}
impl WriteBoxTo for CodecConfigurationBox {
    fn box_type(&self) -> BoxType {
        self.kind
    }
}
impl WriteTo for CodecConfigurationBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write_all!(writer, &self.data);
        Ok(())
    }
}

/// Visual sample entry (`avc1`, `hvc1`, ...).
#[derive(Debug, Clone)]
pub struct VisualSampleEntry {
    pub format: SampleFormat,
    pub width: u16,
    pub height: u16,
    pub config_box: CodecConfigurationBox,
}
impl VisualSampleEntry {
    /// Converts to a generic sample entry.
    pub fn to_sample_entry(&self) -> Result<SampleEntry> {
        let mut data = Vec::new();
        write_zeroes!(&mut data, 16);
        write_u16!(&mut data, self.width);
        write_u16!(&mut data, self.height);
        write_u32!(&mut data, 0x0048_0000);
        write_u32!(&mut data, 0x0048_0000);
        write_zeroes!(&mut data, 4);
        write_u16!(&mut data, 1);
        write_zeroes!(&mut data, 32);
        write_u16!(&mut data, 0x0018);
        write_i16!(&mut data, -1);
        write_box!(&mut data, self.config_box);
        Ok(SampleEntry {
            format: self.format,
            data_reference_index: 1,
            data,
        })
    }
}

/// `mp4a` sample entry.
#[derive(Debug, Clone)]
pub struct AudioSampleEntry {
    pub channels: u16,
    pub sample_size: u16,
    pub sample_rate: u32,
    pub esds_box: Mpeg4EsDescriptorBox,
}
impl AudioSampleEntry {
    /// Converts to a generic sample entry.
    pub fn to_sample_entry(&self) -> Result<SampleEntry> {
        let mut data = Vec::new();
        track!(self.write_to(&mut data))?;
        Ok(SampleEntry {
            format: SampleFormat(*b"mp4a"),
            data_reference_index: 1,
            data,
        })
    }
}
impl WriteTo for AudioSampleEntry {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_assert_ne!(self.channels, 0, ErrorKind::InvalidInput);
        // Rates above 65535 Hz are only carried by the esds.
        let sample_rate = if self.sample_rate <= 0xFFFF {
            self.sample_rate as u16
        } else {
            0
        };
        write_zeroes!(writer, 8);
        write_u16!(writer, self.channels);
        write_u16!(writer, self.sample_size);
        write_zeroes!(writer, 4);
        write_u16!(writer, sample_rate);
        write_zeroes!(writer, 2);

        write_box!(writer, self.esds_box);
        Ok(())
    }
}

/// `esds` box (ISO/IEC 14496-1 descriptors around an AudioSpecificConfig).
#[derive(Debug, Clone)]
pub struct Mpeg4EsDescriptorBox {
    pub es_id: u16,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
    pub audio_specific_config: Vec<u8>,
}
impl Mpeg4EsDescriptorBox {
    /// Makes a new `Mpeg4EsDescriptorBox` instance.
    pub fn new(audio_specific_config: Vec<u8>) -> Self {
        Mpeg4EsDescriptorBox {
            es_id: 1,
            max_bitrate: 0,
            avg_bitrate: 0,
            audio_specific_config,
        }
    }
}
impl WriteBoxTo for Mpeg4EsDescriptorBox {
    fn box_type(&self) -> BoxType {
        BoxType(*b"esds")
    }
    fn full_box_header(&self) -> Option<FullBoxHeader> {
        Some(FullBoxHeader::new(0, 0))
    }
}
impl WriteTo for Mpeg4EsDescriptorBox {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        const HEADER: u32 = 5; // tag + 4-byte length
        let asc_len = self.audio_specific_config.len() as u32;
        let decoder_specific_info_len = asc_len;
        let decoder_config_len = 13 + HEADER + decoder_specific_info_len;
        let sl_config_len = 1;
        let es_len = 3 + HEADER + decoder_config_len + HEADER + sl_config_len;

        track!(write_descriptor_header(&mut writer, 0x03, es_len))?;
        write_u16!(writer, self.es_id);
        write_u8!(writer, 0); // stream_priority and flags

        track!(write_descriptor_header(&mut writer, 0x04, decoder_config_len))?;
        write_u8!(writer, 0x40); // object_type=MPEG-4 audio
        write_u8!(writer, (5 << 2) | 1); // stream_type=audio=5, upstream=0, reserved=1
        write_u24!(writer, 0); // buffer_size
        write_u32!(writer, self.max_bitrate);
        write_u32!(writer, self.avg_bitrate);

        track!(write_descriptor_header(&mut writer, 0x05, decoder_specific_info_len))?;
        write_all!(writer, &self.audio_specific_config);

        track!(write_descriptor_header(&mut writer, 0x06, sl_config_len))?;
        write_u8!(writer, 2); // predefined=MP4
        Ok(())
    }
}

fn write_descriptor_header<W: Write>(mut writer: W, tag: u8, len: u32) -> Result<()> {
    track_assert!(len < (1 << 28), ErrorKind::Unsupported, "Too large descriptor: {}", len);
    write_u8!(writer, tag);
    write_u8!(writer, 0x80 | ((len >> 21) & 0x7F) as u8);
    write_u8!(writer, 0x80 | ((len >> 14) & 0x7F) as u8);
    write_u8!(writer, 0x80 | ((len >> 7) & 0x7F) as u8);
    write_u8!(writer, (len & 0x7F) as u8);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};

    #[test]
    fn esds_lengths_follow_the_config() {
        for asc in [vec![0x12, 0x10], vec![0x13, 0x90, 0x56, 0xE5, 0xA5]] {
            let bytes = track_try_unwrap!(Mpeg4EsDescriptorBox::new(asc.clone()).to_box_bytes());
            let n = asc.len();
            assert_eq!(BigEndian::read_u32(&bytes) as usize, bytes.len());
            assert_eq!(&bytes[12..17], &[0x03, 0x80, 0x80, 0x80, (0x20 + n) as u8]);
            assert_eq!(&bytes[20..25], &[0x04, 0x80, 0x80, 0x80, (0x12 + n) as u8]);
            assert_eq!(&bytes[38..43], &[0x05, 0x80, 0x80, 0x80, n as u8]);
            assert_eq!(&bytes[43..43 + n], &asc[..]);
            assert_eq!(&bytes[43 + n..], &[0x06, 0x80, 0x80, 0x80, 0x01, 0x02]);
        }
    }

    #[test]
    fn ftyp_layout() {
        let bytes = track_try_unwrap!(FileTypeBox::default().to_box_bytes());
        assert_eq!(&bytes[..], &b"\x00\x00\x00\x20ftypisom\x00\x00\x02\x00isomiso2mp41mp42"[..]);
    }

    #[test]
    fn track_ids_are_consistent() {
        let entry = VisualSampleEntry {
            format: SampleFormat(*b"avc1"),
            width: 640,
            height: 360,
            config_box: CodecConfigurationBox {
                kind: BoxType(*b"avcC"),
                data: vec![1, 0x64, 0x00, 0x1F],
            },
        };
        let mut moov = MovieBox::new(1000, 5000);
        moov.push_track(track_try_unwrap!(TrackBox::video(1, 1000, 5000, &entry)));
        assert_eq!(moov.mvhd_box.next_track_id, 2);
        assert_eq!(moov.mvex_box.trex_boxes[0].track_id, 1);

        let bytes = track_try_unwrap!(moov.to_box_bytes());
        assert_eq!(BigEndian::read_u32(&bytes) as usize, bytes.len());
    }

    #[test]
    fn hdlr_layout() {
        let bytes = track_try_unwrap!(HandlerReferenceBox::new(false).to_box_bytes());
        assert_eq!(&bytes[16..20], b"soun");
        assert_eq!(&bytes[32..], b"SoundHandler\0");
    }
}
