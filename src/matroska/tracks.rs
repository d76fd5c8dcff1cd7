//! Track descriptions.
use super::encoding::{ContentEncodings, DecodePipeline, CONTENT_ENCODINGS};
use crate::ebml::{define_elements, Many};
use crate::Result;

const TRACK_TYPES: &[(u64, &str)] = &[
    (1, "video"),
    (2, "audio"),
    (3, "complex"),
    (0x10, "logo"),
    (0x11, "subtitle"),
    (0x12, "buttons"),
    (0x20, "control"),
    (0x21, "metadata"),
];

define_elements! {
    /// Descriptions of the tracks.
    Tracks(TRACKS, multiple) = 0x1654_AE6B, Some(1), Master [TRACK_ENTRY];
    /// Description of a single track.
    TrackEntry(TRACK_ENTRY, multiple) = 0xAE, Some(2), Master [
        TRACK_NUMBER, TRACK_UID, TRACK_TYPE, FLAG_ENABLED, FLAG_DEFAULT, FLAG_FORCED,
        FLAG_LACING, DEFAULT_DURATION, NAME, LANGUAGE, LANGUAGE_BCP47, CODEC_ID,
        CODEC_PRIVATE, CODEC_NAME, CODEC_DELAY, SEEK_PRE_ROLL, VIDEO, AUDIO,
        CONTENT_ENCODINGS,
    ];
    /// Number used by blocks to refer to the track.
    TrackNumber(TRACK_NUMBER) = 0xD7, Some(3), Uint;
    /// Unique id of the track.
    TrackUID(TRACK_UID) = 0x73C5, Some(3), Uint;
    /// Kind of the track.
    TrackType(TRACK_TYPE) = 0x83, Some(3), Enum(TRACK_TYPES);
    /// Whether the track is usable.
    FlagEnabled(FLAG_ENABLED) = 0xB9, Some(3), Uint;
    /// Whether the track is selected by default.
    FlagDefault(FLAG_DEFAULT) = 0x88, Some(3), Uint;
    /// Whether the track must be played.
    FlagForced(FLAG_FORCED) = 0x55AA, Some(3), Uint;
    /// Whether the blocks of the track may use lacing.
    FlagLacing(FLAG_LACING) = 0x9C, Some(3), Uint;
    /// Nanoseconds per frame.
    DefaultDuration(DEFAULT_DURATION) = 0x23_E383, Some(3), Uint;
    /// Human readable name.
    Name(NAME) = 0x536E, Some(3), Utf8;
    /// ISO 639-2 language.
    Language(LANGUAGE) = 0x22_B59C, Some(3), Utf8;
    /// BCP 47 language.
    LanguageBCP47(LANGUAGE_BCP47) = 0x22_B59D, Some(3), Utf8;
    /// Codec identifier (e.g., `V_MPEG4/ISO/AVC`).
    CodecID(CODEC_ID) = 0x86, Some(3), Utf8;
    /// Codec specific initialization data.
    CodecPrivate(CODEC_PRIVATE) = 0x63A2, Some(3), Bytes;
    /// Human readable codec name.
    CodecName(CODEC_NAME) = 0x25_8688, Some(3), Utf8;
    /// Decoder delay in nanoseconds.
    CodecDelay(CODEC_DELAY) = 0x56AA, Some(3), Uint;
    /// Nanoseconds to decode before a seek target.
    SeekPreRoll(SEEK_PRE_ROLL) = 0x56BB, Some(3), Uint;

    /// Video settings.
    Video(VIDEO) = 0xE0, Some(3), Master [
        FLAG_INTERLACED, PIXEL_WIDTH, PIXEL_HEIGHT, PIXEL_CROP_BOTTOM, PIXEL_CROP_TOP,
        PIXEL_CROP_LEFT, PIXEL_CROP_RIGHT, DISPLAY_WIDTH, DISPLAY_HEIGHT, DISPLAY_UNIT,
    ];
    /// Interlacing.
    FlagInterlaced(FLAG_INTERLACED) = 0x9A, Some(4), Uint;
    /// Width in pixels.
    PixelWidth(PIXEL_WIDTH) = 0xB0, Some(4), Uint;
    /// Height in pixels.
    PixelHeight(PIXEL_HEIGHT) = 0xBA, Some(4), Uint;
    /// Pixels removed at the bottom.
    PixelCropBottom(PIXEL_CROP_BOTTOM) = 0x54AA, Some(4), Uint;
    /// Pixels removed at the top.
    PixelCropTop(PIXEL_CROP_TOP) = 0x54BB, Some(4), Uint;
    /// Pixels removed on the left.
    PixelCropLeft(PIXEL_CROP_LEFT) = 0x54CC, Some(4), Uint;
    /// Pixels removed on the right.
    PixelCropRight(PIXEL_CROP_RIGHT) = 0x54DD, Some(4), Uint;
    /// Display width.
    DisplayWidth(DISPLAY_WIDTH) = 0x54B0, Some(4), Uint;
    /// Display height.
    DisplayHeight(DISPLAY_HEIGHT) = 0x54BA, Some(4), Uint;
    /// Unit of the display size.
    DisplayUnit(DISPLAY_UNIT) = 0x54B2, Some(4), Uint;

    /// Audio settings.
    Audio(AUDIO) = 0xE1, Some(3), Master [
        SAMPLING_FREQUENCY, OUTPUT_SAMPLING_FREQUENCY, CHANNELS, BIT_DEPTH,
    ];
    /// Sampling frequency in Hz.
    SamplingFrequency(SAMPLING_FREQUENCY) = 0xB5, Some(4), Float;
    /// Output sampling frequency in Hz.
    OutputSamplingFrequency(OUTPUT_SAMPLING_FREQUENCY) = 0x78B5, Some(4), Float;
    /// Number of channels.
    Channels(CHANNELS) = 0x9F, Some(4), Uint;
    /// Bits per sample.
    BitDepth(BIT_DEPTH) = 0x6264, Some(4), Uint;
}

/// Kind of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum TrackKind {
    Video,
    Audio,
    Complex,
    Logo,
    Subtitle,
    Buttons,
    Control,
    Metadata,
    Other(u64),
}
impl TrackKind {
    /// Makes a `TrackKind` from its code.
    pub fn from_code(code: u64) -> Self {
        match code {
            1 => TrackKind::Video,
            2 => TrackKind::Audio,
            3 => TrackKind::Complex,
            0x10 => TrackKind::Logo,
            0x11 => TrackKind::Subtitle,
            0x12 => TrackKind::Buttons,
            0x20 => TrackKind::Control,
            0x21 => TrackKind::Metadata,
            n => TrackKind::Other(n),
        }
    }
}

impl Tracks {
    /// Returns the track entries.
    pub fn entries(&self) -> Result<Many<TrackEntry>> {
        track!(self.many::<TrackEntry>())
    }
}

macro_rules! optional_value {
    ($(#[$attr:meta])* $method:ident, $ty:ty, $element:ident, $read:ident) => {
        $(#[$attr])*
        pub fn $method(&self) -> Result<Option<$ty>> {
            match track!(self.maybe_one::<$element>())? {
                Some(e) => Ok(Some(track!(e.$read())?)),
                None => Ok(None),
            }
        }
    };
}

impl TrackEntry {
    /// Returns the track number.
    pub fn track_number(&self) -> Result<u64> {
        track!(self.one::<TrackNumber>().and_then(|e| e.read_uint()))
    }

    /// Returns the kind of the track.
    pub fn track_kind(&self) -> Result<TrackKind> {
        let code = track!(self.one::<TrackType>().and_then(|e| e.read_uint()))?;
        Ok(TrackKind::from_code(code))
    }

    /// Returns the codec identifier.
    pub fn codec_id(&self) -> Result<String> {
        track!(self.one::<CodecID>().and_then(|e| e.read_utf8()))
    }

    optional_value!(
        /// Returns the unique id.
        track_uid, u64, TrackUID, read_uint
    );
    optional_value!(
        /// Returns the nanoseconds per frame.
        default_duration, u64, DefaultDuration, read_uint
    );
    optional_value!(
        /// Returns the name.
        track_name, String, Name, read_utf8
    );
    optional_value!(
        /// Returns the codec delay in nanoseconds.
        codec_delay, u64, CodecDelay, read_uint
    );

    /// Returns the codec private data as stored, before content decoding.
    pub fn raw_codec_private(&self) -> Result<Option<Vec<u8>>> {
        match track!(self.maybe_one::<CodecPrivate>())? {
            Some(e) => Ok(Some(track!(e.read_bytes())?)),
            None => Ok(None),
        }
    }

    /// Returns the codec private data with the content encodings undone.
    pub fn codec_private(&self) -> Result<Option<Vec<u8>>> {
        let Some(raw) = track!(self.raw_codec_private())? else {
            return Ok(None);
        };
        let pipeline = track!(self.decode_pipeline())?;
        Ok(Some(track!(pipeline.decode_private(raw))?))
    }

    /// Returns the language, `eng` if absent.
    pub fn language(&self) -> Result<String> {
        if let Some(bcp47) = track!(self.maybe_one::<LanguageBCP47>())? {
            return track!(bcp47.read_utf8());
        }
        match track!(self.maybe_one::<Language>())? {
            Some(e) => track!(e.read_utf8()),
            None => Ok("eng".to_owned()),
        }
    }

    /// Returns `true` unless the track is flagged as disabled.
    pub fn is_enabled(&self) -> Result<bool> {
        match track!(self.maybe_one::<FlagEnabled>())? {
            Some(e) => Ok(track!(e.read_uint())? != 0),
            None => Ok(true),
        }
    }

    /// Returns the video settings.
    pub fn video(&self) -> Result<Option<Video>> {
        track!(self.maybe_one::<Video>())
    }

    /// Returns the audio settings.
    pub fn audio(&self) -> Result<Option<Audio>> {
        track!(self.maybe_one::<Audio>())
    }

    /// Returns the content encodings.
    pub fn content_encodings(&self) -> Result<Option<ContentEncodings>> {
        track!(self.maybe_one::<ContentEncodings>())
    }

    /// Returns the steps that undo the content encodings of the track.
    pub fn decode_pipeline(&self) -> Result<DecodePipeline> {
        match track!(self.content_encodings())? {
            Some(encodings) => track!(DecodePipeline::new(&encodings)),
            None => Ok(DecodePipeline::default()),
        }
    }
}

impl Video {
    /// Returns the width in pixels.
    pub fn pixel_width(&self) -> Result<u64> {
        track!(self.one::<PixelWidth>().and_then(|e| e.read_uint()))
    }

    /// Returns the height in pixels.
    pub fn pixel_height(&self) -> Result<u64> {
        track!(self.one::<PixelHeight>().and_then(|e| e.read_uint()))
    }

    /// Returns the display width, the pixel width if absent.
    pub fn display_width(&self) -> Result<u64> {
        match track!(self.maybe_one::<DisplayWidth>())? {
            Some(e) => track!(e.read_uint()),
            None => track!(self.pixel_width()),
        }
    }

    /// Returns the display height, the pixel height if absent.
    pub fn display_height(&self) -> Result<u64> {
        match track!(self.maybe_one::<DisplayHeight>())? {
            Some(e) => track!(e.read_uint()),
            None => track!(self.pixel_height()),
        }
    }
}

impl Audio {
    /// Returns the sampling frequency, 8000 Hz if absent.
    pub fn sampling_frequency(&self) -> Result<f64> {
        match track!(self.maybe_one::<SamplingFrequency>())? {
            Some(e) => track!(e.read_float()),
            None => Ok(8000.0),
        }
    }

    /// Returns the number of channels, one if absent.
    pub fn channels(&self) -> Result<u64> {
        match track!(self.maybe_one::<Channels>())? {
            Some(e) => track!(e.read_uint()),
            None => Ok(1),
        }
    }

    /// Returns the bits per sample.
    pub fn bit_depth(&self) -> Result<Option<u64>> {
        match track!(self.maybe_one::<BitDepth>())? {
            Some(e) => Ok(Some(track!(e.read_uint())?)),
            None => Ok(None),
        }
    }
}
