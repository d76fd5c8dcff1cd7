//! Segment information.
use crate::ebml::define_elements;
use crate::Result;

/// Default `TimestampScale` (one millisecond).
pub const DEFAULT_TIMESTAMP_SCALE: u64 = 1_000_000;

define_elements! {
    /// General information about the Segment.
    Info(INFO, multiple) = 0x1549_A966, Some(1), Master [
        SEGMENT_UUID, SEGMENT_FILENAME, PREV_UUID, NEXT_UUID, TIMESTAMP_SCALE,
        DURATION, DATE_UTC, TITLE, MUXING_APP, WRITING_APP,
    ];
    /// Unique id of the Segment.
    SegmentUUID(SEGMENT_UUID) = 0x73A4, Some(2), Bytes;
    /// File name of the Segment.
    SegmentFilename(SEGMENT_FILENAME) = 0x7384, Some(2), Utf8;
    /// Id of the previous Segment.
    PrevUUID(PREV_UUID) = 0x3C_B923, Some(2), Bytes;
    /// Id of the next Segment.
    NextUUID(NEXT_UUID) = 0x3E_B923, Some(2), Bytes;
    /// Nanoseconds per timestamp tick.
    TimestampScale(TIMESTAMP_SCALE) = 0x2A_D7B1, Some(2), Uint;
    /// Duration of the Segment in timestamp ticks.
    Duration(DURATION) = 0x4489, Some(2), Float;
    /// Production date.
    DateUTC(DATE_UTC) = 0x4461, Some(2), Date;
    /// Title.
    Title(TITLE) = 0x7BA9, Some(2), Utf8;
    /// Muxing library.
    MuxingApp(MUXING_APP) = 0x4D80, Some(2), Utf8;
    /// Writing application.
    WritingApp(WRITING_APP) = 0x5741, Some(2), Utf8;
}

impl Info {
    /// Returns the nanoseconds per timestamp tick.
    pub fn timestamp_scale(&self) -> Result<u64> {
        match track!(self.maybe_one::<TimestampScale>())? {
            Some(scale) => track!(scale.read_uint()),
            None => Ok(DEFAULT_TIMESTAMP_SCALE),
        }
    }

    /// Returns the duration in timestamp ticks.
    pub fn duration(&self) -> Result<Option<f64>> {
        match track!(self.maybe_one::<Duration>())? {
            Some(d) => Ok(Some(track!(d.read_float())?)),
            None => Ok(None),
        }
    }

    /// Returns the duration in seconds.
    pub fn duration_secs(&self) -> Result<Option<f64>> {
        let scale = track!(self.timestamp_scale())? as f64;
        Ok(track!(self.duration())?.map(|d| d * scale / 1e9))
    }

    /// Returns the title.
    pub fn title(&self) -> Result<Option<String>> {
        match track!(self.maybe_one::<Title>())? {
            Some(t) => Ok(Some(track!(t.read_utf8())?)),
            None => Ok(None),
        }
    }

    /// Returns the muxing library.
    pub fn muxing_app(&self) -> Result<Option<String>> {
        match track!(self.maybe_one::<MuxingApp>())? {
            Some(t) => Ok(Some(track!(t.read_utf8())?)),
            None => Ok(None),
        }
    }

    /// Returns the writing application.
    pub fn writing_app(&self) -> Result<Option<String>> {
        match track!(self.maybe_one::<WritingApp>())? {
            Some(t) => Ok(Some(track!(t.read_utf8())?)),
            None => Ok(None),
        }
    }
}
