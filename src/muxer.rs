//! Remuxing of a Matroska video track (and optionally an audio track) into fragmented MP4.
//!
//! Every Cluster becomes one media segment (`moof` + `mdat`).
use std::sync::{Arc, OnceLock};
use trackable::error::ErrorKindExt;

use crate::aac::AudioSpecificConfig;
use crate::avc::AvcDecoderConfigurationRecord;
use crate::ebml::StreamOptions;
use crate::fmp4::{
    AudioSampleEntry, BoxHeader, BoxType, Brand, CodecConfigurationBox, FileTypeBox,
    InitializationSegment, MediaDataBox, MediaSegment, MovieBox, Mpeg4EsDescriptorBox,
    SampleFlags, SampleFormat, TrackBox, TrackFragmentBox, TrunEntry, VisualSampleEntry,
    WriteBoxTo,
};
use crate::hevc::HevcDecoderConfigurationRecord;
use crate::matroska::{
    Cluster, DecodePipeline, MatroskaFile, SeekClusters, Segment, TrackEntry, TrackKind,
};
use crate::source::ByteRange;
use crate::{Error, ErrorKind, Result};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Options of `Muxer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MuxerOptions {
    /// Options of the underlying EBML streams.
    pub stream: StreamOptions,
}

/// An entry of the seek index: a cue of the video track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekPoint {
    /// Time in seconds.
    pub time: f64,

    /// Position of the cluster, relative to the Segment data.
    pub cluster_position: u64,
}

#[derive(Debug, Clone)]
struct SelectedTrack {
    track_number: u64,
    track_id: u32,
    pipeline: DecodePipeline,

    // Spacing of laced frames in timestamp ticks.
    frame_duration: Option<u64>,
}

#[derive(Debug)]
struct MuxerState {
    segment: Segment,
    mime_type: String,
    duration: f64,
    initialization_segment: Vec<u8>,
    segment_end: u64,
    tracks: Vec<SelectedTrack>,
    seeks: Vec<SeekPoint>,
}

/// Matroska to fragmented MP4 remuxer.
///
/// Initialization runs once on first use; later calls (from any thread) share its result, errors included.
#[derive(Debug)]
pub struct Muxer {
    file: MatroskaFile,
    state: OnceLock<Result<Arc<MuxerState>>>,
}
impl Muxer {
    /// Makes a new `Muxer` with the default options.
    pub fn new(range: ByteRange) -> Self {
        Self::with_options(range, MuxerOptions::default())
    }

    /// Makes a new `Muxer` with the given options.
    pub fn with_options(range: ByteRange, options: MuxerOptions) -> Self {
        Muxer {
            file: MatroskaFile::with_options(range, options.stream),
            state: OnceLock::new(),
        }
    }

    /// Parses the headers and selects the tracks.
    ///
    /// Calling this is optional; every other method initializes the muxer on demand.
    pub fn init(&self) -> Result<()> {
        track!(self.state())?;
        Ok(())
    }

    /// Returns the MIME type of the output (e.g., `video/mp4; codecs="avc1.64001F, mp4a.40.2"`).
    pub fn mime_type(&self) -> Result<String> {
        Ok(track!(self.state())?.mime_type.clone())
    }

    /// Returns the duration of the Segment in seconds (`0.0` if unknown).
    pub fn duration(&self) -> Result<f64> {
        Ok(track!(self.state())?.duration)
    }

    /// Returns the initialization segment (`ftyp` + `moov`).
    pub fn initialization_segment(&self) -> Result<Vec<u8>> {
        Ok(track!(self.state())?.initialization_segment.clone())
    }

    /// Returns the seek index, sorted by time.
    pub fn seek_points(&self) -> Result<Vec<SeekPoint>> {
        Ok(track!(self.state())?.seeks.clone())
    }

    /// Returns the media segments starting at the last seek point at or before `seconds`.
    pub fn stream_from(&self, seconds: f64) -> Result<Fragments> {
        let state = track!(self.state())?;
        let index = state
            .seeks
            .partition_point(|s| s.time <= seconds)
            .saturating_sub(1);
        let seek = state.seeks[index];
        tracing::debug!(
            "Seeking to {}s: cue #{} at {}s (cluster position {})",
            seconds,
            index,
            seek.time,
            seek.cluster_position
        );

        let clusters = track!(state.segment.seek_clusters(seek.cluster_position))?;
        let last_decode_end = vec![None; state.tracks.len()];
        Ok(Fragments {
            state,
            clusters,
            pending: None,
            exhausted: false,
            sequence_number: index as u32 + 1,
            last_decode_end,
            done: false,
        })
    }

    fn state(&self) -> Result<Arc<MuxerState>> {
        match self.state.get_or_init(|| self.load().map(Arc::new)) {
            Ok(state) => Ok(Arc::clone(state)),
            Err(e) => Err(track!(e.clone())),
        }
    }

    fn load(&self) -> Result<MuxerState> {
        let segment = track!(self.file.segment())?;
        let cues = track!(segment.cues(true))?;
        let cues = track_assert_some!(
            cues,
            ErrorKind::ElementNotFound,
            "No Cues referenced by a SeekHead"
        );

        let info = track!(segment.info())?;
        let timestamp_scale = track!(info.timestamp_scale())?;
        track_assert_ne!(timestamp_scale, 0, ErrorKind::InvalidInput);
        let timescale = (NANOS_PER_SEC / timestamp_scale as f64).round();
        track_assert!(
            timescale >= 1.0 && timescale <= f64::from(u32::MAX),
            ErrorKind::Unsupported,
            "TimestampScale {} has no MP4 timescale",
            timestamp_scale
        );
        let timescale = timescale as u32;
        let segment_end = track!(info.duration())?
            .filter(|d| d.is_finite())
            .unwrap_or(0.0)
            .max(0.0)
            .round() as u64;
        let duration = segment_end as f64 * timestamp_scale as f64 / NANOS_PER_SEC;

        let mut video = None;
        let mut audio = None;
        for entry in track!(track!(segment.tracks())?.entries())? {
            let entry = track!(entry)?;
            let kind = track!(entry.track_kind())?;
            let result = match kind {
                TrackKind::Video if video.is_none() => {
                    describe_video(&entry, timestamp_scale).map(|v| video = Some(v))
                }
                TrackKind::Audio if audio.is_none() => {
                    describe_audio(&entry, timestamp_scale).map(|a| audio = Some(a))
                }
                _ => Ok(()),
            };
            if let Err(e) = result {
                if !is_recoverable(&e) {
                    return Err(track!(e));
                }
                tracing::warn!("Skipping {:?} track: {}", kind, e);
            }
        }
        let Some((video_track, video_entry, video_codec)) = video else {
            track_panic!(ErrorKind::NoSuitableVideoTrack);
        };

        let mut ftyp_box = FileTypeBox::default();
        if video_entry.format.0 == *b"avc1" {
            ftyp_box.compatible_brands.push(Brand(*b"avc1"));
        }
        let mut moov_box = MovieBox::new(timescale, segment_end);
        let mut tracks = Vec::new();
        let mut codecs = vec![video_codec];

        let track_id = tracks.len() as u32 + 1;
        moov_box.push_track(track!(TrackBox::video(
            track_id,
            timescale,
            segment_end,
            &video_entry
        ))?);
        tracks.push(SelectedTrack {
            track_id,
            ..video_track
        });
        if let Some((audio_track, audio_entry, audio_codec)) = audio {
            let track_id = tracks.len() as u32 + 1;
            moov_box.push_track(track!(TrackBox::audio(
                track_id,
                timescale,
                segment_end,
                &audio_entry
            ))?);
            tracks.push(SelectedTrack {
                track_id,
                ..audio_track
            });
            codecs.push(audio_codec);
        }
        let initialization_segment = track!(InitializationSegment { ftyp_box, moov_box }.to_bytes())?;

        let video_number = tracks[0].track_number;
        let mut seeks = Vec::new();
        for point in track!(cues.points())? {
            let point = track!(point)?;
            let time = track!(point.time())? as f64 * timestamp_scale as f64 / NANOS_PER_SEC;
            for positions in track!(point.track_positions())? {
                let positions = track!(positions)?;
                if track!(positions.track())? == video_number {
                    seeks.push(SeekPoint {
                        time,
                        cluster_position: track!(positions.cluster_position())?,
                    });
                }
            }
        }
        if seeks.is_empty() {
            tracing::warn!("No cue points at the video track; seeking is disabled");
            let position = track!(segment.first_cluster_position())?;
            let position = track_assert_some!(position, ErrorKind::ElementNotFound, "No Cluster");
            seeks.push(SeekPoint {
                time: 0.0,
                cluster_position: position,
            });
        }
        seeks.sort_by(|a, b| a.time.total_cmp(&b.time));

        let mime_type = format!("video/mp4; codecs=\"{}\"", codecs.join(", "));
        tracing::info!(
            "Muxer initialized: mime_type={:?}, duration={}s, tracks={}, seek_points={}",
            mime_type,
            duration,
            tracks.len(),
            seeks.len()
        );
        Ok(MuxerState {
            segment,
            mime_type,
            duration,
            initialization_segment,
            segment_end,
            tracks,
            seeks,
        })
    }
}

fn is_recoverable(e: &Error) -> bool {
    matches!(
        *e.kind(),
        ErrorKind::UnsupportedCodec | ErrorKind::UnsupportedEncoding | ErrorKind::ElementNotFound
    )
}

fn unsupported_codec(e: Error) -> Error {
    Error::from(ErrorKind::UnsupportedCodec.takes_over(e))
}

fn frame_duration(entry: &TrackEntry, timestamp_scale: u64) -> Result<Option<u64>> {
    let duration = track!(entry.default_duration())?;
    Ok(duration.map(|d| d / timestamp_scale).filter(|&d| d > 0))
}

fn describe_video(
    entry: &TrackEntry,
    timestamp_scale: u64,
) -> Result<(SelectedTrack, VisualSampleEntry, String)> {
    let codec_id = track!(entry.codec_id())?;
    let is_avc = match codec_id.as_str() {
        "V_MPEG4/ISO/AVC" => true,
        "V_MPEGH/ISO/HEVC" => false,
        _ => track_panic!(ErrorKind::UnsupportedCodec, "Video codec {:?}", codec_id),
    };
    let pipeline = track!(entry.decode_pipeline())?;
    let private = track!(entry.codec_private())?;
    let private = track_assert_some!(private, ErrorKind::UnsupportedCodec, "No CodecPrivate");

    let (format, config, codec) = if is_avc {
        let record = track!(AvcDecoderConfigurationRecord::read_from(&private[..]))
            .map_err(unsupported_codec)?;
        (*b"avc1", *b"avcC", record.codec_string())
    } else {
        let record =
            track!(HevcDecoderConfigurationRecord::read_from(&private)).map_err(unsupported_codec)?;
        (*b"hvc1", *b"hvcC", record.codec_string("hvc1"))
    };

    let settings = track!(entry.video())?;
    let settings = track_assert_some!(settings, ErrorKind::ElementNotFound, "No Video settings");
    let width = track!(settings.pixel_width())?;
    let height = track!(settings.pixel_height())?;
    track_assert!(
        width <= 0xFFFF && height <= 0xFFFF,
        ErrorKind::UnsupportedCodec,
        "Too large picture: {}x{}",
        width,
        height
    );

    let track = SelectedTrack {
        track_number: track!(entry.track_number())?,
        track_id: 0,
        pipeline,
        frame_duration: track!(frame_duration(entry, timestamp_scale))?,
    };
    let sample_entry = VisualSampleEntry {
        format: SampleFormat(format),
        width: width as u16,
        height: height as u16,
        config_box: CodecConfigurationBox {
            kind: BoxType(config),
            data: private,
        },
    };
    Ok((track, sample_entry, codec))
}

fn describe_audio(
    entry: &TrackEntry,
    timestamp_scale: u64,
) -> Result<(SelectedTrack, AudioSampleEntry, String)> {
    let codec_id = track!(entry.codec_id())?;
    track_assert!(
        codec_id == "A_AAC" || codec_id.starts_with("A_AAC/"),
        ErrorKind::UnsupportedCodec,
        "Audio codec {:?}",
        codec_id
    );
    let pipeline = track!(entry.decode_pipeline())?;

    let (sampling_frequency, channels, bit_depth) = match track!(entry.audio())? {
        Some(a) => (
            track!(a.sampling_frequency())?,
            track!(a.channels())?,
            track!(a.bit_depth())?,
        ),
        None => (8000.0, 1, None),
    };
    let (config, asc) = match track!(entry.codec_private())? {
        Some(private) => {
            let asc = track!(AudioSpecificConfig::read_from(&private)).map_err(unsupported_codec)?;
            (private, asc)
        }
        None => {
            let asc = AudioSpecificConfig::from_codec_id(
                &codec_id,
                sampling_frequency.round() as u32,
                channels.min(u64::from(u8::MAX)) as u8,
            );
            let asc = track_assert_some!(
                asc,
                ErrorKind::UnsupportedCodec,
                "No AudioSpecificConfig for {:?}",
                codec_id
            );
            (asc.to_bytes(), asc)
        }
    };
    let channels = match asc.channel_configuration {
        0 => channels.min(0xFFFF) as u16,
        7 => 8,
        n => u16::from(n),
    };

    let track = SelectedTrack {
        track_number: track!(entry.track_number())?,
        track_id: 0,
        pipeline,
        frame_duration: track!(frame_duration(entry, timestamp_scale))?,
    };
    let sample_entry = AudioSampleEntry {
        channels,
        sample_size: bit_depth.unwrap_or(16).min(0xFFFF) as u16,
        sample_rate: asc.sampling_frequency,
        esds_box: Mpeg4EsDescriptorBox::new(config),
    };
    Ok((track, sample_entry, asc.codec_string()))
}

#[derive(Debug)]
struct Sample {
    pts: i64,
    keyframe: bool,
    data: Vec<u8>,
}

/// Lazy sequence of media segments, one per Cluster.
///
/// The first error ends the sequence.
#[derive(Debug)]
pub struct Fragments {
    state: Arc<MuxerState>,
    clusters: SeekClusters,
    pending: Option<Cluster>,
    exhausted: bool,
    sequence_number: u32,
    last_decode_end: Vec<Option<i64>>,
    done: bool,
}
impl Fragments {
    fn next_cluster(&mut self) -> Result<Option<Cluster>> {
        match self.clusters.next() {
            None => Ok(None),
            Some(result) => Ok(Some(track!(result)?.1)),
        }
    }

    fn next_fragment(&mut self) -> Result<Option<MediaSegment>> {
        loop {
            let current = match self.pending.take() {
                Some(cluster) => cluster,
                None if self.exhausted => return Ok(None),
                None => match track!(self.next_cluster())? {
                    Some(cluster) => cluster,
                    None => return Ok(None),
                },
            };
            self.pending = track!(self.next_cluster())?;
            self.exhausted = self.pending.is_none();

            let cluster_start = track!(current.timestamp())? as i64;
            let cluster_end = match self.pending {
                Some(ref next) => track!(next.timestamp())? as i64,
                None => i64::try_from(self.state.segment_end).unwrap_or(i64::MAX),
            };
            if let Some(segment) = track!(self.build(&current, cluster_start, cluster_end))? {
                self.sequence_number += 1;
                return Ok(Some(segment));
            }
        }
    }

    fn build(
        &mut self,
        cluster: &Cluster,
        cluster_start: i64,
        cluster_end: i64,
    ) -> Result<Option<MediaSegment>> {
        let tracks = &self.state.tracks;
        let mut samples: Vec<Vec<Sample>> = tracks.iter().map(|_| Vec::new()).collect();
        for block in track!(cluster.blocks())? {
            let block = track!(block)?;
            let Some(i) = tracks
                .iter()
                .position(|t| t.track_number == block.track_number())
            else {
                continue;
            };
            let base = cluster_start + i64::from(block.timestamp());
            let spacing = tracks[i].frame_duration.unwrap_or(0) as i64;
            for (j, frame) in block.frames().enumerate() {
                let data = track!(tracks[i].pipeline.decode_frame(frame.to_vec()))?;
                samples[i].push(Sample {
                    pts: base + j as i64 * spacing,
                    keyframe: block.is_keyframe(),
                    data,
                });
            }
        }
        if samples.iter().all(Vec::is_empty) {
            tracing::debug!("Skipping cluster at {} without samples", cluster_start);
            return Ok(None);
        }

        let mut segment = MediaSegment::new(self.sequence_number);
        let mut mdat = MediaDataBox::default();
        let mut data_sizes = Vec::new();
        let mut sample_count = 0;
        for (i, track_samples) in samples.into_iter().enumerate() {
            if track_samples.is_empty() {
                continue;
            }
            let track = &tracks[i];

            let mut dtses = Vec::with_capacity(track_samples.len());
            let mut floor = self.last_decode_end[i].unwrap_or(0);
            for s in &track_samples {
                let dts = s.pts.max(floor);
                dtses.push(dts);
                floor = dts;
            }
            let last_dts = floor;
            let mut last_duration = (cluster_end - last_dts).max(0);
            if last_duration == 0 && self.pending.is_none() {
                last_duration = track.frame_duration.unwrap_or(0) as i64;
            }
            let decode_end = last_dts + last_duration;
            self.last_decode_end[i] = Some(decode_end);

            let expected = cluster_end - cluster_start;
            if self.pending.is_some() && decode_end - dtses[0] != expected {
                tracing::warn!(
                    "Duration mismatch on track {}: samples span {} ticks, cluster spans {}",
                    track.track_number,
                    decode_end - dtses[0],
                    expected
                );
            }

            let mut traf = TrackFragmentBox::new(track.track_id);
            traf.tfdt_box.base_media_decode_time = dtses[0] as u64;
            traf.trun_box.data_offset = Some(0);
            let mut data_size = 0;
            for (k, s) in track_samples.into_iter().enumerate() {
                let next_dts = dtses.get(k + 1).copied().unwrap_or(decode_end);
                let duration = next_dts - dtses[k];
                track_assert!(duration <= i64::from(u32::MAX), ErrorKind::Unsupported);
                let offset = s.pts - dtses[k];
                track_assert!(offset >= i64::from(i32::MIN), ErrorKind::Unsupported);
                let flags = if s.keyframe {
                    SampleFlags::keyframe()
                } else {
                    SampleFlags::delta_frame()
                };
                traf.trun_box.entries.push(TrunEntry {
                    sample_duration: Some(duration as u32),
                    sample_size: Some(s.data.len() as u32),
                    sample_flags: Some(flags.to_u32()),
                    sample_composition_time_offset: Some(offset as i32),
                });
                data_size += s.data.len() as u64;
                mdat.chunks.push(s.data);
                sample_count += 1;
            }
            segment.moof_box.traf_boxes.push(traf);
            data_sizes.push(data_size);
        }

        // The data offsets point past the moof, so it is sized once before they are filled in.
        let moof_size = track!(segment.moof_box.box_size())?;
        let mut offset = u64::from(moof_size) + u64::from(BoxHeader::SIZE);
        for (traf, size) in segment.moof_box.traf_boxes.iter_mut().zip(data_sizes) {
            track_assert!(offset <= i32::MAX as u64, ErrorKind::Unsupported);
            traf.trun_box.data_offset = Some(offset as i32);
            offset += size;
        }
        segment.mdat_boxes.push(mdat);

        tracing::debug!(
            "Emitting fragment #{}: {} samples from cluster at {}",
            self.sequence_number,
            sample_count,
            cluster_start
        );
        Ok(Some(segment))
    }
}
impl Iterator for Fragments {
    type Item = Result<MediaSegment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_fragment() {
            Ok(Some(segment)) => Some(Ok(segment)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(track!(e)))
            }
        }
    }
}
