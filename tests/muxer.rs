#[macro_use]
extern crate trackable;

use mkv_fmp4::ebml::XmlOptions;
use mkv_fmp4::fmp4::{MovieFragmentHeaderBox, TrackFragmentBaseMediaDecodeTimeBox, TrackRunBox};
use mkv_fmp4::isobmff::read_boxes;
use mkv_fmp4::matroska::{MatroskaFile, TopLevelElement};
use mkv_fmp4::muxer::Muxer;
use mkv_fmp4::source::ByteRange;
use mkv_fmp4::{ErrorKind, Result};

mod common;

use crate::common::{
    block_group, concat, el, simple_block, uint, xiph_laced_block, Fixture, AAC_CONFIG, AVC_CONFIG,
};

struct Fragment {
    sequence_number: u32,
    base_media_decode_time: u64,
    trun: TrackRunBox,
    moof_size: usize,
    mdat: Vec<u8>,
}

fn fragments(muxer: &Muxer, seconds: f64) -> Vec<Fragment> {
    let segments: Result<Vec<_>> = track_try_unwrap!(muxer.stream_from(seconds)).collect();
    track_try_unwrap!(segments)
        .into_iter()
        .map(|segment| {
            let bytes = track_try_unwrap!(segment.into_bytes());
            let boxes = track_try_unwrap!(read_boxes(&bytes));
            assert_eq!(boxes.len(), 2);
            let (moof, mdat) = (boxes[0], boxes[1]);
            assert_eq!(&moof.kind.0, b"moof");
            assert_eq!(&mdat.kind.0, b"mdat");

            let mfhd = track_try_unwrap!(moof.child(b"mfhd"));
            let tfdt = track_try_unwrap!(moof.descend(&[b"traf", b"tfdt"]));
            let trun = track_try_unwrap!(moof.descend(&[b"traf", b"trun"]));
            Fragment {
                sequence_number: track_try_unwrap!(MovieFragmentHeaderBox::read_box(&mfhd))
                    .sequence_number,
                base_media_decode_time: track_try_unwrap!(
                    TrackFragmentBaseMediaDecodeTimeBox::read_box(&tfdt)
                )
                .base_media_decode_time,
                trun: track_try_unwrap!(TrackRunBox::read_box(&trun)),
                moof_size: moof.size,
                mdat: mdat.data.to_vec(),
            }
        })
        .collect()
}

#[test]
fn one_fragment_per_cluster() {
    let muxer = Fixture::new().muxer();
    assert_eq!(
        track_try_unwrap!(muxer.mime_type()),
        "video/mp4; codecs=\"avc1.64001F\""
    );
    assert_eq!(track_try_unwrap!(muxer.duration()), 3.0);

    let fragments = fragments(&muxer, 0.0);
    assert_eq!(fragments.len(), 3);
    let times: Vec<_> = fragments.iter().map(|f| f.base_media_decode_time).collect();
    assert_eq!(times, [0, 1000, 2500]);
    let seqs: Vec<_> = fragments.iter().map(|f| f.sequence_number).collect();
    assert_eq!(seqs, [1, 2, 3]);

    let durations: Vec<_> = fragments
        .iter()
        .map(|f| f.trun.entries[0].sample_duration)
        .collect();
    assert_eq!(durations, [Some(1000), Some(1500), Some(500)]);

    for (f, frame) in fragments.iter().zip([&b"first"[..], &b"second"[..], &b"third"[..]]) {
        assert_eq!(f.trun.entries.len(), 1);
        assert_eq!(f.trun.entries[0].sample_size, Some(frame.len() as u32));
        assert_eq!(f.trun.entries[0].sample_flags, Some(0x0200_0000));
        assert_eq!(f.trun.data_offset, Some(f.moof_size as i32 + 8));
        assert_eq!(f.mdat, frame);
    }
}

#[test]
fn seeking_starts_at_the_preceding_cue() {
    let muxer = Fixture::new().muxer();
    let points = track_try_unwrap!(muxer.seek_points());
    let times: Vec<_> = points.iter().map(|p| p.time).collect();
    assert_eq!(times, [0.0, 1.0, 2.5]);

    let fragments = fragments(&muxer, 1.2);
    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments[0].base_media_decode_time, 1000);
    assert_eq!(fragments[0].sequence_number, 2);

    assert_eq!(self::fragments(&muxer, 10.0).len(), 1);
    assert_eq!(self::fragments(&muxer, -1.0).len(), 3);
}

#[test]
fn decode_times_stay_monotonic() {
    let mut fixture = Fixture::new();
    fixture.clusters = vec![(
        0,
        vec![
            simple_block(1, 0, true, b"I"),
            simple_block(1, 80, false, b"P"),
            simple_block(1, 40, false, b"B"),
        ],
    )];
    fixture.duration = 120.0;
    let fragments = fragments(&fixture.muxer(), 0.0);
    assert_eq!(fragments.len(), 1);

    let entries = &fragments[0].trun.entries;
    let durations: Vec<_> = entries.iter().map(|e| e.sample_duration).collect();
    assert_eq!(durations, [Some(80), Some(0), Some(40)]);
    let offsets: Vec<_> = entries
        .iter()
        .map(|e| e.sample_composition_time_offset)
        .collect();
    assert_eq!(offsets, [Some(0), Some(0), Some(-40)]);
    assert_eq!(entries[1].sample_flags, Some(0x0101_0000));
}

#[test]
fn initialization_segment_layout() {
    let muxer = Fixture::new().muxer();
    let init = track_try_unwrap!(muxer.initialization_segment());
    let boxes = track_try_unwrap!(read_boxes(&init));
    let kinds: Vec<_> = boxes.iter().map(|b| b.kind.0).collect();
    assert_eq!(kinds, [*b"ftyp", *b"moov"]);
    assert_eq!(&boxes[0].data[..4], b"isom");
    assert!(boxes[0].data.windows(4).any(|w| w == b"avc1"));

    let moov = boxes[1];
    let tkhd = track_try_unwrap!(moov.descend(&[b"trak", b"tkhd"]));
    let (header, data) = track_try_unwrap!(tkhd.full_box());
    assert_eq!(header.version, 1);
    assert_eq!(&data[16..20], &[0, 0, 0, 1]);

    let trex = track_try_unwrap!(moov.descend(&[b"mvex", b"trex"]));
    let (_, data) = track_try_unwrap!(trex.full_box());
    assert_eq!(&data[..8], &[0, 0, 0, 1, 0, 0, 0, 1]);

    let mdhd = track_try_unwrap!(moov.descend(&[b"trak", b"mdia", b"mdhd"]));
    let (_, data) = track_try_unwrap!(mdhd.full_box());
    assert_eq!(&data[16..20], &1000u32.to_be_bytes());

    let stsd = track_try_unwrap!(moov.descend(&[b"trak", b"mdia", b"minf", b"stbl", b"stsd"]));
    let (_, entries) = track_try_unwrap!(stsd.full_box());
    let entries = track_try_unwrap!(read_boxes(&entries[4..]));
    assert_eq!(&entries[0].kind.0, b"avc1");
    let config = track_try_unwrap!(read_boxes(&entries[0].data[78..]));
    assert_eq!(&config[0].kind.0, b"avcC");
    assert_eq!(config[0].data, &AVC_CONFIG[..]);
}

#[test]
fn unknown_video_codec_is_not_muxable() {
    let mut fixture = Fixture::new();
    fixture.codec_id = "V_UNKNOWN";
    let muxer = fixture.muxer();
    let e = muxer.init().err().map(|e| *e.kind());
    assert_eq!(e, Some(ErrorKind::NoSuitableVideoTrack));

    // The failure is remembered.
    let e = muxer.mime_type().err().map(|e| *e.kind());
    assert_eq!(e, Some(ErrorKind::NoSuitableVideoTrack));
}

#[test]
fn zlib_encoding_fails_closed() {
    let mut fixture = Fixture::new();
    let compression = el(0x5034, &uint(0x4254, 0));
    fixture.encodings = Some(el(0x6D80, &el(0x6240, &compression)));

    let segment = track_try_unwrap!(fixture.file().segment());
    let tracks = track_try_unwrap!(segment.tracks());
    let entry = track_try_unwrap!(track_try_unwrap!(tracks.entries())
        .next()
        .expect("a track entry"));
    let encodings = track_try_unwrap!(entry.content_encodings()).expect("ContentEncodings");
    let encoding = track_try_unwrap!(encodings.encodings()).remove(0);
    let e = encoding.decode(b"data".to_vec()).err().map(|e| *e.kind());
    assert_eq!(e, Some(ErrorKind::UnsupportedEncoding));

    let e = fixture.muxer().init().err().map(|e| *e.kind());
    assert_eq!(e, Some(ErrorKind::NoSuitableVideoTrack));
}

#[test]
fn header_stripping_is_undone() {
    let mut fixture = Fixture::new();
    let compression = el(
        0x5034,
        &concat(&[uint(0x4254, 3), el(0x4255, &[0x00, 0x00, 0x00])]),
    );
    fixture.encodings = Some(el(0x6D80, &el(0x6240, &compression)));
    fixture.clusters = vec![(0, vec![simple_block(1, 0, true, b"\x05abc")])];

    let fragments = fragments(&fixture.muxer(), 0.0);
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].mdat, b"\x00\x00\x00\x05abc");
    assert_eq!(fragments[0].trun.entries[0].sample_size, Some(7));
}

#[test]
fn fast_and_slow_cue_lookups_agree() {
    let file = Fixture::new().file();
    let segment = track_try_unwrap!(file.segment());
    let fast = track_try_unwrap!(segment.cues(true)).expect("cues via SeekHead");
    let slow = track_try_unwrap!(segment.cues(false)).expect("cues");
    assert_eq!(fast.position(), slow.position());
    assert_eq!(track_try_unwrap!(fast.read()), track_try_unwrap!(slow.read()));

    let mut fixture = Fixture::new();
    fixture.seek_head = false;
    fixture.cues_first = true;
    let segment = track_try_unwrap!(fixture.file().segment());
    assert!(track_try_unwrap!(segment.cues(true)).is_none());
    assert!(track_try_unwrap!(segment.cues(false)).is_some());

    // Without a SeekHead the muxer refuses to scan for the Cues.
    let e = fixture.muxer().init().err().map(|e| *e.kind());
    assert_eq!(e, Some(ErrorKind::ElementNotFound));
}

#[test]
fn resolve_checks_the_level() {
    let fixture = Fixture::new();
    let (bytes, tracks_position, cluster_positions) = fixture.build();
    let segment = track_try_unwrap!(MatroskaFile::new(ByteRange::from_vec(bytes)).segment());

    let tracks = track_try_unwrap!(segment.resolve(tracks_position));
    assert!(matches!(tracks, TopLevelElement::Tracks(_)));
    let cluster = track_try_unwrap!(segment.resolve(cluster_positions[1]));
    assert_eq!(cluster.name(), "Cluster");

    // The TrackEntry sits right after the 12-byte Tracks header.
    let e = segment.resolve(tracks_position + 12).err().map(|e| *e.kind());
    assert_eq!(e, Some(ErrorKind::SchemaViolation));
}

#[test]
fn xml_dump() {
    let file = Fixture::new().file();
    let xml = track_try_unwrap!(file.to_xml(&XmlOptions::default()));
    assert!(xml.starts_with("<EBMLHead>\n  <EBMLVersion>1</EBMLVersion>\n  <DocType>matroska</DocType>\n</EBMLHead>"));
    assert!(xml.contains("    <TrackEntry>"));
    assert!(xml.contains("<TrackType>video</TrackType>"));
    assert!(xml.contains("<CodecID>V_MPEG4/ISO/AVC</CodecID>"));
    assert!(xml.contains("<SeekID>0x1C53BB6B</SeekID>"));
    assert!(xml.contains("<SimpleBlock size=\"18\" dataSize=\"9\" />"));
    assert!(xml.ends_with("</Segment>"));

    let options = XmlOptions {
        max_depth: Some(1),
        ..XmlOptions::default()
    };
    let xml = track_try_unwrap!(file.to_xml(&options));
    assert!(xml.contains("\n  <Cues size=\""));
    assert!(!xml.contains("TrackEntry"));
}

struct TrackFragment {
    track_id: u32,
    base_media_decode_time: u64,
    trun: TrackRunBox,
}

fn track_fragments(bytes: &[u8]) -> Vec<TrackFragment> {
    let boxes = track_try_unwrap!(read_boxes(bytes));
    let trafs = track_try_unwrap!(boxes[0].children_of(b"traf"));
    trafs
        .iter()
        .map(|traf| {
            let tfhd = track_try_unwrap!(traf.child(b"tfhd"));
            let (_, data) = track_try_unwrap!(tfhd.full_box());
            let tfdt = track_try_unwrap!(traf.child(b"tfdt"));
            let trun = track_try_unwrap!(traf.child(b"trun"));
            TrackFragment {
                track_id: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
                base_media_decode_time: track_try_unwrap!(
                    TrackFragmentBaseMediaDecodeTimeBox::read_box(&tfdt)
                )
                .base_media_decode_time,
                trun: track_try_unwrap!(TrackRunBox::read_box(&trun)),
            }
        })
        .collect()
}

fn audio_video_fixture() -> Fixture {
    let mut fixture = Fixture::new();
    fixture.audio = true;
    fixture.clusters = vec![(
        0,
        vec![
            simple_block(1, 0, true, b"VVVV"),
            simple_block(2, 0, true, b"aa"),
            simple_block(2, 20, true, b"bb"),
            simple_block(1, 40, false, b"WW"),
        ],
    )];
    fixture.duration = 80.0;
    fixture
}

#[test]
fn audio_and_video_share_a_fragment() {
    let muxer = audio_video_fixture().muxer();
    assert_eq!(
        track_try_unwrap!(muxer.mime_type()),
        "video/mp4; codecs=\"avc1.64001F, mp4a.40.2\""
    );

    let segments: Result<Vec<_>> = track_try_unwrap!(muxer.stream_from(0.0)).collect();
    let mut segments = track_try_unwrap!(segments);
    assert_eq!(segments.len(), 1);
    let bytes = track_try_unwrap!(segments.remove(0).into_bytes());

    let boxes = track_try_unwrap!(read_boxes(&bytes));
    let (moof, mdat) = (boxes[0], boxes[1]);
    assert_eq!(mdat.data, b"VVVVWWaabb");

    let trafs = track_fragments(&bytes);
    let ids: Vec<_> = trafs.iter().map(|t| t.track_id).collect();
    assert_eq!(ids, [1, 2]);
    assert_eq!(trafs[0].trun.data_offset, Some(moof.size as i32 + 8));
    assert_eq!(trafs[1].trun.data_offset, Some(moof.size as i32 + 8 + 6));
    for (traf, data) in trafs.iter().zip([&b"VVVVWW"[..], &b"aabb"[..]]) {
        let offset = traf.trun.data_offset.expect("data offset") as usize;
        assert_eq!(&bytes[offset..offset + data.len()], data);
        assert_eq!(traf.base_media_decode_time, 0);
    }

    let durations = |t: &TrackFragment| -> Vec<_> {
        t.trun.entries.iter().map(|e| e.sample_duration).collect()
    };
    assert_eq!(durations(&trafs[0]), [Some(40), Some(40)]);
    assert_eq!(durations(&trafs[1]), [Some(20), Some(60)]);
}

#[test]
fn audio_track_in_initialization_segment() {
    let muxer = audio_video_fixture().muxer();
    let init = track_try_unwrap!(muxer.initialization_segment());
    let boxes = track_try_unwrap!(read_boxes(&init));
    let moov = boxes[1];

    let traks = track_try_unwrap!(moov.children_of(b"trak"));
    assert_eq!(traks.len(), 2);
    let audio = traks[1];

    let tkhd = track_try_unwrap!(audio.child(b"tkhd"));
    let (_, data) = track_try_unwrap!(tkhd.full_box());
    assert_eq!(&data[16..20], &[0, 0, 0, 2]);

    let hdlr = track_try_unwrap!(audio.descend(&[b"mdia", b"hdlr"]));
    let (_, data) = track_try_unwrap!(hdlr.full_box());
    assert_eq!(&data[4..8], b"soun");

    let stsd = track_try_unwrap!(audio.descend(&[b"mdia", b"minf", b"stbl", b"stsd"]));
    let (_, entries) = track_try_unwrap!(stsd.full_box());
    let entries = track_try_unwrap!(read_boxes(&entries[4..]));
    let mp4a = entries[0];
    assert_eq!(&mp4a.kind.0, b"mp4a");
    assert_eq!(&mp4a.data[16..18], &[0, 2]);
    assert_eq!(&mp4a.data[24..26], &44_100u16.to_be_bytes());
    let esds = track_try_unwrap!(read_boxes(&mp4a.data[28..]));
    assert_eq!(&esds[0].kind.0, b"esds");
    assert!(esds[0].data.windows(2).any(|w| w == &AAC_CONFIG[..]));

    let trexes = track_try_unwrap!(track_try_unwrap!(moov.child(b"mvex")).children_of(b"trex"));
    let ids: Vec<_> = trexes
        .iter()
        .map(|trex| {
            let (_, data) = track_try_unwrap!(trex.full_box());
            u32::from_be_bytes([data[0], data[1], data[2], data[3]])
        })
        .collect();
    assert_eq!(ids, [1, 2]);
}

#[test]
fn laced_frames_are_spread_by_default_duration() {
    let mut fixture = Fixture::new();
    fixture.default_duration = Some(20_000_000);
    fixture.clusters = vec![(
        0,
        vec![xiph_laced_block(1, 0, &[&b"aa"[..], &b"bbb"[..], &b"cccc"[..]])],
    )];
    fixture.duration = 60.0;

    let fragments = fragments(&fixture.muxer(), 0.0);
    assert_eq!(fragments.len(), 1);
    let samples: Vec<_> = fragments[0]
        .trun
        .entries
        .iter()
        .map(|e| (e.sample_duration, e.sample_size))
        .collect();
    assert_eq!(
        samples,
        [(Some(20), Some(2)), (Some(20), Some(3)), (Some(20), Some(4))]
    );
    assert_eq!(fragments[0].mdat, b"aabbbcccc");
}

#[test]
fn block_groups_are_keyframes_without_references() {
    let mut fixture = Fixture::new();
    fixture.clusters = vec![(
        0,
        vec![
            block_group(1, 0, None, b"key"),
            block_group(1, 40, Some(-40), b"delta"),
        ],
    )];
    fixture.duration = 80.0;

    let fragments = fragments(&fixture.muxer(), 0.0);
    assert_eq!(fragments.len(), 1);
    let flags: Vec<_> = fragments[0]
        .trun
        .entries
        .iter()
        .map(|e| e.sample_flags)
        .collect();
    assert_eq!(flags, [Some(0x0200_0000), Some(0x0101_0000)]);
    assert_eq!(fragments[0].mdat, b"keydelta");
}

#[test]
fn infinite_duration_is_treated_as_unknown() {
    let mut fixture = Fixture::new();
    fixture.duration = f64::INFINITY;
    let muxer = fixture.muxer();
    assert_eq!(track_try_unwrap!(muxer.duration()), 0.0);

    let fragments = fragments(&muxer, 0.0);
    let durations: Vec<_> = fragments
        .iter()
        .map(|f| f.trun.entries[0].sample_duration)
        .collect();
    assert_eq!(durations, [Some(1000), Some(1500), Some(0)]);
}
