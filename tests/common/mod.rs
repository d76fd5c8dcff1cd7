//! A small writer of synthetic Matroska files.
#![allow(dead_code)]

use mkv_fmp4::matroska::MatroskaFile;
use mkv_fmp4::muxer::Muxer;
use mkv_fmp4::source::ByteRange;

pub const AVC_CONFIG: [u8; 16] = [
    0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0x00, 0x03, 0x67, 0x64, 0x00, 0x01, 0x00, 0x02, 0x68, 0xEE,
];

/// AAC-LC, 44.1 kHz, stereo.
pub const AAC_CONFIG: [u8; 2] = [0x12, 0x10];

/// Writes an element with an 8-byte size.
pub fn el(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf: Vec<u8> = id.to_be_bytes().iter().copied().skip_while(|&b| b == 0).collect();
    buf.push(0x01);
    buf.extend_from_slice(&(payload.len() as u64).to_be_bytes()[1..]);
    buf.extend_from_slice(payload);
    buf
}

pub fn uint(id: u32, v: u64) -> Vec<u8> {
    el(id, &v.to_be_bytes())
}

pub fn int(id: u32, v: i64) -> Vec<u8> {
    el(id, &v.to_be_bytes())
}

pub fn float(id: u32, v: f64) -> Vec<u8> {
    el(id, &v.to_be_bytes())
}

pub fn text(id: u32, v: &str) -> Vec<u8> {
    el(id, v.as_bytes())
}

pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

fn block_payload(track: u8, timestamp: i16, flags: u8, frame: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x80 | track];
    payload.extend_from_slice(&timestamp.to_be_bytes());
    payload.push(flags);
    payload.extend_from_slice(frame);
    payload
}

pub fn simple_block(track: u8, timestamp: i16, keyframe: bool, frame: &[u8]) -> Vec<u8> {
    let flags = if keyframe { 0x80 } else { 0x00 };
    el(0xA3, &block_payload(track, timestamp, flags, frame))
}

/// A keyframe `SimpleBlock` whose frames are packed with Xiph lacing.
pub fn xiph_laced_block(track: u8, timestamp: i16, frames: &[&[u8]]) -> Vec<u8> {
    let mut table = vec![(frames.len() - 1) as u8];
    for frame in &frames[..frames.len() - 1] {
        let mut size = frame.len();
        while size >= 0xFF {
            table.push(0xFF);
            size -= 0xFF;
        }
        table.push(size as u8);
    }
    table.extend(frames.concat());
    el(0xA3, &block_payload(track, timestamp, 0x80 | 0x02, &table))
}

/// A `BlockGroup`, with a `ReferenceBlock` if `reference` is given.
pub fn block_group(track: u8, timestamp: i16, reference: Option<i64>, frame: &[u8]) -> Vec<u8> {
    let mut parts = vec![el(0xA1, &block_payload(track, timestamp, 0x00, frame))];
    if let Some(reference) = reference {
        parts.push(int(0xFB, reference));
    }
    el(0xA0, &concat(&parts))
}

pub struct Fixture {
    pub codec_id: &'static str,
    pub encodings: Option<Vec<u8>>,
    pub default_duration: Option<u64>,
    pub audio: bool,
    pub clusters: Vec<(u64, Vec<Vec<u8>>)>,
    pub duration: f64,
    pub seek_head: bool,
    pub cues_first: bool,
}
impl Fixture {
    pub fn new() -> Self {
        Fixture {
            codec_id: "V_MPEG4/ISO/AVC",
            encodings: None,
            default_duration: None,
            audio: false,
            clusters: vec![
                (0, vec![simple_block(1, 0, true, b"first")]),
                (1000, vec![simple_block(1, 0, true, b"second")]),
                (2500, vec![simple_block(1, 0, true, b"third")]),
            ],
            duration: 3000.0,
            seek_head: true,
            cues_first: false,
        }
    }

    fn info(&self) -> Vec<u8> {
        el(
            0x1549_A966,
            &concat(&[uint(0x2A_D7B1, 1_000_000), float(0x4489, self.duration)]),
        )
    }

    fn tracks(&self) -> Vec<u8> {
        let mut video = vec![
            uint(0xD7, 1),
            uint(0x73C5, 1234),
            uint(0x83, 1),
            text(0x86, self.codec_id),
            el(0x63A2, &AVC_CONFIG),
            el(0xE0, &concat(&[uint(0xB0, 640), uint(0xBA, 360)])),
        ];
        if let Some(d) = self.default_duration {
            video.push(uint(0x23_E383, d));
        }
        if let Some(ref encodings) = self.encodings {
            video.push(encodings.clone());
        }
        let mut entries = vec![el(0xAE, &concat(&video))];
        if self.audio {
            let audio = [
                uint(0xD7, 2),
                uint(0x73C5, 5678),
                uint(0x83, 2),
                text(0x86, "A_AAC"),
                el(0x63A2, &AAC_CONFIG),
                el(0xE1, &concat(&[float(0xB5, 44_100.0), uint(0x9F, 2)])),
            ];
            entries.push(el(0xAE, &concat(&audio)));
        }
        el(0x1654_AE6B, &concat(&entries))
    }

    fn clusters(&self) -> Vec<Vec<u8>> {
        self.clusters
            .iter()
            .map(|(ts, blocks)| {
                let mut parts = vec![uint(0xE7, *ts)];
                parts.extend(blocks.iter().cloned());
                el(0x1F43_B675, &concat(&parts))
            })
            .collect()
    }

    fn cues(&self, cluster_positions: &[u64]) -> Vec<u8> {
        let points: Vec<Vec<u8>> = self
            .clusters
            .iter()
            .zip(cluster_positions)
            .map(|((ts, _), &pos)| {
                let positions = el(0xB7, &concat(&[uint(0xF7, 1), uint(0xF1, pos)]));
                el(0xBB, &concat(&[uint(0xB3, *ts), positions]))
            })
            .collect();
        el(0x1C53_BB6B, &concat(&points))
    }

    fn seek_head(&self, cues_position: u64) -> Vec<u8> {
        let seek = el(
            0x4DBB,
            &concat(&[el(0x53AB, &[0x1C, 0x53, 0xBB, 0x6B]), uint(0x53AC, cues_position)]),
        );
        el(0x114D_9B74, &seek)
    }

    /// Returns the file and the Segment-relative positions of Tracks and the clusters.
    pub fn build(&self) -> (Vec<u8>, u64, Vec<u64>) {
        // Every size and integer has a fixed width, so placeholders give the final layout.
        let seek_head_len = if self.seek_head {
            self.seek_head(0).len() as u64
        } else {
            0
        };
        let info = self.info();
        let tracks = self.tracks();
        let clusters = self.clusters();
        let cues_len = self.cues(&vec![0; clusters.len()]).len() as u64;

        let tracks_position = seek_head_len + info.len() as u64;
        let mut position = tracks_position + tracks.len() as u64;
        let cues_position = if self.cues_first {
            let p = position;
            position += cues_len;
            p
        } else {
            position + clusters.iter().map(|c| c.len() as u64).sum::<u64>()
        };
        let mut cluster_positions = Vec::new();
        for c in &clusters {
            cluster_positions.push(position);
            position += c.len() as u64;
        }
        let cues = self.cues(&cluster_positions);

        let mut body = Vec::new();
        if self.seek_head {
            body.extend(self.seek_head(cues_position));
        }
        body.extend(info);
        body.extend(tracks);
        if self.cues_first {
            body.extend(cues.clone());
        }
        for c in clusters {
            body.extend(c);
        }
        if !self.cues_first {
            body.extend(cues);
        }

        let head = el(0x1A45_DFA3, &concat(&[uint(0x4286, 1), text(0x4282, "matroska")]));
        let mut file = head;
        file.extend(el(0x1853_8067, &body));
        (file, tracks_position, cluster_positions)
    }

    pub fn muxer(&self) -> Muxer {
        Muxer::new(ByteRange::from_vec(self.build().0))
    }

    pub fn file(&self) -> MatroskaFile {
        MatroskaFile::new(ByteRange::from_vec(self.build().0))
    }
}
