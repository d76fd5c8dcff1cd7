//! Seek index.
use super::{Cluster, Segment, TopLevelElement};
use crate::ebml::{define_elements, Many};
use crate::{ErrorKind, Result};

define_elements! {
    /// Index of the clusters by time.
    Cues(CUES) = 0x1C53_BB6B, Some(1), Master [CUE_POINT];
    /// An index entry for a single timestamp.
    CuePoint(CUE_POINT, multiple) = 0xBB, Some(2), Master [CUE_TIME, CUE_TRACK_POSITIONS];
    /// Timestamp of the entry.
    CueTime(CUE_TIME) = 0xB3, Some(3), Uint;
    /// Positions for one track.
    CueTrackPositions(CUE_TRACK_POSITIONS, multiple) = 0xB7, Some(3), Master [
        CUE_TRACK, CUE_CLUSTER_POSITION, CUE_RELATIVE_POSITION, CUE_DURATION, CUE_BLOCK_NUMBER,
    ];
    /// Track number.
    CueTrack(CUE_TRACK) = 0xF7, Some(4), Uint;
    /// Position of the cluster, relative to the Segment data.
    CueClusterPosition(CUE_CLUSTER_POSITION) = 0xF1, Some(4), Uint;
    /// Position of the block, relative to the cluster data.
    CueRelativePosition(CUE_RELATIVE_POSITION) = 0xF0, Some(4), Uint;
    /// Duration of the block.
    CueDuration(CUE_DURATION) = 0xB2, Some(4), Uint;
    /// Number of the block in the cluster (1-based).
    CueBlockNumber(CUE_BLOCK_NUMBER) = 0x5378, Some(4), Uint;
}

impl Cues {
    /// Returns the entries.
    pub fn points(&self) -> Result<Many<CuePoint>> {
        track!(self.many::<CuePoint>())
    }
}

impl CuePoint {
    /// Returns the timestamp of the entry.
    pub fn time(&self) -> Result<u64> {
        track!(self.one::<CueTime>().and_then(|e| e.read_uint()))
    }

    /// Returns the positions of the entry.
    pub fn track_positions(&self) -> Result<Many<CueTrackPositions>> {
        track!(self.many::<CueTrackPositions>())
    }
}

impl CueTrackPositions {
    /// Returns the track number.
    pub fn track(&self) -> Result<u64> {
        track!(self.one::<CueTrack>().and_then(|e| e.read_uint()))
    }

    /// Returns the position of the cluster, relative to the Segment data.
    pub fn cluster_position(&self) -> Result<u64> {
        track!(self.one::<CueClusterPosition>().and_then(|e| e.read_uint()))
    }

    /// Parses the cluster the entry points at.
    pub fn referenced_cluster(&self, segment: &Segment) -> Result<Cluster> {
        let position = track!(self.cluster_position())?;
        match track!(segment.resolve(position))? {
            TopLevelElement::Cluster(cluster) => Ok(cluster),
            other => track_panic!(
                ErrorKind::SchemaViolation,
                "Cue points at {} (offset {})",
                other.name(),
                position
            ),
        }
    }
}
