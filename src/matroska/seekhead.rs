//! Index of the level 1 elements.
use super::{Segment, TopLevelElement};
use crate::ebml::{define_elements, Many};
use crate::Result;

define_elements! {
    /// Positions of other level 1 elements.
    SeekHead(SEEK_HEAD, multiple) = 0x114D_9B74, Some(1), Master [SEEK];
    /// A single index entry.
    Seek(SEEK, multiple) = 0x4DBB, Some(2), Master [SEEK_ID, SEEK_POSITION];
    /// Id of the indexed element.
    SeekID(SEEK_ID) = 0x53AB, Some(3), VarInt;
    /// Position of the indexed element, relative to the Segment data.
    SeekPosition(SEEK_POSITION) = 0x53AC, Some(3), Uint;
}

impl SeekHead {
    /// Returns the entries.
    pub fn seeks(&self) -> Result<Many<Seek>> {
        track!(self.many::<Seek>())
    }
}

impl Seek {
    /// Returns the id (length marker included) of the indexed element.
    pub fn seek_id(&self) -> Result<u64> {
        let id = track!(self.one::<SeekID>())?;
        Ok(track!(id.read_varint())?.id())
    }

    /// Returns the position of the indexed element.
    pub fn position(&self) -> Result<u64> {
        track!(self.one::<SeekPosition>().and_then(|p| p.read_uint()))
    }

    /// Parses the indexed element.
    pub fn resolve(&self, segment: &Segment) -> Result<TopLevelElement> {
        let position = track!(self.position())?;
        track!(segment.resolve(position))
    }
}
