//! Clusters and their blocks.
use super::block::DecodedBlock;
use crate::ebml::{define_elements, ElementType, SchemaChildren};
use crate::Result;

define_elements! {
    /// A group of blocks sharing a base timestamp.
    Cluster(CLUSTER, multiple) = 0x1F43_B675, Some(1), Master [
        TIMESTAMP, POSITION, PREV_SIZE, SIMPLE_BLOCK, BLOCK_GROUP,
    ];
    /// Base timestamp of the blocks in the cluster.
    Timestamp(TIMESTAMP) = 0xE7, Some(2), Uint;
    /// Position of the cluster in the Segment.
    Position(POSITION) = 0xA7, Some(2), Uint;
    /// Size of the previous cluster.
    PrevSize(PREV_SIZE) = 0xAB, Some(2), Uint;
    /// A block with its keyframe flag in the header.
    SimpleBlock(SIMPLE_BLOCK, multiple) = 0xA3, Some(2), Block;
    /// A block with its references.
    BlockGroup(BLOCK_GROUP, multiple) = 0xA0, Some(2), Master [
        BLOCK, BLOCK_DURATION, REFERENCE_BLOCK, DISCARD_PADDING,
    ];
    /// The block of a group.
    Block(BLOCK) = 0xA1, Some(3), Block;
    /// Duration of the block in timestamp ticks.
    BlockDuration(BLOCK_DURATION) = 0x9B, Some(3), Uint;
    /// Timestamp of a referenced block, relative to this one.
    ReferenceBlock(REFERENCE_BLOCK, multiple) = 0xFB, Some(3), Int;
    /// Nanoseconds of padding to discard at the end of the block.
    DiscardPadding(DISCARD_PADDING) = 0x75A2, Some(3), Int;
}

impl Cluster {
    /// Returns the base timestamp.
    pub fn timestamp(&self) -> Result<u64> {
        track!(self.one::<Timestamp>().and_then(|e| e.read_uint()))
    }

    /// Returns the blocks in document order, read into memory one at a time.
    pub fn blocks(&self) -> Result<Blocks> {
        Ok(Blocks {
            children: track!(self.children())?,
        })
    }
}

impl SimpleBlock {
    /// Reads and decodes the block.
    pub fn decode(&self) -> Result<DecodedBlock> {
        let data = track!(self.read_bytes())?;
        track!(DecodedBlock::from_simple_block(data))
    }
}

impl BlockGroup {
    /// Returns `true` if the block does not reference other blocks.
    pub fn is_keyframe(&self) -> Result<bool> {
        Ok(track!(self.maybe_one::<ReferenceBlock>())?.is_none())
    }

    /// Returns the duration in timestamp ticks.
    pub fn duration(&self) -> Result<Option<u64>> {
        match track!(self.maybe_one::<BlockDuration>())? {
            Some(e) => Ok(Some(track!(e.read_uint())?)),
            None => Ok(None),
        }
    }

    /// Reads and decodes the block.
    pub fn decode(&self) -> Result<DecodedBlock> {
        let block = track!(self.one::<Block>())?;
        let data = track!(block.read_bytes())?;
        let keyframe = track!(self.is_keyframe())?;
        track!(DecodedBlock::from_block(data, keyframe))
    }
}

/// The `SimpleBlock` and `BlockGroup` children of a cluster.
#[derive(Debug)]
pub struct Blocks {
    children: SchemaChildren,
}
impl Iterator for Blocks {
    type Item = Result<DecodedBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let child = match self.children.next()? {
                Ok(child) => child,
                Err(e) => return Some(Err(track!(e))),
            };
            if child.id() == SIMPLE_BLOCK.id {
                let block = SimpleBlock::from_schema(child);
                return Some(track!(block.decode()));
            }
            if child.id() == BLOCK_GROUP.id {
                let group = BlockGroup::from_schema(child);
                return Some(track!(group.decode()));
            }
        }
    }
}
