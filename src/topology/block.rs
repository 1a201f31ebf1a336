//! Blocks of an AMR oct-tree and their face neighbors.
//!
//! A [`Block`] is an immutable record: it is assembled once by a
//! [`BlockBuilder`] after all attribute tables of a snapshot have been
//! scanned, and afterwards only exposes read accessors.

use super::block_id::BlockId;
use serde::{Deserialize, Serialize};

/// Number of face neighbors of a block.
pub const NEIGHBOR_COUNT: usize = 6;

/// Role of a block in the refinement hierarchy (PARAMESH `node type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Holds the finest data at its location.
    Leaf,
    /// Direct parent of leaves.
    Parent,
    /// Any higher ancestor.
    Ancestor,
    /// A code the library does not interpret.
    Other(i32),
}

impl NodeType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => NodeType::Leaf,
            2 => NodeType::Parent,
            3 => NodeType::Ancestor,
            other => NodeType::Other(other),
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            NodeType::Leaf => 1,
            NodeType::Parent => 2,
            NodeType::Ancestor => 3,
            NodeType::Other(raw) => raw,
        }
    }
}

/// The six faces of a cube, in neighbor-table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockFace {
    /// −x
    Left,
    /// +x
    Right,
    /// −y
    Bottom,
    /// +y
    Top,
    /// −z
    Back,
    /// +z
    Front,
}

impl BlockFace {
    pub const ALL: [BlockFace; NEIGHBOR_COUNT] = [
        BlockFace::Left,
        BlockFace::Right,
        BlockFace::Bottom,
        BlockFace::Top,
        BlockFace::Back,
        BlockFace::Front,
    ];

    /// Slot of this face in a block's neighbor list.
    #[inline]
    pub const fn neighbor_index(self) -> usize {
        self as usize
    }

    /// Outward unit normal of the face.
    pub const fn direction(self) -> [i8; 3] {
        match self {
            BlockFace::Left => [-1, 0, 0],
            BlockFace::Right => [1, 0, 0],
            BlockFace::Bottom => [0, -1, 0],
            BlockFace::Top => [0, 1, 0],
            BlockFace::Back => [0, 0, -1],
            BlockFace::Front => [0, 0, 1],
        }
    }

    /// The face on the other side of the cube.
    pub const fn opposite(self) -> BlockFace {
        match self {
            BlockFace::Left => BlockFace::Right,
            BlockFace::Right => BlockFace::Left,
            BlockFace::Bottom => BlockFace::Top,
            BlockFace::Top => BlockFace::Bottom,
            BlockFace::Back => BlockFace::Front,
            BlockFace::Front => BlockFace::Back,
        }
    }
}

/// One cube-shaped mesh region.
///
/// Identity is the id alone: two blocks compare equal iff their ids match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    id: BlockId,
    refine_level: u8,
    node_type: NodeType,
    block_size: f32,
    coordinates: [f32; 3],
    bounding_box: [f32; 3],
    which_child: Option<u8>,
    bflags: i32,
    neighbors: [Option<BlockId>; NEIGHBOR_COUNT],
}

impl Block {
    /// Start assembling a block with the given id.
    pub fn builder(id: BlockId) -> BlockBuilder {
        BlockBuilder::new(id)
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Depth in the oct-tree; roots are level 1.
    pub fn refine_level(&self) -> u8 {
        self.refine_level
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn is_leaf(&self) -> bool {
        self.node_type == NodeType::Leaf
    }

    /// Edge length of the cube.
    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    /// Center of the cube.
    pub fn coordinates(&self) -> [f32; 3] {
        self.coordinates
    }

    /// Half extent of the cube along each axis.
    pub fn bounding_box(&self) -> [f32; 3] {
        self.bounding_box
    }

    /// Octant index (0–7) inside the parent, `None` for a root.
    pub fn which_child(&self) -> Option<u8> {
        self.which_child
    }

    /// Solver specific flags, carried through untouched.
    pub fn bflags(&self) -> i32 {
        self.bflags
    }

    /// All six neighbor slots in [`BlockFace`] order.
    pub fn neighbors(&self) -> &[Option<BlockId>; NEIGHBOR_COUNT] {
        &self.neighbors
    }

    /// Neighbor across `face`, or `None` at a domain boundary / coarser face.
    pub fn neighbor(&self, face: BlockFace) -> Option<BlockId> {
        self.neighbors[face.neighbor_index()]
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Block {}

impl std::hash::Hash for Block {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Assembles a [`Block`] from attribute tables scanned in any order.
#[derive(Debug, Clone)]
pub struct BlockBuilder {
    block: Block,
}

impl BlockBuilder {
    pub fn new(id: BlockId) -> Self {
        Self {
            block: Block {
                id,
                refine_level: 1,
                node_type: NodeType::Leaf,
                block_size: 0.0,
                coordinates: [0.0; 3],
                bounding_box: [0.0; 3],
                which_child: None,
                bflags: 0,
                neighbors: [None; NEIGHBOR_COUNT],
            },
        }
    }

    pub fn refine_level(mut self, level: u8) -> Self {
        self.block.refine_level = level;
        self
    }

    pub fn node_type(mut self, node_type: NodeType) -> Self {
        self.block.node_type = node_type;
        self
    }

    pub fn block_size(mut self, size: f32) -> Self {
        self.block.block_size = size;
        self
    }

    pub fn coordinates(mut self, center: [f32; 3]) -> Self {
        self.block.coordinates = center;
        self
    }

    pub fn bounding_box(mut self, half_extent: [f32; 3]) -> Self {
        self.block.bounding_box = half_extent;
        self
    }

    /// Raw `which child` entry; negative values mark a root.
    pub fn which_child(mut self, raw: i32) -> Self {
        self.block.which_child = u8::try_from(raw).ok();
        self
    }

    pub fn bflags(mut self, flags: i32) -> Self {
        self.block.bflags = flags;
        self
    }

    /// Raw neighbor ids in [`BlockFace`] order; entries `<= 0` are empty slots.
    pub fn neighbors(mut self, raw: [i32; NEIGHBOR_COUNT]) -> Self {
        self.block.neighbors = raw.map(BlockId::from_encoded);
        self
    }

    pub fn build(self) -> Block {
        self.block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(raw: u32) -> BlockId {
        BlockId::new(raw).unwrap()
    }

    #[test]
    fn face_indices_follow_table_order() {
        for (i, face) in BlockFace::ALL.iter().enumerate() {
            assert_eq!(face.neighbor_index(), i);
        }
        assert_eq!(BlockFace::Top.direction(), [0, 1, 0]);
        assert_eq!(BlockFace::Back.opposite(), BlockFace::Front);
    }

    #[test]
    fn opposite_directions_cancel() {
        for face in BlockFace::ALL {
            let a = face.direction();
            let b = face.opposite().direction();
            assert_eq!([a[0] + b[0], a[1] + b[1], a[2] + b[2]], [0, 0, 0]);
        }
    }

    #[test]
    fn missing_neighbor_is_none() {
        let block = Block::builder(bid(4))
            .neighbors([2, -1, 3, 0, -21, 5])
            .build();
        assert_eq!(block.neighbor(BlockFace::Left), Some(bid(2)));
        assert_eq!(block.neighbor(BlockFace::Right), None);
        assert_eq!(block.neighbor(BlockFace::Top), None);
        assert_eq!(block.neighbor(BlockFace::Back), None);
        assert_eq!(block.neighbor(BlockFace::Front), Some(bid(5)));
    }

    #[test]
    fn builder_populates_every_field() {
        let block = Block::builder(bid(2))
            .refine_level(3)
            .node_type(NodeType::from_raw(2))
            .block_size(0.5)
            .coordinates([1.0, 2.0, 3.0])
            .bounding_box([0.25, 0.25, 0.25])
            .which_child(6)
            .bflags(11)
            .build();
        assert_eq!(block.id(), bid(2));
        assert_eq!(block.refine_level(), 3);
        assert_eq!(block.node_type(), NodeType::Parent);
        assert!(!block.is_leaf());
        assert_eq!(block.block_size(), 0.5);
        assert_eq!(block.coordinates(), [1.0, 2.0, 3.0]);
        assert_eq!(block.bounding_box(), [0.25; 3]);
        assert_eq!(block.which_child(), Some(6));
        assert_eq!(block.bflags(), 11);
    }

    #[test]
    fn negative_which_child_marks_root() {
        let block = Block::builder(bid(1)).which_child(-1).build();
        assert_eq!(block.which_child(), None);
    }

    #[test]
    fn equality_is_by_id() {
        let a = Block::builder(bid(5)).refine_level(2).build();
        let b = Block::builder(bid(5)).refine_level(4).build();
        assert_eq!(a, b);
        assert_eq!(NodeType::from_raw(9).to_raw(), 9);
    }
}
