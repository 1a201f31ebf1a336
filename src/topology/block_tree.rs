//! Index-addressable oct-tree over the blocks of one snapshot.
//!
//! The tree is decoded once from the compact relation encoding (9 integers
//! per block: parent id followed by eight child ids, `-1` for "none") and is
//! immutable afterwards. Blocks are stored by `id - 1`, so every lookup is a
//! plain array access.
//!
//! # Invariants
//! - ids form the contiguous range `1..=N`;
//! - every block has either 0 or exactly 8 children;
//! - a child's parent entry names the block that lists it as a child;
//! - every block is reachable from a root (a block without parent);
//! - block 1 is a root.

use super::block::{Block, BlockFace, NodeType};
use super::block_id::BlockId;
use crate::amr_error::AmrReduceError;
use crate::debug_invariants::DebugInvariants;
use std::collections::{BTreeMap, VecDeque};

/// Number of integers per block in the relation encoding.
pub const RELATION_STRIDE: usize = 9;
/// Children of a refined block.
pub const CHILD_COUNT: usize = 8;

type Children = Option<[BlockId; CHILD_COUNT]>;

/// Immutable oct-tree (or forest of oct-trees) of AMR blocks.
#[derive(Debug, Clone)]
pub struct BlockTree {
    blocks: Vec<Block>,
    parents: Vec<Option<BlockId>>,
    children: Vec<Children>,
}

impl BlockTree {
    /// Build a tree from the relation encoding alone.
    ///
    /// Block attributes that the encoding implies are derived: the refine
    /// level is the depth (roots are level 1), the node type follows from the
    /// children and `which_child` is the octant slot in the parent. Geometry
    /// stays zeroed.
    pub fn from_relations(relations: &[i32]) -> Result<Self, AmrReduceError> {
        let (parents, children) = decode_relations(relations)?;
        let order = walk(&parents, &children)?;

        let mut levels = vec![1u8; parents.len()];
        let mut slots = vec![-1i32; parents.len()];
        for id in &order {
            if let Some(kids) = &children[id.index()] {
                for (slot, kid) in kids.iter().enumerate() {
                    levels[kid.index()] = levels[id.index()].saturating_add(1);
                    slots[kid.index()] = slot as i32;
                }
            }
        }

        let blocks = (0..parents.len())
            .map(|i| {
                let id = BlockId::from_index(i)?;
                let node_type = match &children[i] {
                    None => NodeType::Leaf,
                    Some(kids) if kids.iter().all(|k| children[k.index()].is_none()) => {
                        NodeType::Parent
                    }
                    Some(_) => NodeType::Ancestor,
                };
                Ok(Block::builder(id)
                    .refine_level(levels[i])
                    .node_type(node_type)
                    .which_child(slots[i])
                    .build())
            })
            .collect::<Result<Vec<_>, AmrReduceError>>()?;

        let tree = Self {
            blocks,
            parents,
            children,
        };
        tree.debug_assert_invariants();
        Ok(tree)
    }

    /// Build a tree over fully populated blocks.
    ///
    /// `blocks[i]` must carry id `i + 1` and the relation encoding must have
    /// exactly one row per block.
    pub fn with_blocks(blocks: Vec<Block>, relations: &[i32]) -> Result<Self, AmrReduceError> {
        for (i, block) in blocks.iter().enumerate() {
            if block.id().index() != i {
                return Err(AmrReduceError::MalformedRelations(format!(
                    "block at position {i} has id {}, expected {}",
                    block.id(),
                    i + 1
                )));
            }
        }
        let (parents, children) = decode_relations(relations)?;
        if parents.len() != blocks.len() {
            return Err(AmrReduceError::MalformedRelations(format!(
                "{} relation rows for {} blocks",
                parents.len(),
                blocks.len()
            )));
        }
        walk(&parents, &children)?;
        Ok(Self {
            blocks,
            parents,
            children,
        })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    /// All blocks in ascending id order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The block with id 1.
    pub fn root(&self) -> Option<&Block> {
        self.blocks.first()
    }

    /// Every top-level block, in id order.
    pub fn roots(&self) -> impl Iterator<Item = &Block> + '_ {
        self.blocks
            .iter()
            .zip(&self.parents)
            .filter(|(_, parent)| parent.is_none())
            .map(|(block, _)| block)
    }

    /// Blocks without children, in id order.
    pub fn leaves(&self) -> impl Iterator<Item = &Block> + '_ {
        self.blocks
            .iter()
            .zip(&self.children)
            .filter(|(_, kids)| kids.is_none())
            .map(|(block, _)| block)
    }

    /// Parent of `id`; `None` for roots and unknown ids.
    pub fn parent_of(&self, id: BlockId) -> Option<&Block> {
        self.parents
            .get(id.index())
            .copied()
            .flatten()
            .and_then(|parent| self.get(parent))
    }

    /// Children of `id` in octant order; empty for leaves and unknown ids.
    pub fn children_of(&self, id: BlockId) -> Vec<&Block> {
        match self.children.get(id.index()) {
            Some(Some(kids)) => kids.iter().filter_map(|&kid| self.get(kid)).collect(),
            _ => Vec::new(),
        }
    }

    /// Face neighbor of `id`, if the slot is populated.
    pub fn neighbor_of(&self, id: BlockId, face: BlockFace) -> Option<&Block> {
        self.get(id)?.neighbor(face).and_then(|n| self.get(n))
    }

    /// Breadth-first walk starting at block 1, then any further roots in id
    /// order.
    pub fn level_order(&self) -> Vec<&Block> {
        self.level_order_ids()
            .into_iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// Block ids grouped by refine level, each group in id order.
    pub fn levels(&self) -> BTreeMap<u8, Vec<BlockId>> {
        let mut levels: BTreeMap<u8, Vec<BlockId>> = BTreeMap::new();
        for block in &self.blocks {
            levels
                .entry(block.refine_level())
                .or_default()
                .push(block.id());
        }
        levels
    }

    /// Deepest refine level present (0 for an empty tree).
    pub fn height(&self) -> u8 {
        self.blocks
            .iter()
            .map(Block::refine_level)
            .max()
            .unwrap_or(0)
    }

    fn level_order_ids(&self) -> Vec<BlockId> {
        // construction already proved the structure acyclic and connected
        walk(&self.parents, &self.children).unwrap_or_default()
    }
}

impl DebugInvariants for BlockTree {
    fn validate_invariants(&self) -> Result<(), AmrReduceError> {
        for (i, block) in self.blocks.iter().enumerate() {
            if block.id().index() != i {
                return Err(AmrReduceError::MalformedRelations(format!(
                    "block at position {i} has id {}",
                    block.id()
                )));
            }
        }
        check_back_references(&self.parents, &self.children)?;
        walk(&self.parents, &self.children)?;
        for block in &self.blocks {
            for child in self.children_of(block.id()) {
                if child.refine_level() != block.refine_level().saturating_add(1) {
                    return Err(AmrReduceError::MalformedRelations(format!(
                        "child {} of block {} is on level {}, expected {}",
                        child.id(),
                        block.id(),
                        child.refine_level(),
                        block.refine_level().saturating_add(1)
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Split the relation encoding into parent and children tables.
fn decode_relations(
    relations: &[i32],
) -> Result<(Vec<Option<BlockId>>, Vec<Children>), AmrReduceError> {
    if relations.len() % RELATION_STRIDE != 0 {
        return Err(AmrReduceError::MalformedRelations(format!(
            "relation array length {} is not a multiple of {RELATION_STRIDE}",
            relations.len()
        )));
    }
    let count = relations.len() / RELATION_STRIDE;
    let lookup = |owner: usize, raw: i32| -> Result<Option<BlockId>, AmrReduceError> {
        match BlockId::from_encoded(raw) {
            Some(id) if id.index() < count => Ok(Some(id)),
            Some(id) => Err(AmrReduceError::MalformedRelations(format!(
                "block {} references block {id} outside 1..={count}",
                owner + 1
            ))),
            None => Ok(None),
        }
    };

    let mut parents = Vec::with_capacity(count);
    let mut children = Vec::with_capacity(count);
    let mut listed = vec![false; count];
    for (i, row) in relations.chunks_exact(RELATION_STRIDE).enumerate() {
        let parent = lookup(i, row[0])?;
        if parent.is_some_and(|p| p.index() == i) {
            return Err(AmrReduceError::MalformedRelations(format!(
                "block {} is its own parent",
                i + 1
            )));
        }
        parents.push(parent);

        let mut kids = Vec::with_capacity(CHILD_COUNT);
        for &raw in &row[1..] {
            match lookup(i, raw)? {
                Some(kid) if listed[kid.index()] => {
                    return Err(AmrReduceError::MalformedRelations(format!(
                        "block {kid} is listed as a child more than once"
                    )));
                }
                Some(kid) => {
                    listed[kid.index()] = true;
                    kids.push(kid);
                }
                None => break,
            }
        }
        if row[1 + kids.len()..].iter().any(|&raw| raw > 0) {
            return Err(AmrReduceError::MalformedRelations(format!(
                "block {} has child ids after the end-of-children sentinel",
                i + 1
            )));
        }
        match <[BlockId; CHILD_COUNT]>::try_from(kids.as_slice()) {
            Ok(full) => children.push(Some(full)),
            Err(_) if kids.is_empty() => children.push(None),
            Err(_) => {
                return Err(AmrReduceError::MalformedRelations(format!(
                    "block {} has {} children, expected 0 or {CHILD_COUNT}",
                    i + 1,
                    kids.len()
                )));
            }
        }
    }
    check_back_references(&parents, &children)?;
    if parents.first().is_some_and(Option::is_some) {
        return Err(AmrReduceError::MalformedRelations(
            "block 1 must be a root".into(),
        ));
    }
    Ok((parents, children))
}

/// Every child must name its lister as parent, and every parent must list
/// the child.
fn check_back_references(
    parents: &[Option<BlockId>],
    children: &[Children],
) -> Result<(), AmrReduceError> {
    for (i, kids) in children.iter().enumerate() {
        for kid in kids.iter().flatten() {
            if parents[kid.index()].map(BlockId::index) != Some(i) {
                return Err(AmrReduceError::MalformedRelations(format!(
                    "block {} lists child {kid} whose parent entry disagrees",
                    i + 1
                )));
            }
        }
    }
    for (i, parent) in parents.iter().enumerate() {
        if let Some(parent) = parent {
            let listed = children[parent.index()]
                .iter()
                .flatten()
                .any(|kid| kid.index() == i);
            if !listed {
                return Err(AmrReduceError::MalformedRelations(format!(
                    "block {} names parent {parent}, which does not list it as child",
                    i + 1
                )));
            }
        }
    }
    Ok(())
}

/// Breadth-first order over all roots; fails if a block is reached twice or
/// not at all.
fn walk(
    parents: &[Option<BlockId>],
    children: &[Children],
) -> Result<Vec<BlockId>, AmrReduceError> {
    let mut visited = vec![false; parents.len()];
    let mut order = Vec::with_capacity(parents.len());
    let mut queue = parents
        .iter()
        .enumerate()
        .filter(|(_, parent)| parent.is_none())
        .map(|(i, _)| BlockId::from_index(i))
        .collect::<Result<VecDeque<_>, _>>()?;

    while let Some(id) = queue.pop_front() {
        if std::mem::replace(&mut visited[id.index()], true) {
            return Err(AmrReduceError::MalformedRelations(format!(
                "block {id} is reached more than once"
            )));
        }
        order.push(id);
        if let Some(kids) = &children[id.index()] {
            queue.extend(kids.iter().copied());
        }
    }
    let missing = visited.iter().filter(|&&seen| !seen).count();
    if missing > 0 {
        return Err(AmrReduceError::MalformedRelations(format!(
            "{missing} of {} blocks are not reachable from a root",
            parents.len()
        )));
    }
    Ok(order)
}
