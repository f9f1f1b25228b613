//! Animation sets.

use rmdkit_rw::{ChunkId, NodeId};

/// Tags that open an animation set when met outside of one.
pub const ANIMATION_SET_MEMBERS: [ChunkId; 6] = [
    ChunkId::ANIMATION,
    ChunkId::UV_ANIMATION_DICTIONARY,
    ChunkId::RMD_ANIMATION_PLACEHOLDER,
    ChunkId::RMD_ANIMATION_INSTANCE,
    ChunkId::RMD_TRANSFORM_OVERRIDE,
    ChunkId::RMD_VISIBILITY_ANIMATION,
];

/// Whether chunks with `tag` belong to animation sets.
#[inline]
pub fn is_animation_set_member(tag: ChunkId) -> bool {
    ANIMATION_SET_MEMBERS.contains(&tag)
}

/// A run of top-level chunks forming one animation.
///
/// A set has no chunk of its own. Its members are written flat, followed
/// by a terminator chunk that is never kept in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimationSet {
    members: Vec<NodeId>,
}

impl AnimationSet {
    pub fn new(members: Vec<NodeId>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.members
    }

    pub fn push(&mut self, member: NodeId) {
        self.members.push(member);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl From<Vec<NodeId>> for AnimationSet {
    fn from(members: Vec<NodeId>) -> Self {
        Self::new(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_tags() {
        assert!(is_animation_set_member(ChunkId::ANIMATION));
        assert!(is_animation_set_member(ChunkId::RMD_ANIMATION_INSTANCE));
        assert!(!is_animation_set_member(ChunkId::RMD_ANIMATION_TERMINATOR));
        assert!(!is_animation_set_member(ChunkId::RMD_ANIMATION_COUNT));
        assert!(!is_animation_set_member(ChunkId::CLUMP));
    }
}
