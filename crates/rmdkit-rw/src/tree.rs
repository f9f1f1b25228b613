//! Arena-backed node tree.
//!
//! All nodes of a tree live in one flat `Vec` and reference each other by
//! [`NodeId`]. A node owns its ordered children; the parent link is a plain
//! index used only for context queries such as [`NodeTree::enclosing`].

use std::cell::Cell;
use std::fmt;

use crate::chunk::version_for_tag;
use crate::nodes::{GeometryInfo, NodeBody, SchemaContext};
use crate::{ChunkId, Error, Result};

/// Deepest chunk nesting the decoder and encoder accept. A root chunk sits
/// at depth 0.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Handle of a node inside a [`NodeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Position of the node in its arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One chunk of the tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Chunk type tag.
    pub tag: ChunkId,
    /// Library id stamp written in the header.
    pub version: u32,
    /// Typed payload.
    pub body: NodeBody,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    payload_size: Cell<u32>,
}

impl Node {
    /// The node that owns this one.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Owned children, in stream order.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Payload size as last read or written. Never used to encode.
    #[inline]
    pub fn payload_size(&self) -> u32 {
        self.payload_size.get()
    }

    #[inline]
    pub(crate) fn set_payload_size(&self, size: u32) {
        self.payload_size.set(size);
    }
}

/// An arena of nodes.
///
/// Nodes detached from their parent stay in the arena until the tree is
/// dropped; they are simply unreachable from the roots a caller keeps.
#[derive(Debug, Clone, Default)]
pub struct NodeTree {
    nodes: Vec<Node>,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the arena, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a detached node stamped with the default version for `tag`.
    pub fn add(&mut self, tag: ChunkId, body: NodeBody) -> NodeId {
        self.add_with_version(tag, version_for_tag(tag), body)
    }

    /// Allocate a detached node with an explicit version stamp.
    pub fn add_with_version(&mut self, tag: ChunkId, version: u32, body: NodeBody) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            tag,
            version,
            body,
            parent: None,
            children: Vec::new(),
            payload_size: Cell::new(0),
        });
        id
    }

    /// Allocate a node and attach it as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, tag: ChunkId, body: NodeBody) -> Result<NodeId> {
        self.get(parent)?;
        let child = self.add(tag, body);
        self.attach_child(parent, child)?;
        Ok(child)
    }

    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.index()).ok_or(Error::UnknownNode(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.index()).ok_or(Error::UnknownNode(id))
    }

    /// Like [`get`](Self::get), for lookups where absence is not an error.
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Children of `id`; empty for unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(Node::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(Node::parent)
    }

    /// Tag of `id`, if it exists.
    pub fn tag(&self, id: NodeId) -> Option<ChunkId> {
        self.node(id).map(|n| n.tag)
    }

    /// Append `child` to `parent`'s children.
    ///
    /// Attaching a child that is already the last-known child of `parent`
    /// is a no-op. A child owned by another node is moved.
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.get(parent)?;
        let previous = self.get(child)?.parent;

        if previous == Some(parent) && self.nodes[parent.index()].children.contains(&child) {
            return Ok(());
        }
        if parent == child || self.ancestors(parent).any(|a| a == child) {
            return Err(Error::CyclicAttachment { parent, child });
        }

        if let Some(previous) = previous {
            self.nodes[previous.index()].children.retain(|&c| c != child);
        }
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
        Ok(())
    }

    /// Detach `child` from its parent. The node stays in the arena.
    pub fn detach(&mut self, child: NodeId) -> Result<()> {
        if let Some(parent) = self.get(child)?.parent {
            self.nodes[parent.index()].children.retain(|&c| c != child);
            self.nodes[child.index()].parent = None;
        }
        Ok(())
    }

    /// Ancestors of `id`, nearest first, not including `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&a| self.parent(a))
    }

    /// Nearest ancestor of `id` with the given tag.
    pub fn enclosing(&self, id: NodeId, tag: ChunkId) -> Option<NodeId> {
        self.ancestors(id).find(|&a| self.tag(a) == Some(tag))
    }

    /// First child of `id` with the given tag.
    pub fn child_with_tag(&self, id: NodeId, tag: ChunkId) -> Option<NodeId> {
        self.children_with_tag(id, tag).next()
    }

    /// Children of `id` with the given tag, in order.
    pub fn children_with_tag(&self, id: NodeId, tag: ChunkId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.tag(c) == Some(tag))
    }

    /// First struct child of `id`.
    pub fn struct_child(&self, id: NodeId) -> Option<NodeId> {
        self.child_with_tag(id, ChunkId::STRUCT)
    }

    /// Body of the first struct child of `id`.
    pub fn struct_body(&self, id: NodeId) -> Option<&NodeBody> {
        self.struct_child(id).and_then(|s| self.node(s)).map(|n| &n.body)
    }

    /// Pre-order walk of the subtree rooted at `id`, including `id`.
    pub fn iter_subtree(&self, id: NodeId) -> SubtreeIter<'_> {
        let stack = if self.node(id).is_some() { vec![(id, 0)] } else { Vec::new() };
        SubtreeIter { tree: self, stack }
    }

    /// Borrow `id` for structural comparison or serialization.
    pub fn node_ref(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    /// Schema context for reading or writing the payload of `id`.
    pub fn schema_context(&self, id: NodeId) -> SchemaContext {
        let version = self.node(id).map_or(0, |n| n.version);
        self.context_under(self.parent(id), version)
    }

    /// Schema context for a node with `version` placed under `parent`.
    pub(crate) fn context_under(&self, parent: Option<NodeId>, version: u32) -> SchemaContext {
        SchemaContext::new(version).with_geometry(parent.and_then(|p| self.geometry_info(p)))
    }

    /// What the geometry at or above `id` declares about its vertices.
    fn geometry_info(&self, id: NodeId) -> Option<GeometryInfo> {
        let geometry = if self.tag(id) == Some(ChunkId::GEOMETRY) {
            id
        } else {
            self.enclosing(id, ChunkId::GEOMETRY)?
        };
        let g = self.struct_body(geometry)?.as_geometry_struct()?;
        Some(GeometryInfo {
            vertex_count: g.vertex_count,
            native: g.is_native(),
        })
    }

    /// Drop every node allocated after `len`.
    ///
    /// Only valid when those nodes are not referenced by earlier ones
    /// except as children, which is the case for an aborted decode.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len >= self.nodes.len() {
            return;
        }
        self.nodes.truncate(len);
        let limit = len as u32;
        for node in &mut self.nodes {
            node.children.retain(|c| c.0 < limit);
        }
    }
}

/// Pre-order iterator over a subtree, yielding each node with its depth
/// relative to the subtree root.
pub struct SubtreeIter<'a> {
    tree: &'a NodeTree,
    stack: Vec<(NodeId, usize)>,
}

impl Iterator for SubtreeIter<'_> {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        let children = self.tree.children(id);
        self.stack.extend(children.iter().rev().map(|&c| (c, depth + 1)));
        Some((id, depth))
    }
}

/// A node together with its tree.
///
/// Equality is structural: tags, versions, bodies and children in order.
/// Arena positions and cached payload sizes are ignored.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a NodeTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn new(tree: &'a NodeTree, id: NodeId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> Option<&'a Node> {
        self.tree.node(self.id)
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        tree.children(self.id).iter().map(move |&id| NodeRef { tree, id })
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(*self, *other)];
        while let Some((x, y)) = pending.pop() {
            match (x.node(), y.node()) {
                (Some(a), Some(b)) => {
                    if a.tag != b.tag
                        || a.version != b.version
                        || a.body != b.body
                        || a.children.len() != b.children.len()
                    {
                        return false;
                    }
                    pending.extend(x.children().zip(y.children()));
                }
                (None, None) => {}
                _ => return false,
            }
        }
        true
    }
}

/// A [`NodeRef`] at a known depth below the node being formatted.
#[derive(Clone, Copy)]
struct Nested<'a> {
    node: NodeRef<'a>,
    depth: usize,
}

impl<'a> Nested<'a> {
    fn children(&self) -> impl Iterator<Item = Nested<'a>> + 'a {
        let depth = self.depth + 1;
        self.node.children().map(move |node| Nested { node, depth })
    }
}

impl fmt::Debug for Nested<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(node) = self.node.node() else {
            return write!(f, "<missing {:?}>", self.node.id);
        };
        let mut s = f.debug_struct("Node");
        s.field("tag", &node.tag)
            .field("version", &format_args!("{:#x}", node.version))
            .field("body", &node.body);
        if !node.children.is_empty() {
            if self.depth + 1 >= MAX_NESTING_DEPTH {
                s.field("children", &format_args!("<{} nested too deep>", node.children.len()));
            } else {
                s.field("children", &self.children().collect::<Vec<_>>());
            }
        }
        s.finish()
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Nested { node: *self, depth: 0 }, f)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Nested<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::{Error as _, SerializeStruct};

        let node = self.node.tree.get(self.node.id).map_err(S::Error::custom)?;
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(S::Error::custom(format_args!(
                "{} node nests deeper than {} levels",
                node.tag, MAX_NESTING_DEPTH
            )));
        }
        let children: Vec<Nested<'_>> = self.children().collect();

        let mut state = serializer.serialize_struct("Node", 4)?;
        state.serialize_field("tag", &node.tag)?;
        state.serialize_field("version", &node.version)?;
        state.serialize_field("body", &node.body)?;
        state.serialize_field("children", &children)?;
        state.end()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for NodeRef<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&Nested { node: *self, depth: 0 }, serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{RMD_VERSION, RW_VERSION};
    use crate::nodes::{geometry_flags, GeometryStruct};

    fn clump_with_extension(tree: &mut NodeTree) -> (NodeId, NodeId) {
        let clump = tree.add(ChunkId::CLUMP, NodeBody::Container);
        let ext = tree.add_child(clump, ChunkId::EXTENSION, NodeBody::Container).unwrap();
        (clump, ext)
    }

    #[test]
    fn test_add_uses_version_epoch() {
        let mut tree = NodeTree::new();
        let clump = tree.add(ChunkId::CLUMP, NodeBody::Container);
        let marker = tree.add(ChunkId::RMD_ANIMATION_TERMINATOR, NodeBody::Empty);
        assert_eq!(tree.get(clump).unwrap().version, RW_VERSION);
        assert_eq!(tree.get(marker).unwrap().version, RMD_VERSION);
    }

    #[test]
    fn test_attach_child_is_idempotent() {
        let mut tree = NodeTree::new();
        let (clump, ext) = clump_with_extension(&mut tree);
        tree.attach_child(clump, ext).unwrap();
        tree.attach_child(clump, ext).unwrap();
        assert_eq!(tree.children(clump), &[ext]);
        assert_eq!(tree.parent(ext), Some(clump));
    }

    #[test]
    fn test_attach_child_moves_between_parents() {
        let mut tree = NodeTree::new();
        let (clump, ext) = clump_with_extension(&mut tree);
        let other = tree.add(ChunkId::ATOMIC, NodeBody::Container);

        tree.attach_child(other, ext).unwrap();
        assert!(tree.children(clump).is_empty());
        assert_eq!(tree.children(other), &[ext]);
        assert_eq!(tree.parent(ext), Some(other));
    }

    #[test]
    fn test_attach_child_rejects_cycles() {
        let mut tree = NodeTree::new();
        let (clump, ext) = clump_with_extension(&mut tree);
        assert!(matches!(
            tree.attach_child(ext, clump),
            Err(Error::CyclicAttachment { .. })
        ));
        assert!(matches!(
            tree.attach_child(clump, clump),
            Err(Error::CyclicAttachment { .. })
        ));
    }

    #[test]
    fn test_unknown_node() {
        let tree = NodeTree::new();
        assert!(matches!(tree.get(NodeId(3)), Err(Error::UnknownNode(_))));
        assert!(tree.children(NodeId(3)).is_empty());
        assert_eq!(tree.iter_subtree(NodeId(3)).count(), 0);
    }

    #[test]
    fn test_enclosing_and_queries() {
        let mut tree = NodeTree::new();
        let geometry = tree.add(ChunkId::GEOMETRY, NodeBody::Container);
        let geometry_struct = GeometryStruct {
            flags: geometry_flags::NATIVE,
            vertex_count: 12,
            ..GeometryStruct::default()
        };
        tree.add_child(geometry, ChunkId::STRUCT, NodeBody::GeometryStruct(geometry_struct))
            .unwrap();
        let ext = tree.add_child(geometry, ChunkId::EXTENSION, NodeBody::Container).unwrap();
        let skin = tree
            .add_child(ext, ChunkId::SKIN, NodeBody::Opaque(Vec::new()))
            .unwrap();

        assert_eq!(tree.enclosing(skin, ChunkId::GEOMETRY), Some(geometry));
        assert_eq!(tree.enclosing(skin, ChunkId::CLUMP), None);
        assert_eq!(tree.child_with_tag(geometry, ChunkId::EXTENSION), Some(ext));

        let ctx = tree.schema_context(skin);
        assert_eq!(
            ctx.geometry,
            Some(GeometryInfo {
                vertex_count: 12,
                native: true
            })
        );
    }

    #[test]
    fn test_iter_subtree_preorder() {
        let mut tree = NodeTree::new();
        let root = tree.add(ChunkId::CLUMP, NodeBody::Container);
        let a = tree.add_child(root, ChunkId::FRAME_LIST, NodeBody::Container).unwrap();
        let a1 = tree.add_child(a, ChunkId::EXTENSION, NodeBody::Container).unwrap();
        let b = tree.add_child(root, ChunkId::GEOMETRY_LIST, NodeBody::Container).unwrap();

        let order: Vec<_> = tree.iter_subtree(root).collect();
        assert_eq!(order, vec![(root, 0), (a, 1), (a1, 2), (b, 1)]);
    }

    #[test]
    fn test_node_ref_ignores_arena_layout() {
        let mut left = NodeTree::new();
        let l = left.add(ChunkId::CLUMP, NodeBody::Container);
        left.add_child(l, ChunkId::STRING, NodeBody::String("a".into())).unwrap();

        let mut right = NodeTree::new();
        right.add(ChunkId::WORLD, NodeBody::Container);
        let r = right.add(ChunkId::CLUMP, NodeBody::Container);
        let s = right
            .add_child(r, ChunkId::STRING, NodeBody::String("a".into()))
            .unwrap();
        right.get(s).unwrap().set_payload_size(4);

        assert_eq!(left.node_ref(l), right.node_ref(r));

        right.get_mut(s).unwrap().body = NodeBody::String("b".into());
        assert_ne!(left.node_ref(l), right.node_ref(r));
    }

    #[test]
    fn test_truncate_drops_dangling_children() {
        let mut tree = NodeTree::new();
        let root = tree.add(ChunkId::CLUMP, NodeBody::Container);
        tree.add_child(root, ChunkId::EXTENSION, NodeBody::Container).unwrap();
        tree.truncate(1);
        assert_eq!(tree.len(), 1);
        assert!(tree.children(root).is_empty());
    }

    fn chain(tree: &mut NodeTree, levels: usize) -> NodeId {
        let root = tree.add(ChunkId::EXTENSION, NodeBody::Container);
        let mut leaf = root;
        for _ in 1..levels {
            leaf = tree.add_child(leaf, ChunkId::EXTENSION, NodeBody::Container).unwrap();
        }
        root
    }

    #[test]
    fn test_node_ref_handles_deep_chains() {
        let mut left = NodeTree::new();
        let l = chain(&mut left, 20_000);
        let mut right = NodeTree::new();
        let r = chain(&mut right, 20_000);
        assert_eq!(left.node_ref(l), right.node_ref(r));

        let leaf = left.iter_subtree(l).last().unwrap().0;
        left.get_mut(leaf).unwrap().version = RMD_VERSION;
        assert_ne!(left.node_ref(l), right.node_ref(r));

        let debug = format!("{:?}", left.node_ref(l));
        assert!(debug.contains("nested too deep"));
    }
}
