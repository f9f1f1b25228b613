//! RMD scene container.
//!
//! An RMD file is a bare run of top-level chunks with no enclosing root.
//! Loading sorts them into the scene's parts; saving writes the parts back
//! in a fixed order:
//!
//! ```text
//! animation count    (only when animation sets exist)
//! misc chunks        (in load order)
//! texture dictionary
//! clumps
//! node-link list     (only when it holds links)
//! animation sets     (members, then one terminator each)
//! ```
//!
//! Misc chunks that were interleaved with clumps or animation sets in the
//! original file therefore move. Everything else keeps its relative order.

use log::{debug, warn};
use rmdkit_common::{BinaryReader, BinaryWriter};
use rmdkit_rw::nodes::{AnimationCount, NodeLinkList};
use rmdkit_rw::{read_header, ChunkHeader, ChunkId, NodeBody, NodeId, NodeRef, NodeTree};

use crate::animation::{is_animation_set_member, AnimationSet};
use crate::{Error, Result};

/// A decoded RMD scene.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    tree: NodeTree,
    texture_dictionary: Option<NodeId>,
    clumps: Vec<NodeId>,
    node_links: Option<NodeId>,
    animation_sets: Vec<AnimationSet>,
    misc: Vec<NodeId>,
}

impl Scene {
    /// An empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a whole RMD file.
    pub fn load(data: &[u8]) -> Result<Self> {
        let mut tree = NodeTree::new();
        let roots = tree.load_all(data)?;
        Ok(Self::from_roots(tree, roots))
    }

    /// Build a scene from already decoded top-level chunks.
    pub fn from_roots(tree: NodeTree, roots: Vec<NodeId>) -> Self {
        let mut scene = Self {
            tree,
            ..Self::default()
        };

        let unfiltered = scene.classify(roots);
        scene.group(unfiltered);

        debug!(
            "scene: {} clumps, {} animation sets, {} misc chunks, texture dictionary: {}",
            scene.clumps.len(),
            scene.animation_sets.len(),
            scene.misc.len(),
            scene.texture_dictionary.is_some()
        );
        scene
    }

    /// Route each top-level chunk into its slot; return the rest in order.
    fn classify(&mut self, roots: Vec<NodeId>) -> Vec<NodeId> {
        let mut unfiltered = Vec::new();
        for id in roots {
            let Some(tag) = self.tree.tag(id) else {
                continue;
            };
            match tag {
                ChunkId::RMD_ANIMATION_COUNT => {
                    debug!("dropping animation count marker, it is rewritten on save");
                }
                ChunkId::RMD_AUTHOR => {
                    debug!("dropping author marker");
                }
                ChunkId::TEXTURE_DICTIONARY => {
                    if self.texture_dictionary.replace(id).is_some() {
                        warn!("scene has more than one texture dictionary, keeping the last");
                    }
                }
                ChunkId::CLUMP => self.clumps.push(id),
                ChunkId::RMD_NODE_LINK_LIST if self.is_empty_link_list(id) => {
                    debug!("dropping empty node-link list");
                }
                ChunkId::RMD_NODE_LINK_LIST => {
                    if self.node_links.replace(id).is_some() {
                        warn!("scene has more than one node-link list, keeping the last");
                    }
                }
                _ => unfiltered.push(id),
            }
        }
        unfiltered
    }

    /// Split the unfiltered chunks into animation sets and misc chunks.
    ///
    /// A set opens at a member tag and takes every following chunk up to a
    /// terminator, which is dropped, or to the end.
    fn group(&mut self, unfiltered: Vec<NodeId>) {
        let mut current: Option<AnimationSet> = None;
        for id in unfiltered {
            let tag = self.tree.tag(id).unwrap_or(ChunkId(0));
            if tag == ChunkId::RMD_ANIMATION_TERMINATOR {
                match current.take() {
                    Some(set) => self.animation_sets.push(set),
                    None => self.misc.push(id),
                }
            } else if let Some(set) = current.as_mut() {
                set.push(id);
            } else if is_animation_set_member(tag) {
                current = Some(AnimationSet::new(vec![id]));
            } else {
                self.misc.push(id);
            }
        }
        if let Some(set) = current {
            self.animation_sets.push(set);
        }
    }

    /// Encode the scene in canonical order.
    pub fn save(&self) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        let markers = Markers::new(self.animation_sets.len())?;

        if !self.animation_sets.is_empty() {
            markers.write_count(&mut writer)?;
        }
        for &id in &self.misc {
            self.tree.write_node(id, &mut writer)?;
        }
        if let Some(id) = self.texture_dictionary {
            self.tree.write_node(id, &mut writer)?;
        }
        for &id in &self.clumps {
            self.tree.write_node(id, &mut writer)?;
        }
        if let Some(id) = self.written_node_links() {
            self.tree.write_node(id, &mut writer)?;
        }
        for set in &self.animation_sets {
            self.write_animation_set(set, &markers, &mut writer)?;
        }

        Ok(writer.into_inner())
    }

    fn write_animation_set(
        &self,
        set: &AnimationSet,
        markers: &Markers,
        writer: &mut BinaryWriter,
    ) -> Result<()> {
        for &id in set.members() {
            self.tree.write_node(id, writer)?;
        }
        markers.write_terminator(writer)
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut NodeTree {
        &mut self.tree
    }

    pub fn texture_dictionary(&self) -> Option<NodeId> {
        self.texture_dictionary
    }

    pub fn set_texture_dictionary(&mut self, id: Option<NodeId>) {
        self.texture_dictionary = id;
    }

    pub fn clumps(&self) -> &[NodeId] {
        &self.clumps
    }

    pub fn clumps_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.clumps
    }

    /// The node-link list chunk.
    pub fn node_link_list(&self) -> Option<NodeId> {
        self.node_links
    }

    pub fn set_node_link_list(&mut self, id: Option<NodeId>) {
        self.node_links = id;
    }

    /// Decoded node links, if the scene has a node-link list.
    pub fn node_links(&self) -> Option<&NodeLinkList> {
        self.tree.node(self.node_links?)?.body.as_node_link_list()
    }

    pub fn animation_sets(&self) -> &[AnimationSet] {
        &self.animation_sets
    }

    pub fn animation_sets_mut(&mut self) -> &mut Vec<AnimationSet> {
        &mut self.animation_sets
    }

    /// Top-level chunks that belong to no other part.
    pub fn misc(&self) -> &[NodeId] {
        &self.misc
    }

    pub fn misc_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.misc
    }

    /// Decode a single texture dictionary chunk into this scene, replacing
    /// the current one.
    pub fn load_texture_dictionary(&mut self, data: &[u8]) -> Result<NodeId> {
        let id = self.load_single(data, ChunkId::TEXTURE_DICTIONARY, "TextureDictionary")?;
        self.texture_dictionary = Some(id);
        Ok(id)
    }

    /// Decode a single clump chunk and append it to this scene.
    pub fn load_clump(&mut self, data: &[u8]) -> Result<NodeId> {
        let id = self.load_single(data, ChunkId::CLUMP, "Clump")?;
        self.clumps.push(id);
        Ok(id)
    }

    /// Decode one animation set, as written by
    /// [`save_animation_set`](Self::save_animation_set), and append it.
    ///
    /// The terminator is optional.
    pub fn load_animation_set(&mut self, data: &[u8]) -> Result<usize> {
        let headers = top_level_headers(data)?;
        let first = headers[0].id();
        if !is_animation_set_member(first) {
            return Err(Error::UnexpectedNode {
                expected: "animation set member",
                actual: first,
            });
        }
        if let Some(end) = headers
            .iter()
            .position(|h| h.id() == ChunkId::RMD_ANIMATION_TERMINATOR)
        {
            if end + 1 < headers.len() {
                return Err(Error::TrailingNodes {
                    count: headers.len() - end - 1,
                });
            }
        }

        let members = self
            .tree
            .load_all(data)?
            .into_iter()
            .filter(|&id| self.tree.tag(id) != Some(ChunkId::RMD_ANIMATION_TERMINATOR))
            .collect();
        self.animation_sets.push(AnimationSet::new(members));
        Ok(self.animation_sets.len() - 1)
    }

    fn load_single(&mut self, data: &[u8], tag: ChunkId, expected: &'static str) -> Result<NodeId> {
        let header = read_header(&mut BinaryReader::new(data))?;
        if header.id() != tag {
            return Err(Error::UnexpectedNode {
                expected,
                actual: header.id(),
            });
        }
        Ok(self.tree.load_node(data)?)
    }

    /// Encode only the texture dictionary.
    pub fn save_texture_dictionary(&self) -> Result<Vec<u8>> {
        let id = self.texture_dictionary.ok_or(Error::IndexOutOfRange {
            kind: "texture dictionary",
            index: 0,
            len: 0,
        })?;
        Ok(self.tree.save_node(id)?)
    }

    /// Encode only the clump at `index`.
    pub fn save_clump(&self, index: usize) -> Result<Vec<u8>> {
        let &id = self.clumps.get(index).ok_or(Error::IndexOutOfRange {
            kind: "clump",
            index,
            len: self.clumps.len(),
        })?;
        Ok(self.tree.save_node(id)?)
    }

    /// Encode only the animation set at `index`, terminator included.
    pub fn save_animation_set(&self, index: usize) -> Result<Vec<u8>> {
        let set = self.animation_sets.get(index).ok_or(Error::IndexOutOfRange {
            kind: "animation set",
            index,
            len: self.animation_sets.len(),
        })?;
        let markers = Markers::new(self.animation_sets.len())?;
        let mut writer = BinaryWriter::new();
        self.write_animation_set(set, &markers, &mut writer)?;
        Ok(writer.into_inner())
    }

    fn is_empty_link_list(&self, id: NodeId) -> bool {
        self.tree
            .node(id)
            .and_then(|n| n.body.as_node_link_list())
            .is_some_and(NodeLinkList::is_empty)
    }

    /// The node-link list as [`save`](Self::save) writes it: absent when it
    /// holds no links.
    fn written_node_links(&self) -> Option<NodeId> {
        self.node_links.filter(|&id| !self.is_empty_link_list(id))
    }

    fn node_ref(&self, id: NodeId) -> NodeRef<'_> {
        self.tree.node_ref(id)
    }

    fn refs(&self, ids: &[NodeId]) -> Vec<NodeRef<'_>> {
        ids.iter().map(|&id| self.node_ref(id)).collect()
    }
}

/// Headers of the top-level chunks in `data`, without decoding payloads.
fn top_level_headers(data: &[u8]) -> Result<Vec<ChunkHeader>> {
    let mut reader = BinaryReader::new(data);
    let mut headers = Vec::new();
    loop {
        let offset = reader.offset();
        let header = read_header(&mut reader)?;
        if header.size as usize > reader.remaining() {
            return Err(rmdkit_rw::Error::Truncated {
                tag: header.id(),
                offset,
                declared: header.size,
                available: reader.remaining(),
            }
            .into());
        }
        reader.read_bytes(header.size as usize)?;
        headers.push(header);
        if reader.is_empty() {
            return Ok(headers);
        }
    }
}

/// The animation count and terminator chunks regenerated on save.
struct Markers {
    tree: NodeTree,
    count: NodeId,
    terminator: NodeId,
}

impl Markers {
    fn new(set_count: usize) -> Result<Self> {
        let count = u16::try_from(set_count).map_err(|_| {
            rmdkit_rw::Error::InvalidNode {
                tag: ChunkId::RMD_ANIMATION_COUNT,
                reason: format!("{} animation sets do not fit the count marker", set_count),
            }
        })?;
        let mut tree = NodeTree::new();
        let count = tree.add(
            ChunkId::RMD_ANIMATION_COUNT,
            NodeBody::AnimationCount(AnimationCount::new(count)),
        );
        let terminator = tree.add(ChunkId::RMD_ANIMATION_TERMINATOR, NodeBody::Empty);
        Ok(Self {
            tree,
            count,
            terminator,
        })
    }

    fn write_count(&self, writer: &mut BinaryWriter) -> Result<()> {
        Ok(self.tree.write_node(self.count, writer)?)
    }

    fn write_terminator(&self, writer: &mut BinaryWriter) -> Result<()> {
        Ok(self.tree.write_node(self.terminator, writer)?)
    }
}

impl PartialEq for Scene {
    /// Structural equality of every part; arena layout is ignored.
    fn eq(&self, other: &Self) -> bool {
        let opt = |a: Option<NodeId>, b: Option<NodeId>| match (a, b) {
            (Some(a), Some(b)) => self.node_ref(a) == other.node_ref(b),
            (None, None) => true,
            _ => false,
        };
        let list = |a: &[NodeId], b: &[NodeId]| self.refs(a) == other.refs(b);

        opt(self.texture_dictionary, other.texture_dictionary)
            && list(&self.clumps, &other.clumps)
            && opt(self.written_node_links(), other.written_node_links())
            && list(&self.misc, &other.misc)
            && self.animation_sets.len() == other.animation_sets.len()
            && self
                .animation_sets
                .iter()
                .zip(&other.animation_sets)
                .all(|(a, b)| list(a.members(), b.members()))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Scene {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let sets: Vec<Vec<NodeRef<'_>>> = self.animation_sets.iter().map(|s| self.refs(s.members())).collect();

        let mut state = serializer.serialize_struct("Scene", 5)?;
        state.serialize_field("texture_dictionary", &self.texture_dictionary.map(|id| self.node_ref(id)))?;
        state.serialize_field("clumps", &self.refs(&self.clumps))?;
        state.serialize_field("node_links", &self.written_node_links().map(|id| self.node_ref(id)))?;
        state.serialize_field("animation_sets", &sets)?;
        state.serialize_field("misc", &self.refs(&self.misc))?;
        state.end()
    }
}
