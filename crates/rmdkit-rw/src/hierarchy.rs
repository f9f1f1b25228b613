//! Frame hierarchy and skin bone remapping.
//!
//! A frame list stores frames flat, each with the index of its parent. The
//! animation hierarchy numbers bones separately: every animated frame carries
//! an H-Anim plugin with a name id, and one root plugin lists the hierarchy
//! as `(name id, hierarchy index)` pairs. Skin bone indices are hierarchy
//! indices, so they must be remapped through the name ids before use.
//!
//! The format has no reverse index, so both directions are linear scans.
//! A [`FrameHierarchy`] borrows its tree; mutating the frame list ends the
//! borrow and with it any stale view.

use glam::Mat4;

use crate::nodes::{Frame, HAnimPlugin, NodeBody, SkinPlugin};
use crate::tree::{NodeId, NodeTree};
use crate::{ChunkId, Error, Result};

/// A bone of the animation hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub hierarchy_index: usize,
    pub frame_index: usize,
    pub name_id: u32,
    pub world_transform: Mat4,
    pub children: Vec<Bone>,
}

/// Read-only view over a frame list.
#[derive(Debug)]
pub struct FrameHierarchy<'a> {
    frames: &'a [Frame],
    /// H-Anim plugin of each flat frame, if it has one.
    plugins: Vec<Option<&'a HAnimPlugin>>,
    /// The plugin that carries the hierarchy table.
    table: Option<&'a HAnimPlugin>,
}

impl<'a> FrameHierarchy<'a> {
    /// View the frame list `frame_list`.
    ///
    /// The i-th extension child of the frame list belongs to the i-th frame.
    pub fn new(tree: &'a NodeTree, frame_list: NodeId) -> Result<Self> {
        let node = tree.get(frame_list)?;
        if node.tag != ChunkId::FRAME_LIST {
            return Err(Error::InvalidNode {
                tag: node.tag,
                reason: "not a frame list".to_string(),
            });
        }

        let frames = match tree.struct_body(frame_list) {
            Some(NodeBody::FrameListStruct(s)) => s.frames.as_slice(),
            _ => {
                return Err(Error::MissingChild {
                    parent: ChunkId::FRAME_LIST,
                    expected: ChunkId::STRUCT,
                })
            }
        };

        let mut plugins = vec![None; frames.len()];
        for (slot, ext) in plugins
            .iter_mut()
            .zip(tree.children_with_tag(frame_list, ChunkId::EXTENSION))
        {
            *slot = tree
                .child_with_tag(ext, ChunkId::HANIM)
                .and_then(|h| tree.node(h))
                .and_then(|n| n.body.as_hanim());
        }
        let table = plugins.iter().flatten().copied().find(|p| p.is_root());

        Ok(Self {
            frames,
            plugins,
            table,
        })
    }

    pub fn frames(&self) -> &'a [Frame] {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// H-Anim plugin attached to the frame at `index`.
    pub fn hanim(&self, index: usize) -> Option<&'a HAnimPlugin> {
        self.plugins.get(index).copied().flatten()
    }

    pub fn local_transform(&self, index: usize) -> Option<Mat4> {
        self.frames.get(index).map(|f| f.transform)
    }

    /// World transform of the frame at `index`: its local transform composed
    /// with every ancestor's. `None` if the index or a parent link is invalid.
    pub fn world_transform(&self, index: usize) -> Option<Mat4> {
        let mut world = self.frames.get(index)?.transform;
        let mut current = index;
        for _ in 0..self.frames.len() {
            match self.frames[current].parent() {
                None => return Some(world),
                Some(parent) => {
                    world = self.frames.get(parent)?.transform * world;
                    current = parent;
                }
            }
        }
        None
    }

    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.frames.get(index)?.parent()
    }

    /// Flat indices of the frames parented to `index`, in order.
    pub fn children_of(&self, index: usize) -> Vec<usize> {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.parent() == Some(index))
            .map(|(i, _)| i)
            .collect()
    }

    /// Hierarchy index of the frame at flat index `flat`.
    pub fn flat_to_hierarchy_index(&self, flat: usize) -> Option<usize> {
        let name_id = self.hanim(flat)?.name_id;
        self.table?
            .nodes
            .iter()
            .find(|n| n.name_id == name_id)
            .map(|n| n.index as usize)
    }

    /// Flat index of the frame with hierarchy index `hierarchy`.
    pub fn hierarchy_to_flat_index(&self, hierarchy: usize) -> Option<usize> {
        let name_id = self
            .table?
            .nodes
            .iter()
            .find(|n| n.index as usize == hierarchy)?
            .name_id;
        self.plugins
            .iter()
            .position(|p| p.is_some_and(|p| p.name_id == name_id))
    }

    /// The animation hierarchy as a tree of bones, in hierarchy order.
    ///
    /// A bone's parent is its nearest ancestor frame that is itself a bone.
    pub fn bone_tree(&self) -> Vec<Bone> {
        let Some(table) = self.table else {
            return Vec::new();
        };

        // (hierarchy index, flat index, name id) of every resolvable bone.
        let bones: Vec<(usize, usize, u32)> = table
            .nodes
            .iter()
            .filter_map(|n| {
                let h = n.index as usize;
                Some((h, self.hierarchy_to_flat_index(h)?, n.name_id))
            })
            .collect();

        let bone_parent = |flat: usize| -> Option<usize> {
            let mut current = flat;
            for _ in 0..self.frames.len() {
                current = self.parent_of(current)?;
                if let Some(pos) = bones.iter().position(|b| b.1 == current) {
                    return Some(pos);
                }
            }
            None
        };
        let parents: Vec<Option<usize>> = bones.iter().map(|b| bone_parent(b.1)).collect();

        fn build(
            pos: usize,
            bones: &[(usize, usize, u32)],
            parents: &[Option<usize>],
            hierarchy: &FrameHierarchy<'_>,
        ) -> Bone {
            let (hierarchy_index, frame_index, name_id) = bones[pos];
            Bone {
                hierarchy_index,
                frame_index,
                name_id,
                world_transform: hierarchy.world_transform(frame_index).unwrap_or(Mat4::IDENTITY),
                children: (0..bones.len())
                    .filter(|&c| parents[c] == Some(pos))
                    .map(|c| build(c, bones, parents, hierarchy))
                    .collect(),
            }
        }

        (0..bones.len())
            .filter(|&pos| parents[pos].is_none())
            .map(|pos| build(pos, &bones, &parents, self))
            .collect()
    }

    /// Flat frame index of each bone influencing each vertex of `skin`.
    ///
    /// Slots with zero weight, or whose hierarchy index does not resolve,
    /// are `None`.
    pub fn skin_bone_frames(&self, skin: &SkinPlugin) -> Vec<[Option<usize>; 4]> {
        skin.bone_indices
            .iter()
            .zip(&skin.weights)
            .map(|(indices, weights)| {
                let mut frames = [None; 4];
                for (slot, (&bone, &weight)) in frames.iter_mut().zip(indices.iter().zip(weights)) {
                    if weight != 0.0 {
                        *slot = self.hierarchy_to_flat_index(bone as usize);
                    }
                }
                frames
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{FrameListStruct, HAnimNode};
    use glam::Vec3;

    /// Four frames: a root, a dummy child without plugin, and two bones
    /// under it. Hierarchy indices are assigned in reverse name order.
    fn skeleton() -> (NodeTree, NodeId) {
        let mut tree = NodeTree::new();
        let frame_list = tree.add(ChunkId::FRAME_LIST, NodeBody::Container);

        let frames = vec![
            Frame::root(Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0))),
            Frame::child_of(0, Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0))),
            Frame::child_of(1, Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0))),
            Frame::child_of(1, Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0))),
        ];
        tree.add_child(
            frame_list,
            ChunkId::STRUCT,
            NodeBody::FrameListStruct(FrameListStruct { frames }),
        )
        .unwrap();

        let table = vec![
            HAnimNode { name_id: 30, index: 0, flags: 0 },
            HAnimNode { name_id: 20, index: 1, flags: 2 },
            HAnimNode { name_id: 10, index: 2, flags: 1 },
        ];
        let plugins = [
            Some(HAnimPlugin {
                name_id: 30,
                nodes: table,
                ..HAnimPlugin::default()
            }),
            None,
            Some(HAnimPlugin::tag(10)),
            Some(HAnimPlugin::tag(20)),
        ];
        for plugin in plugins {
            let ext = tree
                .add_child(frame_list, ChunkId::EXTENSION, NodeBody::Container)
                .unwrap();
            if let Some(plugin) = plugin {
                tree.add_child(ext, ChunkId::HANIM, NodeBody::HAnim(plugin)).unwrap();
            }
        }
        (tree, frame_list)
    }

    #[test]
    fn test_remap_is_inverse() {
        let (tree, frame_list) = skeleton();
        let hierarchy = FrameHierarchy::new(&tree, frame_list).unwrap();

        assert_eq!(hierarchy.flat_to_hierarchy_index(0), Some(0));
        assert_eq!(hierarchy.flat_to_hierarchy_index(1), None);
        assert_eq!(hierarchy.flat_to_hierarchy_index(2), Some(2));
        assert_eq!(hierarchy.flat_to_hierarchy_index(3), Some(1));

        for flat in 0..hierarchy.len() {
            if let Some(h) = hierarchy.flat_to_hierarchy_index(flat) {
                assert_eq!(hierarchy.hierarchy_to_flat_index(h), Some(flat));
            }
        }
        assert_eq!(hierarchy.hierarchy_to_flat_index(7), None);
    }

    #[test]
    fn test_world_transform_composes_parents() {
        let (tree, frame_list) = skeleton();
        let hierarchy = FrameHierarchy::new(&tree, frame_list).unwrap();

        assert_eq!(hierarchy.world_transform(0), hierarchy.local_transform(0));
        let world = hierarchy.world_transform(2).unwrap();
        assert_eq!(world.w_axis.truncate(), Vec3::new(1.0, 1.0, 2.0));
        assert_eq!(hierarchy.world_transform(9), None);
        assert_eq!(hierarchy.children_of(1), vec![2, 3]);
        assert_eq!(hierarchy.parent_of(3), Some(1));
    }

    #[test]
    fn test_cyclic_parents_have_no_world_transform() {
        let mut tree = NodeTree::new();
        let frame_list = tree.add(ChunkId::FRAME_LIST, NodeBody::Container);
        let frames = vec![
            Frame::child_of(1, Mat4::IDENTITY),
            Frame::child_of(0, Mat4::IDENTITY),
        ];
        tree.add_child(
            frame_list,
            ChunkId::STRUCT,
            NodeBody::FrameListStruct(FrameListStruct { frames }),
        )
        .unwrap();
        let hierarchy = FrameHierarchy::new(&tree, frame_list).unwrap();
        assert_eq!(hierarchy.world_transform(0), None);
    }

    #[test]
    fn test_bone_tree_skips_plain_frames() {
        let (tree, frame_list) = skeleton();
        let bones = FrameHierarchy::new(&tree, frame_list).unwrap().bone_tree();

        assert_eq!(bones.len(), 1);
        let root = &bones[0];
        assert_eq!(root.frame_index, 0);
        let children: Vec<_> = root.children.iter().map(|b| b.hierarchy_index).collect();
        assert_eq!(children, vec![1, 2]);
        assert_eq!(root.children[0].frame_index, 3);
        assert_eq!(
            root.children[0].world_transform.w_axis.truncate(),
            Vec3::new(-1.0, 1.0, 2.0)
        );
    }

    #[test]
    fn test_skin_bone_frames() {
        let (tree, frame_list) = skeleton();
        let hierarchy = FrameHierarchy::new(&tree, frame_list).unwrap();
        let skin = SkinPlugin {
            bone_indices: vec![[1, 2, 0, 0], [0, 0, 0, 0]],
            weights: vec![[0.5, 0.5, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]],
            ..SkinPlugin::default()
        };
        assert_eq!(
            hierarchy.skin_bone_frames(&skin),
            vec![[Some(3), Some(2), None, None], [Some(0), None, None, None]]
        );
    }

    #[test]
    fn test_requires_frame_list() {
        let mut tree = NodeTree::new();
        let clump = tree.add(ChunkId::CLUMP, NodeBody::Container);
        assert!(FrameHierarchy::new(&tree, clump).is_err());

        let frame_list = tree.add(ChunkId::FRAME_LIST, NodeBody::Container);
        assert!(matches!(
            FrameHierarchy::new(&tree, frame_list),
            Err(Error::MissingChild { .. })
        ));
    }
}
