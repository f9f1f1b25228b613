//! Geometry struct and the mesh list (bin mesh) plugin.

use glam::{Vec2, Vec3, Vec4};
use rmdkit_common::{BinaryReader, BinaryWriter};

use super::{bounded_capacity, SchemaContext};
use crate::{ChunkId, Error, Result};

/// Geometry format flags.
pub mod geometry_flags {
    pub const TRISTRIP: u32 = 0x0000_0001;
    pub const POSITIONS: u32 = 0x0000_0002;
    pub const TEXTURED: u32 = 0x0000_0004;
    pub const PRELIT: u32 = 0x0000_0008;
    pub const NORMALS: u32 = 0x0000_0010;
    pub const LIGHT: u32 = 0x0000_0020;
    pub const MODULATE_MATERIAL_COLOR: u32 = 0x0000_0040;
    pub const TEXTURED2: u32 = 0x0000_0080;
    /// Vertex data lives in a platform-specific plugin instead of the struct.
    pub const NATIVE: u32 = 0x0100_0000;
}

/// Libraries before this version store surface properties in the
/// geometry struct instead of the material.
const GEOMETRY_SURFACE_VERSION: u32 = 0x34000;

/// Ambient, specular and diffuse lighting coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceProperties {
    pub ambient: f32,
    pub specular: f32,
    pub diffuse: f32,
}

impl Default for SurfaceProperties {
    fn default() -> Self {
        Self {
            ambient: 1.0,
            specular: 1.0,
            diffuse: 1.0,
        }
    }
}

impl SurfaceProperties {
    pub(crate) fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            ambient: reader.read_f32()?,
            specular: reader.read_f32()?,
            diffuse: reader.read_f32()?,
        })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_f32(self.ambient)?;
        writer.write_f32(self.specular)?;
        writer.write_f32(self.diffuse)?;
        Ok(())
    }
}

/// A triangle and the material it is drawn with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Triangle {
    pub vertices: [u16; 3],
    pub material: u16,
}

/// One morph target: a bounding sphere plus optional vertex streams.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MorphTarget {
    /// Center in xyz, radius in w.
    pub bounding_sphere: Vec4,
    pub positions: Option<Vec<Vec3>>,
    pub normals: Option<Vec<Vec3>>,
}

/// Struct of a geometry.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeometryStruct {
    /// Format flags, see [`geometry_flags`]. Bits 16..24 hold an explicit
    /// UV set count.
    pub flags: u32,
    pub triangle_count: u32,
    pub vertex_count: u32,
    /// Only present for libraries older than 3.4.
    pub surface: Option<SurfaceProperties>,
    pub prelit_colors: Vec<[u8; 4]>,
    pub uv_sets: Vec<Vec<Vec2>>,
    pub triangles: Vec<Triangle>,
    pub morph_targets: Vec<MorphTarget>,
}

impl GeometryStruct {
    /// Whether vertex data is stored natively by a platform plugin.
    pub fn is_native(&self) -> bool {
        self.flags & geometry_flags::NATIVE != 0
    }

    /// Number of UV sets implied by the flags.
    pub fn uv_set_count(&self) -> usize {
        let explicit = (self.flags >> 16) & 0xFF;
        if explicit != 0 {
            explicit as usize
        } else if self.flags & geometry_flags::TEXTURED2 != 0 {
            2
        } else if self.flags & geometry_flags::TEXTURED != 0 {
            1
        } else {
            0
        }
    }

    pub(crate) fn read(reader: &mut BinaryReader<'_>, ctx: &SchemaContext) -> Result<Self> {
        let flags = reader.read_u32()?;
        let triangle_count = reader.read_u32()?;
        let vertex_count = reader.read_u32()?;
        let morph_target_count = reader.read_u32()? as usize;

        let surface = if ctx.library_version < GEOMETRY_SURFACE_VERSION {
            Some(SurfaceProperties::read(reader)?)
        } else {
            None
        };

        let mut geometry = Self {
            flags,
            triangle_count,
            vertex_count,
            surface,
            ..Self::default()
        };
        let vertices = vertex_count as usize;

        if !geometry.is_native() {
            if flags & geometry_flags::PRELIT != 0 {
                geometry.prelit_colors = Vec::with_capacity(bounded_capacity(vertices, 4, reader));
                for _ in 0..vertices {
                    let rgba = reader.read_bytes(4)?;
                    geometry.prelit_colors.push([rgba[0], rgba[1], rgba[2], rgba[3]]);
                }
            }

            for _ in 0..geometry.uv_set_count() {
                let mut uvs = Vec::with_capacity(bounded_capacity(vertices, 8, reader));
                for _ in 0..vertices {
                    uvs.push(reader.read_vec2()?);
                }
                geometry.uv_sets.push(uvs);
            }

            let triangles = triangle_count as usize;
            geometry.triangles = Vec::with_capacity(bounded_capacity(triangles, 8, reader));
            for _ in 0..triangles {
                let v1 = reader.read_u16()?;
                let v0 = reader.read_u16()?;
                let material = reader.read_u16()?;
                let v2 = reader.read_u16()?;
                geometry.triangles.push(Triangle {
                    vertices: [v0, v1, v2],
                    material,
                });
            }
        }

        geometry.morph_targets = Vec::with_capacity(bounded_capacity(morph_target_count, 24, reader));
        for _ in 0..morph_target_count {
            let bounding_sphere = reader.read_vec4()?;
            let has_positions = reader.read_bool32()?;
            let has_normals = reader.read_bool32()?;
            let positions = if has_positions {
                Some(read_vec3_stream(reader, vertices)?)
            } else {
                None
            };
            let normals = if has_normals {
                Some(read_vec3_stream(reader, vertices)?)
            } else {
                None
            };
            geometry.morph_targets.push(MorphTarget {
                bounding_sphere,
                positions,
                normals,
            });
        }

        Ok(geometry)
    }

    /// Check that the vertex streams agree with the declared counts.
    pub fn validate(&self) -> Result<()> {
        let vertices = self.vertex_count as usize;
        let invalid = |reason: String| Error::InvalidNode {
            tag: ChunkId::GEOMETRY,
            reason,
        };

        if !self.is_native() {
            if self.flags & geometry_flags::PRELIT != 0 && self.prelit_colors.len() != vertices {
                return Err(invalid(format!(
                    "{} prelit colors for {} vertices",
                    self.prelit_colors.len(),
                    vertices
                )));
            }
            if self.uv_sets.len() != self.uv_set_count() {
                return Err(invalid(format!(
                    "{} UV sets but flags declare {}",
                    self.uv_sets.len(),
                    self.uv_set_count()
                )));
            }
            if let Some(set) = self.uv_sets.iter().find(|set| set.len() != vertices) {
                return Err(invalid(format!("UV set of {} for {} vertices", set.len(), vertices)));
            }
            if self.triangles.len() != self.triangle_count as usize {
                return Err(invalid(format!(
                    "{} triangles but count is {}",
                    self.triangles.len(),
                    self.triangle_count
                )));
            }
        }

        for target in &self.morph_targets {
            let streams = [target.positions.as_ref(), target.normals.as_ref()];
            if streams.iter().flatten().any(|s| s.len() != vertices) {
                return Err(invalid(format!(
                    "morph target stream does not match {} vertices",
                    vertices
                )));
            }
        }

        Ok(())
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter, ctx: &SchemaContext) -> Result<()> {
        self.validate()?;

        writer.write_u32(self.flags)?;
        writer.write_u32(self.triangle_count)?;
        writer.write_u32(self.vertex_count)?;
        writer.write_u32(self.morph_targets.len() as u32)?;

        if ctx.library_version < GEOMETRY_SURFACE_VERSION {
            self.surface.unwrap_or_default().write(writer)?;
        }

        if !self.is_native() {
            if self.flags & geometry_flags::PRELIT != 0 {
                for rgba in &self.prelit_colors {
                    writer.write_bytes(rgba)?;
                }
            }
            for uvs in &self.uv_sets {
                for uv in uvs {
                    writer.write_vec2(*uv)?;
                }
            }
            for triangle in &self.triangles {
                writer.write_u16(triangle.vertices[1])?;
                writer.write_u16(triangle.vertices[0])?;
                writer.write_u16(triangle.material)?;
                writer.write_u16(triangle.vertices[2])?;
            }
        }

        for target in &self.morph_targets {
            writer.write_vec4(target.bounding_sphere)?;
            writer.write_bool32(target.positions.is_some())?;
            writer.write_bool32(target.normals.is_some())?;
            for stream in [&target.positions, &target.normals].into_iter().flatten() {
                for v in stream {
                    writer.write_vec3(*v)?;
                }
            }
        }

        Ok(())
    }
}

fn read_vec3_stream(reader: &mut BinaryReader<'_>, count: usize) -> Result<Vec<Vec3>> {
    let mut values = Vec::with_capacity(bounded_capacity(count, 12, reader));
    for _ in 0..count {
        values.push(reader.read_vec3()?);
    }
    Ok(values)
}

/// One draw call of a mesh list: the indices drawn with one material.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mesh {
    pub material_index: u32,
    /// Declared index count. Native geometry stores no indices here.
    pub index_count: u32,
    pub indices: Vec<u32>,
}

/// Mesh list plugin: the geometry split into per-material draw calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshList {
    /// `1` when meshes are triangle strips.
    pub flags: u32,
    /// Total index count as stored. Written back unchanged, even when it
    /// disagrees with [`index_sum`](Self::index_sum).
    pub total_index_count: u32,
    pub meshes: Vec<Mesh>,
}

impl MeshList {
    /// Whether meshes are triangle strips.
    pub fn is_tristrip(&self) -> bool {
        self.flags & 1 != 0
    }

    /// A mesh list whose stored total matches its meshes.
    pub fn new(flags: u32, meshes: Vec<Mesh>) -> Self {
        let mut list = Self {
            flags,
            total_index_count: 0,
            meshes,
        };
        list.total_index_count = list.index_sum();
        list
    }

    /// Sum of all meshes' index counts.
    pub fn index_sum(&self) -> u32 {
        self.meshes.iter().map(|m| m.index_count).sum()
    }

    pub(crate) fn read(reader: &mut BinaryReader<'_>, ctx: &SchemaContext) -> Result<Self> {
        let native = ctx.geometry.is_some_and(|g| g.native);
        let flags = reader.read_u32()?;
        let mesh_count = reader.read_u32()? as usize;
        let total_index_count = reader.read_u32()?;

        let mut meshes = Vec::with_capacity(bounded_capacity(mesh_count, 8, reader));
        for _ in 0..mesh_count {
            let index_count = reader.read_u32()?;
            let material_index = reader.read_u32()?;
            let mut indices = Vec::new();
            if !native {
                indices.reserve(bounded_capacity(index_count as usize, 4, reader));
                for _ in 0..index_count {
                    indices.push(reader.read_u32()?);
                }
            }
            meshes.push(Mesh {
                material_index,
                index_count,
                indices,
            });
        }

        Ok(Self {
            flags,
            total_index_count,
            meshes,
        })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter, ctx: &SchemaContext) -> Result<()> {
        let native = ctx.geometry.is_some_and(|g| g.native);
        if !native {
            if let Some(mesh) = self.meshes.iter().find(|m| m.indices.len() != m.index_count as usize) {
                return Err(Error::InvalidNode {
                    tag: ChunkId::MESH_LIST,
                    reason: format!(
                        "mesh declares {} indices but holds {}",
                        mesh.index_count,
                        mesh.indices.len()
                    ),
                });
            }
        }

        writer.write_u32(self.flags)?;
        writer.write_u32(self.meshes.len() as u32)?;
        writer.write_u32(self.total_index_count)?;
        for mesh in &self.meshes {
            writer.write_u32(mesh.index_count)?;
            writer.write_u32(mesh.material_index)?;
            if !native {
                for &index in &mesh.indices {
                    writer.write_u32(index)?;
                }
            }
        }
        Ok(())
    }
}
