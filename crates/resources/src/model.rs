//! Model loading from OBJ files.
//!
//! Faces are triangulated on load. Every vertex gets a white color and a
//! texture coordinate flipped to `(u, 1 - v)`, then identical vertices are
//! merged so the index buffer references each distinct vertex once.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use tracing::{debug, info};

use minirender_rhi::vertex::Vertex;

use crate::error::{ResourceError, ResourceResult};

/// Color given to every loaded vertex.
pub const VERTEX_COLOR: Vec3 = Vec3::ONE;

/// One corner of a triangle: indices into the flattened attribute arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceVertex {
    /// Index of the `[x, y, z]` triple in the position array.
    pub position: u32,
    /// Index of the `[u, v]` pair in the texcoord array, if the face has one.
    pub tex_coord: Option<u32>,
}

/// An indexed triangle mesh ready for upload.
#[derive(Debug, Default)]
pub struct Model {
    /// Distinct vertices.
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`.
    pub indices: Vec<u32>,
    /// Axis-aligned bounding box minimum
    pub aabb_min: Vec3,
    /// Axis-aligned bounding box maximum
    pub aabb_max: Vec3,
}

impl Model {
    /// Load a model from an OBJ file.
    ///
    /// Materials referenced by the file are ignored.
    ///
    /// # Errors
    /// Returns an error if the file is missing or malformed, or if it
    /// contains no triangles.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let reader = BufReader::new(File::open(path)?);
        let model = Self::parse(reader, path)?;

        info!(
            "Model '{}' loaded: {} vertices, {} triangles, size {} centered at {}",
            path.display(),
            model.vertex_count(),
            model.triangle_count(),
            model.size(),
            model.center()
        );
        Ok(model)
    }

    /// Parse OBJ text from any buffered reader.
    ///
    /// # Errors
    /// Returns an error if the text is malformed or contains no triangles.
    pub fn from_obj_reader<R: BufRead>(reader: R) -> ResourceResult<Self> {
        Self::parse(reader, Path::new("<reader>"))
    }

    fn parse<R: BufRead>(mut reader: R, source: &Path) -> ResourceResult<Self> {
        let options = tobj::LoadOptions {
            triangulate: true,
            ..Default::default()
        };
        let (models, _materials) =
            tobj::load_obj_buf(&mut reader, &options, |_| Ok(Default::default())).map_err(
                |e| ResourceError::ObjLoad {
                    path: source.to_path_buf(),
                    message: e.to_string(),
                },
            )?;

        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        let mut unique = HashMap::new();

        for model in &models {
            let mesh = &model.mesh;
            debug!(
                "OBJ object '{}': {} positions, {} indices",
                model.name,
                mesh.positions.len() / 3,
                mesh.indices.len()
            );

            let faces = face_vertices(&mesh.indices, &mesh.texcoord_indices);
            let (mesh_vertices, mesh_indices) =
                dedup_vertices(&mesh.positions, &mesh.texcoords, &faces)?;

            // Merge across objects so vertices shared between them stay unique.
            for index in mesh_indices {
                let vertex = mesh_vertices[index as usize];
                let merged = *unique.entry(vertex).or_insert_with(|| {
                    vertices.push(vertex);
                    (vertices.len() - 1) as u32
                });
                indices.push(merged);
            }
        }

        if indices.is_empty() {
            return Err(ResourceError::EmptyModel(PathBuf::from(source)));
        }

        let (aabb_min, aabb_max) = bounds(&vertices);
        Ok(Self {
            vertices,
            indices,
            aabb_min,
            aabb_max,
        })
    }

    /// Number of distinct vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Center of the bounding box.
    pub fn center(&self) -> Vec3 {
        (self.aabb_min + self.aabb_max) * 0.5
    }

    /// Extent of the bounding box.
    pub fn size(&self) -> Vec3 {
        self.aabb_max - self.aabb_min
    }
}

/// Pairs position indices with texcoord indices, corner by corner.
///
/// `tex_coord_indices` is either empty or as long as `position_indices`.
fn face_vertices(position_indices: &[u32], tex_coord_indices: &[u32]) -> Vec<[FaceVertex; 3]> {
    position_indices
        .chunks_exact(3)
        .enumerate()
        .map(|(face, corners)| {
            std::array::from_fn(|corner| FaceVertex {
                position: corners[corner],
                tex_coord: tex_coord_indices.get(face * 3 + corner).copied(),
            })
        })
        .collect()
}

/// Builds a deduplicated vertex list and index list from triangle faces.
///
/// `positions` holds flattened `[x, y, z]` triples and `tex_coords` flattened
/// `[u, v]` pairs. Each corner becomes a vertex with [`VERTEX_COLOR`] and the
/// texture coordinate `(u, 1 - v)`; a corner without one gets `(0, 0)`.
/// Vertices equal in every bit share one index, assigned in order of first
/// appearance.
///
/// # Errors
/// Returns [`ResourceError::IndexOutOfRange`] if a corner points past either
/// array.
pub fn dedup_vertices(
    positions: &[f32],
    tex_coords: &[f32],
    faces: &[[FaceVertex; 3]],
) -> ResourceResult<(Vec<Vertex>, Vec<u32>)> {
    let mut vertices = Vec::new();
    let mut indices = Vec::with_capacity(faces.len() * 3);
    let mut unique: HashMap<Vertex, u32> = HashMap::new();

    for corner in faces.iter().flatten() {
        let vertex = Vertex::new(
            position_at(positions, corner.position)?,
            VERTEX_COLOR,
            match corner.tex_coord {
                Some(index) => tex_coord_at(tex_coords, index)?,
                None => Vec2::ZERO,
            },
        );

        let index = *unique.entry(vertex).or_insert_with(|| {
            vertices.push(vertex);
            (vertices.len() - 1) as u32
        });
        indices.push(index);
    }

    Ok((vertices, indices))
}

fn position_at(positions: &[f32], index: u32) -> ResourceResult<Vec3> {
    let start = index as usize * 3;
    positions
        .get(start..start + 3)
        .map(Vec3::from_slice)
        .ok_or(ResourceError::IndexOutOfRange {
            attribute: "position",
            index,
            len: positions.len() / 3,
        })
}

fn tex_coord_at(tex_coords: &[f32], index: u32) -> ResourceResult<Vec2> {
    let start = index as usize * 2;
    tex_coords
        .get(start..start + 2)
        .map(|uv| Vec2::new(uv[0], 1.0 - uv[1]))
        .ok_or(ResourceError::IndexOutOfRange {
            attribute: "texcoord",
            index,
            len: tex_coords.len() / 2,
        })
}

fn bounds(vertices: &[Vertex]) -> (Vec3, Vec3) {
    if vertices.is_empty() {
        return (Vec3::ZERO, Vec3::ZERO);
    }
    vertices.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), v| (min.min(v.position), max.max(v.position)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corner(position: u32, tex_coord: u32) -> FaceVertex {
        FaceVertex {
            position,
            tex_coord: Some(tex_coord),
        }
    }

    #[test]
    fn test_dedup_shared_vertex() {
        // Two triangles sharing corners 0 and 2.
        let positions = [
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0,
        ];
        let tex_coords = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let faces = [
            [corner(0, 0), corner(1, 1), corner(2, 2)],
            [corner(2, 2), corner(3, 3), corner(0, 0)],
        ];

        let (vertices, indices) = dedup_vertices(&positions, &tex_coords, &faces).unwrap();

        assert_eq!(vertices.len(), 4);
        assert_eq!(indices, vec![0, 1, 2, 2, 3, 0]);
        assert_eq!(indices.iter().filter(|&&i| i == 0).count(), 2);
        assert_eq!(indices.iter().filter(|&&i| i == 2).count(), 2);
    }

    #[test]
    fn test_dedup_distinct_tex_coords_stay_separate() {
        let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let tex_coords = [0.0, 0.0, 0.5, 0.5];
        let faces = [
            [corner(0, 0), corner(1, 0), corner(2, 0)],
            [corner(0, 1), corner(1, 0), corner(2, 0)],
        ];

        let (vertices, indices) = dedup_vertices(&positions, &tex_coords, &faces).unwrap();

        // Position 0 appears with two different texcoords.
        assert_eq!(vertices.len(), 4);
        assert_eq!(indices, vec![0, 1, 2, 3, 1, 2]);
    }

    #[test]
    fn test_dedup_flips_v_and_sets_color() {
        let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let tex_coords = [0.25, 0.75];
        let faces = [[corner(0, 0), corner(1, 0), corner(2, 0)]];

        let (vertices, _) = dedup_vertices(&positions, &tex_coords, &faces).unwrap();

        assert_eq!(vertices[0].tex_coord, Vec2::new(0.25, 0.25));
        assert_eq!(vertices[0].color, VERTEX_COLOR);
    }

    #[test]
    fn test_dedup_missing_tex_coord() {
        let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let faces = [[
            FaceVertex {
                position: 0,
                tex_coord: None,
            },
            FaceVertex {
                position: 1,
                tex_coord: None,
            },
            FaceVertex {
                position: 2,
                tex_coord: None,
            },
        ]];

        let (vertices, _) = dedup_vertices(&positions, &[], &faces).unwrap();
        assert!(vertices.iter().all(|v| v.tex_coord == Vec2::ZERO));
    }

    #[test]
    fn test_dedup_index_out_of_range() {
        let positions = [0.0, 0.0, 0.0];
        let faces = [[corner(0, 0), corner(1, 0), corner(0, 0)]];

        let result = dedup_vertices(&positions, &[0.0, 0.0], &faces);
        assert!(matches!(
            result,
            Err(ResourceError::IndexOutOfRange {
                attribute: "position",
                index: 1,
                len: 1,
            })
        ));
    }

    #[test]
    fn test_face_vertices_pairs_indices() {
        let faces = face_vertices(&[0, 1, 2, 2, 3, 0], &[4, 5, 6, 6, 7, 4]);
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[1][1], corner(3, 7));

        let untextured = face_vertices(&[0, 1, 2], &[]);
        assert_eq!(untextured[0][2].tex_coord, None);
    }

    #[test]
    fn test_from_obj_reader_quad() {
        let obj = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";
        let model = Model::from_obj_reader(obj.as_bytes()).unwrap();

        // The quad is split into two triangles sharing an edge.
        assert_eq!(model.triangle_count(), 2);
        assert_eq!(model.vertex_count(), 4);
        assert_eq!(model.aabb_min, Vec3::ZERO);
        assert_eq!(model.aabb_max, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(model.center(), Vec3::new(0.5, 0.5, 0.0));
    }

    #[test]
    fn test_from_obj_reader_empty() {
        let result = Model::from_obj_reader("# nothing here\n".as_bytes());
        assert!(matches!(
            result,
            Err(ResourceError::EmptyModel(_) | ResourceError::ObjLoad { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Model::load(Path::new("does/not/exist.obj"));
        assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
    }
}
