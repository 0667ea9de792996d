//! CPU-side mesh representation used by loaders.

/// Indexed triangle mesh with separate position and normal streams.
///
/// `positions` and `normals` always have the same length; `indices` holds
/// three entries per triangle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(positions: Vec<[f32; 3]>, normals: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals,
            indices,
        }
    }

    /// Build a mesh without normals; smooth normals are derived from the faces.
    pub fn with_computed_normals(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        let mut mesh = Self::new(positions, Vec::new(), indices);
        mesh.compute_normals();
        mesh
    }

    /// Returns `true` if the mesh has triangles, matching streams and in-range indices.
    pub fn is_valid(&self) -> bool {
        !self.positions.is_empty()
            && self.positions.len() == self.normals.len()
            && !self.indices.is_empty()
            && self.indices.len() % 3 == 0
            && self
                .indices
                .iter()
                .all(|&i| (i as usize) < self.positions.len())
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = *self.positions.first()?;
        let mut min = first;
        let mut max = first;
        for p in &self.positions {
            for k in 0..3 {
                min[k] = min[k].min(p[k]);
                max[k] = max[k].max(p[k]);
            }
        }
        Some((min, max))
    }

    /// Center the mesh on its bounding box and scale it uniformly so the
    /// largest extent spans [-1, 1].
    pub fn resize(&mut self) {
        let Some((min, max)) = self.bounds() else {
            return;
        };
        let extent = [max[0] - min[0], max[1] - min[1], max[2] - min[2]];
        let max_extent = extent[0].max(extent[1]).max(extent[2]);
        let scale = if max_extent > f32::EPSILON {
            2.0 / max_extent
        } else {
            1.0
        };
        let shift = [
            min[0] + extent[0] / 2.0,
            min[1] + extent[1] / 2.0,
            min[2] + extent[2] / 2.0,
        ];

        for p in &mut self.positions {
            for k in 0..3 {
                p[k] = (p[k] - shift[k]) * scale;
            }
        }
        log::debug!(
            "Mesh resized: shift=({:.3}, {:.3}, {:.3}) scale={:.4}",
            shift[0],
            shift[1],
            shift[2],
            scale
        );
    }

    /// Replace normals with area-weighted smooth vertex normals.
    pub fn compute_normals(&mut self) {
        let mut acc = vec![[0.0f32; 3]; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let (ia, ib, ic) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let (Some(a), Some(b), Some(c)) = (
                self.positions.get(ia),
                self.positions.get(ib),
                self.positions.get(ic),
            ) else {
                continue;
            };
            let e1 = sub(*b, *a);
            let e2 = sub(*c, *a);
            // Cross product length is twice the triangle area.
            let n = cross(e1, e2);
            for i in [ia, ib, ic] {
                for k in 0..3 {
                    acc[i][k] += n[k];
                }
            }
        }
        self.normals = acc.into_iter().map(normalize_or_default).collect();
    }
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize_or_default(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len > f32::EPSILON {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshData {
        MeshData::with_computed_normals(
            vec![
                [2.0, 2.0, 0.0],
                [6.0, 2.0, 0.0],
                [6.0, 4.0, 0.0],
                [2.0, 4.0, 0.0],
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn mesh_data_validity() {
        let data = MeshData::new(vec![[0.0; 3]; 3], vec![[0.0, 0.0, 1.0]; 3], vec![0, 1, 2]);
        assert!(data.is_valid());

        let out_of_range = MeshData::new(vec![[0.0; 3]; 3], vec![[0.0; 3]; 3], vec![0, 1, 3]);
        assert!(!out_of_range.is_valid());

        let mismatched = MeshData::new(vec![[0.0; 3]; 3], vec![], vec![0, 1, 2]);
        assert!(!mismatched.is_valid());
    }

    #[test]
    fn computed_normals_face_the_winding() {
        let mesh = quad();
        assert_eq!(mesh.normals.len(), 4);
        for n in &mesh.normals {
            assert!((n[2] - 1.0).abs() < 1e-6, "{n:?}");
        }
        assert!(mesh.is_valid());
    }

    #[test]
    fn resize_centers_and_fits_unit_cube() {
        let mut mesh = quad();
        mesh.resize();
        let (min, max) = mesh.bounds().unwrap();
        assert!((min[0] + 1.0).abs() < 1e-6 && (max[0] - 1.0).abs() < 1e-6);
        assert!((min[1] + 0.5).abs() < 1e-6 && (max[1] - 0.5).abs() < 1e-6);
        assert_eq!(min[2], 0.0);
        assert_eq!(max[2], 0.0);
    }

    #[test]
    fn resize_degenerate_mesh_only_centers() {
        let mut mesh = MeshData::new(vec![[3.0, 3.0, 3.0]], vec![[0.0; 3]], vec![]);
        mesh.resize();
        assert_eq!(mesh.positions[0], [0.0, 0.0, 0.0]);
    }
}
