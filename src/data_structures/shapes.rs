//! Procedural geometry for the static meshes of the showcase.

use crate::data_structures::model::ModelVertex;

/// A `width` x `height` plane in the XY plane, facing +Z.
///
/// Rotate the owning node by -90 degrees around X to lay it flat.
pub fn plane(width: f32, height: f32) -> (Vec<ModelVertex>, Vec<u32>) {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let corners = [
        ([-hw, -hh], [0.0, 1.0]),
        ([hw, -hh], [1.0, 1.0]),
        ([hw, hh], [1.0, 0.0]),
        ([-hw, hh], [0.0, 0.0]),
    ];
    let vertices = corners
        .iter()
        .map(|&([x, y], tex_coords)| ModelVertex {
            position: [x, y, 0.0],
            tex_coords,
            normal: [0.0, 0.0, 1.0],
        })
        .collect();
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

/// An axis aligned box centred on the origin with four vertices per face so
/// every face keeps its own normal.
pub fn cuboid(width: f32, height: f32, depth: f32) -> (Vec<ModelVertex>, Vec<u32>) {
    let half = [width / 2.0, height / 2.0, depth / 2.0];
    // (normal, u, v) with u x v == normal, which keeps the winding counter-clockwise
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let quad = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in quad {
            let position = [0, 1, 2].map(|axis| (normal[axis] + u[axis] * su + v[axis] * sv) * half[axis]);
            vertices.push(ModelVertex {
                position,
                tex_coords: [(su + 1.0) / 2.0, (1.0 - sv) / 2.0],
                normal,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Vector3};

    use super::*;

    fn assert_ccw_outward(vertices: &[ModelVertex], indices: &[u32]) {
        for tri in indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vector3::from(vertices[i as usize].position));
            let face_normal = (b - a).cross(c - a).normalize();
            let vertex_normal = Vector3::from(vertices[tri[0] as usize].normal);
            assert!(
                (face_normal - vertex_normal).magnitude() < 1e-5,
                "triangle {:?} winds against its normal",
                tri
            );
        }
    }

    #[test]
    fn cuboid_faces_wind_outward() {
        let (vertices, indices) = cuboid(1.0, 1.0, 1.0);
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert_ccw_outward(&vertices, &indices);
    }

    #[test]
    fn cuboid_respects_extents() {
        let (vertices, _) = cuboid(2.0, 4.0, 6.0);
        for vertex in vertices {
            assert_eq!(vertex.position[0].abs(), 1.0);
            assert_eq!(vertex.position[1].abs(), 2.0);
            assert_eq!(vertex.position[2].abs(), 3.0);
        }
    }

    #[test]
    fn plane_faces_positive_z() {
        let (vertices, indices) = plane(20.0, 20.0);
        assert_eq!(indices.len(), 6);
        assert_ccw_outward(&vertices, &indices);
        assert!(vertices.iter().all(|v| v.position[0].abs() == 10.0));
    }
}
