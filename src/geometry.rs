use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::model::{Material, ModelPrimitive, Vertex};

/// UV sphere centered on the origin with its poles on ±Y.
///
/// `u` runs around the Y axis, `v` from the north pole (0) to the south pole (1),
/// which is the row order textures are uploaded in. Triangles wind counter-clockwise.
pub fn sphere<T>(radius: f32, width_segments: u32, height_segments: u32) -> ModelPrimitive<T> {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);

    let mut vertices = Vec::with_capacity(((width_segments + 1) * (height_segments + 1)) as usize);
    let mut grid = Vec::with_capacity(height_segments as usize + 1);

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let mut row = Vec::with_capacity(width_segments as usize + 1);

        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;

            let position = Vec3::new(
                -radius * (u * 2.0 * PI).cos() * (v * PI).sin(),
                radius * (v * PI).cos(),
                radius * (u * 2.0 * PI).sin() * (v * PI).sin(),
            );

            row.push(vertices.len() as u32);
            vertices.push(Vertex {
                position,
                normal: position.normalize_or(Vec3::Y),
                tex_coords: Vec2::new(u, v),
            });
        }

        grid.push(row);
    }

    let mut indices = Vec::new();
    for iy in 0..height_segments as usize {
        for ix in 0..width_segments as usize {
            let a = grid[iy][ix + 1];
            let b = grid[iy][ix];
            let c = grid[iy + 1][ix];
            let d = grid[iy + 1][ix + 1];

            if iy != 0 {
                indices.extend([a, b, d]);
            }
            if iy != height_segments as usize - 1 {
                indices.extend([b, c, d]);
            }
        }
    }

    ModelPrimitive {
        index: 0,
        vertices,
        indices,
        material: Material::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn vertices_lie_on_the_surface() {
        let sphere = sphere::<()>(5.5, 50, 20);

        assert_eq!(sphere.vertices.len(), 51 * 21);
        for vertex in &sphere.vertices {
            assert_relative_eq!(vertex.position.length(), 5.5, epsilon = 1e-4);
        }
    }

    #[test]
    fn poles_are_not_duplicated_as_triangles() {
        let sphere = sphere::<()>(1.0, 8, 4);

        // Two triangles per quad except the single-triangle rows at each pole.
        assert_eq!(sphere.indices.len(), 3 * (8 * 2 * 4 - 2 * 8));
        assert!(sphere.indices.iter().all(|&i| (i as usize) < sphere.vertices.len()));
    }

    #[test]
    fn triangles_face_outwards() {
        let sphere = sphere::<()>(1.0, 16, 8);

        for triangle in sphere.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| sphere.vertices[triangle[i] as usize].position);
            let normal = (b - a).cross(c - a);
            let center = (a + b + c) / 3.0;
            assert!(normal.dot(center) > 0.0);
        }
    }
}
