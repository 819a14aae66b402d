// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Procedural meshes for the demo scene.

use bytemuck::{Pod, Zeroable};
use kiln_core::math::{Vec2, Vec3};

/// The vertex layout the geometry pipelines read.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    fn new(position: Vec3, normal: Vec3, tangent: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            tangent: tangent.to_array(),
            uv: uv.to_array(),
        }
    }
}

/// Vertices and 32-bit triangle list indices.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// An axis-aligned cube of half extent `half`, four vertices per face.
    pub fn cube(half: f32) -> Self {
        let faces = [
            (Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_X, Vec3::Z),
            (Vec3::Y, Vec3::X),
            (Vec3::NEG_Y, Vec3::X),
            (Vec3::Z, Vec3::X),
            (Vec3::NEG_Z, Vec3::NEG_X),
        ];
        let mut mesh = Self::default();
        for (normal, tangent) in faces {
            let bitangent = normal.cross(tangent);
            let base = mesh.vertices.len() as u32;
            for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let offset = tangent * (u * 2.0 - 1.0) + bitangent * (v * 2.0 - 1.0);
                mesh.vertices.push(Vertex::new(
                    (normal + offset) * half,
                    normal,
                    tangent,
                    Vec2::new(u, v),
                ));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// A UV sphere of `radius` with `rings` latitude and `segments`
    /// longitude subdivisions.
    pub fn sphere(radius: f32, rings: u32, segments: u32) -> Self {
        let mut mesh = Self::default();
        for ring in 0..=rings {
            let v = ring as f32 / rings as f32;
            let theta = v * std::f32::consts::PI;
            for segment in 0..=segments {
                let u = segment as f32 / segments as f32;
                let phi = u * std::f32::consts::TAU;
                let normal = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
                let tangent = Vec3::new(-phi.sin(), 0.0, phi.cos());
                mesh.vertices
                    .push(Vertex::new(normal * radius, normal, tangent, Vec2::new(u, v)));
            }
        }
        let row = segments + 1;
        for ring in 0..rings {
            for segment in 0..segments {
                let a = ring * row + segment;
                let b = a + row;
                mesh.indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }
        mesh
    }

    /// A flat `size` x `size` grid in the XZ plane split into `cells` per
    /// side. Its triangles double as three-point patches.
    pub fn grid(size: f32, cells: u32) -> Self {
        let mut mesh = Self::default();
        for z in 0..=cells {
            for x in 0..=cells {
                let uv = Vec2::new(x as f32, z as f32) / cells as f32;
                let position = Vec3::new(uv.x - 0.5, 0.0, uv.y - 0.5) * size;
                mesh.vertices.push(Vertex::new(position, Vec3::Y, Vec3::X, uv));
            }
        }
        let row = cells + 1;
        for z in 0..cells {
            for x in 0..cells {
                let a = z * row + x;
                mesh.indices
                    .extend_from_slice(&[a, a + row, a + 1, a + 1, a + row, a + row + 1]);
            }
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices_in_range(mesh: &MeshData) -> bool {
        mesh.indices.iter().all(|i| (*i as usize) < mesh.vertices.len())
    }

    #[test]
    fn vertex_matches_the_input_layout() {
        assert_eq!(MeshData::STRIDE, 44);
    }

    #[test]
    fn generated_meshes_are_triangle_lists() {
        let cube = MeshData::cube(0.5);
        assert_eq!((cube.vertices.len(), cube.indices.len()), (24, 36));

        let sphere = MeshData::sphere(1.0, 8, 16);
        assert_eq!(sphere.indices.len(), 8 * 16 * 6);

        let grid = MeshData::grid(10.0, 4);
        assert_eq!(grid.vertices.len(), 25);
        for mesh in [cube, sphere, grid] {
            assert_eq!(mesh.indices.len() % 3, 0);
            assert!(indices_in_range(&mesh));
        }
    }
}
