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

//! Math types used across the renderer.
//!
//! Re-exports the subset of `glam` the renderer works with so downstream
//! crates do not need their own `glam` dependency.

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

/// Transposes a row-vector (CPU side) matrix into the column-major layout
/// shaders read from constant buffers.
#[inline]
pub fn to_shader_layout(matrix: &Mat4) -> Mat4 {
    matrix.transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_layout_is_transpose() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let t = to_shader_layout(&m);
        assert_eq!(t.row(3), m.col(3));
        assert_eq!(to_shader_layout(&t), m);
    }
}
