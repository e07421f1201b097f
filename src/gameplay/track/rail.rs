use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;

#[derive(Debug, Clone, Copy)]
pub(super) struct RailProfilePoint {
    pub(super) upper: Vec2,
    pub(super) lower: Vec2,
    pub(super) u: f32,
}

/// Offsets every polyline vertex along its averaged normal to build a strip of `thickness`.
pub(super) fn build_rail_profile(polyline: &[Vec2], thickness: f32) -> Vec<RailProfilePoint> {
    let node_count = polyline.len();
    if node_count < 2 {
        return Vec::new();
    }

    let half_thickness = thickness.max(0.001) * 0.5;
    let mut points = Vec::with_capacity(node_count);
    let mut u_along = 0.0_f32;
    for index in 0..node_count {
        if index > 0 {
            u_along += polyline[index].distance(polyline[index - 1]) / (half_thickness * 2.0);
        }
        let tangent = if index == 0 {
            polyline[1] - polyline[0]
        } else if index + 1 == node_count {
            polyline[node_count - 1] - polyline[node_count - 2]
        } else {
            polyline[index + 1] - polyline[index - 1]
        };
        let normal = Vec2::new(-tangent.y, tangent.x).normalize_or_zero();
        let safe_normal = if normal.length_squared() <= f32::EPSILON {
            Vec2::Y
        } else {
            normal
        };
        let center = polyline[index];

        points.push(RailProfilePoint {
            upper: center + safe_normal * half_thickness,
            lower: center - safe_normal * half_thickness,
            u: u_along,
        });
    }

    points
}

pub(super) fn build_rail_strip_mesh(profile: &[RailProfilePoint], z: f32) -> Mesh {
    let node_count = profile.len();
    let mut positions = Vec::with_capacity(node_count * 2);
    let mut normals = Vec::with_capacity(node_count * 2);
    let mut uvs = Vec::with_capacity(node_count * 2);
    let mut indices = Vec::with_capacity(node_count.saturating_sub(1) * 6);

    for point in profile {
        positions.push([point.upper.x, point.upper.y, z]);
        positions.push([point.lower.x, point.lower.y, z]);
        normals.push([0.0, 0.0, 1.0]);
        normals.push([0.0, 0.0, 1.0]);
        uvs.push([point.u, 0.0]);
        uvs.push([point.u, 1.0]);
    }

    for index in 0..node_count.saturating_sub(1) {
        let base = (index * 2) as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_straddles_a_flat_rail() {
        let profile = build_rail_profile(&[Vec2::ZERO, Vec2::new(10.0, 0.0)], 4.0);
        assert_eq!(profile.len(), 2);
        assert_eq!(profile[0].upper, Vec2::new(0.0, 2.0));
        assert_eq!(profile[0].lower, Vec2::new(0.0, -2.0));
        assert!((profile[1].u - 2.5).abs() < 1e-5);
    }

    #[test]
    fn collapsed_points_fall_back_to_vertical_normal() {
        let profile = build_rail_profile(&[Vec2::ONE, Vec2::ONE], 2.0);
        assert_eq!(profile[0].upper, Vec2::new(1.0, 2.0));
        assert_eq!(profile[1].lower, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn strip_mesh_has_two_triangles_per_segment() {
        let polyline = [Vec2::ZERO, Vec2::new(5.0, 1.0), Vec2::new(9.0, -2.0)];
        let mesh = build_rail_strip_mesh(&build_rail_profile(&polyline, 3.0), 0.0);
        assert_eq!(mesh.count_vertices(), 6);
        assert_eq!(mesh.indices().map(|indices| indices.len()), Some(12));
    }
}
