//! Tube (pipe) meshes swept along Bezier patches.
//!
//! For each parameter step the circle is oriented by the rotation taking
//! [`REFERENCE_AXIS`] onto the tangent at the start of the step, then
//! projected onto the plane normal to the tangent at the end of the step.
//! Projecting instead of re-rotating keeps consecutive rings from
//! spinning around the curve.

pub mod state;

pub use state::{SyncOutcome, TubeSlot, TubeState, TubeStatus};

use glam::{Quat, Vec3};

use crate::curve::bezier::{evaluate, tangent};

/// Axis the unrotated cross-section circle is perpendicular to.
pub const REFERENCE_AXIS: Vec3 = Vec3::Z;
/// Rotation axis used when the tangent is (anti)parallel to [`REFERENCE_AXIS`].
pub const FALLBACK_AXIS: Vec3 = Vec3::X;
const PARALLEL_TOLERANCE: f32 = 1e-6;

/// Everything a generation thread needs, copied at launch time.
#[derive(Debug, Clone, PartialEq)]
pub struct TubeInput {
    pub control_points: Vec<Vec3>,
    pub radius: f32,
    pub sector_count: u32,
    pub tick_count: u32,
}

/// Non-indexed triangle list with one normal per vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TubeMesh {
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
}

impl TubeMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// `[px, py, pz, nx, ny, nz]` per vertex, the layout GPU buffers take.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.vertices.len() * 6);
        for (vertex, normal) in self.vertices.iter().zip(&self.normals) {
            out.extend_from_slice(vertex);
            out.extend_from_slice(normal);
        }
        out
    }
}

/// Rotation taking [`REFERENCE_AXIS`] onto `direction` (unit length).
pub fn align_reference_axis(direction: Vec3) -> Quat {
    let axis = REFERENCE_AXIS.cross(direction);
    let dot = REFERENCE_AXIS.dot(direction).clamp(-1.0, 1.0);
    if axis.length_squared() <= PARALLEL_TOLERANCE * PARALLEL_TOLERANCE {
        return if dot > 0.0 {
            Quat::IDENTITY
        } else {
            Quat::from_axis_angle(FALLBACK_AXIS, std::f32::consts::PI)
        };
    }
    Quat::from_axis_angle(axis.normalize(), dot.acos())
}

/// Orthogonal projection of `point` onto the plane through `origin` with
/// unit `normal`.
pub fn project_onto_plane(normal: Vec3, origin: Vec3, point: Vec3) -> Vec3 {
    point - normal * (point - origin).dot(normal)
}

/// Unit circle of `sector_count` points in the plane perpendicular to
/// [`REFERENCE_AXIS`].
fn reference_circle(sector_count: u32) -> Vec<Vec3> {
    (0..sector_count)
        .map(|i| {
            let angle = (i as f32 / sector_count as f32) * std::f32::consts::TAU;
            Vec3::new(angle.cos(), angle.sin(), 0.0)
        })
        .collect()
}

/// The two cross-sections of the step starting at `t0`, or `None` when a
/// tangent vanishes there.
pub fn cross_sections(
    control_points: &[Vec3],
    circle: &[Vec3],
    radius: f32,
    t0: f32,
    t1: f32,
) -> Option<(Vec<Vec3>, Vec<Vec3>)> {
    let p0 = evaluate(control_points, t0)?;
    let p1 = evaluate(control_points, t1)?;
    let tangent0 = tangent(control_points, t0)?;
    let tangent1 = tangent(control_points, t1)?;
    if tangent0 == Vec3::ZERO || tangent1 == Vec3::ZERO {
        return None;
    }

    let rotation = align_reference_axis(tangent0);
    let ring0: Vec<Vec3> = circle
        .iter()
        .map(|&unit| p0 + rotation * (unit * radius))
        .collect();
    let ring1 = ring0
        .iter()
        .map(|&point| project_onto_plane(tangent1, p1, point))
        .collect();
    Some((ring0, ring1))
}

/// Sweeps the tube for one patch. Degenerate patches yield an empty mesh.
pub fn generate_tube(input: &TubeInput) -> TubeMesh {
    let mut mesh = TubeMesh::default();
    if input.control_points.len() < 2 || input.sector_count < 3 || input.tick_count == 0 {
        return mesh;
    }

    let sectors = input.sector_count as usize;
    let ticks = input.tick_count as usize;
    let dt = 1.0 / input.tick_count as f32;
    let circle = reference_circle(input.sector_count);
    mesh.vertices.reserve(ticks * sectors * 6);
    mesh.normals.reserve(ticks * sectors * 6);

    for tick in 0..ticks {
        let t0 = tick as f32 * dt;
        let t1 = ((tick + 1) as f32 * dt).min(1.0);
        let Some((ring0, ring1)) =
            cross_sections(&input.control_points, &circle, input.radius, t0, t1)
        else {
            continue;
        };
        // Both evaluations succeeded inside cross_sections.
        let center0 = evaluate(&input.control_points, t0).unwrap_or_default();
        let center1 = evaluate(&input.control_points, t1).unwrap_or_default();

        for i in 0..sectors {
            let j = (i + 1) % sectors;
            let quad = [
                (ring0[i], center0),
                (ring0[j], center0),
                (ring1[i], center1),
                (ring0[j], center0),
                (ring1[j], center1),
                (ring1[i], center1),
            ];
            for (vertex, center) in quad {
                mesh.vertices.push(vertex.to_array());
                mesh.normals
                    .push((vertex - center).normalize_or_zero().to_array());
            }
        }
    }

    mesh
}
