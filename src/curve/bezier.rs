use glam::Vec3;

use super::point::{Point, PointArena, PointId};
use super::{validate_radius, validate_sector_count, CurveError, Ray};
use crate::tube::{SyncOutcome, TubeInput, TubeMesh, TubeSlot, TubeState};

/// Default cross-section radius of a new curve.
pub const DEFAULT_RADIUS: f32 = 0.25;
/// Default number of sectors around a tube cross-section.
pub const DEFAULT_SECTOR_COUNT: u32 = 128;

fn factorial(n: usize) -> f32 {
    (1..=n).fold(1.0, |acc, k| acc * k as f32)
}

fn binomial(n: usize, k: usize) -> f32 {
    factorial(n) / (factorial(k) * factorial(n - k))
}

/// Bernstein-form evaluation. `None` for an empty control polygon.
pub fn evaluate(control_points: &[Vec3], t: f32) -> Option<Vec3> {
    let n = control_points.len().checked_sub(1)?;
    let s = 1.0 - t;
    let value = control_points
        .iter()
        .enumerate()
        .fold(Vec3::ZERO, |acc, (i, &point)| {
            let weight = binomial(n, i) * t.powi(i as i32) * s.powi((n - i) as i32);
            acc + weight * point
        });
    Some(value)
}

/// Unit tangent from the hodograph built on `cp[i] - cp[i + 1]`.
///
/// The differences point against the direction of travel; tube framing
/// relies on that sign. `None` below degree 1, zero when the hodograph
/// vanishes at `t`.
pub fn tangent(control_points: &[Vec3], t: f32) -> Option<Vec3> {
    if control_points.len() < 2 {
        return None;
    }
    let differences: Vec<Vec3> = control_points
        .windows(2)
        .map(|pair| pair[0] - pair[1])
        .collect();
    evaluate(&differences, t).map(Vec3::normalize_or_zero)
}

/// Perpendicular distance from `point` to the ray, or `None` when the
/// point lies behind the origin.
pub fn distance_ahead_of_ray(ray: &Ray, point: Vec3) -> Option<f32> {
    let difference = point - ray.origin;
    let dot = difference.dot(ray.direction);
    (dot >= 0.0).then(|| (difference - ray.direction * dot).length())
}

/// Upper bound on samples per patch for distance and length queries.
pub const MAX_SAMPLE_STEPS: usize = 1_000_000;

/// Parameters `0, epsilon, 2 epsilon, ..., 1`, always including both ends.
/// Steps finer than `1 / MAX_SAMPLE_STEPS` are clamped.
pub(crate) fn sample_parameters(epsilon: f32) -> impl Iterator<Item = f32> {
    let steps = if epsilon > 0.0 && epsilon.is_finite() {
        ((1.0 / epsilon).ceil().max(1.0) as usize).min(MAX_SAMPLE_STEPS)
    } else {
        1
    };
    (0..=steps).map(move |i| i as f32 / steps as f32)
}

/// One Bezier segment with its tube appearance and generation slot.
#[derive(Debug)]
pub struct BezierPatch {
    control_points: PointArena,
    radius: f32,
    sector_count: u32,
    tube: TubeSlot,
}

impl Default for BezierPatch {
    fn default() -> Self {
        Self::with_valid_appearance(DEFAULT_RADIUS, DEFAULT_SECTOR_COUNT)
    }
}

impl BezierPatch {
    pub fn new(radius: f32, sector_count: u32) -> Result<Self, CurveError> {
        validate_radius(radius)?;
        validate_sector_count(sector_count)?;
        Ok(Self::with_valid_appearance(radius, sector_count))
    }

    fn with_valid_appearance(radius: f32, sector_count: u32) -> Self {
        Self {
            control_points: PointArena::new(),
            radius,
            sector_count,
            tube: TubeSlot::new(),
        }
    }

    /// Patch owning copies of `positions`.
    pub fn from_positions(
        positions: &[Vec3],
        radius: f32,
        sector_count: u32,
    ) -> Result<Self, CurveError> {
        let mut patch = Self::new(radius, sector_count)?;
        for &position in positions {
            patch.control_points.push(position)?;
        }
        Ok(patch)
    }

    /// Number of control points minus one; `None` for an empty patch.
    pub fn degree(&self) -> Option<usize> {
        self.control_points.len().checked_sub(1)
    }

    pub fn control_points(&self) -> &[Point] {
        self.control_points.as_slice()
    }

    pub fn control_point(&self, id: PointId) -> Option<&Point> {
        self.control_points.get(id)
    }

    pub(crate) fn control_point_mut(&mut self, id: PointId) -> Option<&mut Point> {
        self.control_points.get_mut(id)
    }

    pub fn control_point_positions(&self) -> Vec<Vec3> {
        self.control_points.positions()
    }

    pub fn add_control_point(&mut self, position: Vec3) -> Result<PointId, CurveError> {
        let id = self.control_points.push(position)?;
        self.tube.mark_dirty();
        Ok(id)
    }

    pub fn insert_control_point(
        &mut self,
        index: usize,
        position: Vec3,
    ) -> Result<PointId, CurveError> {
        let id = self.control_points.insert(index, position)?;
        self.tube.mark_dirty();
        Ok(id)
    }

    pub fn remove_control_point(&mut self, id: PointId) -> Option<Point> {
        let removed = self.control_points.remove(id)?;
        self.tube.mark_dirty();
        Some(removed)
    }

    pub fn set_control_point_position(
        &mut self,
        id: PointId,
        position: Vec3,
    ) -> Result<(), CurveError> {
        self.control_points.set_position(id, position)?;
        self.tube.mark_dirty();
        Ok(())
    }

    pub fn translate(&mut self, translation: Vec3) -> Result<(), CurveError> {
        self.control_points.translate(translation)?;
        self.tube.mark_dirty();
        Ok(())
    }

    pub(crate) fn clear_selection(&mut self) {
        self.control_points.clear_selection();
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) -> Result<(), CurveError> {
        validate_radius(radius)?;
        if radius != self.radius {
            self.radius = radius;
            self.tube.mark_dirty();
        }
        Ok(())
    }

    pub fn sector_count(&self) -> u32 {
        self.sector_count
    }

    pub fn set_sector_count(&mut self, sector_count: u32) -> Result<(), CurveError> {
        validate_sector_count(sector_count)?;
        if sector_count != self.sector_count {
            self.sector_count = sector_count;
            self.tube.mark_dirty();
        }
        Ok(())
    }

    pub fn value_at(&self, t: f32) -> Option<Vec3> {
        evaluate(&self.control_point_positions(), t)
    }

    pub fn tangent_at(&self, t: f32) -> Option<Vec3> {
        tangent(&self.control_point_positions(), t)
    }

    /// Sampled minimum distance from the curve to the ray, `f32::INFINITY`
    /// when no sample lies ahead of the origin.
    pub fn closest_distance_to_ray(&self, ray: &Ray, epsilon: f32) -> f32 {
        let positions = self.control_point_positions();
        sample_parameters(epsilon)
            .filter_map(|t| evaluate(&positions, t))
            .filter_map(|point| distance_ahead_of_ray(ray, point))
            .fold(f32::INFINITY, f32::min)
    }

    /// Nearest control point strictly closer than `max_distance` to the ray.
    pub fn closest_control_point_to_ray(&self, ray: &Ray, max_distance: f32) -> Option<PointId> {
        closest_point_to_ray(self.control_points.as_slice(), ray, max_distance)
    }

    /// Length of the polyline through samples spaced `epsilon` apart.
    pub fn length(&self, epsilon: f32) -> f32 {
        let positions = self.control_point_positions();
        let samples: Vec<Vec3> = sample_parameters(epsilon)
            .filter_map(|t| evaluate(&positions, t))
            .collect();
        samples
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum()
    }

    pub fn tube_state(&self) -> TubeState {
        self.tube.state()
    }

    /// Last mesh uploaded for this patch.
    pub fn tube_mesh(&self) -> Option<&TubeMesh> {
        self.tube.mesh()
    }

    /// Advances the tube state machine by one render step.
    pub fn sync_tube(&mut self, tick_count: u32, upload: impl FnOnce(&TubeMesh)) -> SyncOutcome {
        let control_points = self.control_point_positions();
        let radius = self.radius;
        let sector_count = self.sector_count;
        self.tube.sync(
            move || TubeInput {
                control_points,
                radius,
                sector_count,
                tick_count,
            },
            upload,
        )
    }

    /// Copies the geometry and appearance; the tube starts over as `Dirty`.
    pub fn deep_copy(&self) -> Self {
        Self {
            control_points: self.control_points.clone(),
            radius: self.radius,
            sector_count: self.sector_count,
            tube: TubeSlot::new(),
        }
    }
}

pub(crate) fn closest_point_to_ray(
    points: &[Point],
    ray: &Ray,
    max_distance: f32,
) -> Option<PointId> {
    let mut best: Option<(PointId, f32)> = None;
    for point in points {
        let Some(distance) = distance_ahead_of_ray(ray, point.position()) else {
            continue;
        };
        if best.map_or(true, |(_, min)| distance < min) {
            best = Some((point.id(), distance));
        }
    }
    best.filter(|&(_, distance)| distance < max_distance)
        .map(|(id, _)| id)
}
