use glam::Vec3;

use super::bezier::{closest_point_to_ray, BezierPatch, DEFAULT_RADIUS, DEFAULT_SECTOR_COUNT};
use super::fitter::fit_segments;
use super::point::{Point, PointArena, PointId};
use super::{validate_radius, validate_sector_count, CurveError, Material, Ray};

/// Interpolating curve through an ordered list of knots.
///
/// The Bezier patches are derived data. Any knot edit marks the spline
/// dirty and the patches are rebuilt on the next query that needs them.
/// Derived control points are copies of the knot positions, so moving a
/// knot never aliases into a live patch.
#[derive(Debug)]
pub struct Spline {
    knots: PointArena,
    patches: Vec<BezierPatch>,
    dirty: bool,
    selected: bool,
    material: Material,
    radius: f32,
    sector_count: u32,
}

impl Default for Spline {
    fn default() -> Self {
        Self::new()
    }
}

impl Spline {
    pub fn new() -> Self {
        Self::with_valid_appearance(DEFAULT_RADIUS, DEFAULT_SECTOR_COUNT)
    }

    /// Empty spline whose patches get this pipe appearance.
    pub fn with_appearance(radius: f32, sector_count: u32) -> Result<Self, CurveError> {
        validate_radius(radius)?;
        validate_sector_count(sector_count)?;
        Ok(Self::with_valid_appearance(radius, sector_count))
    }

    fn with_valid_appearance(radius: f32, sector_count: u32) -> Self {
        Self {
            knots: PointArena::new(),
            patches: Vec::new(),
            dirty: true,
            selected: false,
            material: Material::default(),
            radius,
            sector_count,
        }
    }

    pub fn from_knots(
        knots: &[Vec3],
        radius: f32,
        sector_count: u32,
    ) -> Result<Self, CurveError> {
        let mut spline = Self::with_appearance(radius, sector_count)?;
        for &knot in knots {
            spline.add_knot(knot)?;
        }
        Ok(spline)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn set_material(&mut self, material: Material) {
        self.material = material;
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Applies to every patch without a rebuild.
    pub fn set_radius(&mut self, radius: f32) -> Result<(), CurveError> {
        validate_radius(radius)?;
        self.radius = radius;
        for patch in &mut self.patches {
            patch.set_radius(radius)?;
        }
        Ok(())
    }

    pub fn sector_count(&self) -> u32 {
        self.sector_count
    }

    pub fn set_sector_count(&mut self, sector_count: u32) -> Result<(), CurveError> {
        validate_sector_count(sector_count)?;
        self.sector_count = sector_count;
        for patch in &mut self.patches {
            patch.set_sector_count(sector_count)?;
        }
        Ok(())
    }

    pub fn add_knot(&mut self, position: Vec3) -> Result<PointId, CurveError> {
        let id = self.knots.push(position)?;
        self.dirty = true;
        Ok(id)
    }

    pub fn insert_knot(&mut self, index: usize, position: Vec3) -> Result<PointId, CurveError> {
        let id = self.knots.insert(index, position)?;
        self.dirty = true;
        Ok(id)
    }

    pub fn remove_knot(&mut self, id: PointId) -> Option<Point> {
        let removed = self.knots.remove(id)?;
        self.dirty = true;
        Some(removed)
    }

    pub fn set_knot_position(&mut self, id: PointId, position: Vec3) -> Result<(), CurveError> {
        self.knots.set_position(id, position)?;
        self.dirty = true;
        Ok(())
    }

    pub fn knot(&self, id: PointId) -> Option<&Point> {
        self.knots.get(id)
    }

    pub(crate) fn knot_mut(&mut self, id: PointId) -> Option<&mut Point> {
        self.knots.get_mut(id)
    }

    pub fn knot_count(&self) -> usize {
        self.knots.len()
    }

    pub fn knot_positions(&self) -> Vec<Vec3> {
        self.knots.positions()
    }

    /// Knots without triggering a rebuild.
    pub fn knots(&self) -> &[Point] {
        self.knots.as_slice()
    }

    pub fn knot_points(&mut self) -> &[Point] {
        self.ensure_patches();
        self.knots.as_slice()
    }

    pub fn bezier_patches(&mut self) -> &[BezierPatch] {
        self.ensure_patches();
        &self.patches
    }

    pub fn bezier_patches_mut(&mut self) -> &mut [BezierPatch] {
        self.ensure_patches();
        &mut self.patches
    }

    pub(crate) fn clear_selection(&mut self) {
        self.knots.clear_selection();
    }

    /// Rebuilds the derived patches if any knot changed since the last
    /// rebuild.
    pub fn ensure_patches(&mut self) {
        if self.dirty {
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        self.patches.clear();
        let knots = self.knots.positions();
        let segments = if knots.len() <= 1 {
            vec![knots.clone()]
        } else {
            fit_segments(&knots)
        };
        for segment in segments {
            // Fitted positions are finite whenever the knots are.
            match BezierPatch::from_positions(&segment, self.radius, self.sector_count) {
                Ok(patch) => self.patches.push(patch),
                Err(err) => log::warn!("dropping spline segment: {}", err),
            }
        }
        self.dirty = false;
        log::debug!(
            "rebuilt spline: {} knots -> {} patches",
            knots.len(),
            self.patches.len()
        );
    }

    /// Patch index and local parameter for a global `t` in `[0, patch count]`.
    fn locate(&self, t: f32) -> Option<(usize, f32)> {
        let last = self.patches.len().checked_sub(1)?;
        let index = (t.floor().max(0.0) as usize).min(last);
        Some((index, t - index as f32))
    }

    pub fn value_at(&mut self, t: f32) -> Option<Vec3> {
        self.ensure_patches();
        let (index, local) = self.locate(t)?;
        self.patches[index].value_at(local)
    }

    pub fn tangent_at(&mut self, t: f32) -> Option<Vec3> {
        self.ensure_patches();
        let (index, local) = self.locate(t)?;
        self.patches[index].tangent_at(local)
    }

    pub fn translate(&mut self, translation: Vec3) -> Result<(), CurveError> {
        self.knots.translate(translation)?;
        self.dirty = true;
        Ok(())
    }

    pub fn closest_distance_to_ray(&mut self, ray: &Ray, epsilon: f32) -> f32 {
        self.ensure_patches();
        self.patches
            .iter()
            .map(|patch| patch.closest_distance_to_ray(ray, epsilon))
            .fold(f32::INFINITY, f32::min)
    }

    pub fn closest_knot_to_ray(&self, ray: &Ray, max_distance: f32) -> Option<PointId> {
        closest_point_to_ray(self.knots.as_slice(), ray, max_distance)
    }

    pub fn length(&mut self, epsilon: f32) -> f32 {
        self.ensure_patches();
        self.patches.iter().map(|patch| patch.length(epsilon)).sum()
    }

    /// Independent copy of the knots and appearance; patches are rebuilt
    /// for the copy and its tubes regenerate from scratch.
    pub fn deep_copy(&self) -> Self {
        let mut knots = self.knots.clone();
        knots.clear_selection();
        Self {
            knots,
            patches: Vec::new(),
            dirty: true,
            selected: false,
            material: self.material,
            radius: self.radius,
            sector_count: self.sector_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn scenario() -> Spline {
        Spline::from_knots(
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(5.0, 5.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
                Vec3::new(0.0, 15.0, 0.0),
            ],
            DEFAULT_RADIUS,
            DEFAULT_SECTOR_COUNT,
        )
        .unwrap()
    }

    #[test]
    fn constructors_reject_invalid_appearance() {
        assert!(matches!(
            Spline::with_appearance(-1.0, 8),
            Err(CurveError::InvalidRadius(_))
        ));
        assert!(matches!(
            Spline::with_appearance(f32::NAN, 8),
            Err(CurveError::InvalidRadius(_))
        ));
        assert!(matches!(
            Spline::with_appearance(0.25, 1),
            Err(CurveError::InvalidSectorCount(1))
        ));
        assert!(matches!(
            Spline::from_knots(&[Vec3::ZERO, Vec3::X], 0.25, 0),
            Err(CurveError::InvalidSectorCount(0))
        ));

        let mut spline = Spline::with_appearance(0.5, 6).unwrap();
        spline.add_knot(Vec3::ZERO).unwrap();
        spline.add_knot(Vec3::X).unwrap();
        let patch = &spline.bezier_patches()[0];
        assert_eq!(patch.radius(), 0.5);
        assert_eq!(patch.sector_count(), 6);
    }

    #[test]
    fn patch_counts_follow_knot_counts() {
        let mut spline = Spline::new();
        assert_eq!(spline.bezier_patches().len(), 1);
        assert!(spline.bezier_patches()[0].control_points().is_empty());

        spline.add_knot(Vec3::ONE).unwrap();
        assert_eq!(spline.bezier_patches().len(), 1);
        assert_eq!(spline.bezier_patches()[0].degree(), Some(0));

        for n in 2..8 {
            let mut spline = Spline::new();
            for i in 0..n {
                spline
                    .add_knot(Vec3::new(i as f32, (i * i) as f32, 0.0))
                    .unwrap();
            }
            let expected_points = if n == 2 { 2 } else { 4 };
            let patches = spline.bezier_patches();
            assert_eq!(patches.len(), n - 1);
            assert!(patches
                .iter()
                .all(|patch| patch.control_points().len() == expected_points));
        }
    }

    #[test]
    fn scenario_endpoints_match_knots() {
        let mut spline = scenario();
        let knots = spline.knot_positions();
        let patches = spline.bezier_patches();
        assert_eq!(patches.len(), 3);
        assert_eq!(patches[0].control_point_positions()[0], Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(patches[2].control_point_positions()[3], Vec3::new(0.0, 15.0, 0.0));
        assert_eq!(patches[0].control_point_positions()[0], knots[0]);
        assert_eq!(patches[2].control_point_positions()[3], knots[3]);
    }

    #[test]
    fn adjacent_patches_are_continuous() {
        let mut spline = scenario();
        let patches = spline.bezier_patches();
        for pair in patches.windows(2) {
            assert_eq!(pair[0].value_at(1.0), pair[1].value_at(0.0));
        }
    }

    #[test]
    fn two_knot_spline_is_a_unit_line() {
        let mut spline = Spline::from_knots(&[Vec3::ZERO, Vec3::X], 0.25, 8).unwrap();
        let patches = spline.bezier_patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].control_point_positions(), vec![Vec3::ZERO, Vec3::X]);
        assert_abs_diff_eq!(spline.length(0.01), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn global_parameter_maps_to_patches() {
        let mut spline = scenario();
        assert_eq!(spline.value_at(0.0), Some(Vec3::ZERO));
        assert_eq!(spline.value_at(1.0), Some(Vec3::new(5.0, 5.0, 0.0)));
        assert_eq!(spline.value_at(2.0), Some(Vec3::new(0.0, 10.0, 0.0)));
        assert_eq!(spline.value_at(3.0), Some(Vec3::new(0.0, 15.0, 0.0)));
        // Past the end clamps to the last patch.
        let beyond = spline.value_at(3.5).unwrap();
        assert!(beyond.is_finite());
        assert_eq!(spline.value_at(-1.0), spline.bezier_patches()[0].value_at(-1.0));
        let tangent = spline.tangent_at(1.5).unwrap();
        assert_abs_diff_eq!(tangent.length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn knot_edits_mark_dirty_and_rebuild_lazily() {
        let mut spline = scenario();
        spline.bezier_patches();
        assert!(!spline.is_dirty());

        let last = spline.knot_points()[3].id();
        spline.set_knot_position(last, Vec3::new(0.0, 20.0, 0.0)).unwrap();
        assert!(spline.is_dirty());
        assert_eq!(
            spline.bezier_patches()[2].control_point_positions()[3],
            Vec3::new(0.0, 20.0, 0.0)
        );
        assert!(!spline.is_dirty());

        spline.remove_knot(last).unwrap();
        assert_eq!(spline.bezier_patches().len(), 2);

        spline.insert_knot(0, Vec3::new(0.0, -5.0, 0.0)).unwrap();
        assert_eq!(spline.bezier_patches().len(), 3);
        assert_eq!(
            spline.bezier_patches()[0].control_point_positions()[0],
            Vec3::new(0.0, -5.0, 0.0)
        );
    }

    #[test]
    fn translate_moves_every_knot() {
        let mut spline = scenario();
        let before = spline.knot_positions();
        spline.translate(Vec3::new(1.0, -1.0, 2.0)).unwrap();
        assert!(spline.is_dirty());
        for (a, b) in before.iter().zip(spline.knot_positions()) {
            assert_eq!(b - *a, Vec3::new(1.0, -1.0, 2.0));
        }
        assert_eq!(spline.value_at(0.0), Some(Vec3::new(1.0, -1.0, 2.0)));
    }

    #[test]
    fn ray_queries_aggregate_over_patches() {
        let mut spline = scenario();
        let target = spline.value_at(2.5).unwrap();
        let ray = Ray::new(target + Vec3::Z * 4.0, -Vec3::Z);
        assert_abs_diff_eq!(spline.closest_distance_to_ray(&ray, 0.01), 0.0, epsilon = 1e-3);

        let away = Ray::new(Vec3::new(0.0, 0.0, 4.0), Vec3::Z);
        assert_eq!(spline.closest_distance_to_ray(&away, 0.01), f32::INFINITY);

        let knot = spline.knot_points()[1].id();
        let at_knot = Ray::new(Vec3::new(5.0, 5.2, 3.0), -Vec3::Z);
        assert_eq!(spline.closest_knot_to_ray(&at_knot, 0.5), Some(knot));
        assert_eq!(spline.closest_knot_to_ray(&at_knot, 0.1), None);
    }

    #[test]
    fn appearance_propagates_to_patches() {
        let mut spline = scenario();
        spline.bezier_patches();
        spline.set_radius(0.75).unwrap();
        spline.set_sector_count(12).unwrap();
        assert!(spline
            .bezier_patches()
            .iter()
            .all(|patch| patch.radius() == 0.75 && patch.sector_count() == 12));
        assert!(spline.set_radius(-1.0).is_err());
        assert!(spline.set_sector_count(1).is_err());
    }

    #[test]
    fn deep_copy_is_independent() {
        let mut spline = scenario();
        let mut copy = spline.deep_copy();
        let first = copy.knot_points()[0].id();
        copy.set_knot_position(first, Vec3::new(9.0, 9.0, 9.0)).unwrap();
        assert_eq!(spline.value_at(0.0), Some(Vec3::ZERO));
        assert_eq!(copy.value_at(0.0), Some(Vec3::new(9.0, 9.0, 9.0)));
        assert_eq!(copy.radius(), spline.radius());
    }
}
