//! Curve model: knots, Bezier patches and interpolating splines.

pub mod bezier;
pub mod fitter;
pub mod point;
pub mod spline;

pub use bezier::{BezierPatch, DEFAULT_RADIUS, DEFAULT_SECTOR_COUNT};
pub use point::{Point, PointArena, PointId};
pub use spline::Spline;

use glam::Vec3;

pub const MIN_SECTOR_COUNT: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CurveError {
    #[error("position is not finite: {0:?}")]
    NonFinitePosition([f32; 3]),
    #[error("unknown point {0:?}")]
    UnknownPoint(PointId),
    #[error("pipe radius must be positive and finite, got {0}")]
    InvalidRadius(f32),
    #[error("pipe sector count must be at least 3, got {0}")]
    InvalidSectorCount(u32),
}

pub(crate) fn validate_radius(radius: f32) -> Result<(), CurveError> {
    if radius > 0.0 && radius.is_finite() {
        Ok(())
    } else {
        Err(CurveError::InvalidRadius(radius))
    }
}

pub(crate) fn validate_sector_count(sector_count: u32) -> Result<(), CurveError> {
    if sector_count >= MIN_SECTOR_COUNT {
        Ok(())
    } else {
        Err(CurveError::InvalidSectorCount(sector_count))
    }
}

/// Pick ray. The direction is kept at unit length so projections onto it
/// are distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

/// Phong-style appearance the pipe renderer reads per curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: [f32; 4],
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            ambient: 0.25,
            diffuse: 0.75,
            specular: 0.25,
            shininess: 4.0,
        }
    }
}

/// A user-authored Bezier curve of any degree.
#[derive(Debug, Default)]
pub struct BezierCurve {
    patch: BezierPatch,
    selected: bool,
    material: Material,
}

impl BezierCurve {
    pub fn new(radius: f32, sector_count: u32) -> Result<Self, CurveError> {
        Ok(Self {
            patch: BezierPatch::new(radius, sector_count)?,
            selected: false,
            material: Material::default(),
        })
    }

    pub fn patch(&self) -> &BezierPatch {
        &self.patch
    }

    pub fn patch_mut(&mut self) -> &mut BezierPatch {
        &mut self.patch
    }

    pub fn deep_copy(&self) -> Self {
        let mut patch = self.patch.deep_copy();
        patch.clear_selection();
        Self {
            patch,
            selected: false,
            material: self.material,
        }
    }
}

/// Every curve kind the editor knows about.
#[derive(Debug)]
pub enum Curve {
    Bezier(BezierCurve),
    Spline(Spline),
}

impl From<Spline> for Curve {
    fn from(spline: Spline) -> Self {
        Curve::Spline(spline)
    }
}

impl From<BezierCurve> for Curve {
    fn from(curve: BezierCurve) -> Self {
        Curve::Bezier(curve)
    }
}

impl Curve {
    pub fn as_spline(&self) -> Option<&Spline> {
        match self {
            Curve::Spline(spline) => Some(spline),
            Curve::Bezier(_) => None,
        }
    }

    pub fn selected(&self) -> bool {
        match self {
            Curve::Bezier(curve) => curve.selected,
            Curve::Spline(spline) => spline.selected(),
        }
    }

    pub fn set_selected(&mut self, selected: bool) {
        match self {
            Curve::Bezier(curve) => curve.selected = selected,
            Curve::Spline(spline) => spline.set_selected(selected),
        }
    }

    pub fn material(&self) -> &Material {
        match self {
            Curve::Bezier(curve) => &curve.material,
            Curve::Spline(spline) => spline.material(),
        }
    }

    pub fn set_material(&mut self, material: Material) {
        match self {
            Curve::Bezier(curve) => curve.material = material,
            Curve::Spline(spline) => spline.set_material(material),
        }
    }

    pub fn radius(&self) -> f32 {
        match self {
            Curve::Bezier(curve) => curve.patch.radius(),
            Curve::Spline(spline) => spline.radius(),
        }
    }

    pub fn set_radius(&mut self, radius: f32) -> Result<(), CurveError> {
        match self {
            Curve::Bezier(curve) => curve.patch.set_radius(radius),
            Curve::Spline(spline) => spline.set_radius(radius),
        }
    }

    pub fn sector_count(&self) -> u32 {
        match self {
            Curve::Bezier(curve) => curve.patch.sector_count(),
            Curve::Spline(spline) => spline.sector_count(),
        }
    }

    pub fn set_sector_count(&mut self, sector_count: u32) -> Result<(), CurveError> {
        match self {
            Curve::Bezier(curve) => curve.patch.set_sector_count(sector_count),
            Curve::Spline(spline) => spline.set_sector_count(sector_count),
        }
    }

    /// Patches to draw, rebuilding a dirty spline first.
    pub fn patches(&mut self) -> &[BezierPatch] {
        match self {
            Curve::Bezier(curve) => std::slice::from_ref(&curve.patch),
            Curve::Spline(spline) => spline.bezier_patches(),
        }
    }

    pub fn patches_mut(&mut self) -> &mut [BezierPatch] {
        match self {
            Curve::Bezier(curve) => std::slice::from_mut(&mut curve.patch),
            Curve::Spline(spline) => spline.bezier_patches_mut(),
        }
    }

    pub fn value_at(&mut self, t: f32) -> Option<Vec3> {
        match self {
            Curve::Bezier(curve) => curve.patch.value_at(t),
            Curve::Spline(spline) => spline.value_at(t),
        }
    }

    pub fn tangent_at(&mut self, t: f32) -> Option<Vec3> {
        match self {
            Curve::Bezier(curve) => curve.patch.tangent_at(t),
            Curve::Spline(spline) => spline.tangent_at(t),
        }
    }

    pub fn translate(&mut self, translation: Vec3) -> Result<(), CurveError> {
        match self {
            Curve::Bezier(curve) => curve.patch.translate(translation),
            Curve::Spline(spline) => spline.translate(translation),
        }
    }

    pub fn closest_distance_to_ray(&mut self, ray: &Ray, epsilon: f32) -> f32 {
        match self {
            Curve::Bezier(curve) => curve.patch.closest_distance_to_ray(ray, epsilon),
            Curve::Spline(spline) => spline.closest_distance_to_ray(ray, epsilon),
        }
    }

    pub fn length(&mut self, epsilon: f32) -> f32 {
        match self {
            Curve::Bezier(curve) => curve.patch.length(epsilon),
            Curve::Spline(spline) => spline.length(epsilon),
        }
    }

    /// Pickable points: control points of a free-form curve, knots of a
    /// spline.
    pub fn points(&self) -> &[Point] {
        match self {
            Curve::Bezier(curve) => curve.patch.control_points(),
            Curve::Spline(spline) => spline.knots(),
        }
    }

    pub fn point(&self, id: PointId) -> Option<&Point> {
        match self {
            Curve::Bezier(curve) => curve.patch.control_point(id),
            Curve::Spline(spline) => spline.knot(id),
        }
    }

    pub(crate) fn point_mut(&mut self, id: PointId) -> Option<&mut Point> {
        match self {
            Curve::Bezier(curve) => curve.patch.control_point_mut(id),
            Curve::Spline(spline) => spline.knot_mut(id),
        }
    }

    pub fn closest_point_to_ray(&self, ray: &Ray, max_distance: f32) -> Option<PointId> {
        match self {
            Curve::Bezier(curve) => curve.patch.closest_control_point_to_ray(ray, max_distance),
            Curve::Spline(spline) => spline.closest_knot_to_ray(ray, max_distance),
        }
    }

    pub fn add_point(&mut self, position: Vec3) -> Result<PointId, CurveError> {
        match self {
            Curve::Bezier(curve) => curve.patch.add_control_point(position),
            Curve::Spline(spline) => spline.add_knot(position),
        }
    }

    pub fn set_point_position(&mut self, id: PointId, position: Vec3) -> Result<(), CurveError> {
        match self {
            Curve::Bezier(curve) => curve.patch.set_control_point_position(id, position),
            Curve::Spline(spline) => spline.set_knot_position(id, position),
        }
    }

    pub fn remove_point(&mut self, id: PointId) -> Option<Point> {
        match self {
            Curve::Bezier(curve) => curve.patch.remove_control_point(id),
            Curve::Spline(spline) => spline.remove_knot(id),
        }
    }

    pub(crate) fn clear_point_selection(&mut self) {
        match self {
            Curve::Bezier(curve) => curve.patch.clear_selection(),
            Curve::Spline(spline) => spline.clear_selection(),
        }
    }

    pub fn deep_copy(&self) -> Self {
        match self {
            Curve::Bezier(curve) => Curve::Bezier(curve.deep_copy()),
            Curve::Spline(spline) => Curve::Spline(spline.deep_copy()),
        }
    }
}
