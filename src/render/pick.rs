//! Ray picking.
//!
//! A click is turned into a world-space [`Ray`] by unprojecting the cursor
//! through the inverse view-projection matrix, then resolved against the
//! registry: points of the selected curve win over curves.
//!
//! Projections are expected to map depth to `[0, 1]` (glam's
//! `perspective_rh` / `orthographic_rh`).

use glam::{Mat4, Vec3};

use crate::config::PickSettings;
use crate::curve::Ray;
use crate::scene::{CurveId, CurveRegistry, PointHandle};

/// Result of resolving a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickHit {
    Point(PointHandle),
    Curve(CurveId),
}

impl PickHit {
    pub fn curve(&self) -> CurveId {
        match self {
            PickHit::Point(handle) => handle.curve,
            PickHit::Curve(id) => *id,
        }
    }
}

/// World-space ray under the screen position `(screen_x, screen_y)`,
/// measured in pixels from the top-left corner of a `width` x `height`
/// viewport. The origin lies on the near plane.
pub fn ray_from_screen(
    screen_x: f32,
    screen_y: f32,
    width: f32,
    height: f32,
    view: Mat4,
    projection: Mat4,
) -> Option<Ray> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let view_proj = projection * view;
    if view_proj.determinant().abs() <= f32::EPSILON {
        return None;
    }
    let inverse = view_proj.inverse();
    let ndc_x = (screen_x / width) * 2.0 - 1.0;
    let ndc_y = 1.0 - (screen_y / height) * 2.0;
    let near = inverse.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
    let far = inverse.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
    let direction = far - near;
    if !near.is_finite() || !direction.is_finite() || direction.length_squared() == 0.0 {
        return None;
    }
    Some(Ray::new(near, direction))
}

/// Click-to-select: first a point of the currently selected curve, then
/// any curve. Updates the registry's selection either way.
pub fn pick(registry: &mut CurveRegistry, ray: &Ray, settings: &PickSettings) -> Option<PickHit> {
    if registry.selected_curve().is_some() {
        if let Some(handle) = registry.select_point(ray, settings.max_distance) {
            log::debug!("picked point {:?}", handle);
            return Some(PickHit::Point(handle));
        }
    }
    let hit = registry
        .select_curve(ray, settings.max_distance, settings.epsilon)
        .map(PickHit::Curve);
    log::debug!("picked {:?}", hit);
    hit
}
