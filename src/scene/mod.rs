pub mod serialization;

use glam::Vec3;

use crate::curve::{
    validate_radius, validate_sector_count, Curve, CurveError, PointId, Ray, Spline,
    DEFAULT_RADIUS, DEFAULT_SECTOR_COUNT,
};
use serialization::CurveData;

/// Stable handle of a curve in a [`CurveRegistry`]. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurveId(pub u64);

/// A point on a specific curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointHandle {
    pub curve: CurveId,
    pub point: PointId,
}

#[derive(Debug)]
struct CurveEntry {
    id: CurveId,
    curve: Curve,
}

/// Owns every curve in the scene and the current selection.
///
/// Selection flags on curves and points are kept in step with
/// `selected_curve` / `selected_point`: at most one curve and one point
/// carry the flag, and the point always belongs to the selected curve.
#[derive(Debug)]
pub struct CurveRegistry {
    entries: Vec<CurveEntry>,
    next_id: u64,
    selected_curve: Option<CurveId>,
    selected_point: Option<PointHandle>,
    default_radius: f32,
    default_sector_count: u32,
}

impl Default for CurveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CurveRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            selected_curve: None,
            selected_point: None,
            default_radius: DEFAULT_RADIUS,
            default_sector_count: DEFAULT_SECTOR_COUNT,
        }
    }

    /// Registry whose new curves start with the given pipe appearance.
    pub fn with_defaults(radius: f32, sector_count: u32) -> Result<Self, CurveError> {
        validate_radius(radius)?;
        validate_sector_count(sector_count)?;
        Ok(Self {
            default_radius: radius,
            default_sector_count: sector_count,
            ..Self::new()
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn default_radius(&self) -> f32 {
        self.default_radius
    }

    pub fn default_sector_count(&self) -> u32 {
        self.default_sector_count
    }

    pub fn ids(&self) -> Vec<CurveId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    pub fn curves(&self) -> impl Iterator<Item = (CurveId, &Curve)> {
        self.entries.iter().map(|entry| (entry.id, &entry.curve))
    }

    pub fn curves_mut(&mut self) -> impl Iterator<Item = (CurveId, &mut Curve)> {
        self.entries
            .iter_mut()
            .map(|entry| (entry.id, &mut entry.curve))
    }

    pub fn curve(&self, id: CurveId) -> Option<&Curve> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| &entry.curve)
    }

    pub fn curve_mut(&mut self, id: CurveId) -> Option<&mut Curve> {
        self.entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .map(|entry| &mut entry.curve)
    }

    pub fn add_curve(&mut self, curve: impl Into<Curve>) -> CurveId {
        let id = CurveId(self.next_id);
        self.next_id += 1;
        let mut curve = curve.into();
        curve.set_selected(false);
        curve.clear_point_selection();
        self.entries.push(CurveEntry { id, curve });
        log::info!("added curve {:?}", id);
        id
    }

    /// New spline through `knots` with the registry's default appearance.
    pub fn add_spline(&mut self, knots: &[Vec3]) -> Result<CurveId, CurveError> {
        let spline = Spline::from_knots(knots, self.default_radius, self.default_sector_count)?;
        Ok(self.add_curve(spline))
    }

    pub fn remove_curve(&mut self, id: CurveId) -> Option<Curve> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        if self.selected_curve == Some(id) {
            self.set_selected_curve(None);
        }
        let entry = self.entries.remove(index);
        log::info!("removed curve {:?}", id);
        Some(entry.curve)
    }

    pub fn clear(&mut self) {
        self.selected_curve = None;
        self.selected_point = None;
        let count = self.entries.len();
        self.entries.clear();
        log::info!("cleared {} curves", count);
    }

    /// Appends an independent copy of `id` and returns the copy's handle.
    pub fn duplicate_curve(&mut self, id: CurveId) -> Option<CurveId> {
        let copy = self.curve(id)?.deep_copy();
        Some(self.add_curve(copy))
    }

    pub fn selected_curve(&self) -> Option<CurveId> {
        self.selected_curve
    }

    pub fn selected_point(&self) -> Option<PointHandle> {
        self.selected_point
    }

    /// Selects `id` (or nothing) and drops the point selection. Unknown ids
    /// select nothing.
    pub fn set_selected_curve(&mut self, id: Option<CurveId>) {
        let id = id.filter(|&id| self.curve(id).is_some());
        if self.selected_curve == id {
            return;
        }
        if let Some(curve) = self.selected_curve.and_then(|old| self.curve_mut(old)) {
            curve.set_selected(false);
        }
        if let Some(curve) = id.and_then(|new| self.curve_mut(new)) {
            curve.set_selected(true);
        }
        self.selected_curve = id;
        log::debug!("selected curve {:?}", id);
        self.set_selected_point(None);
    }

    /// Selects a point of the selected curve. Points on other curves and
    /// unknown points select nothing.
    pub fn set_selected_point(&mut self, handle: Option<PointHandle>) {
        let handle = handle.filter(|handle| {
            Some(handle.curve) == self.selected_curve
                && self
                    .curve(handle.curve)
                    .is_some_and(|curve| curve.point(handle.point).is_some())
        });
        if self.selected_point == handle {
            return;
        }
        if let Some(old) = self.selected_point {
            if let Some(point) = self
                .curve_mut(old.curve)
                .and_then(|curve| curve.point_mut(old.point))
            {
                point.set_selected(false);
            }
        }
        if let Some(new) = handle {
            if let Some(point) = self
                .curve_mut(new.curve)
                .and_then(|curve| curve.point_mut(new.point))
            {
                point.set_selected(true);
            }
        }
        self.selected_point = handle;
    }

    /// Picks the curve passing closest to `ray`. Nothing is selected when
    /// the best distance is not below `max_distance`.
    pub fn select_curve(&mut self, ray: &Ray, max_distance: f32, epsilon: f32) -> Option<CurveId> {
        let mut best: Option<(CurveId, f32)> = None;
        for entry in &mut self.entries {
            let distance = entry.curve.closest_distance_to_ray(ray, epsilon);
            if distance < best.map_or(f32::INFINITY, |(_, min)| min) {
                best = Some((entry.id, distance));
            }
        }
        let picked = best
            .filter(|&(_, distance)| distance < max_distance)
            .map(|(id, _)| id);
        self.set_selected_curve(picked);
        picked
    }

    /// Picks a point of the selected curve. Without a selected curve this
    /// does nothing.
    pub fn select_point(&mut self, ray: &Ray, max_distance: f32) -> Option<PointHandle> {
        let curve_id = self.selected_curve?;
        let point = self.curve(curve_id)?.closest_point_to_ray(ray, max_distance);
        let handle = point.map(|point| PointHandle {
            curve: curve_id,
            point,
        });
        self.set_selected_point(handle);
        handle
    }

    /// Appends a point to the selected curve, first creating and selecting
    /// an empty spline when no curve is selected. The new point becomes
    /// the selected point.
    pub fn add_knot_to_selected(&mut self, position: Vec3) -> Result<PointHandle, CurveError> {
        if let Some(curve_id) = self.selected_curve {
            if let Some(curve) = self.curve_mut(curve_id) {
                let point = curve.add_point(position)?;
                let handle = PointHandle {
                    curve: curve_id,
                    point,
                };
                self.set_selected_point(Some(handle));
                return Ok(handle);
            }
        }

        let mut spline = Spline::with_appearance(self.default_radius, self.default_sector_count)?;
        let point = spline.add_knot(position)?;
        let curve_id = self.add_curve(spline);
        self.set_selected_curve(Some(curve_id));
        let handle = PointHandle {
            curve: curve_id,
            point,
        };
        self.set_selected_point(Some(handle));
        Ok(handle)
    }

    /// Moves the selected point. Returns `Ok(false)` when nothing is
    /// selected.
    pub fn move_selected_point(&mut self, position: Vec3) -> Result<bool, CurveError> {
        let Some(handle) = self.selected_point else {
            return Ok(false);
        };
        let Some(curve) = self.curve_mut(handle.curve) else {
            return Ok(false);
        };
        curve.set_point_position(handle.point, position)?;
        Ok(true)
    }

    pub fn remove_selected_point(&mut self) -> bool {
        let Some(handle) = self.selected_point.take() else {
            return false;
        };
        self.curve_mut(handle.curve)
            .and_then(|curve| curve.remove_point(handle.point))
            .is_some()
    }

    pub fn remove_selected_curve(&mut self) -> Option<Curve> {
        let id = self.selected_curve?;
        self.remove_curve(id)
    }

    pub fn set_selected_radius(&mut self, radius: f32) -> Result<bool, CurveError> {
        validate_radius(radius)?;
        let Some(curve) = self.selected_curve.and_then(|id| self.curve_mut(id)) else {
            return Ok(false);
        };
        curve.set_radius(radius)?;
        Ok(true)
    }

    pub fn set_selected_sector_count(&mut self, sector_count: u32) -> Result<bool, CurveError> {
        validate_sector_count(sector_count)?;
        let Some(curve) = self.selected_curve.and_then(|id| self.curve_mut(id)) else {
            return Ok(false);
        };
        curve.set_sector_count(sector_count)?;
        Ok(true)
    }

    /// Applies `radius` to every curve and to curves created later.
    pub fn set_global_radius(&mut self, radius: f32) -> Result<(), CurveError> {
        validate_radius(radius)?;
        for entry in &mut self.entries {
            entry.curve.set_radius(radius)?;
        }
        self.default_radius = radius;
        Ok(())
    }

    /// Applies `sector_count` to every curve and to curves created later.
    pub fn set_global_sector_count(&mut self, sector_count: u32) -> Result<(), CurveError> {
        validate_sector_count(sector_count)?;
        for entry in &mut self.entries {
            entry.curve.set_sector_count(sector_count)?;
        }
        self.default_sector_count = sector_count;
        Ok(())
    }

    /// Persistence shape of every spline. Free-form curves have no saved
    /// form and are skipped.
    pub fn to_data(&self) -> Vec<CurveData> {
        let data: Vec<CurveData> = self
            .entries
            .iter()
            .filter_map(|entry| entry.curve.as_spline())
            .map(CurveData::from_spline)
            .collect();
        if data.len() != self.entries.len() {
            log::warn!(
                "skipping {} free-form curves that cannot be saved",
                self.entries.len() - data.len()
            );
        }
        data
    }

    /// Adds a spline per entry. Either every entry is added or none is.
    pub fn extend_from_data(&mut self, data: &[CurveData]) -> Result<Vec<CurveId>, CurveError> {
        let splines = data
            .iter()
            .map(CurveData::to_spline)
            .collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<CurveId> = splines
            .into_iter()
            .map(|spline| self.add_curve(spline))
            .collect();
        log::info!("loaded {} curves", ids.len());
        Ok(ids)
    }
}
