use glam::Vec3;

use super::CurveError;

/// Handle to a point inside the curve that owns it.
///
/// Ids are never reused by an owner, so a handle to a removed point
/// simply fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    id: PointId,
    position: Vec3,
    selected: bool,
}

impl Point {
    pub fn id(&self) -> PointId {
        self.id
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

/// Ordered storage for the points of one curve.
///
/// Order is geometric order along the curve. Mutations go through the
/// arena so the owner can mark itself dirty.
#[derive(Debug, Clone, Default)]
pub struct PointArena {
    points: Vec<Point>,
    next_id: u32,
}

impl PointArena {
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.points.iter().map(|point| point.position).collect()
    }

    pub fn get(&self, id: PointId) -> Option<&Point> {
        self.points.iter().find(|point| point.id == id)
    }

    pub fn get_mut(&mut self, id: PointId) -> Option<&mut Point> {
        self.points.iter_mut().find(|point| point.id == id)
    }

    pub fn index_of(&self, id: PointId) -> Option<usize> {
        self.points.iter().position(|point| point.id == id)
    }

    pub fn push(&mut self, position: Vec3) -> Result<PointId, CurveError> {
        self.insert(self.points.len(), position)
    }

    /// Inserts before `index`; an index past the end appends.
    pub fn insert(&mut self, index: usize, position: Vec3) -> Result<PointId, CurveError> {
        ensure_finite(position)?;
        let id = PointId(self.next_id);
        self.next_id += 1;
        let index = index.min(self.points.len());
        self.points.insert(
            index,
            Point {
                id,
                position,
                selected: false,
            },
        );
        Ok(id)
    }

    pub fn remove(&mut self, id: PointId) -> Option<Point> {
        let index = self.index_of(id)?;
        Some(self.points.remove(index))
    }

    pub fn set_position(&mut self, id: PointId, position: Vec3) -> Result<(), CurveError> {
        ensure_finite(position)?;
        let point = self.get_mut(id).ok_or(CurveError::UnknownPoint(id))?;
        point.position = position;
        Ok(())
    }

    pub fn translate(&mut self, translation: Vec3) -> Result<(), CurveError> {
        ensure_finite(translation)?;
        for point in &mut self.points {
            point.position += translation;
        }
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        for point in &mut self.points {
            point.selected = false;
        }
    }
}

pub(crate) fn ensure_finite(position: Vec3) -> Result<(), CurveError> {
    if position.is_finite() {
        Ok(())
    } else {
        Err(CurveError::NonFinitePosition(position.to_array()))
    }
}
