use crate::curve::{CurveError, Spline};
use glam::Vec3;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PositionData {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KnotData {
    pub position: PositionData,
}

/// One saved curve: pipe appearance plus its knots in order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CurveData {
    #[serde(rename = "r")]
    pub radius: f32,
    pub sector_count: u32,
    pub knots: Vec<KnotData>,
}

impl From<Vec3> for PositionData {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<PositionData> for Vec3 {
    fn from(p: PositionData) -> Self {
        Vec3::new(p.x, p.y, p.z)
    }
}

impl CurveData {
    pub fn from_spline(spline: &Spline) -> Self {
        Self {
            radius: spline.radius(),
            sector_count: spline.sector_count(),
            knots: spline
                .knots()
                .iter()
                .map(|knot| KnotData {
                    position: knot.position().into(),
                })
                .collect(),
        }
    }

    pub fn knot_positions(&self) -> Vec<Vec3> {
        self.knots.iter().map(|knot| knot.position.into()).collect()
    }

    /// Rebuilds the spline, rejecting bad appearance values and
    /// non-finite knots.
    pub fn to_spline(&self) -> std::result::Result<Spline, CurveError> {
        Spline::from_knots(&self.knot_positions(), self.radius, self.sector_count)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid curve data: {0}")]
    Curve(#[from] CurveError),
}

pub type Result<T> = std::result::Result<T, SerializationError>;

pub fn save_curves_to_file(curves: &[CurveData], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(curves)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_curves_from_file(path: &Path) -> Result<Vec<CurveData>> {
    let json = std::fs::read_to_string(path)?;
    let curves: Vec<CurveData> = serde_json::from_str(&json)?;
    for curve in &curves {
        // Validate now so a bad file fails before anything reaches a registry.
        curve.to_spline()?;
    }
    Ok(curves)
}
