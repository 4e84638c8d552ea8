//! Boundary with the rendering backend.
//!
//! The backend owns every GPU resource. Each frame it calls
//! [`sync_tubes`] to advance the per-patch tube state machines and receive
//! freshly generated meshes through [`TubeUploader`], then pulls
//! [`path_draw_list`] and [`pipe_draw_list`] to know what to draw.

pub mod pick;

pub use pick::{pick, ray_from_screen, PickHit};

use std::collections::{HashMap, HashSet};

use crate::curve::Material;
use crate::scene::{CurveId, CurveRegistry};
use crate::tube::{SyncOutcome, TubeMesh, TubeState};

/// Identifies one Bezier patch of one curve. Indices are positional, so a
/// rebuilt spline reuses the keys of its previous patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchKey {
    pub curve: CurveId,
    pub patch_index: usize,
}

/// Receives finished tube meshes on the render thread.
pub trait TubeUploader {
    /// Replaces whatever buffer is stored for `key`.
    fn upload_tube(&mut self, key: PatchKey, mesh: &TubeMesh);

    /// Called once per sync with every key that still exists. Buffers of
    /// other keys may be freed.
    fn retain_tubes(&mut self, _live: &HashSet<PatchKey>) {}
}

/// CPU-side uploader that keeps a copy of every mesh, for headless runs.
#[derive(Debug, Default)]
pub struct TubeMeshCache {
    meshes: HashMap<PatchKey, TubeMesh>,
}

impl TubeMeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: PatchKey) -> Option<&TubeMesh> {
        self.meshes.get(&key)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn total_triangles(&self) -> usize {
        self.meshes.values().map(TubeMesh::triangle_count).sum()
    }
}

impl TubeUploader for TubeMeshCache {
    fn upload_tube(&mut self, key: PatchKey, mesh: &TubeMesh) {
        self.meshes.insert(key, mesh.clone());
    }

    fn retain_tubes(&mut self, live: &HashSet<PatchKey>) {
        self.meshes.retain(|key, _| live.contains(key));
    }
}

/// Counts from one [`sync_tubes`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub launched: usize,
    pub generating: usize,
    pub uploaded: usize,
    /// Patches not yet `Ready` after this sync.
    pub pending: usize,
}

impl SyncStats {
    pub fn is_settled(&self) -> bool {
        self.pending == 0
    }
}

/// One render step over every patch of every curve: dirty patches start
/// generating, finished ones are uploaded and become `Ready`.
pub fn sync_tubes<U: TubeUploader + ?Sized>(
    registry: &mut CurveRegistry,
    uploader: &mut U,
    tick_count: u32,
) -> SyncStats {
    let mut stats = SyncStats::default();
    let mut live = HashSet::new();
    for (curve_id, curve) in registry.curves_mut() {
        for (patch_index, patch) in curve.patches_mut().iter_mut().enumerate() {
            let key = PatchKey {
                curve: curve_id,
                patch_index,
            };
            live.insert(key);
            match patch.sync_tube(tick_count, |mesh| uploader.upload_tube(key, mesh)) {
                SyncOutcome::Launched => stats.launched += 1,
                SyncOutcome::Generating => stats.generating += 1,
                SyncOutcome::Uploaded => stats.uploaded += 1,
                SyncOutcome::Idle => {}
            }
            if patch.tube_state() != TubeState::Ready {
                stats.pending += 1;
            }
        }
    }
    uploader.retain_tubes(&live);
    stats
}

/// Control polygon of one patch, for drawing the curve as a line strip.
#[derive(Debug, Clone, PartialEq)]
pub struct PathDraw {
    pub key: PatchKey,
    pub selected: bool,
    pub control_points: Vec<[f32; 3]>,
}

/// Everything needed to draw the pipe of one patch.
#[derive(Debug, Clone, Copy)]
pub struct PipeDraw<'a> {
    pub key: PatchKey,
    pub selected: bool,
    pub material: Material,
    pub radius: f32,
    pub sector_count: u32,
    pub state: TubeState,
    /// Last uploaded mesh. Still set while a newer one is generated.
    pub mesh: Option<&'a TubeMesh>,
}

pub fn path_draw_list(registry: &mut CurveRegistry) -> Vec<PathDraw> {
    let mut draws = Vec::new();
    for (curve_id, curve) in registry.curves_mut() {
        let selected = curve.selected();
        for (patch_index, patch) in curve.patches().iter().enumerate() {
            draws.push(PathDraw {
                key: PatchKey {
                    curve: curve_id,
                    patch_index,
                },
                selected,
                control_points: patch
                    .control_point_positions()
                    .into_iter()
                    .map(|p| p.to_array())
                    .collect(),
            });
        }
    }
    draws
}

pub fn pipe_draw_list(registry: &mut CurveRegistry) -> Vec<PipeDraw<'_>> {
    let mut draws = Vec::new();
    for (curve_id, curve) in registry.curves_mut() {
        let selected = curve.selected();
        let material = *curve.material();
        for (patch_index, patch) in curve.patches().iter().enumerate() {
            draws.push(PipeDraw {
                key: PatchKey {
                    curve: curve_id,
                    patch_index,
                },
                selected,
                material,
                radius: patch.radius(),
                sector_count: patch.sector_count(),
                state: patch.tube_state(),
                mesh: patch.tube_mesh(),
            });
        }
    }
    draws
}
