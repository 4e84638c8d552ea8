//! Tube generation state machine.
//!
//! The state and the id of the request it belongs to are packed into a
//! single `AtomicU64` (request id in the high bits, state in the low
//! byte). That word is the only thing the render thread and a generation
//! thread share; the mesh itself travels over a channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use super::{generate_tube, TubeInput, TubeMesh};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TubeState {
    Dirty = 0,
    GeneratingVertices = 1,
    WaitingForUpload = 2,
    Ready = 3,
}

impl TubeState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::GeneratingVertices,
            2 => Self::WaitingForUpload,
            3 => Self::Ready,
            _ => Self::Dirty,
        }
    }

    /// Every state may fall back to `Dirty`; otherwise only one step forward.
    pub fn can_transition_to(self, next: TubeState) -> bool {
        matches!(
            (self, next),
            (_, TubeState::Dirty)
                | (TubeState::Dirty, TubeState::GeneratingVertices)
                | (TubeState::GeneratingVertices, TubeState::WaitingForUpload)
                | (TubeState::WaitingForUpload, TubeState::Ready)
        )
    }
}

fn pack(request: u64, state: TubeState) -> u64 {
    (request << 8) | state as u64
}

fn unpack(word: u64) -> (u64, TubeState) {
    (word >> 8, TubeState::from_u8((word & 0xFF) as u8))
}

/// Shared, atomically updated state word of one patch.
#[derive(Debug, Clone, Default)]
pub struct TubeStatus {
    word: Arc<AtomicU64>,
}

impl TubeStatus {
    pub fn new() -> Self {
        Self {
            word: Arc::new(AtomicU64::new(pack(0, TubeState::Dirty))),
        }
    }

    pub fn state(&self) -> TubeState {
        self.load().1
    }

    pub fn load(&self) -> (u64, TubeState) {
        unpack(self.word.load(Ordering::Acquire))
    }

    /// Forces `Dirty` from any state. The request id is kept so an
    /// in-flight task can no longer match it.
    pub fn mark_dirty(&self) {
        let _ = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let (request, _) = unpack(word);
                Some(pack(request, TubeState::Dirty))
            });
    }

    /// `Dirty -> GeneratingVertices` under a fresh request id.
    pub fn try_begin(&self) -> Option<u64> {
        let current = self.word.load(Ordering::Acquire);
        let (request, state) = unpack(current);
        if state != TubeState::Dirty {
            return None;
        }
        let next = request + 1;
        self.word
            .compare_exchange(
                current,
                pack(next, TubeState::GeneratingVertices),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| next)
    }

    /// Called by the generation thread. Fails when the patch was edited
    /// after `request` started.
    pub fn finish(&self, request: u64) -> bool {
        self.advance(request, TubeState::GeneratingVertices, TubeState::WaitingForUpload)
    }

    pub fn mark_uploaded(&self, request: u64) -> bool {
        self.advance(request, TubeState::WaitingForUpload, TubeState::Ready)
    }

    /// Reverts a launch that never produced a thread.
    pub(crate) fn abort(&self, request: u64) -> bool {
        self.advance(request, TubeState::GeneratingVertices, TubeState::Dirty)
    }

    fn advance(&self, request: u64, from: TubeState, to: TubeState) -> bool {
        debug_assert!(from.can_transition_to(to));
        self.word
            .compare_exchange(
                pack(request, from),
                pack(request, to),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

struct TubeResult {
    request: u64,
    mesh: TubeMesh,
}

/// What a call to [`TubeSlot::sync`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Idle,
    Launched,
    Generating,
    Uploaded,
}

/// Per-patch tube state, result channel and last published mesh.
pub struct TubeSlot {
    status: TubeStatus,
    sender: Sender<TubeResult>,
    receiver: Receiver<TubeResult>,
    mesh: Option<TubeMesh>,
}

impl std::fmt::Debug for TubeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TubeSlot")
            .field("status", &self.status.load())
            .field("mesh_vertices", &self.mesh.as_ref().map(|m| m.vertex_count()))
            .finish()
    }
}

impl Default for TubeSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl TubeSlot {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            status: TubeStatus::new(),
            sender,
            receiver,
            mesh: None,
        }
    }

    pub fn state(&self) -> TubeState {
        self.status.state()
    }

    pub fn status(&self) -> &TubeStatus {
        &self.status
    }

    pub fn mark_dirty(&self) {
        self.status.mark_dirty();
    }

    /// Last mesh handed to the uploader, kept for redraws while a newer
    /// one is generated.
    pub fn mesh(&self) -> Option<&TubeMesh> {
        self.mesh.as_ref()
    }

    /// Render-thread step.
    ///
    /// `Dirty` launches a generation thread with the inputs built by
    /// `input`; `WaitingForUpload` hands the new mesh to `upload` and
    /// advances to `Ready`.
    pub fn sync(
        &mut self,
        input: impl FnOnce() -> TubeInput,
        upload: impl FnOnce(&TubeMesh),
    ) -> SyncOutcome {
        let (request, state) = self.status.load();
        match state {
            TubeState::Dirty => {
                if self.launch(input()) {
                    SyncOutcome::Launched
                } else {
                    SyncOutcome::Idle
                }
            }
            TubeState::GeneratingVertices => SyncOutcome::Generating,
            TubeState::WaitingForUpload => {
                let Some(mesh) = self.take_result(request) else {
                    log::warn!("tube request {} published no mesh; regenerating", request);
                    self.status.mark_dirty();
                    return SyncOutcome::Idle;
                };
                upload(&mesh);
                self.mesh = Some(mesh);
                if self.status.mark_uploaded(request) {
                    SyncOutcome::Uploaded
                } else {
                    // Edited between the load and the upload; the mesh is
                    // still the freshest we have.
                    SyncOutcome::Idle
                }
            }
            TubeState::Ready => SyncOutcome::Idle,
        }
    }

    fn launch(&mut self, input: TubeInput) -> bool {
        let Some(request) = self.status.try_begin() else {
            return false;
        };
        let status = self.status.clone();
        let sender = self.sender.clone();
        log::debug!(
            "launching tube request {} ({} control points, {} sectors)",
            request,
            input.control_points.len(),
            input.sector_count
        );
        let spawned = std::thread::Builder::new()
            .name(format!("tube-gen-{}", request))
            .spawn(move || {
                let mesh = generate_tube(&input);
                // Send before publishing the state so the render thread
                // always finds the mesh once it sees WaitingForUpload.
                if sender.send(TubeResult { request, mesh }).is_err() {
                    return;
                }
                if !status.finish(request) {
                    log::debug!("dropping stale tube request {}", request);
                }
            });
        match spawned {
            Ok(_) => true,
            Err(err) => {
                log::warn!("failed to spawn tube generation thread: {}", err);
                self.status.abort(request);
                false
            }
        }
    }

    fn take_result(&mut self, request: u64) -> Option<TubeMesh> {
        let mut found = None;
        while let Ok(result) = self.receiver.try_recv() {
            if result.request == request {
                found = Some(result.mesh);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::time::{Duration, Instant};

    const ALL: [TubeState; 4] = [
        TubeState::Dirty,
        TubeState::GeneratingVertices,
        TubeState::WaitingForUpload,
        TubeState::Ready,
    ];

    #[test]
    fn no_shortcuts_through_the_state_machine() {
        assert!(!TubeState::Dirty.can_transition_to(TubeState::Ready));
        assert!(!TubeState::Dirty.can_transition_to(TubeState::WaitingForUpload));
        assert!(!TubeState::Ready.can_transition_to(TubeState::GeneratingVertices));
        assert!(!TubeState::WaitingForUpload.can_transition_to(TubeState::GeneratingVertices));
        for state in ALL {
            assert!(state.can_transition_to(TubeState::Dirty));
        }
    }

    #[test]
    fn state_byte_roundtrip() {
        for state in ALL {
            assert_eq!(TubeState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn only_one_generation_at_a_time() {
        let status = TubeStatus::new();
        let first = status.try_begin().unwrap();
        assert!(status.try_begin().is_none());
        assert!(status.finish(first));
        assert!(status.try_begin().is_none());
        assert!(status.mark_uploaded(first));
        assert_eq!(status.state(), TubeState::Ready);
        assert!(status.try_begin().is_none());
    }

    #[test]
    fn edits_during_generation_discard_the_result() {
        let status = TubeStatus::new();
        let first = status.try_begin().unwrap();
        status.mark_dirty();
        assert!(!status.finish(first));
        assert_eq!(status.state(), TubeState::Dirty);

        let second = status.try_begin().unwrap();
        assert!(second > first);
        assert!(!status.finish(first));
        assert!(status.finish(second));
        assert_eq!(status.state(), TubeState::WaitingForUpload);
    }

    #[test]
    fn upload_needs_a_finished_request() {
        let status = TubeStatus::new();
        assert!(!status.mark_uploaded(0));
        let request = status.try_begin().unwrap();
        assert!(!status.mark_uploaded(request));
        assert_eq!(status.state(), TubeState::GeneratingVertices);
    }

    fn straight_input() -> TubeInput {
        TubeInput {
            control_points: vec![Vec3::ZERO, Vec3::X],
            radius: 0.25,
            sector_count: 8,
            tick_count: 10,
        }
    }

    #[test]
    fn slot_reaches_ready_and_uploads_once() {
        let mut slot = TubeSlot::new();
        let mut uploads = 0;
        let deadline = Instant::now() + Duration::from_secs(10);
        assert_eq!(slot.sync(straight_input, |_| uploads += 1), SyncOutcome::Launched);
        while slot.state() != TubeState::Ready {
            assert!(Instant::now() < deadline, "tube generation timed out");
            slot.sync(straight_input, |mesh| {
                assert_eq!(mesh.vertex_count(), 10 * 8 * 6);
                uploads += 1;
            });
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(uploads, 1);
        assert!(slot.mesh().is_some());
        assert_eq!(slot.sync(straight_input, |_| uploads += 1), SyncOutcome::Idle);
        assert_eq!(uploads, 1);
    }

    #[test]
    fn dirty_slot_keeps_previous_mesh() {
        let mut slot = TubeSlot::new();
        let deadline = Instant::now() + Duration::from_secs(10);
        while slot.state() != TubeState::Ready {
            assert!(Instant::now() < deadline, "tube generation timed out");
            slot.sync(straight_input, |_| {});
            std::thread::sleep(Duration::from_millis(1));
        }
        slot.mark_dirty();
        assert_eq!(slot.state(), TubeState::Dirty);
        assert!(slot.mesh().is_some());
    }

    fn raised_input() -> TubeInput {
        TubeInput {
            control_points: vec![Vec3::ZERO, Vec3::new(0.0, 2.0, 1.0)],
            radius: 0.5,
            sector_count: 6,
            tick_count: 5,
        }
    }

    /// Syncs until `Ready`, returning every mesh handed to the uploader.
    fn sync_until_ready(slot: &mut TubeSlot, input: fn() -> TubeInput) -> Vec<TubeMesh> {
        let mut uploaded = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            slot.sync(input, |mesh| uploaded.push(mesh.clone()));
            if slot.state() == TubeState::Ready {
                return uploaded;
            }
            assert!(Instant::now() < deadline, "tube generation timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn regeneration_uploads_only_the_new_inputs() {
        let mut slot = TubeSlot::new();
        let first = sync_until_ready(&mut slot, straight_input);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].vertex_count(), 10 * 8 * 6);

        slot.mark_dirty();
        let second = sync_until_ready(&mut slot, raised_input);
        let expected = generate_tube(&raised_input());
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].vertex_count(), 5 * 6 * 6);
        assert_eq!(second[0], expected);
        assert_eq!(slot.mesh(), Some(&expected));
    }

    #[test]
    fn result_of_an_interrupted_request_is_never_uploaded() {
        let mut slot = TubeSlot::new();
        assert_eq!(slot.sync(straight_input, |_| {}), SyncOutcome::Launched);
        let (stale_request, _) = slot.status().load();
        // Whether or not the worker already finished, its mesh now belongs
        // to an outdated request.
        slot.mark_dirty();

        let uploaded = sync_until_ready(&mut slot, raised_input);
        let (request, _) = slot.status().load();
        assert!(request > stale_request);
        assert_eq!(uploaded, vec![generate_tube(&raised_input())]);
        assert_eq!(slot.mesh().map(TubeMesh::vertex_count), Some(5 * 6 * 6));
    }
}
