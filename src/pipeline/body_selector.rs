use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use crate::types::{Body, TrackingId};

/// The two knobs the gesture engine exposes to the pipeline.
pub trait GestureEngineControl {
    fn set_tracking_id(&self, tracking_id: TrackingId);
    fn set_paused(&self, paused: bool);
}

/// Tracking target and pause flag, published to the engine thread through
/// atomics. Clones share the same state.
#[derive(Clone, Debug)]
pub struct EngineBinding {
    tracking_id: Arc<AtomicU64>,
    paused: Arc<AtomicBool>,
}

impl Default for EngineBinding {
    fn default() -> Self {
        Self {
            tracking_id: Arc::new(AtomicU64::new(0)),
            paused: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl EngineBinding {
    pub fn tracking_id(&self) -> TrackingId {
        self.tracking_id.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}

impl GestureEngineControl for EngineBinding {
    fn set_tracking_id(&self, tracking_id: TrackingId) {
        self.tracking_id.store(tracking_id, Ordering::Release);
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }
}

/// Lowest slot index whose body is tracked, with its tracking id.
pub fn select_tracked_body(bodies: &[Body]) -> Option<(usize, TrackingId)> {
    bodies
        .iter()
        .enumerate()
        .find(|(_, body)| body.is_tracked)
        .map(|(slot, body)| (slot, body.tracking_id))
}

#[derive(Debug, Default)]
pub struct BodySelector {
    current: Option<TrackingId>,
}

impl BodySelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The body currently driving gestures.
    pub fn current(&self) -> Option<TrackingId> {
        self.current
    }

    /// Rebinds the engine to the first tracked body, or pauses it when
    /// nobody is tracked.
    pub fn update(
        &mut self,
        bodies: &[Body],
        engine: &impl GestureEngineControl,
    ) -> Option<TrackingId> {
        match select_tracked_body(bodies) {
            Some((slot, tracking_id)) => {
                if self.current != Some(tracking_id) {
                    log::info!("gesture engine bound to body {tracking_id} (slot {slot})");
                }
                engine.set_tracking_id(tracking_id);
                engine.set_paused(false);
                self.current = Some(tracking_id);
            }
            None => {
                if let Some(previous) = self.current.take() {
                    log::info!("lost body {previous}, pausing gesture engine");
                }
                engine.set_paused(true);
            }
        }
        self.current
    }
}
