use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::Sender;

use super::{PipelineEvent, body_selector::EngineBinding};
use crate::types::{GestureResult, GestureResultChange, ResultField, TrackingId};

/// The gesture classifier. Asked once per tick for its verdict on the body
/// it is bound to; never called while the binding is paused.
pub trait GestureEngine: Send + 'static {
    fn evaluate(&mut self, tracking_id: TrackingId) -> anyhow::Result<GestureResult>;
}

/// Observable copy of the engine's latest result. Each field that changes
/// produces its own notification, carrying the record as it stands after
/// that field was written.
pub struct GestureResultView {
    current: GestureResult,
    event_tx: Sender<PipelineEvent>,
}

impl GestureResultView {
    pub fn new(event_tx: Sender<PipelineEvent>) -> Self {
        Self {
            current: GestureResult::default(),
            event_tx,
        }
    }

    pub fn current(&self) -> &GestureResult {
        &self.current
    }

    /// Returns false once nobody is listening any more.
    pub fn update(&mut self, next: GestureResult) -> bool {
        if self.current.gesture_name != next.gesture_name {
            self.current.gesture_name = next.gesture_name;
            if !self.notify(ResultField::GestureName) {
                return false;
            }
        }
        if self.current.detected != next.detected {
            self.current.detected = next.detected;
            if !self.notify(ResultField::Detected) {
                return false;
            }
        }
        if self.current.confidence != next.confidence {
            self.current.confidence = next.confidence;
            if !self.notify(ResultField::Confidence) {
                return false;
            }
        }
        true
    }

    fn notify(&self, field: ResultField) -> bool {
        let change = GestureResultChange {
            field,
            result: self.current.clone(),
        };
        self.event_tx
            .send(PipelineEvent::GestureResultChanged(change))
            .is_ok()
    }
}

#[derive(Debug)]
pub struct EngineWorker {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl EngineWorker {
    /// Stops the worker thread. Safe to call more than once.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EngineWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn start_gesture_engine<E: GestureEngine>(
    engine: E,
    binding: EngineBinding,
    tick: Duration,
    event_tx: Sender<PipelineEvent>,
) -> EngineWorker {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        log::info!("gesture engine running, tick {tick:?}");
        run_engine_loop(engine, &binding, tick, &stop_flag, GestureResultView::new(event_tx));
        log::info!("gesture engine stopped");
    });

    EngineWorker {
        stop,
        handle: Some(handle),
    }
}

fn run_engine_loop<E: GestureEngine>(
    mut engine: E,
    binding: &EngineBinding,
    tick: Duration,
    stop: &AtomicBool,
    mut view: GestureResultView,
) {
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(tick);

        if binding.is_paused() {
            // A paused engine holds no verdict.
            let idle = GestureResult::default();
            if *view.current() != idle && !view.update(idle) {
                return;
            }
            continue;
        }

        match engine.evaluate(binding.tracking_id()) {
            Ok(result) => {
                if !view.update(result) {
                    return;
                }
            }
            Err(err) => {
                log::warn!("gesture evaluation failed: {err:?}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::unbounded;

    use super::*;
    use crate::pipeline::body_selector::GestureEngineControl;

    fn result(name: &str, detected: bool, confidence: f32) -> GestureResult {
        GestureResult {
            gesture_name: name.to_string(),
            detected,
            confidence,
        }
    }

    fn changes(rx: &crossbeam_channel::Receiver<PipelineEvent>) -> Vec<GestureResultChange> {
        rx.try_iter()
            .filter_map(|event| match event {
                PipelineEvent::GestureResultChanged(change) => Some(change),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn one_notification_per_changed_field() {
        let (tx, rx) = unbounded();
        let mut view = GestureResultView::new(tx);

        assert!(view.update(result("DoublePalm", true, 0.9)));
        let seen = changes(&rx);
        let fields: Vec<_> = seen.iter().map(|c| c.field).collect();
        assert_eq!(
            fields,
            vec![ResultField::GestureName, ResultField::Detected, ResultField::Confidence]
        );
        // The detected notification already carries the new name.
        assert_eq!(seen[1].result.gesture_name, "DoublePalm");
        assert!(seen[1].result.detected);

        assert!(view.update(result("DoublePalm", true, 0.9)));
        assert!(changes(&rx).is_empty());

        view.update(result("DoublePalm", true, 0.4));
        let fields: Vec<_> = changes(&rx).iter().map(|c| c.field).collect();
        assert_eq!(fields, vec![ResultField::Confidence]);
    }

    #[test]
    fn update_reports_closed_channel() {
        let (tx, rx) = unbounded();
        let mut view = GestureResultView::new(tx);
        drop(rx);
        assert!(!view.update(result("DoublePalm", true, 0.9)));
    }

    struct Scripted {
        results: Vec<GestureResult>,
        seen_ids: Sender<TrackingId>,
    }

    impl GestureEngine for Scripted {
        fn evaluate(&mut self, tracking_id: TrackingId) -> anyhow::Result<GestureResult> {
            let _ = self.seen_ids.send(tracking_id);
            if self.results.is_empty() {
                anyhow::bail!("script exhausted");
            }
            Ok(self.results.remove(0))
        }
    }

    #[test]
    fn worker_evaluates_bound_body_only_when_unpaused() {
        let (event_tx, event_rx) = unbounded();
        let (id_tx, id_rx) = unbounded();
        let binding = EngineBinding::default();
        let engine = Scripted {
            results: vec![result("PalmPunch_Left", true, 0.7)],
            seen_ids: id_tx,
        };

        let tick = Duration::from_millis(1);
        let mut worker = start_gesture_engine(engine, binding.clone(), tick, event_tx);
        thread::sleep(Duration::from_millis(20));
        assert!(id_rx.try_recv().is_err());

        binding.set_tracking_id(77);
        binding.set_paused(false);
        let event = event_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("engine produced no result");
        worker.stop();
        worker.stop();

        assert!(matches!(event, PipelineEvent::GestureResultChanged(_)));
        assert_eq!(id_rx.recv().unwrap(), 77);
    }

    #[test]
    fn pausing_clears_the_result() {
        let (event_tx, event_rx) = unbounded();
        let (id_tx, _id_rx) = unbounded();
        let binding = EngineBinding::default();
        binding.set_paused(false);
        let engine = Scripted {
            results: vec![result("DoublePalm", true, 0.7)],
            seen_ids: id_tx,
        };

        let tick = Duration::from_millis(1);
        let _worker = start_gesture_engine(engine, binding.clone(), tick, event_tx);
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        let mut detected = false;
        while !detected && std::time::Instant::now() < deadline {
            if let Ok(PipelineEvent::GestureResultChanged(change)) =
                event_rx.recv_timeout(Duration::from_millis(50))
            {
                detected = change.field == ResultField::Detected && change.result.detected;
            }
        }
        assert!(detected);

        binding.set_paused(true);
        let cleared = loop {
            match event_rx.recv_timeout(Duration::from_secs(2)) {
                Ok(PipelineEvent::GestureResultChanged(change))
                    if change.field == ResultField::Detected =>
                {
                    break change;
                }
                Ok(_) => continue,
                Err(err) => panic!("no clearing notification: {err}"),
            }
        };
        assert!(!cleared.result.detected);
    }
}
