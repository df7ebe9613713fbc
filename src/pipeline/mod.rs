pub mod body_selector;
pub mod depth_converter;
pub mod dispatcher;
pub mod frame;
pub mod ingest;
pub mod recognizer;
pub mod sensor;
pub mod skeleton;

use std::{ops::ControlFlow, time::Instant};

use crossbeam_channel::Receiver;
use thiserror::Error;

use crate::{
    config::PipelineConfig,
    status::{
        NO_SENSOR_STATUS_TEXT, RUNNING_STATUS_TEXT, SENSOR_NOT_AVAILABLE_STATUS_TEXT, StatusText,
    },
    types::{BodyFrame, DepthFrame, FrameDescription, GestureResultChange},
};

// Re-exports for convenience
pub use body_selector::{BodySelector, EngineBinding, GestureEngineControl};
pub use dispatcher::{Dispatch, GestureDispatcher, MediaAction, MediaPlayer};
pub use frame::FrameReference;
pub use ingest::{DepthSkip, FrameIngestor};
pub use recognizer::{GestureEngine, start_gesture_engine};
pub use sensor::{SensorArrival, SensorDriver, SensorError, SensorSession};

/// Everything the dispatch loop reacts to, from all three sources.
#[derive(Debug)]
pub enum PipelineEvent {
    DepthFrameArrived(FrameReference<DepthFrame>),
    BodyFrameArrived(FrameReference<BodyFrame>),
    AvailabilityChanged(bool),
    GestureResultChanged(GestureResultChange),
    Shutdown,
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("surface expects {expected} bytes, got {got}")]
    Size { expected: usize, got: usize },
}

/// Where visual frames go. Accepts full-frame BGRA-32 writes only.
pub trait VisualSurface {
    fn description(&self) -> FrameDescription;
    fn write_pixels(&mut self, bgra: &[u8], stride: usize) -> Result<(), SurfaceError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_presented: u64,
    pub depth_frames_dropped: u64,
    pub body_frames: u64,
    pub gesture_events: u64,
    pub actions: u64,
}

/// Owns all pipeline state and handles events one at a time.
pub struct Pipeline<P, S, E> {
    draw_skeletons: bool,
    ingestor: FrameIngestor,
    selector: BodySelector,
    dispatcher: GestureDispatcher,
    status: StatusText,
    player: P,
    surface: S,
    engine: E,
    stats: PipelineStats,
}

impl<P, S, E> Pipeline<P, S, E>
where
    P: MediaPlayer,
    S: VisualSurface,
    E: GestureEngineControl,
{
    pub fn new(
        config: &PipelineConfig,
        depth: FrameDescription,
        player: P,
        surface: S,
        engine: E,
        now: Instant,
    ) -> Self {
        Self {
            draw_skeletons: config.draw_skeletons,
            ingestor: FrameIngestor::new(depth, surface.description(), config.show_depth),
            selector: BodySelector::new(),
            dispatcher: GestureDispatcher::new(config, now),
            status: StatusText::new(),
            player,
            surface,
            engine,
            stats: PipelineStats::default(),
        }
    }

    pub fn status(&self) -> &str {
        self.status.get()
    }

    pub fn status_mut(&mut self) -> &mut StatusText {
        &mut self.status
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn sensor_opened(&mut self, available: bool) {
        self.status.set(if available {
            RUNNING_STATUS_TEXT
        } else {
            NO_SENSOR_STATUS_TEXT
        });
    }

    /// Drains `event_rx` until shutdown or until every sender is gone.
    pub fn run(&mut self, event_rx: &Receiver<PipelineEvent>) {
        log::info!("pipeline running");
        for event in event_rx.iter() {
            if self.handle_event(event, Instant::now()).is_break() {
                break;
            }
        }
        log::info!(
            "pipeline stopped after {} gesture events: {:?}",
            self.dispatcher.event_counter(),
            self.stats
        );
    }

    pub fn handle_event(&mut self, event: PipelineEvent, now: Instant) -> ControlFlow<()> {
        match event {
            PipelineEvent::DepthFrameArrived(reference) => self.on_depth_frame(&reference),
            PipelineEvent::BodyFrameArrived(reference) => self.on_body_frame(&reference),
            PipelineEvent::AvailabilityChanged(available) => {
                log::info!("sensor available: {available}");
                self.status.set(if available {
                    RUNNING_STATUS_TEXT
                } else {
                    SENSOR_NOT_AVAILABLE_STATUS_TEXT
                });
            }
            PipelineEvent::GestureResultChanged(change) => self.on_gesture_result(&change, now),
            PipelineEvent::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn on_depth_frame(&mut self, reference: &FrameReference<DepthFrame>) {
        match self.ingestor.on_depth_frame(reference) {
            Ok(()) => self.present(),
            Err(DepthSkip::Hidden) => {}
            Err(skip) => {
                self.stats.depth_frames_dropped += 1;
                log::debug!("depth frame dropped: {skip}");
            }
        }
    }

    fn on_body_frame(&mut self, reference: &FrameReference<BodyFrame>) {
        let Some(bodies) = self.ingestor.on_body_frame(reference) else {
            log::debug!("body frame already reclaimed");
            return;
        };
        self.stats.body_frames += 1;
        self.selector.update(bodies, &self.engine);

        // Without depth frames the bodies are drawn on black at body rate.
        if !self.ingestor.show_depth() && self.draw_skeletons {
            self.ingestor.clear_pixels();
            self.present();
        }
    }

    fn on_gesture_result(&mut self, change: &GestureResultChange, now: Instant) {
        let outcome = self
            .dispatcher
            .handle(change, now, &mut self.player, &mut self.status);
        match outcome {
            Dispatch::Ignored => {}
            Dispatch::Executed(_) => {
                self.stats.gesture_events += 1;
                self.stats.actions += 1;
            }
            _ => self.stats.gesture_events += 1,
        }
    }

    fn present(&mut self) {
        let description = self.surface.description();
        if self.draw_skeletons {
            let controller = self.selector.current();
            let (pixels, bodies) = self.ingestor.visual_frame();
            skeleton::draw_bodies(
                pixels,
                description.width,
                description.height,
                bodies,
                controller,
            );
        }

        match self
            .surface
            .write_pixels(self.ingestor.pixels(), description.stride())
        {
            Ok(()) => self.stats.frames_presented += 1,
            Err(err) => log::warn!("surface write failed: {err}"),
        }
    }
}
