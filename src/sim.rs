//! Stand-ins for the camera, the gesture classifier and the media player, so
//! the pipeline can run without hardware.

use std::{
    collections::VecDeque,
    path::Path,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use image::RgbaImage;

use crate::{
    pipeline::{
        FrameReference, GestureEngine, MediaPlayer, SensorArrival, SensorDriver, SensorError,
        SurfaceError, VisualSurface,
    },
    types::{
        Body, BodyFrame, DepthFrame, FrameDescription, GestureResult, JointType, PlaybackState,
        PlaybackStatus, TrackingId,
    },
};

pub const DEPTH_WIDTH: u32 = 512;
pub const DEPTH_HEIGHT: u32 = 424;
const BODY_COUNT: usize = 6;
const MIN_RELIABLE_DISTANCE: u16 = 500;
const MAX_RELIABLE_DISTANCE: u16 = 4_500;
const SUBJECT_DISTANCE: u16 = 1_800;

// Ticks before the subject walks in, and the window in which tracking drops.
const SUBJECT_ENTERS: u64 = 30;
const TRACKING_LOST: std::ops::Range<u64> = 200..230;
const SUBJECT_ID: TrackingId = 72_057_594_037_928_100;

type Cell<F> = Arc<Mutex<Option<F>>>;

/// The one frame of a stream the sensor still owns.
///
/// Publishing a new frame reclaims the previous one if nobody acquired it,
/// so a handler that falls behind finds its stale references empty.
struct FrameSlot<F> {
    current: Option<Cell<F>>,
}

impl<F> FrameSlot<F> {
    fn new() -> Self {
        Self { current: None }
    }

    /// Returns the cell for `frame` and whether an unread frame was reclaimed.
    fn publish(&mut self, frame: F) -> (Cell<F>, bool) {
        let reclaimed = self.reclaim();
        let cell = Arc::new(Mutex::new(Some(frame)));
        self.current = Some(cell.clone());
        (cell, reclaimed)
    }

    fn reclaim(&mut self) -> bool {
        self.current.take().is_some_and(|cell| {
            cell.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .is_some()
        })
    }
}

pub struct SimulatedSensor {
    description: FrameDescription,
    interval: Duration,
    next_tick: Instant,
    tick: u64,
    pending: VecDeque<SensorArrival>,
    depth_slot: FrameSlot<DepthFrame>,
    body_slot: FrameSlot<BodyFrame>,
    acquired: Arc<AtomicU64>,
    released: Arc<AtomicU64>,
    reclaimed: u64,
    open: bool,
}

impl SimulatedSensor {
    pub fn new(interval: Duration) -> Self {
        Self {
            description: FrameDescription::new(DEPTH_WIDTH, DEPTH_HEIGHT),
            interval,
            next_tick: Instant::now(),
            tick: 0,
            pending: VecDeque::new(),
            depth_slot: FrameSlot::new(),
            body_slot: FrameSlot::new(),
            acquired: Arc::new(AtomicU64::new(0)),
            released: Arc::new(AtomicU64::new(0)),
            reclaimed: 0,
            open: false,
        }
    }

    fn subject_tracked(&self) -> bool {
        self.tick >= SUBJECT_ENTERS && !TRACKING_LOST.contains(&self.tick)
    }

    fn subject_center(&self) -> (f32, f32) {
        let sway = (self.tick as f32 * 0.05).sin() * 40.0;
        (self.description.width as f32 / 2.0 + sway, self.description.height as f32 / 2.0)
    }

    fn produce(&mut self) {
        self.tick += 1;
        let now = Instant::now();
        let tracked = self.subject_tracked();

        let depth = DepthFrame {
            description: self.description,
            samples: self.depth_samples(tracked),
            min_reliable_distance: MIN_RELIABLE_DISTANCE,
            max_reliable_distance: MAX_RELIABLE_DISTANCE,
            timestamp: now,
        };
        let mut bodies = vec![Body::default(); BODY_COUNT];
        if tracked {
            // Slot 0 stays empty so the selector has to look past it.
            bodies[1] = self.subject();
        }
        let body = BodyFrame {
            bodies,
            timestamp: now,
        };

        let (depth, depth_reclaimed) = self.depth_slot.publish(depth);
        let (body, body_reclaimed) = self.body_slot.publish(body);
        for reclaimed in [depth_reclaimed, body_reclaimed] {
            if reclaimed {
                self.reclaimed += 1;
                log::trace!("reclaimed an unread frame at tick {}", self.tick);
            }
        }

        let depth = self.lease(depth);
        let body = self.lease(body);
        self.pending.push_back(SensorArrival::Depth(depth));
        self.pending.push_back(SensorArrival::Body(body));
    }

    fn lease<F>(&self, cell: Cell<F>) -> FrameReference<F> {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        let released = self.released.clone();
        FrameReference::shared(cell).with_release_hook(move || {
            released.fetch_add(1, Ordering::Relaxed);
        })
    }

    fn depth_samples(&self, subject: bool) -> Vec<u16> {
        let (w, h) = (self.description.width, self.description.height);
        let (cx, cy) = self.subject_center();
        let span = (MAX_RELIABLE_DISTANCE - MIN_RELIABLE_DISTANCE) as u32;

        (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .map(|(x, y)| {
                let (dx, dy) = ((x as f32 - cx) / 60.0, (y as f32 - cy) / 170.0);
                if subject && dx * dx + dy * dy <= 1.0 {
                    SUBJECT_DISTANCE
                } else if y < h / 8 {
                    // Ceiling beyond the reliable range.
                    MAX_RELIABLE_DISTANCE + 500
                } else {
                    MIN_RELIABLE_DISTANCE + (span * (h - y) / h) as u16
                }
            })
            .collect()
    }

    fn subject(&self) -> Body {
        use JointType::*;

        let (cx, cy) = self.subject_center();
        let wave = (self.tick as f32 * 0.3).sin() * 25.0;
        Body::tracked(SUBJECT_ID)
            .with_joint(Head, (cx, cy - 150.0))
            .with_joint(Neck, (cx, cy - 120.0))
            .with_joint(SpineShoulder, (cx, cy - 105.0))
            .with_joint(SpineMid, (cx, cy - 40.0))
            .with_joint(SpineBase, (cx, cy + 20.0))
            .with_joint(ShoulderLeft, (cx - 45.0, cy - 100.0))
            .with_joint(ElbowLeft, (cx - 60.0, cy - 45.0))
            .with_joint(WristLeft, (cx - 65.0, cy + 5.0))
            .with_joint(HandLeft, (cx - 66.0, cy + 15.0))
            .with_joint(ShoulderRight, (cx + 45.0, cy - 100.0))
            .with_joint(ElbowRight, (cx + 80.0, cy - 120.0))
            .with_joint(WristRight, (cx + 90.0 + wave, cy - 170.0))
            .with_joint(HandRight, (cx + 92.0 + wave, cy - 182.0))
            .with_joint(HipLeft, (cx - 25.0, cy + 25.0))
            .with_joint(KneeLeft, (cx - 28.0, cy + 90.0))
            .with_joint(AnkleLeft, (cx - 30.0, cy + 155.0))
            .with_joint(FootLeft, (cx - 40.0, cy + 165.0))
            .with_joint(HipRight, (cx + 25.0, cy + 25.0))
            .with_joint(KneeRight, (cx + 28.0, cy + 90.0))
            .with_joint(AnkleRight, (cx + 30.0, cy + 155.0))
            .with_joint(FootRight, (cx + 40.0, cy + 165.0))
    }
}

impl SensorDriver for SimulatedSensor {
    fn depth_description(&self) -> FrameDescription {
        self.description
    }

    fn open(&mut self) -> Result<(), SensorError> {
        if self.interval.is_zero() {
            return Err(SensorError::Open("frame interval must be positive".into()));
        }
        self.open = true;
        self.next_tick = Instant::now();
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.open
    }

    fn next_arrival(&mut self, timeout: Duration) -> Option<SensorArrival> {
        if let Some(arrival) = self.pending.pop_front() {
            return Some(arrival);
        }

        let wait = self.next_tick.saturating_duration_since(Instant::now());
        if wait > timeout {
            thread::sleep(timeout);
            return None;
        }
        thread::sleep(wait);
        self.next_tick += self.interval;
        self.produce();
        self.pending.pop_front()
    }

    fn close(&mut self) {
        self.open = false;
        self.pending.clear();
        for reclaimed in [self.depth_slot.reclaim(), self.body_slot.reclaim()] {
            self.reclaimed += u64::from(reclaimed);
        }
        log::debug!(
            "simulated sensor handed out {} frames: {} acquired and released, {} reclaimed unread",
            self.acquired.load(Ordering::Relaxed),
            self.released.load(Ordering::Relaxed),
            self.reclaimed
        );
    }
}

/// Replays a fixed gesture script against whichever body it is bound to.
pub struct SimulatedGestureEngine {
    script: Vec<(&'static str, u32)>,
    step: usize,
    ticks_left: u32,
    bound_to: Option<TrackingId>,
}

// How many ticks a gesture stays detected before the engine lets go of it.
const DETECTION_TICKS: u32 = 4;

impl SimulatedGestureEngine {
    /// `script` holds each gesture with the ticks until the next one starts.
    pub fn new(script: Vec<(&'static str, u32)>) -> Self {
        let ticks_left = script.first().map_or(0, |(_, ticks)| *ticks);
        Self {
            script,
            step: 0,
            ticks_left,
            bound_to: None,
        }
    }

    pub fn demo() -> Self {
        Self::new(vec![
            ("PalmPunch_Right", 45),
            ("RaiseArm_Right", 45),
            ("RaiseArm_Right", 15),
            ("RaiseArm_Right", 45),
            ("SwipeHand_Right", 45),
            ("Wave", 45),
            ("SwipeHand_Left", 45),
            ("RaiseArm_Left", 45),
            ("PalmPunch_Left", 45),
            ("DoublePalm", 45),
        ])
    }
}

impl GestureEngine for SimulatedGestureEngine {
    fn evaluate(&mut self, tracking_id: TrackingId) -> anyhow::Result<GestureResult> {
        if self.script.is_empty() {
            return Err(anyhow!("gesture script is empty"));
        }
        if self.bound_to != Some(tracking_id) {
            log::debug!("simulated engine now following body {tracking_id}");
            self.bound_to = Some(tracking_id);
        }

        let (name, period) = self.script[self.step];
        let elapsed = period.saturating_sub(self.ticks_left);
        let result = if elapsed < DETECTION_TICKS {
            GestureResult {
                gesture_name: name.to_string(),
                detected: true,
                confidence: 0.6 + 0.1 * elapsed as f32,
            }
        } else {
            GestureResult::default()
        };

        self.ticks_left = self.ticks_left.saturating_sub(1);
        if self.ticks_left == 0 {
            self.step = (self.step + 1) % self.script.len();
            self.ticks_left = self.script[self.step].1;
        }
        Ok(result)
    }
}

/// Keeps a playback state and advances position while playing.
pub struct SimulatedPlayer {
    state: PlaybackState,
    playing_since: Option<Instant>,
}

impl SimulatedPlayer {
    pub fn new(natural_duration: Duration) -> Self {
        Self {
            state: PlaybackState {
                natural_duration: Some(natural_duration),
                ..PlaybackState::default()
            },
            playing_since: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            position: self.position(),
            ..self.state.clone()
        }
    }

    fn settle(&mut self) {
        self.state.position = self.position();
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
    }
}

impl MediaPlayer for SimulatedPlayer {
    fn play(&mut self) {
        self.settle();
        self.playing_since.get_or_insert_with(Instant::now);
        self.state.status = PlaybackStatus::Playing;
        log::info!("player: play from {:?}", self.state.position);
    }

    fn pause(&mut self) {
        self.settle();
        self.playing_since = None;
        self.state.status = PlaybackStatus::Paused;
        log::info!("player: paused at {:?}", self.state.position);
    }

    fn stop(&mut self) {
        self.playing_since = None;
        self.state.position = Duration::ZERO;
        self.state.status = PlaybackStatus::Stopped;
        log::info!("player: stopped");
    }

    fn position(&self) -> Duration {
        let running = self
            .playing_since
            .map_or(Duration::ZERO, |since| since.elapsed());
        let position = self.state.position + running;
        match self.state.natural_duration {
            Some(end) => position.min(end),
            None => position,
        }
    }

    fn set_position(&mut self, position: Duration) {
        self.settle();
        self.state.position = position;
        log::info!("player: seek to {position:?}");
    }

    fn natural_duration(&self) -> Option<Duration> {
        self.state.natural_duration
    }

    fn volume(&self) -> f64 {
        self.state.volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.state.volume = volume;
        log::info!("player: volume {volume:.2}");
    }
}

/// Keeps the most recent frame so it can be written out as a PNG.
pub struct SnapshotSurface {
    description: FrameDescription,
    latest: Option<Vec<u8>>,
}

impl SnapshotSurface {
    pub fn new(description: FrameDescription) -> Self {
        Self {
            description,
            latest: None,
        }
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        let bgra = self
            .latest
            .as_ref()
            .ok_or_else(|| anyhow!("no frame has been presented yet"))?;

        let mut rgba = bgra.clone();
        for px in rgba.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        let image = RgbaImage::from_raw(self.description.width, self.description.height, rgba)
            .ok_or_else(|| anyhow!("frame does not match {:?}", self.description))?;
        image
            .save(path)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        log::info!("snapshot written to {}", path.display());
        Ok(())
    }
}

impl VisualSurface for SnapshotSurface {
    fn description(&self) -> FrameDescription {
        self.description
    }

    fn write_pixels(&mut self, bgra: &[u8], stride: usize) -> Result<(), SurfaceError> {
        let expected = self.description.bgra_len();
        if bgra.len() != expected || stride != self.description.stride() {
            return Err(SurfaceError::Size {
                expected,
                got: bgra.len(),
            });
        }
        match &mut self.latest {
            Some(latest) => latest.copy_from_slice(bgra),
            None => self.latest = Some(bgra.to_vec()),
        }
        Ok(())
    }
}
