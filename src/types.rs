use std::time::{Duration, Instant};

pub type TrackingId = u64;

pub const JOINT_COUNT: usize = 25;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDescription {
    pub width: u32,
    pub height: u32,
}

impl FrameDescription {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Byte length of a BGRA-32 buffer covering the whole frame.
    pub fn bgra_len(&self) -> usize {
        self.pixel_count() * 4
    }

    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }
}

#[derive(Clone, Debug)]
pub struct DepthFrame {
    pub description: FrameDescription,
    pub samples: Vec<u16>,
    pub min_reliable_distance: u16,
    pub max_reliable_distance: u16,
    pub timestamp: Instant,
}

impl DepthFrame {
    /// Copies the samples into `dst`. Returns false without touching `dst`
    /// when the lengths differ.
    pub fn copy_frame_data_to(&self, dst: &mut [u16]) -> bool {
        if dst.len() != self.samples.len() {
            return false;
        }
        dst.copy_from_slice(&self.samples);
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum JointType {
    SpineBase,
    SpineMid,
    Neck,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
    SpineShoulder,
    HandTipLeft,
    ThumbLeft,
    HandTipRight,
    ThumbRight,
}

/// One slot of the sensor's body array.
///
/// Joint positions are already mapped into depth-space pixel coordinates;
/// `None` marks a joint the sensor could not place.
#[derive(Clone, Debug, PartialEq)]
pub struct Body {
    pub tracking_id: TrackingId,
    pub is_tracked: bool,
    pub joints: [Option<(f32, f32)>; JOINT_COUNT],
}

impl Default for Body {
    fn default() -> Self {
        Self {
            tracking_id: 0,
            is_tracked: false,
            joints: [None; JOINT_COUNT],
        }
    }
}

impl Body {
    pub fn tracked(tracking_id: TrackingId) -> Self {
        Self {
            tracking_id,
            is_tracked: true,
            ..Self::default()
        }
    }

    pub fn joint(&self, joint: JointType) -> Option<(f32, f32)> {
        self.joints[joint as usize]
    }

    pub fn with_joint(mut self, joint: JointType, position: (f32, f32)) -> Self {
        self.joints[joint as usize] = Some(position);
        self
    }
}

#[derive(Clone, Debug)]
pub struct BodyFrame {
    pub bodies: Vec<Body>,
    pub timestamp: Instant,
}

impl BodyFrame {
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Refreshes `slots` in place from this frame. Slots beyond the frame's
    /// body count are reset to untracked.
    pub fn refresh_body_data(&self, slots: &mut [Body]) {
        for (idx, slot) in slots.iter_mut().enumerate() {
            match self.bodies.get(idx) {
                Some(body) => slot.clone_from(body),
                None => *slot = Body::default(),
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GestureResult {
    pub gesture_name: String,
    pub detected: bool,
    pub confidence: f32,
}

impl GestureResult {
    /// A detected, named result. Only these can form a gesture event.
    pub fn is_gesture(&self) -> bool {
        self.detected && !self.gesture_name.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultField {
    GestureName,
    Detected,
    Confidence,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GestureResultChange {
    pub field: ResultField,
    pub result: GestureResult,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub position: Duration,
    pub natural_duration: Option<Duration>,
    pub volume: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            position: Duration::ZERO,
            natural_duration: None,
            volume: 0.5,
        }
    }
}
