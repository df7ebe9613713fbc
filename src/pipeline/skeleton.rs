use crate::types::{Body, JointType, TrackingId};

use JointType::*;

pub const BONES: &[(JointType, JointType)] = &[
    // torso
    (Head, Neck),
    (Neck, SpineShoulder),
    (SpineShoulder, SpineMid),
    (SpineMid, SpineBase),
    (SpineShoulder, ShoulderRight),
    (SpineShoulder, ShoulderLeft),
    (SpineBase, HipRight),
    (SpineBase, HipLeft),
    // right arm
    (ShoulderRight, ElbowRight),
    (ElbowRight, WristRight),
    (WristRight, HandRight),
    (HandRight, HandTipRight),
    (WristRight, ThumbRight),
    // left arm
    (ShoulderLeft, ElbowLeft),
    (ElbowLeft, WristLeft),
    (WristLeft, HandLeft),
    (HandLeft, HandTipLeft),
    (WristLeft, ThumbLeft),
    // right leg
    (HipRight, KneeRight),
    (KneeRight, AnkleRight),
    (AnkleRight, FootRight),
    // left leg
    (HipLeft, KneeLeft),
    (KneeLeft, AnkleLeft),
    (AnkleLeft, FootLeft),
];

const BONE_THICKNESS: i64 = 3;
const JOINT_RADIUS: i64 = 3;

// Bones are clipped to the surface grown by this many pixels on every side,
// so strokes that start just off the edge still reach it.
const CLIP_MARGIN: f64 = (BONE_THICKNESS + JOINT_RADIUS) as f64;

// BGRA
const BONE_COLOR: [u8; 4] = [248, 189, 56, 255];
const CONTROLLER_BONE_COLOR: [u8; 4] = [129, 185, 16, 255];
const JOINT_COLOR: [u8; 4] = [113, 113, 248, 255];

/// Draws every tracked body onto a BGRA buffer. The body bound to the
/// gesture engine gets its own bone color.
///
/// Joints the sensor could not place (non-finite coordinates) are skipped
/// along with their bones.
pub fn draw_bodies(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    bodies: &[Body],
    controller: Option<TrackingId>,
) {
    let mut canvas = Canvas {
        pixels: buffer,
        width,
        height,
    };
    for body in bodies.iter().filter(|body| body.is_tracked) {
        let bone_color = if controller == Some(body.tracking_id) {
            CONTROLLER_BONE_COLOR
        } else {
            BONE_COLOR
        };
        canvas.skeleton(body, bone_color);
    }
}

fn placed(joint: Option<(f32, f32)>) -> Option<(f64, f64)> {
    let (x, y) = joint?;
    (x.is_finite() && y.is_finite()).then_some((f64::from(x), f64::from(y)))
}

struct Canvas<'a> {
    pixels: &'a mut [u8],
    width: u32,
    height: u32,
}

impl Canvas<'_> {
    fn skeleton(&mut self, body: &Body, bone_color: [u8; 4]) {
        for &(a, b) in BONES {
            if let (Some(from), Some(to)) = (placed(body.joint(a)), placed(body.joint(b))) {
                self.line(from, to, bone_color);
            }
        }
        for &joint in &body.joints {
            if let Some(center) = placed(joint) {
                self.disc(center, JOINT_COLOR);
            }
        }
    }

    /// Clip rectangle as `(min_x, min_y, max_x, max_y)`.
    fn clip_rect(&self) -> (f64, f64, f64, f64) {
        (
            -CLIP_MARGIN,
            -CLIP_MARGIN,
            f64::from(self.width) + CLIP_MARGIN,
            f64::from(self.height) + CLIP_MARGIN,
        )
    }

    /// Liang-Barsky clip of the segment against `clip_rect`.
    fn clip(&self, from: (f64, f64), to: (f64, f64)) -> Option<((f64, f64), (f64, f64))> {
        let (min_x, min_y, max_x, max_y) = self.clip_rect();
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let (mut enter, mut leave) = (0.0_f64, 1.0_f64);

        for (p, q) in [
            (-dx, from.0 - min_x),
            (dx, max_x - from.0),
            (-dy, from.1 - min_y),
            (dy, max_y - from.1),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let t = q / p;
            if p < 0.0 {
                enter = enter.max(t);
            } else {
                leave = leave.min(t);
            }
            if enter > leave {
                return None;
            }
        }

        Some((
            (from.0 + enter * dx, from.1 + enter * dy),
            (from.0 + leave * dx, from.1 + leave * dy),
        ))
    }

    fn line(&mut self, from: (f64, f64), to: (f64, f64), color: [u8; 4]) {
        let Some((from, to)) = self.clip(from, to) else {
            return;
        };
        // Both ends now lie inside the clip rectangle, so the walk below is
        // bounded by its perimeter.
        let (mut x, mut y) = (from.0.round() as i64, from.1.round() as i64);
        let (end_x, end_y) = (to.0.round() as i64, to.1.round() as i64);
        let dx = (end_x - x).abs();
        let dy = -(end_y - y).abs();
        let step_x = if x < end_x { 1 } else { -1 };
        let step_y = if y < end_y { 1 } else { -1 };
        let mut err = dx + dy;
        let radius = (BONE_THICKNESS - 1) / 2;

        loop {
            self.stamp(x, y, radius, color);
            if x == end_x && y == end_y {
                break;
            }
            let doubled = 2 * err;
            if doubled >= dy {
                err += dy;
                x += step_x;
            }
            if doubled <= dx {
                err += dx;
                y += step_y;
            }
        }
    }

    /// Diamond-shaped brush used for bone strokes.
    fn stamp(&mut self, x: i64, y: i64, radius: i64, color: [u8; 4]) {
        for oy in -radius..=radius {
            let reach = radius - oy.abs();
            for ox in -reach..=reach {
                self.put(x + ox, y + oy, color);
            }
        }
    }

    fn disc(&mut self, center: (f64, f64), color: [u8; 4]) {
        let (min_x, min_y, max_x, max_y) = self.clip_rect();
        if center.0 < min_x || center.0 > max_x || center.1 < min_y || center.1 > max_y {
            return;
        }
        let (cx, cy) = (center.0 as i64, center.1 as i64);
        for oy in -JOINT_RADIUS..=JOINT_RADIUS {
            for ox in -JOINT_RADIUS..=JOINT_RADIUS {
                if ox * ox + oy * oy <= JOINT_RADIUS * JOINT_RADIUS {
                    self.put(cx + ox, cy + oy, color);
                }
            }
        }
    }

    fn put(&mut self, x: i64, y: i64, color: [u8; 4]) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        if let Some(px) = self.pixels.get_mut(idx..idx + 4) {
            px.copy_from_slice(&color);
        }
    }
}
