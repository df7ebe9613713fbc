use thiserror::Error;

use super::{depth_converter, frame::FrameReference};
use crate::types::{Body, BodyFrame, DepthFrame, FrameDescription};

/// Why a depth arrival produced no new pixels. None of these are failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DepthSkip {
    #[error("depth frame already reclaimed by the sensor")]
    Absent,

    #[error("depth display is switched off")]
    Hidden,

    #[error("depth frame is {got:?}, buffers are {expected:?}")]
    DimensionMismatch {
        got: FrameDescription,
        expected: FrameDescription,
    },
}

/// Owns the buffers the frame handlers copy into.
///
/// Depth samples and visual pixels are sized once from the sensor's depth
/// description; the body array is sized on the first body arrival and then
/// refreshed in place.
pub struct FrameIngestor {
    description: FrameDescription,
    surface: FrameDescription,
    depth_data: Vec<u16>,
    depth_pixels: Vec<u8>,
    bodies: Option<Vec<Body>>,
    show_depth: bool,
}

impl FrameIngestor {
    pub fn new(description: FrameDescription, surface: FrameDescription, show_depth: bool) -> Self {
        Self {
            description,
            surface,
            depth_data: vec![0; description.pixel_count()],
            depth_pixels: vec![0; description.bgra_len()],
            bodies: None,
            show_depth,
        }
    }

    pub fn show_depth(&self) -> bool {
        self.show_depth
    }

    pub fn pixels(&self) -> &[u8] {
        &self.depth_pixels
    }

    /// Pixel buffer and body array together, for drawing overlays.
    pub fn visual_frame(&mut self) -> (&mut [u8], &[Body]) {
        (
            &mut self.depth_pixels,
            self.bodies.as_deref().unwrap_or(&[]),
        )
    }

    /// Resets the pixel buffer to opaque black.
    pub fn clear_pixels(&mut self) {
        for px in self.depth_pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[0, 0, 0, 255]);
        }
    }

    /// Acquires a depth frame, copies it and regenerates the pixel buffer.
    ///
    /// The frame is released before this returns, whatever the outcome.
    pub fn on_depth_frame(
        &mut self,
        reference: &FrameReference<DepthFrame>,
    ) -> Result<(), DepthSkip> {
        let Some(frame) = reference.acquire() else {
            return Err(DepthSkip::Absent);
        };
        log::trace!("depth frame acquired {:?} after capture", frame.timestamp.elapsed());
        if !self.show_depth {
            return Err(DepthSkip::Hidden);
        }

        let got = frame.description;
        let fits = got.pixel_count() == self.depth_data.len()
            && got.width == self.surface.width
            && got.height == self.surface.height;
        if !fits || !frame.copy_frame_data_to(&mut self.depth_data) {
            return Err(DepthSkip::DimensionMismatch {
                got,
                expected: self.description,
            });
        }
        let (min, max) = (frame.min_reliable_distance, frame.max_reliable_distance);
        drop(frame);

        depth_converter::depth_to_bgra(&self.depth_data, min, max, &mut self.depth_pixels).map_err(
            |_| DepthSkip::DimensionMismatch {
                got,
                expected: self.description,
            },
        )
    }

    /// Acquires a body frame and refreshes the body array in place.
    /// Returns `None` when the frame was already reclaimed.
    pub fn on_body_frame(&mut self, reference: &FrameReference<BodyFrame>) -> Option<&[Body]> {
        let frame = reference.acquire()?;
        log::trace!("body frame acquired {:?} after capture", frame.timestamp.elapsed());
        let bodies = self
            .bodies
            .get_or_insert_with(|| vec![Body::default(); frame.body_count()]);
        frame.refresh_body_data(bodies);
        drop(frame);

        Some(bodies.as_slice())
    }
}
