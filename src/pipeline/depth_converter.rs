use rayon::prelude::*;
use thiserror::Error;

const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("pixel buffer has {got} bytes, expected {expected}")]
    PixelBufferLen { got: usize, expected: usize },
}

/// Divisor mapping a reliable distance range onto the byte range.
pub fn depth_scale(max_distance: u16) -> u16 {
    (max_distance / 256).max(1)
}

fn depth_intensity(depth: u16, min_distance: u16, max_distance: u16, scale: u16) -> u8 {
    if depth >= min_distance && depth <= max_distance {
        (depth / scale) as u8
    } else {
        0
    }
}

/// Writes one grayscale BGRA pixel per depth sample into `pixels`.
///
/// Samples outside `[min_distance, max_distance]` render black. Nothing is
/// written unless `pixels` holds exactly four bytes per sample.
pub fn depth_to_bgra(
    samples: &[u16],
    min_distance: u16,
    max_distance: u16,
    pixels: &mut [u8],
) -> Result<(), ConvertError> {
    let expected = samples.len() * BYTES_PER_PIXEL;
    if pixels.len() != expected {
        return Err(ConvertError::PixelBufferLen {
            got: pixels.len(),
            expected,
        });
    }

    let scale = depth_scale(max_distance);
    pixels
        .par_chunks_mut(BYTES_PER_PIXEL)
        .zip(samples.par_iter().copied())
        .for_each(|(dst, depth)| {
            let intensity = depth_intensity(depth, min_distance, max_distance, scale);
            dst[0] = intensity;
            dst[1] = intensity;
            dst[2] = intensity;
            dst[3] = 255;
        });

    Ok(())
}
