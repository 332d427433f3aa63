//! Sampling of image buffers at continuous coordinates.
//!
//! Texel `(x, y)` covers `[x, x + 1) x [y, y + 1)` and is sampled at its center, the same
//! convention the rasterizer uses, so sampling a rasterized map at the coordinates a
//! value was rasterized from reads that value back.

use crate::{ImageBatch, RenderError, RenderResult};

/// Sample mode for image sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// Nearest-neighbor sampling
    Nearest,
    /// Bilinear interpolation between the four closest texel centers
    Linear,
}

/// Samples channel values of one instance at normalized image coordinates.
///
/// `u` runs along the columns and `v` along the rows, both in [0, 1]; values outside are
/// clamped to the border texels. Writes `image.channels()` values into `out`.
pub fn sample(image: &ImageBatch, n: usize, u: f32, v: f32, mode: SampleMode, out: &mut [f32]) {
    let width = image.width();
    let height = image.height();
    if width == 0 || height == 0 {
        out.fill(0.0);
        return;
    }
    let x = u * width as f32 - 0.5;
    let y = v * height as f32 - 0.5;

    match mode {
        SampleMode::Nearest => {
            let tx = (x.round().max(0.0) as usize).min(width - 1);
            let ty = (y.round().max(0.0) as usize).min(height - 1);
            for (c, value) in out.iter_mut().enumerate() {
                *value = image.get(n, c, ty, tx);
            }
        }
        SampleMode::Linear => {
            let x = x.clamp(0.0, (width - 1) as f32);
            let y = y.clamp(0.0, (height - 1) as f32);

            // Calculate integer pixel indices and fractional offsets
            let x0 = x.floor() as usize;
            let x1 = (x0 + 1).min(width - 1);
            let y0 = y.floor() as usize;
            let y1 = (y0 + 1).min(height - 1);
            let dx = x - x.floor();
            let dy = y - y.floor();

            for (c, value) in out.iter_mut().enumerate() {
                let v00 = image.get(n, c, y0, x0);
                let v10 = image.get(n, c, y0, x1);
                let v01 = image.get(n, c, y1, x0);
                let v11 = image.get(n, c, y1, x1);

                let v0 = v00 + dx * (v10 - v00);
                let v1 = v01 + dx * (v11 - v01);
                *value = v0 + dy * (v1 - v0);
            }
        }
    }
}

/// Samples `image` at a per-pixel grid of coordinates in [-1, 1].
///
/// `grid` holds two channels, x then y, and has the resolution of the result. Pixels
/// where `mask` (single channel, optional) is zero are left at zero.
pub fn grid_sample(
    image: &ImageBatch,
    grid: &ImageBatch,
    mask: Option<&ImageBatch>,
    mode: SampleMode,
) -> RenderResult<ImageBatch> {
    if grid.channels() != 2 || grid.instances() != image.instances() {
        return Err(RenderError::shape(format!(
            "grid of {}x{} channels cannot sample {} instances",
            grid.instances(),
            grid.channels(),
            image.instances()
        )));
    }
    if let Some(mask) = mask {
        if mask.channels() != 1
            || mask.instances() != grid.instances()
            || mask.height() != grid.height()
            || mask.width() != grid.width()
        {
            return Err(RenderError::shape("sampling mask must match the grid"));
        }
    }

    let channels = image.channels();
    let mut out = ImageBatch::zeros(grid.instances(), channels, grid.height(), grid.width());
    let mut values = vec![0.0; channels];
    for n in 0..grid.instances() {
        for y in 0..grid.height() {
            for x in 0..grid.width() {
                if mask.is_some_and(|m| m.get(n, 0, y, x) == 0.0) {
                    continue;
                }
                let u = (grid.get(n, 0, y, x) + 1.0) / 2.0;
                let v = (grid.get(n, 1, y, x) + 1.0) / 2.0;
                sample(image, n, u, v, mode, &mut values);
                for (c, value) in values.iter().enumerate() {
                    out.set(n, c, y, x, *value);
                }
            }
        }
    }
    Ok(out)
}
