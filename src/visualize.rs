//! Conversion between float image buffers and 8-bit images for inspection.

use crate::{ImageBatch, RenderError, RenderResult};
use image::{Rgb, RgbImage};
use std::path::Path;

/// Converts instance `n` to an RGB image.
///
/// One channel is written as gray, three as RGB; values are clamped to [0, 1].
pub fn to_rgb_image(image: &ImageBatch, n: usize) -> RenderResult<RgbImage> {
    if n >= image.instances() {
        return Err(RenderError::shape(format!(
            "instance {n} of a batch of {}",
            image.instances()
        )));
    }
    let planes: [usize; 3] = match image.channels() {
        1 => [0, 0, 0],
        3 => [0, 1, 2],
        channels => {
            return Err(RenderError::shape(format!(
                "cannot show {channels} channels as RGB"
            )));
        }
    };

    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Ok(RgbImage::from_fn(image.width() as u32, image.height() as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb(planes.map(|c| to_u8(image.get(n, c, y, x))))
    }))
}

/// Maps unit normals from [-1, 1] to [0, 1] colors, keeping zero (uncovered) pixels black.
pub fn normals_to_colors(normals: &ImageBatch) -> ImageBatch {
    let mut colors = normals.clone();
    for n in 0..normals.instances() {
        for i in 0..normals.plane_len() {
            let covered = (0..normals.channels()).any(|c| normals.plane(n, c)[i] != 0.0);
            if !covered {
                continue;
            }
            for c in 0..normals.channels() {
                let value = &mut colors.plane_mut(n, c)[i];
                *value = *value * 0.5 + 0.5;
            }
        }
    }
    colors
}

/// Places instance `n` of every buffer side by side, left to right.
///
/// All buffers must share the height; each may have one or three channels.
pub fn side_by_side(images: &[&ImageBatch], n: usize) -> RenderResult<RgbImage> {
    let Some(first) = images.first() else {
        return Err(RenderError::shape("nothing to show"));
    };
    let height = first.height() as u32;
    let width: u32 = images.iter().map(|i| i.width() as u32).sum();

    let mut out = RgbImage::new(width, height);
    let mut x = 0;
    for image in images {
        if image.height() as u32 != height {
            return Err(RenderError::shape(format!(
                "image of height {} next to height {height}",
                image.height()
            )));
        }
        let rgb = to_rgb_image(image, n)?;
        image::imageops::replace(&mut out, &rgb, x, 0);
        x += rgb.width() as i64;
    }
    Ok(out)
}

/// Writes instance `n` to `path`, the format follows the extension.
pub fn save(image: &ImageBatch, n: usize, path: impl AsRef<Path>) -> RenderResult<()> {
    to_rgb_image(image, n)?.save(path)?;
    Ok(())
}

/// Loads an image file as a single-instance 3 channel buffer with values in [0, 1].
pub fn load_texture(path: impl AsRef<Path>) -> RenderResult<ImageBatch> {
    let rgb = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgb32f();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);

    let mut texture = ImageBatch::zeros(1, 3, height, width);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            texture.set(0, c, y as usize, x as usize, pixel[c]);
        }
    }
    Ok(texture)
}
