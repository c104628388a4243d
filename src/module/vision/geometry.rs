//! Image geometry helpers.

use image::{imageops::FilterType, ImageBuffer, Pixel};

use crate::module::error::{Error, Result};

/// Output size for an aspect-preserving resize, or `None` to keep the image as is.
///
/// When both dimensions are given the width wins and `height` is ignored.
pub fn target_size(w: u32, h: u32, width: Option<u32>, height: Option<u32>) -> Option<(u32, u32)> {
    let scaled = |num: u32, target: u32, den: u32| -> u32 {
        ((num as f64 * target as f64 / den as f64).round() as u32).max(1)
    };
    match (width, height) {
        (None, None) => None,
        (Some(tw), _) => Some((tw.max(1), scaled(h, tw, w))),
        (None, Some(th)) => Some((scaled(w, th, h), th.max(1))),
    }
}

/// Resizes `img` to the given width or height, keeping its aspect ratio.
///
/// Shrinking averages source areas; growing interpolates bilinearly.
pub fn resize_keep_aspect<P>(
    img: &ImageBuffer<P, Vec<u8>>,
    width: Option<u32>,
    height: Option<u32>,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    match target_size(w, h, width, height) {
        None => img.clone(),
        Some((tw, th)) if (tw, th) == (w, h) => img.clone(),
        Some((tw, th)) if tw <= w && th <= h => resize_area(img, tw, th),
        Some((tw, th)) => image::imageops::resize(img, tw, th, FilterType::Triangle),
    }
}

/// Places `img` at the top-left of a zero-filled `width` x `height` canvas.
pub fn embed_in_canvas<P>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: u32,
    height: u32,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel + 'static,
{
    let (w, h) = img.dimensions();
    if w > width || h > height {
        return Err(Error::CanvasTooSmall {
            width: w,
            height: h,
            canvas_width: width,
            canvas_height: height,
        });
    }
    let mut canvas = ImageBuffer::new(width, height);
    image::imageops::replace(&mut canvas, img, 0, 0);
    Ok(canvas)
}

/// Source pixels covering each destination pixel along one axis, with their share.
fn area_weights(src: u32, dst: u32) -> Vec<Vec<(u32, f32)>> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| {
            let start = d as f64 * scale;
            let end = start + scale;
            let mut weights = Vec::new();
            let mut s = start.floor() as u32;
            while (s as f64) < end && s < src {
                let cover = end.min(s as f64 + 1.0) - start.max(s as f64);
                if cover > 1e-9 {
                    weights.push((s, (cover / scale) as f32));
                }
                s += 1;
            }
            weights
        })
        .collect()
}

fn resize_area<P>(img: &ImageBuffer<P, Vec<u8>>, tw: u32, th: u32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (w, h) = img.dimensions();
    let xw = area_weights(w, tw);
    let yw = area_weights(h, th);
    let channels = P::CHANNEL_COUNT as usize;

    let mut out: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(tw, th);
    let mut acc = vec![0f32; channels];
    for (dy, ys) in yw.iter().enumerate() {
        for (dx, xs) in xw.iter().enumerate() {
            acc.iter_mut().for_each(|v| *v = 0.0);
            for &(sy, wy) in ys {
                for &(sx, wx) in xs {
                    let px = img.get_pixel(sx, sy).channels();
                    for (a, &v) in acc.iter_mut().zip(px) {
                        *a += v as f32 * wx * wy;
                    }
                }
            }
            let dst = out.get_pixel_mut(dx as u32, dy as u32).channels_mut();
            for (d, a) in dst.iter_mut().zip(&acc) {
                *d = a.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}
