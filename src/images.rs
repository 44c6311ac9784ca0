//! Image loading, pre-scaled to output dimensions.
//!
//! Fit modes are resolved on the CPU: `load` always returns an RGBA buffer of
//! exactly the output's size, so the draw side is a single full-screen quad and
//! never needs per-mode geometry. `plan_fit` is the pure placement function;
//! `compose` applies a plan to pixel data.

use std::path::Path;

use crate::config::FitMode;
use crate::error::RenderError;

/// Decoded, pre-scaled pixel data ready for GPU upload.
///
/// `pixels` is row-major, top-left origin, always 4 channels here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

/// Placement of a (possibly rescaled) source image on the output canvas.
///
/// `dest_x`/`dest_y` may be negative, meaning the scaled image is cropped at
/// the canvas edge. `tile` repeats the unscaled source across the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitPlan {
    pub scale_w: u32,
    pub scale_h: u32,
    pub dest_x: i32,
    pub dest_y: i32,
    pub tile: bool,
}

fn div_ceil(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

/// Pure placement math for all five fit modes. Integer arithmetic throughout,
/// so identical inputs always produce identical plans.
pub fn plan_fit(src_w: u32, src_h: u32, out_w: u32, out_h: u32, mode: FitMode) -> FitPlan {
    let src_w = src_w.max(1);
    let src_h = src_h.max(1);
    let out_w = out_w.max(1);
    let out_h = out_h.max(1);

    let centered = |w: u32, h: u32| -> (i32, i32) {
        (
            ((out_w as i64 - w as i64) / 2) as i32,
            ((out_h as i64 - h as i64) / 2) as i32,
        )
    };

    match mode {
        FitMode::Stretch => FitPlan {
            scale_w: out_w,
            scale_h: out_h,
            dest_x: 0,
            dest_y: 0,
            tile: false,
        },
        FitMode::Fill => {
            // Cover: the bound axis matches exactly, the other overflows (ceil).
            let (w, h) = if (out_w as u64) * (src_h as u64) >= (out_h as u64) * (src_w as u64) {
                (out_w, div_ceil(src_h as u64 * out_w as u64, src_w as u64) as u32)
            } else {
                (div_ceil(src_w as u64 * out_h as u64, src_h as u64) as u32, out_h)
            };
            let (x, y) = centered(w, h);
            FitPlan { scale_w: w, scale_h: h, dest_x: x, dest_y: y, tile: false }
        }
        FitMode::Fit => {
            // Contain: the bound axis matches exactly, the other letterboxes (floor).
            let (w, h) = if (out_w as u64) * (src_h as u64) <= (out_h as u64) * (src_w as u64) {
                (out_w, ((src_h as u64 * out_w as u64) / src_w as u64).max(1) as u32)
            } else {
                (((src_w as u64 * out_h as u64) / src_h as u64).max(1) as u32, out_h)
            };
            let (x, y) = centered(w, h);
            FitPlan { scale_w: w, scale_h: h, dest_x: x, dest_y: y, tile: false }
        }
        FitMode::Center => {
            let (x, y) = centered(src_w, src_h);
            FitPlan { scale_w: src_w, scale_h: src_h, dest_x: x, dest_y: y, tile: false }
        }
        FitMode::Tile => FitPlan {
            scale_w: src_w,
            scale_h: src_h,
            dest_x: 0,
            dest_y: 0,
            tile: true,
        },
    }
}

/// Apply a plan: place `src` (already at `scale_w` x `scale_h`) onto a black
/// canvas of the output size. Out-of-canvas regions of the source are clipped.
pub fn compose(src: &[u8], plan: &FitPlan, out_w: u32, out_h: u32) -> Vec<u8> {
    let mut canvas = vec![0u8; out_w as usize * out_h as usize * 4];
    // opaque black background
    for px in canvas.chunks_exact_mut(4) {
        px[3] = 255;
    }

    if plan.tile {
        let mut y = 0i32;
        while y < out_h as i32 {
            let mut x = 0i32;
            while x < out_w as i32 {
                blit(&mut canvas, out_w, out_h, src, plan.scale_w, plan.scale_h, x, y);
                x += plan.scale_w as i32;
            }
            y += plan.scale_h as i32;
        }
    } else {
        blit(&mut canvas, out_w, out_h, src, plan.scale_w, plan.scale_h, plan.dest_x, plan.dest_y);
    }

    canvas
}

fn blit(
    canvas: &mut [u8],
    out_w: u32,
    out_h: u32,
    src: &[u8],
    src_w: u32,
    src_h: u32,
    dest_x: i32,
    dest_y: i32,
) {
    for row in 0..src_h as i32 {
        let cy = dest_y + row;
        if cy < 0 || cy >= out_h as i32 {
            continue;
        }
        let mut sx = 0i32;
        let mut cx = dest_x;
        if cx < 0 {
            sx = -cx;
            cx = 0;
        }
        let copy_w = (src_w as i32 - sx).min(out_w as i32 - cx);
        if copy_w <= 0 {
            continue;
        }
        let src_off = (row as usize * src_w as usize + sx as usize) * 4;
        let dst_off = (cy as usize * out_w as usize + cx as usize) * 4;
        let n = copy_w as usize * 4;
        canvas[dst_off..dst_off + n].copy_from_slice(&src[src_off..src_off + n]);
    }
}

/// Decode `path`, rescale per `mode`, and return an output-sized RGBA buffer.
pub fn load(path: &Path, out_w: u32, out_h: u32, mode: FitMode) -> Result<LoadedImage, RenderError> {
    if out_w == 0 || out_h == 0 {
        return Err(RenderError::Image {
            path: path.to_path_buf(),
            detail: "output has zero area".into(),
        });
    }

    let decoded = image::open(path).map_err(|e| RenderError::Image {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let rgba = decoded.to_rgba8();
    let (src_w, src_h) = rgba.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(RenderError::Image {
            path: path.to_path_buf(),
            detail: "image has zero area".into(),
        });
    }

    let plan = plan_fit(src_w, src_h, out_w, out_h, mode);
    let scaled = if (plan.scale_w, plan.scale_h) == (src_w, src_h) {
        rgba
    } else {
        image::imageops::resize(&rgba, plan.scale_w, plan.scale_h, image::imageops::FilterType::Triangle)
    };

    let pixels = compose(scaled.as_raw(), &plan, out_w, out_h);
    Ok(LoadedImage { pixels, width: out_w, height: out_h, channels: 4 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_is_deterministic() {
        for mode in [FitMode::Stretch, FitMode::Fill, FitMode::Fit, FitMode::Center, FitMode::Tile] {
            let a = plan_fit(800, 600, 1920, 1080, mode);
            let b = plan_fit(800, 600, 1920, 1080, mode);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn fill_covers_and_centers() {
        let p = plan_fit(800, 600, 1920, 1080, FitMode::Fill);
        assert_eq!((p.scale_w, p.scale_h), (1920, 1440));
        assert_eq!((p.dest_x, p.dest_y), (0, -180));
        assert!(!p.tile);

        // portrait source on a landscape output binds to height
        let p = plan_fit(600, 800, 1920, 1080, FitMode::Fill);
        assert_eq!(p.scale_h, 1080);
        assert!(p.scale_w >= 1920);
        assert!(p.dest_x <= 0);
    }

    #[test]
    fn fit_letterboxes_and_centers() {
        let p = plan_fit(800, 600, 1920, 1080, FitMode::Fit);
        assert_eq!((p.scale_w, p.scale_h), (1440, 1080));
        assert_eq!((p.dest_x, p.dest_y), (240, 0));

        let p = plan_fit(1920, 1080, 1920, 1080, FitMode::Fit);
        assert_eq!((p.scale_w, p.scale_h), (1920, 1080));
        assert_eq!((p.dest_x, p.dest_y), (0, 0));
    }

    #[test]
    fn center_keeps_native_size() {
        let p = plan_fit(2560, 1440, 1920, 1080, FitMode::Center);
        assert_eq!((p.scale_w, p.scale_h), (2560, 1440));
        assert_eq!((p.dest_x, p.dest_y), (-320, -180));

        let p = plan_fit(640, 480, 1920, 1080, FitMode::Center);
        assert_eq!((p.dest_x, p.dest_y), (640, 300));
    }

    #[test]
    fn stretch_and_tile_anchor_at_origin() {
        let s = plan_fit(123, 45, 1920, 1080, FitMode::Stretch);
        assert_eq!((s.scale_w, s.scale_h, s.dest_x, s.dest_y), (1920, 1080, 0, 0));

        let t = plan_fit(256, 256, 1920, 1080, FitMode::Tile);
        assert_eq!((t.scale_w, t.scale_h), (256, 256));
        assert!(t.tile);
    }

    #[test]
    fn compose_letterboxes_with_black() {
        // 2x2 white source centered on a 4x2 canvas
        let white = vec![255u8; 2 * 2 * 4];
        let plan = FitPlan { scale_w: 2, scale_h: 2, dest_x: 1, dest_y: 0, tile: false };
        let out = compose(&white, &plan, 4, 2);

        let px = |x: usize, y: usize| &out[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(px(0, 0), &[0, 0, 0, 255]);
        assert_eq!(px(1, 0), &[255, 255, 255, 255]);
        assert_eq!(px(2, 1), &[255, 255, 255, 255]);
        assert_eq!(px(3, 1), &[0, 0, 0, 255]);
    }

    #[test]
    fn compose_clips_negative_offsets() {
        let white = vec![255u8; 2 * 2 * 4];
        let plan = FitPlan { scale_w: 2, scale_h: 2, dest_x: -1, dest_y: -1, tile: false };
        let out = compose(&white, &plan, 2, 2);

        let px = |x: usize, y: usize| &out[(y * 2 + x) * 4..(y * 2 + x) * 4 + 4];
        assert_eq!(px(0, 0), &[255, 255, 255, 255], "surviving corner");
        assert_eq!(px(1, 1), &[0, 0, 0, 255]);
    }

    #[test]
    fn compose_tiles_across_the_canvas() {
        // 2x1 source: red, green
        let src = vec![255, 0, 0, 255, 0, 255, 0, 255];
        let plan = FitPlan { scale_w: 2, scale_h: 1, dest_x: 0, dest_y: 0, tile: true };
        let out = compose(&src, &plan, 4, 2);

        let px = |x: usize, y: usize| &out[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        for y in 0..2 {
            assert_eq!(px(0, y), &[255, 0, 0, 255]);
            assert_eq!(px(1, y), &[0, 255, 0, 255]);
            assert_eq!(px(2, y), &[255, 0, 0, 255]);
            assert_eq!(px(3, y), &[0, 255, 0, 255]);
        }
    }
}
