//! Corner overlays written in [`crate::DebugMode::Print`] mode.

use checkerboard_calib_core::TargetDetection;
use image::{GrayImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};

const ROW_COLOURS: [Rgb<u8>; 6] = [
    Rgb([255, 0, 0]),
    Rgb([255, 128, 0]),
    Rgb([200, 200, 0]),
    Rgb([0, 200, 0]),
    Rgb([0, 128, 255]),
    Rgb([200, 0, 255]),
];
const FIRST_CORNER: Rgb<u8> = Rgb([0, 255, 255]);

fn put(img: &mut RgbImage, x: i64, y: i64, colour: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, colour);
    }
}

fn draw_line(img: &mut RgbImage, from: (f32, f32), to: (f32, f32), colour: Rgb<u8>) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil().max(1.0) as usize;
    for s in 0..=steps {
        let t = s as f32 / steps as f32;
        let x = from.0 + t * (to.0 - from.0);
        let y = from.1 + t * (to.1 - from.1);
        put(img, x.round() as i64, y.round() as i64, colour);
    }
}

fn draw_cross(img: &mut RgbImage, (x, y): (f32, f32), half: f32, colour: Rgb<u8>) {
    draw_line(img, (x - half, y - half), (x + half, y + half), colour);
    draw_line(img, (x - half, y + half), (x + half, y - half), colour);
}

fn draw_circle(img: &mut RgbImage, (x, y): (f32, f32), radius: f32, colour: Rgb<u8>) {
    let n = (radius * 8.0).ceil().max(16.0) as usize;
    for k in 0..n {
        let a = k as f32 / n as f32 * std::f32::consts::TAU;
        put(
            img,
            (x + radius * a.cos()).round() as i64,
            (y + radius * a.sin()).round() as i64,
            colour,
        );
    }
}

/// Draw the detected corners on top of the image: one colour per board
/// row, consecutive corners joined, the first corner circled.
pub fn render_corner_overlay(gray: &GrayImage, detection: &TargetDetection) -> RgbImage {
    let mut out = image::DynamicImage::ImageLuma8(gray.clone()).to_rgb8();
    let cols = detection.cols.max(1) as usize;

    let points: Vec<(f32, f32)> = detection
        .corners
        .iter()
        .map(|c| (c.position.x, c.position.y))
        .collect();

    for (k, pair) in points.windows(2).enumerate() {
        let colour = ROW_COLOURS[(k / cols) % ROW_COLOURS.len()];
        draw_line(&mut out, pair[0], pair[1], colour);
    }
    for (k, p) in points.iter().enumerate() {
        draw_cross(&mut out, *p, 4.0, ROW_COLOURS[(k / cols) % ROW_COLOURS.len()]);
    }
    if let Some(first) = points.first() {
        draw_circle(&mut out, *first, 8.0, FIRST_CORNER);
    }
    out
}

/// `<dir>/<stem>_corners.png` for an input image path.
pub fn overlay_path(dir: &Path, image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    dir.join(format!("{stem}_corners.png"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkerboard_calib_core::{GridCoords, LabeledCorner};
    use nalgebra::Point2;

    #[test]
    fn overlay_keeps_size_and_marks_corners() {
        let gray = GrayImage::from_pixel(60, 40, image::Luma([128]));
        let corners = (0..2)
            .flat_map(|j| {
                (0..2).map(move |i| LabeledCorner {
                    position: Point2::new(20.0 + 20.0 * i as f32, 10.0 + 20.0 * j as f32),
                    grid: GridCoords { i, j },
                    strength: 1.0,
                })
            })
            .collect();
        let det = TargetDetection {
            cols: 2,
            rows: 2,
            corners,
        };

        let out = render_corner_overlay(&gray, &det);
        assert_eq!(out.dimensions(), (60, 40));
        assert_eq!(*out.get_pixel(40, 30), ROW_COLOURS[1]);
        assert_eq!(*out.get_pixel(28, 10), FIRST_CORNER);
        assert_eq!(*out.get_pixel(0, 0), Rgb([128, 128, 128]));
    }

    #[test]
    fn overlay_name_uses_the_file_stem() {
        let p = overlay_path(Path::new("/tmp/dbg"), Path::new("/data/img_003.png"));
        assert_eq!(p, Path::new("/tmp/dbg/img_003_corners.png"));
    }
}
