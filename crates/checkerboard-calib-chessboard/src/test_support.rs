//! Synthetic boards for unit tests.

use checkerboard_calib_core::GrayImage;
use nalgebra::Point2;

pub(crate) const DARK: f32 = 30.0;
pub(crate) const LIGHT: f32 = 220.0;

/// Colour of board-plane point `(u, v)` measured in squares, with inner
/// corners at integer coordinates `0..cols x 0..rows`.
pub(crate) fn board_value(u: f32, v: f32, cols: usize, rows: usize) -> f32 {
    if u < -1.0 || v < -1.0 || u >= cols as f32 || v >= rows as f32 {
        return LIGHT;
    }
    let parity = (u.floor() as i32 + v.floor() as i32).rem_euclid(2);
    if parity == 0 {
        DARK
    } else {
        LIGHT
    }
}

/// Render an image through `to_board` (pixel -> board-plane squares) with
/// 4x4 supersampling. Pixel centres sit on integer coordinates.
pub(crate) fn render_with<F>(width: usize, height: usize, cols: usize, rows: usize, to_board: F) -> GrayImage
where
    F: Fn(f32, f32) -> (f32, f32),
{
    const SS: usize = 4;
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for sy in 0..SS {
                for sx in 0..SS {
                    let px = x as f32 - 0.5 + (sx as f32 + 0.5) / SS as f32;
                    let py = y as f32 - 0.5 + (sy as f32 + 0.5) / SS as f32;
                    let (u, v) = to_board(px, py);
                    acc += board_value(u, v, cols, rows);
                }
            }
            data.push((acc / (SS * SS) as f32).round() as u8);
        }
    }
    GrayImage {
        width,
        height,
        data,
    }
}

/// Fronto-parallel board with `square` pixels per square and the first inner
/// corner at `origin`. Returns the image and the inner corners in board order.
pub(crate) fn render_checkerboard(
    cols: usize,
    rows: usize,
    square: f32,
    origin: (f32, f32),
) -> (GrayImage, Vec<Point2<f32>>) {
    let width = (2.0 * origin.0 + (cols - 1) as f32 * square).ceil() as usize;
    let height = (2.0 * origin.1 + (rows - 1) as f32 * square).ceil() as usize;
    let img = render_with(width, height, cols, rows, |x, y| {
        ((x - origin.0) / square, (y - origin.1) / square)
    });
    let corners = (0..rows)
        .flat_map(|j| {
            (0..cols).map(move |i| {
                Point2::new(origin.0 + i as f32 * square, origin.1 + j as f32 * square)
            })
        })
        .collect();
    (img, corners)
}
