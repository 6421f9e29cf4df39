#![allow(dead_code)]

use checkerboard_calib::solver::{CameraIntrinsics, Distortion};
use checkerboard_calib::synthetic::{render_view, standard_poses, SyntheticBoard, SyntheticCamera};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;

pub const COLS: u32 = 9;
pub const ROWS: u32 = 6;

pub fn camera() -> SyntheticCamera {
    SyntheticCamera {
        intrinsics: CameraIntrinsics {
            fx: 450.0,
            fy: 450.0,
            cx: 240.0,
            cy: 180.0,
        },
        distortion: Distortion {
            k1: -0.08,
            k2: 0.02,
            ..Default::default()
        },
        width: 480,
        height: 360,
    }
}

pub fn board() -> SyntheticBoard {
    SyntheticBoard {
        cols: COLS,
        rows: ROWS,
        square: 1.0,
    }
}

/// PNG-encoded views, rendered once per test binary.
pub fn rendered_views() -> &'static [(String, Vec<u8>)] {
    static VIEWS: OnceLock<Vec<(String, Vec<u8>)>> = OnceLock::new();
    VIEWS.get_or_init(|| {
        let camera = camera();
        let board = board();
        standard_poses(&board, 14.0)
            .iter()
            .enumerate()
            .map(|(k, pose)| {
                let img = DynamicImage::ImageLuma8(render_view(&camera, &board, pose));
                let mut png = Vec::new();
                img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                    .expect("encode png");
                (format!("view_{k:02}.png"), png)
            })
            .collect()
    })
}

pub fn write_views(dir: &Path) {
    for (name, png) in rendered_views() {
        std::fs::write(dir.join(name), png).expect("write view");
    }
}

/// Only the `index`-th rendered view.
pub fn write_view(dir: &Path, index: usize) {
    let (name, png) = &rendered_views()[index];
    std::fs::write(dir.join(name), png).expect("write view");
}

/// A flat gray image of the same size as the rendered views.
pub fn write_blank(dir: &Path, name: &str) {
    let cam = camera();
    GrayImage::from_pixel(cam.width, cam.height, Luma([128]))
        .save(dir.join(name))
        .expect("write blank");
}
