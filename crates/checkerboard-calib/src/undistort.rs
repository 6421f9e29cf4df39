use checkerboard_calib_solver::{CameraIntrinsics, Distortion, UndistortMap};
use image::{DynamicImage, GrayImage, RgbImage};
use nalgebra::Matrix3;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Remove lens distortion from `img`, keeping its size and camera matrix.
///
/// Gray and RGB images keep their colour type; anything else comes back as
/// RGB8. Pixels that map outside the source are black.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = img.width(), height = img.height()))
)]
pub fn undistort_image(img: &DynamicImage, camera_matrix: &Matrix3<f64>, distortion: &Distortion) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let map = UndistortMap::new(
        &CameraIntrinsics::from_k_matrix(camera_matrix),
        distortion,
        width as usize,
        height as usize,
    );

    match img {
        DynamicImage::ImageLuma8(gray) => {
            let data = remap::<1>(gray.as_raw(), &map);
            GrayImage::from_raw(width, height, data)
                .map(DynamicImage::ImageLuma8)
                .unwrap_or_else(|| DynamicImage::new_luma8(width, height))
        }
        other => {
            let rgb = match other {
                DynamicImage::ImageRgb8(rgb) => rgb.clone(),
                _ => other.to_rgb8(),
            };
            let data = remap::<3>(rgb.as_raw(), &map);
            RgbImage::from_raw(width, height, data)
                .map(DynamicImage::ImageRgb8)
                .unwrap_or_else(|| DynamicImage::new_rgb8(width, height))
        }
    }
}

/// Bilinear remap of an interleaved `C`-channel buffer; samples outside
/// the source read as zero.
fn remap<const C: usize>(src: &[u8], map: &UndistortMap) -> Vec<u8> {
    let (w, h) = (map.width as i64, map.height as i64);
    let fetch = |x: i64, y: i64, c: usize| -> f32 {
        if x < 0 || y < 0 || x >= w || y >= h {
            0.0
        } else {
            src[((y * w + x) as usize) * C + c] as f32
        }
    };

    let mut out = vec![0u8; map.width * map.height * C];
    for (idx, [sx, sy]) in map.map.iter().copied().enumerate() {
        if !sx.is_finite() || !sy.is_finite() {
            continue;
        }
        let x0 = sx.floor() as i64;
        let y0 = sy.floor() as i64;
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;
        for c in 0..C {
            let a = fetch(x0, y0, c) + fx * (fetch(x0 + 1, y0, c) - fetch(x0, y0, c));
            let b = fetch(x0, y0 + 1, c) + fx * (fetch(x0 + 1, y0 + 1, c) - fetch(x0, y0 + 1, c));
            out[idx * C + c] = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, Rgba, RgbaImage};

    fn k() -> Matrix3<f64> {
        Matrix3::new(80.0, 0.0, 31.5, 0.0, 80.0, 23.5, 0.0, 0.0, 1.0)
    }

    fn pattern() -> GrayImage {
        GrayImage::from_fn(64, 48, |x, y| Luma([((x * 7 + y * 13) % 251) as u8]))
    }

    #[test]
    fn zero_distortion_is_the_identity() {
        let img = DynamicImage::ImageLuma8(pattern());
        let out = undistort_image(&img, &k(), &Distortion::default());
        assert_eq!(out.as_luma8().expect("gray").as_raw(), pattern().as_raw());
    }

    #[test]
    fn keeps_size_and_colour_type() {
        let d = Distortion {
            k1: -0.2,
            ..Default::default()
        };
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([10, 20, 30])));
        let out = undistort_image(&rgb, &k(), &d);
        assert_eq!((out.width(), out.height()), (64, 48));
        let out = out.as_rgb8().expect("rgb");
        assert_eq!(*out.get_pixel(32, 24), Rgb([10, 20, 30]));

        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 48, Rgba([1, 2, 3, 255])));
        assert!(undistort_image(&rgba, &k(), &d).as_rgb8().is_some());
    }

    #[test]
    fn pincushion_corners_fall_outside_and_turn_black() {
        // Strong pincushion pushes the image corners beyond the source.
        let d = Distortion {
            k1: 0.8,
            ..Default::default()
        };
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 48, Luma([200])));
        let out = undistort_image(&img, &k(), &d);
        let out = out.as_luma8().expect("gray");
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(32, 24)[0], 200);
    }
}
