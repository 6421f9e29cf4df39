/// Borrowed 8-bit grayscale image, row-major.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl<'a> GrayImageView<'a> {
    /// Wrap a raw buffer; `None` when the length does not match `width * height`.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Option<Self> {
        (width.checked_mul(height)? == data.len()).then_some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// True if `(x, y)` is at least `margin` pixels away from every border.
    #[inline]
    pub fn contains_with_margin(&self, x: f32, y: f32, margin: f32) -> bool {
        x >= margin
            && y >= margin
            && x <= self.width as f32 - 1.0 - margin
            && y <= self.height as f32 - 1.0 - margin
    }
}

/// Owned counterpart of [`GrayImageView`].
#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

/// Bilinear sample at a sub-pixel location; pixels outside the image read as 0.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let (xf, yf) = (x.floor(), y.floor());
    let (tx, ty) = (x - xf, y - yf);
    let (xi, yi) = (xf as i64, yf as i64);

    let px = |dx: i64, dy: i64| -> f32 {
        let (cx, cy) = (xi + dx, yi + dy);
        if cx < 0 || cy < 0 || cx >= src.width as i64 || cy >= src.height as i64 {
            0.0
        } else {
            src.get(cx as usize, cy as usize) as f32
        }
    };

    let top = px(0, 0) * (1.0 - tx) + px(1, 0) * tx;
    let bottom = px(0, 1) * (1.0 - tx) + px(1, 1) * tx;
    top * (1.0 - ty) + bottom * ty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let data = [0u8, 100, 200, 50];
        let view = GrayImageView::new(2, 2, &data).expect("view");
        assert!((sample_bilinear(&view, 0.5, 0.0) - 50.0).abs() < 1e-4);
        assert!((sample_bilinear(&view, 0.5, 0.5) - 87.5).abs() < 1e-4);
        assert_eq!(sample_bilinear(&view, 1.0, 1.0), 50.0);
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let data = [0u8; 5];
        assert!(GrayImageView::new(2, 2, &data).is_none());
    }

    #[test]
    fn margin_check() {
        let data = [0u8; 100];
        let view = GrayImageView::new(10, 10, &data).expect("view");
        assert!(view.contains_with_margin(5.0, 5.0, 3.0));
        assert!(!view.contains_with_margin(2.0, 5.0, 3.0));
        assert!(!view.contains_with_margin(5.0, 7.5, 3.0));
    }
}
