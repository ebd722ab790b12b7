use image::{ImageBuffer, Rgba, Rgba32FImage};

/// Represents a single video frame on the host side
///
/// A thin wrapper around a 4-channel `f32` image. Values are not clamped, so
/// HDR-like excursions above 1.0 survive the round trip through the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: Rgba32FImage,
}

impl Frame {
    /// Create a new frame from an RGBA image buffer
    pub fn new(buffer: Rgba32FImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [f32; 4]) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgba(color));
        Self { buffer }
    }

    /// Create a new frame whose pixels are produced by `f(x, y)`
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> [f32; 4],
    {
        let buffer = ImageBuffer::from_fn(width, height, |x, y| Rgba(f(x, y)));
        Self { buffer }
    }

    /// SMPTE-style vertical color bars at 75% amplitude
    pub fn color_bars(width: u32, height: u32) -> Self {
        const BARS: [[f32; 3]; 7] = [
            [0.75, 0.75, 0.75],
            [0.75, 0.75, 0.0],
            [0.0, 0.75, 0.75],
            [0.0, 0.75, 0.0],
            [0.75, 0.0, 0.75],
            [0.75, 0.0, 0.0],
            [0.0, 0.0, 0.75],
        ];
        Self::from_fn(width, height, |x, _| {
            let bar = (x as usize * BARS.len()) / width.max(1) as usize;
            let [r, g, b] = BARS[bar.min(BARS.len() - 1)];
            [r, g, b, 1.0]
        })
    }

    /// Horizontal gray ramp from black to white
    pub fn ramp(width: u32, height: u32) -> Self {
        let span = width.saturating_sub(1).max(1) as f32;
        Self::from_fn(width, height, |x, _| {
            let v = x as f32 / span;
            [v, v, v, 1.0]
        })
    }

    /// Get the width of the frame
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    /// Get the height of the frame
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Get a pixel at the given coordinates
    pub fn get_pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.buffer.get_pixel(x, y).0
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [f32; 4]) {
        self.buffer.put_pixel(x, y, Rgba(color));
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &Rgba32FImage {
        &self.buffer
    }

    /// Consume the frame and return the underlying image buffer
    pub fn into_image(self) -> Rgba32FImage {
        self.buffer
    }

    /// Mean absolute per-channel difference over the color channels.
    ///
    /// Returns `None` when the frames differ in size.
    pub fn mean_abs_difference(&self, other: &Frame) -> Option<f32> {
        self.color_differences(other).map(|(sum, _, count)| {
            if count == 0 {
                0.0
            } else {
                (sum / count as f64) as f32
            }
        })
    }

    /// Largest absolute per-channel difference over the color channels.
    pub fn max_abs_difference(&self, other: &Frame) -> Option<f32> {
        self.color_differences(other).map(|(_, max, _)| max)
    }

    fn color_differences(&self, other: &Frame) -> Option<(f64, f32, usize)> {
        if self.width() != other.width() || self.height() != other.height() {
            return None;
        }
        let mut sum = 0.0f64;
        let mut max = 0.0f32;
        let mut count = 0usize;
        for (a, b) in self.buffer.pixels().zip(other.buffer.pixels()) {
            for channel in 0..3 {
                let diff = (a[channel] - b[channel]).abs();
                sum += diff as f64;
                max = max.max(diff);
                count += 1;
            }
        }
        Some((sum, max, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_bars_cover_width() {
        let frame = Frame::color_bars(70, 2);
        assert_eq!(frame.get_pixel(0, 0), [0.75, 0.75, 0.75, 1.0]);
        assert_eq!(frame.get_pixel(69, 1), [0.0, 0.0, 0.75, 1.0]);
    }

    #[test]
    fn test_difference_metrics() {
        let a = Frame::new_filled(4, 4, [0.5, 0.5, 0.5, 1.0]);
        let mut b = a.clone();
        b.set_pixel(1, 1, [0.5, 0.9, 0.5, 0.0]);

        assert!((a.max_abs_difference(&b).unwrap() - 0.4).abs() < 1e-6);
        // alpha is not part of the metric
        assert!(a.mean_abs_difference(&b).unwrap() < 0.01);
        assert!(a.mean_abs_difference(&Frame::new_filled(2, 2, [0.0; 4])).is_none());
    }
}
