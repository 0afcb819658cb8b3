// This is free and unencumbered software released into the public domain.

use crate::shared::CameraError;
use bytes::Bytes;
use image::RgbaImage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    Bgra8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }
}

/// One raw preview buffer pulled from a device.
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub pixel_format: PixelFormat,
    pub timestamp_ns: u64,
}

impl Frame {
    pub fn new_rgb8(data: impl Into<Bytes>, width: u32, height: u32, stride: usize) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            stride,
            pixel_format: PixelFormat::Rgb8,
            timestamp_ns: 0,
        }
    }

    pub fn new_bgra(data: impl Into<Bytes>, width: u32, height: u32, stride: usize) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            stride,
            pixel_format: PixelFormat::Bgra8,
            timestamp_ns: 0,
        }
    }

    pub fn with_timestamp_ns(mut self, ts: u64) -> Self {
        self.timestamp_ns = ts;
        self
    }

    /// Converts the buffer to an opaque RGBA image, honoring the row stride.
    pub fn to_rgba_image(&self) -> Result<RgbaImage, CameraError> {
        let bpp = self.pixel_format.bytes_per_pixel();
        let row_len = self.width as usize * bpp;
        let needed = self
            .stride
            .saturating_mul(self.height.saturating_sub(1) as usize)
            + row_len;
        if self.stride < row_len || self.data.len() < needed {
            return Err(CameraError::other(format!(
                "frame buffer too small: {} bytes for {}x{} stride {}",
                self.data.len(),
                self.width,
                self.height,
                self.stride
            )));
        }

        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for row in self.data.chunks(self.stride).take(self.height as usize) {
            for px in row[..row_len].chunks_exact(bpp) {
                match self.pixel_format {
                    // The fourth channel of camera buffers is padding, not alpha.
                    PixelFormat::Rgb8 | PixelFormat::Rgba8 => {
                        out.extend_from_slice(&[px[0], px[1], px[2], 255])
                    },
                    PixelFormat::Bgra8 => out.extend_from_slice(&[px[2], px[1], px[0], 255]),
                }
            }
        }

        RgbaImage::from_raw(self.width, self.height, out)
            .ok_or_else(|| CameraError::other("frame conversion produced a short buffer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_bgra_converts_to_opaque_rgba() {
        // 2x2 pixels, one byte of row padding.
        let data = vec![
            1, 2, 3, 0, 4, 5, 6, 0, 9, //
            7, 8, 9, 0, 10, 11, 12, 0, 9,
        ];
        let img = Frame::new_bgra(data, 2, 2, 9).to_rgba_image().unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [3, 2, 1, 255]);
        assert_eq!(img.get_pixel(1, 1).0, [12, 11, 10, 255]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let frame = Frame::new_rgb8(vec![0u8; 10], 4, 4, 12);
        assert!(frame.to_rgba_image().is_err());
    }
}
