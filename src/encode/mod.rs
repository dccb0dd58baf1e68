//! Pixel encoder adapter: streams row-major pixel buffers into an image encoder.

mod jpeg;
#[cfg(test)]
mod tests;

pub use jpeg::JpegScanlineEncoder;

use crate::error::EncodingError;
use crate::frame::{required_len, ChannelOrder, PixelBuffer};
use std::io::Write;
use tracing::trace;

/// JPEG quality used for persisted frames unless configured otherwise
pub const DEFAULT_QUALITY: u8 = 85;

/// Sample layout handed to an image encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// 3 bytes per pixel, R G B
    Rgb,
    /// 1 byte per pixel
    Luma,
}

impl ColorMode {
    pub fn components(&self) -> usize {
        match self {
            ColorMode::Rgb => 3,
            ColorMode::Luma => 1,
        }
    }
}

/// A scanline-oriented image encoder.
///
/// Callers invoke `begin`, then `write_row` exactly `height` times, then
/// `finish`. After any failure the caller invokes `abort` instead of `finish`.
pub trait ImageEncoder {
    fn begin(&mut self, width: u32, height: u32, color: ColorMode) -> Result<(), EncodingError>;

    fn write_row(&mut self, row: &[u8]) -> Result<(), EncodingError>;

    fn finish(&mut self) -> Result<(), EncodingError>;

    /// Discard any partially encoded image
    fn abort(&mut self) {}
}

/// Feeds 3-channel pixel buffers to an [`ImageEncoder`] one row at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelEncoder {
    quality: u8,
    source_order: ChannelOrder,
}

impl Default for PixelEncoder {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            source_order: ChannelOrder::Rgb,
        }
    }
}

impl PixelEncoder {
    /// `source_order` is the channel order of the buffers this encoder will be given
    pub fn new(quality: u8, source_order: ChannelOrder) -> Result<Self, EncodingError> {
        if quality > 100 {
            return Err(EncodingError::InvalidQuality { quality });
        }
        Ok(Self {
            quality,
            source_order,
        })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn source_order(&self) -> ChannelOrder {
        self.source_order
    }

    /// Encode a row-major buffer to JPEG bytes
    pub fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        row_stride: usize,
    ) -> Result<Vec<u8>, EncodingError> {
        self.encode_to(data, width, height, row_stride, Vec::new())
    }

    /// Encode a row-major buffer as JPEG into `out`, returning it once finalized
    pub fn encode_to<W: Write>(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        row_stride: usize,
        out: W,
    ) -> Result<W, EncodingError> {
        let mut encoder = JpegScanlineEncoder::new(out, self.quality);
        self.stream_rows(data, width, height, row_stride, &mut encoder)?;
        Ok(encoder.into_inner())
    }

    /// Encode a frame's pixel buffer to JPEG bytes
    pub fn encode_buffer(&self, pixels: &PixelBuffer) -> Result<Vec<u8>, EncodingError> {
        self.encode(&pixels.data, pixels.width, pixels.height, pixels.stride)
    }

    /// Stream exactly `height` rows of `width` pixels to `encoder`,
    /// advancing through `data` by `row_stride` bytes per row
    pub fn stream_rows<E: ImageEncoder>(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        row_stride: usize,
        encoder: &mut E,
    ) -> Result<(), EncodingError> {
        if width == 0 || height == 0 {
            return Err(EncodingError::InvalidGeometry {
                details: format!("{}x{} image has no pixels", width, height),
            });
        }

        let row_bytes = width as usize * ColorMode::Rgb.components();
        if row_stride < row_bytes {
            return Err(EncodingError::InvalidGeometry {
                details: format!(
                    "row stride {} is smaller than {} bytes of pixel data",
                    row_stride, row_bytes
                ),
            });
        }

        let expected = required_len(height, row_stride, row_bytes);
        if data.len() < expected {
            return Err(EncodingError::BufferTooShort {
                expected,
                actual: data.len(),
            });
        }

        if let Err(e) = encoder.begin(width, height, ColorMode::Rgb) {
            encoder.abort();
            return Err(e);
        }

        let mut swapped = match self.source_order {
            ChannelOrder::Rgb => Vec::new(),
            ChannelOrder::Bgr => vec![0u8; row_bytes],
        };

        for y in 0..height as usize {
            let start = y * row_stride;
            let row = &data[start..start + row_bytes];

            let written = match self.source_order {
                ChannelOrder::Rgb => encoder.write_row(row),
                ChannelOrder::Bgr => {
                    for (dst, src) in swapped.chunks_exact_mut(3).zip(row.chunks_exact(3)) {
                        dst[0] = src[2];
                        dst[1] = src[1];
                        dst[2] = src[0];
                    }
                    encoder.write_row(&swapped)
                }
            };

            if let Err(e) = written {
                encoder.abort();
                return Err(e);
            }
        }

        if let Err(e) = encoder.finish() {
            encoder.abort();
            return Err(e);
        }

        trace!(
            "Encoded {}x{} image (stride {}, quality {})",
            width,
            height,
            row_stride,
            self.quality
        );
        Ok(())
    }
}

/// Encode an RGB row-major buffer to JPEG at the given quality
pub fn encode_jpeg(
    data: &[u8],
    width: u32,
    height: u32,
    row_stride: usize,
    quality: u8,
) -> Result<Vec<u8>, EncodingError> {
    PixelEncoder::new(quality, ChannelOrder::Rgb)?.encode(data, width, height, row_stride)
}
