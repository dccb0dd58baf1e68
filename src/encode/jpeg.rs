use super::{ColorMode, ImageEncoder};
use crate::error::EncodingError;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use std::io::Write;

struct Geometry {
    width: u32,
    height: u32,
    color: ColorMode,
}

/// Baseline JPEG encoder fed one scanline at a time.
///
/// Rows are gathered into a tightly packed image and compressed into the
/// destination writer on `finish`.
pub struct JpegScanlineEncoder<W: Write> {
    out: W,
    quality: u8,
    geometry: Option<Geometry>,
    rows: Vec<u8>,
    rows_written: u32,
}

impl<W: Write> JpegScanlineEncoder<W> {
    /// `quality` is clamped to the 1..=100 range JPEG supports
    pub fn new(out: W, quality: u8) -> Self {
        Self {
            out,
            quality: quality.clamp(1, 100),
            geometry: None,
            rows: Vec::new(),
            rows_written: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn reset(&mut self) {
        self.geometry = None;
        self.rows = Vec::new();
        self.rows_written = 0;
    }
}

impl<W: Write> ImageEncoder for JpegScanlineEncoder<W> {
    fn begin(&mut self, width: u32, height: u32, color: ColorMode) -> Result<(), EncodingError> {
        if self.geometry.is_some() {
            return Err(EncodingError::Encoder {
                details: "begin called while an image is in progress".to_string(),
            });
        }
        if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(EncodingError::InvalidGeometry {
                details: format!("{}x{} is not a valid JPEG size", width, height),
            });
        }

        self.rows = Vec::with_capacity(width as usize * height as usize * color.components());
        self.rows_written = 0;
        self.geometry = Some(Geometry {
            width,
            height,
            color,
        });
        Ok(())
    }

    fn write_row(&mut self, row: &[u8]) -> Result<(), EncodingError> {
        let geometry = self.geometry.as_ref().ok_or_else(|| EncodingError::Encoder {
            details: "write_row called before begin".to_string(),
        })?;

        let row_bytes = geometry.width as usize * geometry.color.components();
        if row.len() != row_bytes {
            return Err(EncodingError::Encoder {
                details: format!("row has {} bytes, expected {}", row.len(), row_bytes),
            });
        }
        if self.rows_written >= geometry.height {
            return Err(EncodingError::Encoder {
                details: format!("more than {} rows written", geometry.height),
            });
        }

        self.rows.extend_from_slice(row);
        self.rows_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EncodingError> {
        let geometry = self.geometry.take().ok_or_else(|| EncodingError::Encoder {
            details: "finish called before begin".to_string(),
        })?;

        if self.rows_written != geometry.height {
            let written = self.rows_written;
            self.reset();
            return Err(EncodingError::Encoder {
                details: format!("{} of {} rows written", written, geometry.height),
            });
        }

        let color_type = match geometry.color {
            ColorMode::Rgb => ColorType::Rgb8,
            ColorMode::Luma => ColorType::L8,
        };

        let rows = std::mem::take(&mut self.rows);
        self.rows_written = 0;

        JpegEncoder::new_with_quality(&mut self.out, self.quality)
            .encode(&rows, geometry.width, geometry.height, color_type)
            .map_err(|e| EncodingError::Encoder {
                details: e.to_string(),
            })?;

        self.out.flush()?;
        Ok(())
    }

    fn abort(&mut self) {
        self.reset();
    }
}
