use crate::frame::{required_len, ChannelOrder, PixelBuffer, PixelFormat, RawFrame};
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Frame has zero extent ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("Row stride {stride} is smaller than {row_bytes} bytes of pixel data")]
    StrideTooSmall { stride: usize, row_bytes: usize },

    #[error("Raw buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },
}

/// Converts sensor-native frames into tightly packed 3-channel buffers
#[derive(Debug, Clone, Copy)]
pub struct FormatConverter {
    output: ChannelOrder,
}

impl FormatConverter {
    pub fn new(output: ChannelOrder) -> Self {
        Self { output }
    }

    /// Convert a raw frame; any input padding is dropped from the output
    pub fn convert(&self, raw: &RawFrame) -> Result<PixelBuffer, ConversionError> {
        if raw.width == 0 || raw.height == 0 {
            return Err(ConversionError::EmptyFrame {
                width: raw.width,
                height: raw.height,
            });
        }

        let row_bytes = raw.format.row_bytes(raw.width);
        if raw.stride < row_bytes {
            return Err(ConversionError::StrideTooSmall {
                stride: raw.stride,
                row_bytes,
            });
        }

        let expected = required_len(raw.height, raw.stride, row_bytes);
        if raw.data.len() < expected {
            return Err(ConversionError::BufferTooShort {
                expected,
                actual: raw.data.len(),
            });
        }

        let width = raw.width as usize;
        let height = raw.height as usize;
        let out_stride = width * 3;
        let mut data = Vec::with_capacity(out_stride * height);

        for y in 0..height {
            for x in 0..width {
                let rgb = sample_rgb(raw, x, y);
                match self.output {
                    ChannelOrder::Rgb => data.extend_from_slice(&rgb),
                    ChannelOrder::Bgr => data.extend_from_slice(&[rgb[2], rgb[1], rgb[0]]),
                }
            }
        }

        trace!(
            "Converted frame {} ({}x{} {:?} -> {:?})",
            raw.sequence,
            raw.width,
            raw.height,
            raw.format,
            self.output
        );

        Ok(PixelBuffer {
            width: raw.width,
            height: raw.height,
            stride: out_stride,
            order: self.output,
            data,
        })
    }
}

/// RGB value of pixel (x, y); bounds were validated by the caller
fn sample_rgb(raw: &RawFrame, x: usize, y: usize) -> [u8; 3] {
    let row = &raw.data[y * raw.stride..];
    match raw.format {
        PixelFormat::Mono8 => [row[x]; 3],
        PixelFormat::Rgb8 => [row[x * 3], row[x * 3 + 1], row[x * 3 + 2]],
        PixelFormat::Bgr8 => [row[x * 3 + 2], row[x * 3 + 1], row[x * 3]],
        PixelFormat::Yuyv => {
            // [Y0 U Y1 V]; an odd trailing pixel reuses its own Y with neutral chroma
            let pair = x & !1;
            let luma = row[x * 2];
            if pair + 1 < raw.width as usize {
                yuv_to_rgb(luma, row[pair * 2 + 1], row[pair * 2 + 3])
            } else {
                yuv_to_rgb(luma, 128, 128)
            }
        }
        PixelFormat::BayerRg8 => demosaic_rggb(raw, x, y),
    }
}

/// Superpixel demosaic: each pixel takes the colors of its 2x2 RGGB tile
fn demosaic_rggb(raw: &RawFrame, x: usize, y: usize) -> [u8; 3] {
    let max_x = raw.width as usize - 1;
    let max_y = raw.height as usize - 1;
    let x0 = x & !1;
    let y0 = y & !1;
    let x1 = (x0 + 1).min(max_x);
    let y1 = (y0 + 1).min(max_y);

    let at = |px: usize, py: usize| raw.data[py * raw.stride + px];

    let r = at(x0, y0);
    let g = ((u16::from(at(x1, y0)) + u16::from(at(x0, y1))) / 2) as u8;
    let b = at(x1, y1);
    [r, g, b]
}

/// ITU-R BT.601 YUV to RGB
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y_f = f32::from(y);
    let u_f = f32::from(u) - 128.0;
    let v_f = f32::from(v) - 128.0;

    let r = 1.402f32.mul_add(v_f, y_f);
    let g = 0.714_14f32.mul_add(-v_f, 0.344_14f32.mul_add(-u_f, y_f));
    let b = 1.772f32.mul_add(u_f, y_f);

    [clamp(r), clamp(g), clamp(b)]
}

fn clamp(val: f32) -> u8 {
    val.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(width: u32, height: u32, stride: usize, format: PixelFormat, data: Vec<u8>) -> RawFrame {
        RawFrame {
            sequence: 0,
            width,
            height,
            stride,
            format,
            data,
        }
    }

    #[test]
    fn test_rgb_passthrough_drops_padding() {
        let data = vec![1, 2, 3, 4, 5, 6, 0xEE, 0xEE, 7, 8, 9, 10, 11, 12, 0xEE, 0xEE];
        let frame = raw(2, 2, 8, PixelFormat::Rgb8, data);

        let out = FormatConverter::new(ChannelOrder::Rgb).convert(&frame).unwrap();
        assert_eq!(out.stride, 6);
        assert_eq!(out.data, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_bgr_input_to_rgb_output() {
        let frame = raw(1, 1, 3, PixelFormat::Bgr8, vec![30, 20, 10]);
        let out = FormatConverter::new(ChannelOrder::Rgb).convert(&frame).unwrap();
        assert_eq!(out.data, vec![10, 20, 30]);

        let out = FormatConverter::new(ChannelOrder::Bgr).convert(&frame).unwrap();
        assert_eq!(out.data, vec![30, 20, 10]);
        assert_eq!(out.order, ChannelOrder::Bgr);
    }

    #[test]
    fn test_mono_expands_to_three_channels() {
        let frame = raw(2, 1, 2, PixelFormat::Mono8, vec![0, 200]);
        let out = FormatConverter::new(ChannelOrder::Rgb).convert(&frame).unwrap();
        assert_eq!(out.data, vec![0, 0, 0, 200, 200, 200]);
    }

    #[test]
    fn test_bayer_tile_colors() {
        // R G
        // G B
        let frame = raw(2, 2, 2, PixelFormat::BayerRg8, vec![200, 100, 50, 10]);
        let out = FormatConverter::new(ChannelOrder::Rgb).convert(&frame).unwrap();
        for pixel in out.data.chunks_exact(3) {
            assert_eq!(pixel, &[200, 75, 10]);
        }
    }

    #[test]
    fn test_yuyv_neutral_chroma_is_gray() {
        let frame = raw(2, 1, 4, PixelFormat::Yuyv, vec![128, 128, 128, 128]);
        let out = FormatConverter::new(ChannelOrder::Rgb).convert(&frame).unwrap();
        assert_eq!(out.data, vec![128; 6]);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let frame = raw(4, 4, 12, PixelFormat::Rgb8, vec![0; 40]);
        let err = FormatConverter::new(ChannelOrder::Rgb).convert(&frame).unwrap_err();
        assert_eq!(
            err,
            ConversionError::BufferTooShort {
                expected: 48,
                actual: 40
            }
        );
    }

    #[test]
    fn test_stride_smaller_than_row_is_rejected() {
        let frame = raw(4, 1, 8, PixelFormat::Rgb8, vec![0; 12]);
        let err = FormatConverter::new(ChannelOrder::Rgb).convert(&frame).unwrap_err();
        assert!(matches!(err, ConversionError::StrideTooSmall { .. }));
    }

    #[test]
    fn test_empty_frame_is_rejected() {
        let frame = raw(0, 4, 0, PixelFormat::Mono8, Vec::new());
        assert!(FormatConverter::new(ChannelOrder::Rgb).convert(&frame).is_err());
    }
}
