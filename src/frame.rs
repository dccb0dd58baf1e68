use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sensor-native pixel layouts a camera may deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit monochrome
    Mono8,
    /// Packed RGB, 3 bytes per pixel
    Rgb8,
    /// Packed BGR, 3 bytes per pixel
    Bgr8,
    /// YUV 4:2:2 packed as [Y0 U Y1 V]
    Yuyv,
    /// 8-bit Bayer mosaic with an RGGB tile
    BayerRg8,
}

impl PixelFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Mono8 | PixelFormat::BayerRg8 => 1,
            PixelFormat::Yuyv => 2,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
        }
    }

    /// Minimum byte length of one row of `width` pixels
    pub fn row_bytes(&self, width: u32) -> usize {
        width as usize * self.bytes_per_pixel()
    }
}

/// Channel ordering of a 3-channel interleaved buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// A frame as delivered by a camera device, before format conversion
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Device sequence number
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of consecutive rows
    pub stride: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Smallest buffer length that holds every row for this geometry
    pub fn required_len(&self) -> usize {
        required_len(self.height, self.stride, self.format.row_bytes(self.width))
    }
}

/// 3-channel interleaved pixel data owned by a frame record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub order: ChannelOrder,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a tightly packed buffer filled with one color, given in RGB
    pub fn filled(width: u32, height: u32, order: ChannelOrder, rgb: [u8; 3]) -> Self {
        let pixel = match order {
            ChannelOrder::Rgb => rgb,
            ChannelOrder::Bgr => [rgb[2], rgb[1], rgb[0]],
        };
        let stride = width as usize * 3;
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take(stride * height as usize)
            .collect();

        Self {
            width,
            height,
            stride,
            order,
            data,
        }
    }

    /// Bytes of pixel data in one row, excluding padding
    pub fn row_bytes(&self) -> usize {
        self.width as usize * 3
    }

    /// Pixel data of row `y`, excluding padding
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let start = y as usize * self.stride;
        self.data.get(start..start + self.row_bytes())
    }
}

/// One captured, format-converted image plus its output basename
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub basename: String,
    pub camera: String,
    pub slot: usize,
    pub shot_index: u32,
    pub captured_at: DateTime<Utc>,
    pub pixels: PixelBuffer,
}

/// Compose the `<prefix>_<camera>_<NN>` basename of a shot
pub fn frame_basename(prefix: &str, camera: &str, shot_index: u32) -> String {
    format!("{}_{}_{:02}", prefix, camera, shot_index)
}

pub(crate) fn required_len(height: u32, stride: usize, row_bytes: usize) -> usize {
    match height {
        0 => 0,
        h => (h as usize - 1) * stride + row_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_properties() {
        assert_eq!(PixelFormat::Mono8.bytes_per_pixel(), 1);
        assert_eq!(PixelFormat::BayerRg8.bytes_per_pixel(), 1);
        assert_eq!(PixelFormat::Yuyv.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Bgr8.row_bytes(10), 30);
    }

    #[test]
    fn test_frame_basename() {
        assert_eq!(frame_basename("test0003", "lower", 7), "test0003_lower_07");
        assert_eq!(frame_basename("test0000", "camera0", 12), "test0000_camera0_12");
    }

    #[test]
    fn test_required_len_ignores_trailing_padding() {
        let raw = RawFrame {
            sequence: 0,
            width: 4,
            height: 3,
            stride: 16,
            format: PixelFormat::Rgb8,
            data: Vec::new(),
        };
        assert_eq!(raw.required_len(), 2 * 16 + 12);
        assert_eq!(required_len(0, 16, 12), 0);
    }

    #[test]
    fn test_filled_buffer_respects_order() {
        let rgb = PixelBuffer::filled(2, 1, ChannelOrder::Rgb, [10, 20, 30]);
        assert_eq!(rgb.data, vec![10, 20, 30, 10, 20, 30]);

        let bgr = PixelBuffer::filled(2, 1, ChannelOrder::Bgr, [10, 20, 30]);
        assert_eq!(bgr.data, vec![30, 20, 10, 30, 20, 10]);
        assert_eq!(bgr.row(0), Some(&bgr.data[..]));
        assert_eq!(bgr.row(1), None);
    }
}
