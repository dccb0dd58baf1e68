use super::*;
use crate::frame::{ChannelOrder, PixelBuffer};

const TOLERANCE: i16 = 12;

/// Records the calls made by the adapter
#[derive(Default)]
struct RecordingEncoder {
    began: Option<(u32, u32, ColorMode)>,
    rows: Vec<Vec<u8>>,
    finished: bool,
    aborted: bool,
    fail_on_row: Option<usize>,
}

impl ImageEncoder for RecordingEncoder {
    fn begin(&mut self, width: u32, height: u32, color: ColorMode) -> Result<(), EncodingError> {
        self.began = Some((width, height, color));
        Ok(())
    }

    fn write_row(&mut self, row: &[u8]) -> Result<(), EncodingError> {
        if self.fail_on_row == Some(self.rows.len()) {
            return Err(EncodingError::Encoder {
                details: "disk full".to_string(),
            });
        }
        self.rows.push(row.to_vec());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EncodingError> {
        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

fn decode(bytes: &[u8]) -> image::RgbImage {
    image::load_from_memory(bytes).unwrap().to_rgb8()
}

fn assert_near(pixel: &image::Rgb<u8>, expected: [u8; 3]) {
    for (actual, expected) in pixel.0.iter().zip(expected) {
        let diff = (*actual as i16 - expected as i16).abs();
        assert!(
            diff <= TOLERANCE,
            "pixel {:?} differs from {:?}",
            pixel.0,
            expected
        );
    }
}

#[test]
fn test_white_2x2_decodes_to_white() {
    let data = vec![255u8; 12];
    let bytes = encode_jpeg(&data, 2, 2, 6, 85).unwrap();

    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);

    let image = decode(&bytes);
    assert_eq!(image.dimensions(), (2, 2));
    for pixel in image.pixels() {
        assert_near(pixel, [255, 255, 255]);
    }
}

#[test]
fn test_padded_rows_are_skipped() {
    // 3x2 red image with 4 bytes of green garbage after every row
    let width = 3u32;
    let stride = width as usize * 3 + 4;
    let mut data = Vec::new();
    for _ in 0..2 {
        for _ in 0..width {
            data.extend_from_slice(&[255, 0, 0]);
        }
        data.extend_from_slice(&[0, 255, 0, 0]);
    }

    let bytes = encode_jpeg(&data, width, 2, stride, 85).unwrap();
    let image = decode(&bytes);
    assert_eq!(image.dimensions(), (3, 2));
    for pixel in image.pixels() {
        assert_near(pixel, [255, 0, 0]);
    }
}

#[test]
fn test_stream_rows_honours_stride() {
    let data: Vec<u8> = (0..20).collect();
    let mut recorder = RecordingEncoder::default();

    PixelEncoder::default()
        .stream_rows(&data, 2, 2, 10, &mut recorder)
        .unwrap();

    assert_eq!(recorder.began, Some((2, 2, ColorMode::Rgb)));
    assert_eq!(recorder.rows, vec![vec![0, 1, 2, 3, 4, 5], vec![10, 11, 12, 13, 14, 15]]);
    assert!(recorder.finished);
    assert!(!recorder.aborted);
}

#[test]
fn test_bgr_source_is_swapped_per_row() {
    let data = vec![1, 2, 3, 4, 5, 6];
    let mut recorder = RecordingEncoder::default();

    PixelEncoder::new(85, ChannelOrder::Bgr)
        .unwrap()
        .stream_rows(&data, 2, 1, 6, &mut recorder)
        .unwrap();

    assert_eq!(recorder.rows, vec![vec![3, 2, 1, 6, 5, 4]]);
}

#[test]
fn test_bgr_and_rgb_paths_decode_alike() {
    let rgb = PixelBuffer::filled(8, 8, ChannelOrder::Rgb, [200, 40, 10]);
    let bgr = PixelBuffer::filled(8, 8, ChannelOrder::Bgr, [200, 40, 10]);

    let from_rgb = PixelEncoder::new(85, ChannelOrder::Rgb)
        .unwrap()
        .encode_buffer(&rgb)
        .unwrap();
    let from_bgr = PixelEncoder::new(85, ChannelOrder::Bgr)
        .unwrap()
        .encode_buffer(&bgr)
        .unwrap();

    assert_eq!(from_rgb, from_bgr);
    assert_near(decode(&from_bgr).get_pixel(3, 3), [200, 40, 10]);
}

#[test]
fn test_encoding_is_deterministic() {
    let pixels: Vec<u8> = (0..16 * 16 * 3).map(|i| (i * 7 % 256) as u8).collect();
    let first = encode_jpeg(&pixels, 16, 16, 48, 85).unwrap();
    let second = encode_jpeg(&pixels, 16, 16, 48, 85).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_quality_changes_output_size() {
    let pixels: Vec<u8> = (0..32 * 32 * 3).map(|i| (i * 31 % 251) as u8).collect();
    let low = encode_jpeg(&pixels, 32, 32, 96, 10).unwrap();
    let high = encode_jpeg(&pixels, 32, 32, 96, 100).unwrap();
    assert!(low.len() < high.len());

    // Zero is accepted and clamped to the JPEG minimum
    assert!(encode_jpeg(&pixels, 32, 32, 96, 0).is_ok());
}

#[test]
fn test_invalid_quality_is_rejected() {
    assert!(matches!(
        PixelEncoder::new(101, ChannelOrder::Rgb),
        Err(EncodingError::InvalidQuality { quality: 101 })
    ));
}

#[test]
fn test_geometry_errors() {
    let encoder = PixelEncoder::default();
    assert!(matches!(
        encoder.encode(&[0; 12], 2, 2, 5),
        Err(EncodingError::InvalidGeometry { .. })
    ));
    assert!(matches!(
        encoder.encode(&[], 0, 2, 0),
        Err(EncodingError::InvalidGeometry { .. })
    ));
    assert!(matches!(
        encoder.encode(&[0; 11], 2, 2, 6),
        Err(EncodingError::BufferTooShort {
            expected: 12,
            actual: 11
        })
    ));
}

#[test]
fn test_last_row_needs_no_padding() {
    // stride 8 for 2 RGB pixels; the final row stops after its pixel data
    let data = vec![128u8; 8 + 6];
    assert!(PixelEncoder::default().encode(&data, 2, 2, 8).is_ok());
}

#[test]
fn test_row_failure_aborts_encoder() {
    let mut recorder = RecordingEncoder {
        fail_on_row: Some(1),
        ..Default::default()
    };

    let result = PixelEncoder::default().stream_rows(&[0; 18], 2, 3, 6, &mut recorder);
    assert!(matches!(result, Err(EncodingError::Encoder { .. })));
    assert!(recorder.aborted);
    assert!(!recorder.finished);
}

#[test]
fn test_jpeg_encoder_rejects_missing_rows() {
    let mut encoder = JpegScanlineEncoder::new(Vec::new(), 85);
    encoder.begin(2, 2, ColorMode::Rgb).unwrap();
    encoder.write_row(&[0; 6]).unwrap();
    assert!(encoder.finish().is_err());
    assert!(encoder.into_inner().is_empty());
}

#[test]
fn test_jpeg_encoder_rejects_wrong_row_length() {
    let mut encoder = JpegScanlineEncoder::new(Vec::new(), 85);
    encoder.begin(2, 1, ColorMode::Rgb).unwrap();
    assert!(encoder.write_row(&[0; 5]).is_err());
}

#[test]
fn test_jpeg_encoder_luma() {
    let mut encoder = JpegScanlineEncoder::new(Vec::new(), 90);
    encoder.begin(4, 2, ColorMode::Luma).unwrap();
    encoder.write_row(&[0, 0, 0, 0]).unwrap();
    encoder.write_row(&[0, 0, 0, 0]).unwrap();
    encoder.finish().unwrap();

    let image = image::load_from_memory(&encoder.into_inner()).unwrap();
    assert_eq!((image.width(), image.height()), (4, 2));
}

#[test]
fn test_encode_to_writer() {
    let out = PixelEncoder::default()
        .encode_to(&[10; 12], 2, 2, 6, std::io::Cursor::new(Vec::new()))
        .unwrap();
    assert!(!out.into_inner().is_empty());
}
