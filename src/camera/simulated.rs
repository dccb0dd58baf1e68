//! Simulated camera transport for running without hardware.
//!
//! Cameras render deterministic test patterns in their native pixel
//! format and can be scripted to fail open, time out or fault after a
//! given number of acquisitions. Timeouts are reported immediately rather
//! than after waiting for the requested duration.

use super::device::{CameraDevice, DeviceDescriptor, DeviceResult, Transport};
use crate::error::DeviceFault;
use crate::frame::{PixelFormat, RawFrame};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const PADDING_BYTE: u8 = 0xAA;

/// Test pattern types for simulated frame generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPattern {
    /// Eight vertical color bars
    ColorBars,
    /// Horizontal gray ramp from black to white
    Gradient,
    /// One RGB color across the whole frame
    Solid([u8; 3]),
}

#[derive(Debug, Clone, Default)]
struct FaultScript {
    fail_open: bool,
    timeout_after: Option<u32>,
    fault_after: Option<u32>,
    stop_grabbing_after: Option<u32>,
}

/// Description of one simulated camera
#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    row_padding: usize,
    pattern: TestPattern,
    script: FaultScript,
}

impl SimulatedCamera {
    /// A 64x48 RGB color-bar camera with the given user-defined name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            width: 64,
            height: 48,
            format: PixelFormat::Rgb8,
            row_padding: 0,
            pattern: TestPattern::ColorBars,
            script: FaultScript::default(),
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Extra bytes appended to every row of delivered frames
    pub fn with_row_padding(mut self, padding: usize) -> Self {
        self.row_padding = padding;
        self
    }

    pub fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Opening this device reports a device fault
    pub fn failing_open(mut self) -> Self {
        self.script.fail_open = true;
        self
    }

    /// Acquisitions after the first `frames` successful ones time out
    pub fn timing_out_after(mut self, frames: u32) -> Self {
        self.script.timeout_after = Some(frames);
        self
    }

    /// Acquisitions after the first `frames` successful ones report a device fault
    pub fn faulting_after(mut self, frames: u32) -> Self {
        self.script.fault_after = Some(frames);
        self
    }

    /// A buffered acquisition stops grabbing after delivering `frames` frames
    pub fn stopping_after(mut self, frames: u32) -> Self {
        self.script.stop_grabbing_after = Some(frames);
        self
    }
}

/// Lifecycle of a simulated device as observed through [`SimulationProbe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceLifecycle {
    pub created: u32,
    pub opened: u32,
    pub closed: u32,
}

/// Shared view of what the transport's devices went through
#[derive(Debug, Clone, Default)]
pub struct SimulationProbe {
    devices: Arc<Mutex<Vec<DeviceLifecycle>>>,
}

impl SimulationProbe {
    fn with_devices(count: usize) -> Self {
        Self {
            devices: Arc::new(Mutex::new(vec![DeviceLifecycle::default(); count])),
        }
    }

    fn update(&self, index: usize, f: impl FnOnce(&mut DeviceLifecycle)) {
        if let Some(entry) = self.devices.lock().get_mut(index) {
            f(entry);
        }
    }

    /// Lifecycle counters for the device at discovery index `index`
    pub fn lifecycle(&self, index: usize) -> DeviceLifecycle {
        self.devices.lock().get(index).copied().unwrap_or_default()
    }

    /// Number of devices created but not yet closed
    pub fn attached(&self) -> usize {
        self.devices
            .lock()
            .iter()
            .map(|d| d.created.saturating_sub(d.closed) as usize)
            .sum()
    }
}

/// Transport exposing a fixed pool of simulated cameras
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    cameras: Vec<SimulatedCamera>,
    probe: SimulationProbe,
}

impl SimulatedTransport {
    pub fn new(cameras: Vec<SimulatedCamera>) -> Self {
        let probe = SimulationProbe::with_devices(cameras.len());
        Self { cameras, probe }
    }

    pub fn probe(&self) -> SimulationProbe {
        self.probe.clone()
    }
}

impl Transport for SimulatedTransport {
    fn enumerate(&self) -> DeviceResult<Vec<DeviceDescriptor>> {
        Ok(self
            .cameras
            .iter()
            .enumerate()
            .map(|(index, camera)| DeviceDescriptor {
                index,
                user_defined_name: camera.name.clone(),
                model_name: "SimCam".to_string(),
                serial_number: format!("SIM{:04}", index),
            })
            .collect())
    }

    fn create_device(&self, descriptor: &DeviceDescriptor) -> DeviceResult<Box<dyn CameraDevice>> {
        let camera = self.cameras.get(descriptor.index).cloned().ok_or_else(|| {
            DeviceFault::new(format!("No simulated device at index {}", descriptor.index))
        })?;

        self.probe.update(descriptor.index, |d| d.created += 1);
        debug!(
            "Created simulated device {} ({:?})",
            descriptor.index, camera.name
        );

        Ok(Box::new(SimulatedDevice {
            index: descriptor.index,
            camera,
            probe: self.probe.clone(),
            is_open: false,
            closed: false,
            grab_remaining: None,
            grabbed_in_run: 0,
            acquisitions: 0,
            sequence: 0,
        }))
    }
}

struct SimulatedDevice {
    index: usize,
    camera: SimulatedCamera,
    probe: SimulationProbe,
    is_open: bool,
    closed: bool,
    grab_remaining: Option<u32>,
    grabbed_in_run: u32,
    acquisitions: u32,
    sequence: u64,
}

impl SimulatedDevice {
    fn ensure_open(&self) -> DeviceResult<()> {
        if self.closed {
            return Err(DeviceFault::new("Device has been destroyed"));
        }
        if !self.is_open {
            return Err(DeviceFault::new("Device is not open"));
        }
        Ok(())
    }

    fn acquire(&mut self) -> DeviceResult<Option<RawFrame>> {
        let script = &self.camera.script;
        if script.fault_after == Some(self.acquisitions) {
            return Err(DeviceFault::new("Simulated transfer failure"));
        }
        if script.timeout_after == Some(self.acquisitions) {
            trace!("Simulated device {} timing out", self.index);
            return Ok(None);
        }

        self.acquisitions += 1;
        let frame = render_frame(&self.camera, self.sequence);
        self.sequence += 1;
        Ok(Some(frame))
    }
}

impl CameraDevice for SimulatedDevice {
    fn open(&mut self) -> DeviceResult<()> {
        if self.closed {
            return Err(DeviceFault::new("Device has been destroyed"));
        }
        if self.camera.script.fail_open {
            return Err(DeviceFault::new(format!(
                "Simulated device {} refused to open",
                self.index
            )));
        }
        if !self.is_open {
            self.is_open = true;
            self.probe.update(self.index, |d| d.opened += 1);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn is_grabbing(&self) -> bool {
        self.grab_remaining.is_some()
    }

    fn start_grabbing(&mut self, count: u32) -> DeviceResult<()> {
        self.ensure_open()?;
        if self.grab_remaining.is_some() {
            return Err(DeviceFault::new("Device is already grabbing"));
        }
        self.grab_remaining = (count > 0).then_some(count);
        self.grabbed_in_run = 0;
        Ok(())
    }

    fn stop_grabbing(&mut self) -> DeviceResult<()> {
        self.grab_remaining = None;
        Ok(())
    }

    fn retrieve_result(&mut self, _timeout: Duration) -> DeviceResult<Option<RawFrame>> {
        self.ensure_open()?;
        let Some(remaining) = self.grab_remaining else {
            return Err(DeviceFault::new("Device is not grabbing"));
        };

        let frame = self.acquire()?;
        if frame.is_some() {
            self.grabbed_in_run += 1;
            let stop_early = self.camera.script.stop_grabbing_after == Some(self.grabbed_in_run);
            self.grab_remaining = match remaining - 1 {
                0 => None,
                _ if stop_early => None,
                left => Some(left),
            };
        }
        Ok(frame)
    }

    fn grab_one(&mut self, _timeout: Duration) -> DeviceResult<Option<RawFrame>> {
        self.ensure_open()?;
        if self.grab_remaining.is_some() {
            return Err(DeviceFault::new("Device is busy grabbing"));
        }
        self.acquire()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.is_open = false;
            self.grab_remaining = None;
            self.probe.update(self.index, |d| d.closed += 1);
        }
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.close();
    }
}

fn render_frame(camera: &SimulatedCamera, sequence: u64) -> RawFrame {
    let width = camera.width as usize;
    let height = camera.height as usize;
    let row_bytes = camera.format.row_bytes(camera.width);
    let stride = row_bytes + camera.row_padding;
    let mut data = vec![PADDING_BYTE; stride * height];

    for y in 0..height {
        let row = &mut data[y * stride..y * stride + row_bytes];
        match camera.format {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 | PixelFormat::Mono8 | PixelFormat::BayerRg8 => {
                for x in 0..width {
                    let [r, g, b] = pattern_rgb(camera.pattern, x, width);
                    match camera.format {
                        PixelFormat::Rgb8 => row[x * 3..x * 3 + 3].copy_from_slice(&[r, g, b]),
                        PixelFormat::Bgr8 => row[x * 3..x * 3 + 3].copy_from_slice(&[b, g, r]),
                        PixelFormat::Mono8 => row[x] = luma(r, g, b),
                        _ => {
                            row[x] = match (y % 2, x % 2) {
                                (0, 0) => r,
                                (1, 1) => b,
                                _ => g,
                            }
                        }
                    }
                }
            }
            PixelFormat::Yuyv => {
                for x in (0..width).step_by(2) {
                    let first = pattern_rgb(camera.pattern, x, width);
                    let second = pattern_rgb(camera.pattern, (x + 1).min(width - 1), width);
                    let (y0, u0, v0) = rgb_to_yuv(first);
                    let (y1, u1, v1) = rgb_to_yuv(second);
                    let u = ((u16::from(u0) + u16::from(u1)) / 2) as u8;
                    let v = ((u16::from(v0) + u16::from(v1)) / 2) as u8;

                    row[x * 2] = y0;
                    row[x * 2 + 1] = u;
                    if x + 1 < width {
                        row[x * 2 + 2] = y1;
                        row[x * 2 + 3] = v;
                    }
                }
            }
        }
    }

    RawFrame {
        sequence,
        width: camera.width,
        height: camera.height,
        stride,
        format: camera.format,
        data,
    }
}

fn pattern_rgb(pattern: TestPattern, x: usize, width: usize) -> [u8; 3] {
    match pattern {
        TestPattern::Solid(rgb) => rgb,
        TestPattern::Gradient => {
            let level = (x * 255 / width.saturating_sub(1).max(1)) as u8;
            [level; 3]
        }
        TestPattern::ColorBars => {
            const BARS: [[u8; 3]; 8] = [
                [255, 255, 255],
                [255, 255, 0],
                [0, 255, 255],
                [0, 255, 0],
                [255, 0, 255],
                [255, 0, 0],
                [0, 0, 255],
                [0, 0, 0],
            ];
            BARS[(x * 8 / width.max(1)).min(7)]
        }
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b))
        .round()
        .clamp(0.0, 255.0) as u8
}

fn rgb_to_yuv([r, g, b]: [u8; 3]) -> (u8, u8, u8) {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let v = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    let c = |val: f32| val.round().clamp(0.0, 255.0) as u8;
    (c(y), c(u), c(v))
}

impl From<&crate::config::SimulatedCameraConfig> for SimulatedCamera {
    fn from(config: &crate::config::SimulatedCameraConfig) -> Self {
        SimulatedCamera::new(config.name.clone())
            .with_resolution(config.width, config.height)
            .with_format(config.pixel_format)
            .with_row_padding(config.row_padding)
            .with_pattern(config.pattern)
    }
}

impl From<&crate::config::SimulatorConfig> for SimulatedTransport {
    fn from(config: &crate::config::SimulatorConfig) -> Self {
        SimulatedTransport::new(config.cameras.iter().map(SimulatedCamera::from).collect())
    }
}
