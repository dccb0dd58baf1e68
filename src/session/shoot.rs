use super::{CameraSlot, CaptureSession};
use crate::convert::FormatConverter;
use crate::error::{CaptureError, DeviceFault};
use crate::frame::{frame_basename, FrameRecord};
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Timeout of a single triggered grab
pub const ONE_SHOT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Timeout for each buffered frame of a continuous acquisition
pub const CONTINUOUS_TIMEOUT: Duration = Duration::from_millis(5000);

/// How frames are acquired from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotMode {
    /// One blocking trigger-and-grab per frame
    OneShot,
    /// The device is armed for the whole count and frames are retrieved from its buffer
    Continuous,
}

impl ShotMode {
    pub fn from_continuous(continuous: bool) -> Self {
        if continuous {
            ShotMode::Continuous
        } else {
            ShotMode::OneShot
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            ShotMode::OneShot => "one-at-a-time",
            ShotMode::Continuous => "continuously",
        }
    }
}

/// One invocation of the shot sequencer
#[derive(Debug, Clone)]
pub struct ShotPlan {
    pub slot: usize,
    pub count: u32,
    pub prefix: String,
    pub mode: ShotMode,
    pub inter_shot_delay: Duration,
    pub one_shot_timeout: Duration,
    pub continuous_timeout: Duration,
}

impl ShotPlan {
    pub fn new<S: Into<String>>(slot: usize, count: u32, prefix: S, mode: ShotMode) -> Self {
        Self {
            slot,
            count,
            prefix: prefix.into(),
            mode,
            inter_shot_delay: Duration::ZERO,
            one_shot_timeout: ONE_SHOT_TIMEOUT,
            continuous_timeout: CONTINUOUS_TIMEOUT,
        }
    }

    pub fn with_inter_shot_delay(mut self, delay: Duration) -> Self {
        self.inter_shot_delay = delay;
        self
    }

    pub fn with_timeouts(mut self, one_shot: Duration, continuous: Duration) -> Self {
        self.one_shot_timeout = one_shot;
        self.continuous_timeout = continuous;
        self
    }
}

impl CaptureSession {
    /// Acquire up to `plan.count` frames from one camera.
    ///
    /// A timeout or device failure abandons the remaining shots and the
    /// frames already grabbed in this call are dropped. Shot counters keep
    /// the indices of those frames consumed.
    ///
    /// # Panics
    ///
    /// Panics if `plan.slot >= connected_count()`.
    pub fn shoot(&mut self, plan: &ShotPlan) -> Result<Vec<FrameRecord>, CaptureError> {
        assert!(
            plan.slot < self.slots.len(),
            "camera slot {} out of range ({} connected)",
            plan.slot,
            self.slots.len()
        );

        let converter = self.converter;
        let camera = &mut self.slots[plan.slot];

        info!(
            "Will grab {} from {} {}",
            plan.count,
            camera.identity,
            plan.mode.describe()
        );

        let result = grab_sequence(camera, plan, converter);

        if plan.mode == ShotMode::Continuous && camera.device.is_grabbing() {
            if let Err(fault) = camera.device.stop_grabbing() {
                warn!("Failed to stop grabbing on {}: {}", camera.identity, fault);
            }
        }

        if let Ok(frames) = &result {
            info!("...successfully grabbed {} images", frames.len());
        }

        result
    }
}

fn grab_sequence(
    camera: &mut CameraSlot,
    plan: &ShotPlan,
    converter: FormatConverter,
) -> Result<Vec<FrameRecord>, CaptureError> {
    let device_error = |camera: &str, fault: DeviceFault| CaptureError::Device {
        camera: camera.to_string(),
        description: fault.description,
    };

    if plan.mode == ShotMode::Continuous {
        camera
            .device
            .start_grabbing(plan.count)
            .map_err(|fault| device_error(&camera.identity, fault))?;
    }

    let mut frames = Vec::with_capacity(plan.count as usize);

    for i in 0..plan.count {
        if plan.mode == ShotMode::Continuous && !camera.device.is_grabbing() {
            debug!(
                "{} stopped grabbing after {} of {} frames",
                camera.identity, i, plan.count
            );
            break;
        }

        if i > 0 && !plan.inter_shot_delay.is_zero() {
            debug!(
                "Delaying {} ms between images",
                plan.inter_shot_delay.as_millis()
            );
            std::thread::sleep(plan.inter_shot_delay);
        }

        let grabbed = match plan.mode {
            ShotMode::Continuous => camera.device.retrieve_result(plan.continuous_timeout),
            ShotMode::OneShot => camera.device.grab_one(plan.one_shot_timeout),
        }
        .map_err(|fault| device_error(&camera.identity, fault))?;

        let raw = grabbed.ok_or_else(|| CaptureError::GrabTimeout {
            camera: camera.identity.clone(),
        })?;

        let shot_index = camera.shots_taken;
        camera.shots_taken += 1;

        let pixels = converter
            .convert(&raw)
            .map_err(|e| CaptureError::Device {
                camera: camera.identity.clone(),
                description: format!("Format conversion failed: {}", e),
            })?;

        let basename = frame_basename(&plan.prefix, &camera.identity, shot_index);
        trace!(
            "Grabbed {} ({}x{}, device sequence {})",
            basename,
            pixels.width,
            pixels.height,
            raw.sequence
        );

        frames.push(FrameRecord {
            basename,
            camera: camera.identity.clone(),
            slot: plan.slot,
            shot_index,
            captured_at: Utc::now(),
            pixels,
        });
    }

    Ok(frames)
}
