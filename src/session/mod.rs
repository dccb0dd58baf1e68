//! Capture session: the attached cameras, their identities and shot counters.

mod shoot;

pub use shoot::{ShotMode, ShotPlan, CONTINUOUS_TIMEOUT, ONE_SHOT_TIMEOUT};

use crate::camera::{CameraDevice, DeviceDescriptor, RuntimeGuard, Transport};
use crate::convert::FormatConverter;
use crate::error::SessionError;
use crate::frame::ChannelOrder;
use tracing::{debug, info, warn};

/// Largest number of cameras a session drives
pub const MAX_CAMERAS: usize = 2;

/// User-defined name that places a camera in slot 1 of a two-camera rig
pub const LOWER_CAMERA_NAME: &str = "lower";

struct CameraSlot {
    device: Box<dyn CameraDevice>,
    identity: String,
    shots_taken: u32,
}

/// Owns the attached camera devices of one capture run
pub struct CaptureSession {
    transport: Box<dyn Transport>,
    converter: FormatConverter,
    slots: Vec<CameraSlot>,
    _runtime: RuntimeGuard,
}

impl CaptureSession {
    /// Create an empty session producing RGB frames
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self::with_channel_order(transport, ChannelOrder::Rgb)
    }

    /// Create an empty session whose converted frames use `order`
    pub fn with_channel_order(transport: Box<dyn Transport>, order: ChannelOrder) -> Self {
        Self {
            transport,
            converter: FormatConverter::new(order),
            slots: Vec::new(),
            _runtime: RuntimeGuard::acquire(),
        }
    }

    /// Discover and open `requested` cameras.
    ///
    /// Either every requested camera ends up attached and open, or the
    /// session is left holding none.
    pub fn open(&mut self, requested: usize) -> Result<(), SessionError> {
        if !(1..=MAX_CAMERAS).contains(&requested) {
            return Err(SessionError::InvalidCameraCount { requested });
        }

        self.close();

        let devices = self
            .transport
            .enumerate()
            .map_err(|fault| SessionError::DeviceOpen {
                description: fault.description,
            })?;
        info!("Found {} cameras", devices.len());

        let order = select_devices(&devices, requested)?;

        let mut slots: Vec<CameraSlot> = Vec::with_capacity(requested);
        for (slot, &device_index) in order.iter().enumerate() {
            let descriptor = &devices[device_index];
            match self.attach(descriptor) {
                Ok(device) => {
                    let identity = assign_identity(&descriptor.user_defined_name, slot, &slots);
                    info!("Camera {} has name {}", slot, identity);
                    slots.push(CameraSlot {
                        device,
                        identity,
                        shots_taken: 0,
                    });
                }
                Err(description) => {
                    for mut attached in slots {
                        attached.device.close();
                    }
                    return Err(SessionError::DeviceOpen { description });
                }
            }
        }

        self.slots = slots;
        info!("Cameras all set up");
        Ok(())
    }

    fn attach(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn CameraDevice>, String> {
        let mut device = self
            .transport
            .create_device(descriptor)
            .map_err(|fault| fault.description)?;

        if let Err(fault) = device.open() {
            device.close();
            return Err(fault.description);
        }

        debug!(
            "Opened device {} ({} {})",
            descriptor.index, descriptor.model_name, descriptor.serial_number
        );
        Ok(device)
    }

    /// Release every attached camera; safe to call repeatedly
    pub fn close(&mut self) {
        for (slot, mut camera) in self.slots.drain(..).enumerate() {
            info!("Destroying camera device {}", slot);
            camera.device.close();
        }
    }

    /// Number of cameras currently attached
    pub fn connected_count(&self) -> usize {
        self.slots.len()
    }

    /// Identity of the camera in `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= connected_count()`.
    pub fn identity(&self, slot: usize) -> &str {
        &self.slot(slot).identity
    }

    /// Identities of every attached camera, in slot order
    pub fn identities(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.identity.as_str()).collect()
    }

    /// Number of frames recorded so far from the camera in `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= connected_count()`.
    pub fn shots_taken(&self, slot: usize) -> u32 {
        self.slot(slot).shots_taken
    }

    pub fn reset_counters(&mut self) {
        for slot in &mut self.slots {
            slot.shots_taken = 0;
        }
    }

    fn slot(&self, slot: usize) -> &CameraSlot {
        assert!(
            slot < self.slots.len(),
            "camera slot {} out of range ({} connected)",
            slot,
            self.slots.len()
        );
        &self.slots[slot]
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Map discovered devices to logical slots, returning device indices in slot order
fn select_devices(
    devices: &[DeviceDescriptor],
    requested: usize,
) -> Result<Vec<usize>, SessionError> {
    if devices.is_empty() {
        return Err(SessionError::NoDevicesFound);
    }

    if requested == 2 {
        if devices.len() != 2 {
            return Err(SessionError::DeviceCountMismatch {
                expected: requested,
                found: devices.len(),
            });
        }
        if devices[0].user_defined_name == LOWER_CAMERA_NAME {
            return Ok(vec![1, 0]);
        }
        return Ok(vec![0, 1]);
    }

    if devices.len() > 1 {
        warn!("More than one device, will just use first found");
    }
    Ok(vec![0])
}

/// Derive a file-name-safe identity that no earlier slot already uses
fn assign_identity(user_defined_name: &str, slot: usize, taken: &[CameraSlot]) -> String {
    let sanitized: String = user_defined_name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_whitespace() || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let mut identity = if sanitized.is_empty() {
        format!("camera{}", slot)
    } else {
        sanitized
    };

    while taken.iter().any(|s| s.identity == identity) {
        warn!(
            "Camera {} name {} is already in use; disambiguating",
            slot, identity
        );
        identity = format!("{}-{}", identity, slot);
    }

    identity
}
