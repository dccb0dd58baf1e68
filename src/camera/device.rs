use crate::error::DeviceFault;
use crate::frame::RawFrame;
use std::time::Duration;

pub type DeviceResult<T> = std::result::Result<T, DeviceFault>;

/// What the transport reports about a discovered device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Position in discovery order
    pub index: usize,
    /// User-defined device name; may be empty
    pub user_defined_name: String,
    pub model_name: String,
    pub serial_number: String,
}

/// Discovery and device creation for one camera transport layer
pub trait Transport {
    /// List the devices currently reachable, in discovery order
    fn enumerate(&self) -> DeviceResult<Vec<DeviceDescriptor>>;

    /// Create an attached (but not yet opened) handle for a discovered device
    fn create_device(&self, descriptor: &DeviceDescriptor) -> DeviceResult<Box<dyn CameraDevice>>;
}

/// One attached camera.
///
/// Acquisition calls block until a frame arrives or the timeout elapses.
/// A timeout is `Ok(None)`; transport or device failures are `Err`.
pub trait CameraDevice: Send {
    fn open(&mut self) -> DeviceResult<()>;

    fn is_open(&self) -> bool;

    /// Whether a buffered acquisition started by `start_grabbing` is still active
    fn is_grabbing(&self) -> bool;

    /// Arm the device for exactly `count` buffered acquisitions
    fn start_grabbing(&mut self, count: u32) -> DeviceResult<()>;

    fn stop_grabbing(&mut self) -> DeviceResult<()>;

    /// Wait for the next buffered frame of an active acquisition
    fn retrieve_result(&mut self, timeout: Duration) -> DeviceResult<Option<RawFrame>>;

    /// Trigger and wait for a single frame
    fn grab_one(&mut self, timeout: Duration) -> DeviceResult<Option<RawFrame>>;

    /// Detach and destroy the underlying device; the handle is unusable afterwards
    fn close(&mut self);
}
