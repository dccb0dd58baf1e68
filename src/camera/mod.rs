mod device;
pub mod runtime;
mod simulated;
#[cfg(test)]
mod tests;

pub use device::{CameraDevice, DeviceDescriptor, DeviceResult, Transport};
pub use runtime::RuntimeGuard;
pub use simulated::{
    DeviceLifecycle, SimulatedCamera, SimulatedTransport, SimulationProbe, TestPattern,
};
