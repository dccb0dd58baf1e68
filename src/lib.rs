pub mod camera;
pub mod campaign;
pub mod config;
pub mod convert;
pub mod encode;
pub mod error;
pub mod frame;
pub mod session;
pub mod storage;

pub use camera::{
    CameraDevice, DeviceDescriptor, RuntimeGuard, SimulatedCamera, SimulatedTransport, Transport,
};
pub use campaign::{CampaignDriver, CampaignPlan, CampaignSummary};
pub use config::{MulticapConfig, PersistencePolicy};
pub use convert::FormatConverter;
pub use encode::{encode_jpeg, ImageEncoder, PixelEncoder};
pub use error::{
    CaptureError, EncodingError, MulticapError, PersistenceError, Result, SessionError,
};
pub use frame::{ChannelOrder, FrameRecord, PixelBuffer, PixelFormat, RawFrame};
pub use session::{CaptureSession, ShotMode, ShotPlan};
pub use storage::ImagePersistence;
