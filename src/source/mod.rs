//! Video origins for the PostureAI agent.
//!
//! A [`FrameSource`] owns one camera or file origin at a time. Platform video
//! stacks plug in through [`VideoBackend`]; the [`SyntheticBackend`] is
//! always available.

pub mod backend;
pub mod frame_source;
pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use backend::{FrameStream, VideoBackend};
pub use frame_source::{FrameSource, SharedFrameSource};
pub use synthetic::{CameraControl, DeviceHandles, SyntheticBackend};
pub use types::{
    CameraConstraints, DeviceAccessError, Frame, FrameOrigin, FrameSourceState, SourceError,
    VideoBlob,
};
