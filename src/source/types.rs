//! Frame source types: origins, frames, lifecycle state and errors.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// A decoded video frame, packed RGB24, row-major.
///
/// Pixel data is shared so frames are cheap to clone between the source and
/// an in-flight estimation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Position of the frame within its stream
    pub sequence: u64,
    pub data: Arc<[u8]>,
}

impl Frame {
    pub fn new(width: u32, height: u32, sequence: u64, data: Arc<[u8]>) -> Self {
        Self {
            width,
            height,
            sequence,
            data,
        }
    }
}

/// Requested camera resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConstraints {
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// Opaque reference to a user-supplied video; never re-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoBlob {
    pub path: PathBuf,
}

impl VideoBlob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOrigin {
    Camera(CameraConstraints),
    File(VideoBlob),
}

impl FrameOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            FrameOrigin::Camera(_) => "camera",
            FrameOrigin::File(_) => "file",
        }
    }
}

/// Camera acquisition failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAccessError {
    PermissionDenied,
    DeviceNotFound,
    DeviceBusy,
    ConstraintsUnsatisfiable,
    SecurityBlocked,
    Unknown(String),
}

impl DeviceAccessError {
    /// Map a platform media error name onto a failure kind.
    pub fn from_error_name(name: &str, message: impl Into<String>) -> Self {
        match name {
            "NotAllowedError" => DeviceAccessError::PermissionDenied,
            "NotFoundError" => DeviceAccessError::DeviceNotFound,
            "NotReadableError" => DeviceAccessError::DeviceBusy,
            "OverconstrainedError" => DeviceAccessError::ConstraintsUnsatisfiable,
            "SecurityError" => DeviceAccessError::SecurityBlocked,
            _ => DeviceAccessError::Unknown(message.into()),
        }
    }

    /// Message shown to the user alongside a retry affordance.
    pub fn user_message(&self) -> String {
        match self {
            DeviceAccessError::PermissionDenied => {
                "Camera access denied. Please allow camera permissions and refresh the page."
                    .to_string()
            }
            DeviceAccessError::DeviceNotFound => {
                "No camera found. Please connect a camera and try again.".to_string()
            }
            DeviceAccessError::DeviceBusy => {
                "Camera is already in use by another application.".to_string()
            }
            DeviceAccessError::ConstraintsUnsatisfiable => {
                "Camera does not support the required settings.".to_string()
            }
            DeviceAccessError::SecurityBlocked => {
                "Camera access blocked due to security restrictions.".to_string()
            }
            DeviceAccessError::Unknown(message) => format!("Camera error: {message}"),
        }
    }
}

impl std::fmt::Display for DeviceAccessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for DeviceAccessError {}

/// Errors raised by a frame source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The camera could not be acquired
    Device(DeviceAccessError),
    /// The video file could not be opened
    File(String),
    /// `start` was called while an origin is still held
    AlreadyStarted,
    /// A lifecycle call that is not valid in the current state
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Device(e) => write!(f, "{e}"),
            SourceError::File(e) => write!(f, "Video file error: {e}"),
            SourceError::AlreadyStarted => write!(f, "Frame source is already started"),
            SourceError::InvalidTransition { action, state } => {
                write!(f, "Cannot {action} a frame source that is {state}")
            }
        }
    }
}

impl std::error::Error for SourceError {}

impl From<DeviceAccessError> for SourceError {
    fn from(e: DeviceAccessError) -> Self {
        SourceError::Device(e)
    }
}

/// Lifecycle of a frame source.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameSourceState {
    Stopped,
    Requesting,
    Active,
    Paused,
    Error(SourceError),
}

impl FrameSourceState {
    pub fn name(&self) -> &'static str {
        match self {
            FrameSourceState::Stopped => "stopped",
            FrameSourceState::Requesting => "requesting",
            FrameSourceState::Active => "active",
            FrameSourceState::Paused => "paused",
            FrameSourceState::Error(_) => "in error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_name_mapping() {
        assert_eq!(
            DeviceAccessError::from_error_name("NotAllowedError", ""),
            DeviceAccessError::PermissionDenied
        );
        assert_eq!(
            DeviceAccessError::from_error_name("NotReadableError", ""),
            DeviceAccessError::DeviceBusy
        );
        assert_eq!(
            DeviceAccessError::from_error_name("AbortError", "aborted"),
            DeviceAccessError::Unknown("aborted".to_string())
        );
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            DeviceAccessError::DeviceNotFound.user_message(),
            "No camera found. Please connect a camera and try again."
        );
        assert_eq!(
            DeviceAccessError::Unknown("boom".to_string()).user_message(),
            "Camera error: boom"
        );
        assert_eq!(
            SourceError::Device(DeviceAccessError::SecurityBlocked).to_string(),
            "Camera access blocked due to security restrictions."
        );
    }

    #[test]
    fn test_default_constraints() {
        let c = CameraConstraints::default();
        assert_eq!((c.width, c.height), (640, 480));
    }
}
