//! Seam between the frame source and a platform video stack.

use crate::source::types::{CameraConstraints, DeviceAccessError, Frame, VideoBlob};

/// An open camera or file stream.
///
/// The stream owns the underlying device handle until [`FrameStream::release`]
/// is called or the stream is dropped.
pub trait FrameStream: Send {
    /// Next decodable frame, or `None` when nothing is available.
    fn next_frame(&mut self) -> Option<Frame>;

    /// Suspend or continue decoding without giving up the handle.
    fn set_paused(&mut self, _paused: bool) {}

    /// Give the handle back. Must be safe to call more than once.
    fn release(&mut self);
}

/// Opens video origins.
pub trait VideoBackend: Send {
    fn open_camera(
        &mut self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn FrameStream>, DeviceAccessError>;

    /// Open a user-supplied video. The error is a human-readable reason.
    fn open_file(&mut self, blob: &VideoBlob) -> Result<Box<dyn FrameStream>, String>;
}
