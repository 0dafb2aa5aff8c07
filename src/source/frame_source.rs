//! The frame source: one video origin and its lifecycle.

use crate::core::OverlayScene;
use crate::source::backend::{FrameStream, VideoBackend};
use crate::source::types::{Frame, FrameOrigin, FrameSourceState, SourceError};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// A frame source shared between a session and its analysis loop.
pub type SharedFrameSource = Arc<Mutex<FrameSource>>;

/// Owns exactly one video origin at a time and hands out frames on demand.
pub struct FrameSource {
    backend: Box<dyn VideoBackend>,
    state: FrameSourceState,
    origin: Option<FrameOrigin>,
    stream: Option<Box<dyn FrameStream>>,
    last_frame_seq: Option<u64>,
    /// Overlay for the last analysis, drawn over the video until reset
    overlay: Option<OverlayScene>,
}

impl FrameSource {
    /// Create a stopped frame source on top of `backend`.
    pub fn new(backend: Box<dyn VideoBackend>) -> Self {
        Self {
            backend,
            state: FrameSourceState::Stopped,
            origin: None,
            stream: None,
            last_frame_seq: None,
            overlay: None,
        }
    }

    /// Wrap the source for sharing with an analysis loop.
    pub fn shared(self) -> SharedFrameSource {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> &FrameSourceState {
        &self.state
    }

    pub fn origin(&self) -> Option<&FrameOrigin> {
        self.origin.as_ref()
    }

    /// Acquire `origin`.
    ///
    /// Valid from `Stopped` or `Error`; a failed start leaves the source in
    /// `Error` so the caller can retry.
    pub fn start(&mut self, origin: FrameOrigin) -> Result<(), SourceError> {
        if !matches!(
            self.state,
            FrameSourceState::Stopped | FrameSourceState::Error(_)
        ) {
            return Err(SourceError::AlreadyStarted);
        }

        self.state = FrameSourceState::Requesting;
        info!(origin = origin.label(), "Requesting frame source");

        let opened = match &origin {
            FrameOrigin::Camera(constraints) => self
                .backend
                .open_camera(constraints)
                .map_err(SourceError::Device),
            FrameOrigin::File(blob) => self.backend.open_file(blob).map_err(SourceError::File),
        };

        match opened {
            Ok(stream) => {
                self.stream = Some(stream);
                self.origin = Some(origin);
                self.last_frame_seq = None;
                self.state = FrameSourceState::Active;
                info!("Frame source active");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Frame source failed to start");
                self.state = FrameSourceState::Error(e.clone());
                Err(e)
            }
        }
    }

    pub fn pause(&mut self) -> Result<(), SourceError> {
        match self.state {
            FrameSourceState::Active => {
                if let Some(stream) = self.stream.as_mut() {
                    stream.set_paused(true);
                }
                self.state = FrameSourceState::Paused;
                debug!("Frame source paused");
                Ok(())
            }
            FrameSourceState::Paused => Ok(()),
            ref other => Err(SourceError::InvalidTransition {
                action: "pause",
                state: other.name(),
            }),
        }
    }

    pub fn resume(&mut self) -> Result<(), SourceError> {
        match self.state {
            FrameSourceState::Paused => {
                if let Some(stream) = self.stream.as_mut() {
                    stream.set_paused(false);
                }
                self.state = FrameSourceState::Active;
                debug!("Frame source resumed");
                Ok(())
            }
            FrameSourceState::Active => Ok(()),
            ref other => Err(SourceError::InvalidTransition {
                action: "resume",
                state: other.name(),
            }),
        }
    }

    /// Clear the cached overlay. The handle is left alone.
    pub fn reset(&mut self) {
        self.overlay = None;
    }

    /// Release the handle and return to `Stopped`. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            info!("Frame source released");
        }
        self.origin = None;
        self.last_frame_seq = None;
        self.overlay = None;
        self.state = FrameSourceState::Stopped;
    }

    /// The newest frame, or `None` when the source is not producing frames.
    pub fn current_frame(&mut self) -> Option<Frame> {
        if self.state != FrameSourceState::Active {
            return None;
        }
        let frame = self.stream.as_mut()?.next_frame()?;
        self.last_frame_seq = Some(frame.sequence);
        Some(frame)
    }

    /// Sequence number of the last frame handed out.
    pub fn last_frame_sequence(&self) -> Option<u64> {
        self.last_frame_seq
    }

    pub fn set_overlay(&mut self, overlay: Option<OverlayScene>) {
        self.overlay = overlay;
    }

    pub fn overlay(&self) -> Option<&OverlayScene> {
        self.overlay.as_ref()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.teardown();
    }
}
