use shared::error::Result;

/// CaptureSource is the camera, or whatever stands in for it, that feeds
/// frames to a session while it scans.
///
/// The session only toggles the source on and off; frames themselves are
/// pushed by the application through `handle_read`. Frames arriving while
/// the session is not scanning are dropped.
pub trait CaptureSource {
    /// Starts capturing. Fails with `ErrCaptureUnavailable` when the device
    /// is missing or permission was denied.
    fn start(&mut self) -> Result<()>;

    /// Stops capturing. Stopping an idle source has no effect.
    fn stop(&mut self);
}

/// A capture source without a device behind it, for hosts that feed frames
/// from elsewhere such as files.
#[derive(Default, Debug)]
pub struct ManualCapture {
    running: bool,
}

impl ManualCapture {
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl CaptureSource for ManualCapture {
    fn start(&mut self) -> Result<()> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }
}
