/// ScanResult is the outcome of decoding one captured frame.
///
/// `valid` is false when the frame holds no readable code, which is the
/// normal case for most frames of a live capture and not an error.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub text: String,
    pub valid: bool,
}

impl ScanResult {
    /// A frame without any readable code.
    pub fn none() -> Self {
        ScanResult::default()
    }

    /// A frame with a code whose content was recovered intact.
    pub fn found(text: String) -> Self {
        ScanResult { text, valid: true }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}
