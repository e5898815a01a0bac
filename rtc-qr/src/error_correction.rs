use std::fmt;

use qrcode::EcLevel;

/// ErrorCorrection selects how much redundancy a rendered code carries.
///
/// Higher levels survive more damage on a scanned frame but hold fewer
/// payload bytes. Low is the default since connection descriptions with
/// several gathered candidates already approach the byte-mode capacity.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCorrection {
    #[default]
    Low,
    Medium,
    Quartile,
    High,
}

const ERROR_CORRECTION_LOW_STR: &str = "low";
const ERROR_CORRECTION_MEDIUM_STR: &str = "medium";
const ERROR_CORRECTION_QUARTILE_STR: &str = "quartile";
const ERROR_CORRECTION_HIGH_STR: &str = "high";

impl ErrorCorrection {
    /// Largest byte-mode payload a version 40 symbol holds at this level.
    pub fn max_payload_len(&self) -> usize {
        match *self {
            ErrorCorrection::Low => 2953,
            ErrorCorrection::Medium => 2331,
            ErrorCorrection::Quartile => 1663,
            ErrorCorrection::High => 1273,
        }
    }

    pub(crate) fn ec_level(&self) -> EcLevel {
        match *self {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

impl From<&str> for ErrorCorrection {
    fn from(raw: &str) -> Self {
        match raw {
            ERROR_CORRECTION_MEDIUM_STR | "m" | "M" => ErrorCorrection::Medium,
            ERROR_CORRECTION_QUARTILE_STR | "q" | "Q" => ErrorCorrection::Quartile,
            ERROR_CORRECTION_HIGH_STR | "h" | "H" => ErrorCorrection::High,
            _ => ErrorCorrection::Low,
        }
    }
}

impl fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ErrorCorrection::Low => ERROR_CORRECTION_LOW_STR,
            ErrorCorrection::Medium => ERROR_CORRECTION_MEDIUM_STR,
            ErrorCorrection::Quartile => ERROR_CORRECTION_QUARTILE_STR,
            ErrorCorrection::High => ERROR_CORRECTION_HIGH_STR,
        };
        write!(f, "{s}")
    }
}
