use std::fmt;

use image::Luma;
use log::trace;
use qrcode::render::unicode;
use qrcode::types::QrError;
use qrcode::{Color, QrCode, Version};
use shared::error::{Error, Result};

use crate::CaptureFrame;
use crate::error_correction::ErrorCorrection;

/// Modules of light border around a symbol, as required for scanners.
const QUIET_ZONE_MODULES: u32 = 4;

/// EncodedCode is a payload rendered as a QR symbol.
///
/// The symbol version is chosen as the smallest one able to hold the whole
/// payload at the requested error correction level.
pub struct EncodedCode {
    data: String,
    code: QrCode,
    error_correction: ErrorCorrection,
}

impl fmt::Debug for EncodedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedCode")
            .field("len", &self.data.len())
            .field("version", &self.version())
            .field("error_correction", &self.error_correction)
            .finish()
    }
}

impl EncodedCode {
    /// Text carried by the symbol.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn error_correction(&self) -> ErrorCorrection {
        self.error_correction
    }

    /// Symbol version, 1 through 40.
    pub fn version(&self) -> i16 {
        match self.code.version() {
            Version::Normal(v) | Version::Micro(v) => v,
        }
    }

    /// Number of modules along one side, quiet zone excluded.
    pub fn width(&self) -> usize {
        self.code.width()
    }

    /// Renders the symbol with half-height block characters for terminals.
    pub fn to_unicode(&self) -> String {
        self.code
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build()
    }

    /// Renders the symbol into a greyscale frame, `module_px` pixels per
    /// module, surrounded by the standard quiet zone.
    pub fn to_image(&self, module_px: u32) -> CaptureFrame {
        let module_px = module_px.max(1);
        let modules = self.code.width() as u32;
        let side = (modules + 2 * QUIET_ZONE_MODULES) * module_px;
        let colors = self.code.to_colors();

        CaptureFrame::from_fn(side, side, |x, y| {
            let mx = (x / module_px).checked_sub(QUIET_ZONE_MODULES);
            let my = (y / module_px).checked_sub(QUIET_ZONE_MODULES);
            match (mx, my) {
                (Some(mx), Some(my)) if mx < modules && my < modules => {
                    match colors[(my * modules + mx) as usize] {
                        Color::Dark => Luma([0u8]),
                        Color::Light => Luma([255u8]),
                    }
                }
                _ => Luma([255u8]),
            }
        })
    }
}

/// Encodes `data` as a QR symbol.
///
/// Payloads beyond the capacity of the largest symbol are rejected with
/// `ErrPayloadTooLarge`; they are never truncated.
pub fn encode(data: &str, error_correction: ErrorCorrection) -> Result<EncodedCode> {
    let max = error_correction.max_payload_len();
    if data.len() > max {
        return Err(Error::ErrPayloadTooLarge {
            size: data.len(),
            max,
        });
    }

    let code = QrCode::with_error_correction_level(data.as_bytes(), error_correction.ec_level())
        .map_err(|err| match err {
            QrError::DataTooLong => Error::ErrPayloadTooLarge {
                size: data.len(),
                max,
            },
            err => Error::ErrCodeEncode(err.to_string()),
        })?;

    let encoded = EncodedCode {
        data: data.to_owned(),
        code,
        error_correction,
    };
    trace!(
        "encoded {} bytes as version {} ({})",
        data.len(),
        encoded.version(),
        error_correction
    );

    Ok(encoded)
}
