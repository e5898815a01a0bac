use log::{debug, trace};

use crate::CaptureFrame;
use crate::scan_result::ScanResult;

/// Decodes the first intact code found in a captured frame.
///
/// Frames without a code, and frames whose code fails error correction
/// (a lossy or partially occluded scan), yield an invalid [`ScanResult`].
/// Only content recovered intact is ever reported as valid.
pub fn decode(frame: &CaptureFrame) -> ScanResult {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return ScanResult::none();
    }

    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            frame.get_pixel(x as u32, y as u32)[0]
        });

    let grids = prepared.detect_grids();
    if grids.is_empty() {
        trace!("no code in {width}x{height} frame");
        return ScanResult::none();
    }

    for grid in grids {
        match grid.decode() {
            Ok((_, content)) if !content.is_empty() => {
                trace!("decoded {} bytes from frame", content.len());
                return ScanResult::found(content);
            }
            Ok(_) => debug!("discarding empty code"),
            Err(err) => debug!("discarding unreadable code: {err}"),
        }
    }

    ScanResult::none()
}
