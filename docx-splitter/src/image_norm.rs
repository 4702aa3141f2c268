//! Image size normalization: EMU/centimeter conversion and the
//! maximum-width clamp applied at emission time.

use std::io::Cursor;

/// Default maximum emitted image width in centimeters.
pub const DEFAULT_MAX_WIDTH_CM: f64 = 14.0;

/// English Metric Units per centimeter (914400 EMU per inch / 2.54).
pub const EMU_PER_CM: f64 = 360_000.0;

const CM_PER_INCH: f64 = 2.54;
const PX_PER_INCH: f64 = 96.0;

pub fn emu_to_cm(emu: i64) -> f64 {
    emu as f64 / EMU_PER_CM
}

pub fn cm_to_emu(cm: f64) -> i64 {
    (cm * EMU_PER_CM).round() as i64
}

/// Clamp a declared size under `max_width_cm`, preserving aspect ratio.
/// Width below the maximum is left untouched (never upsamples); height
/// is only ever scaled, never clamped independently.
pub fn fit_to_width(width_cm: f64, height_cm: f64, max_width_cm: f64) -> (f64, f64) {
    if width_cm > max_width_cm {
        let scale = max_width_cm / width_cm;
        (max_width_cm, height_cm * scale)
    } else {
        (width_cm, height_cm)
    }
}

/// Intrinsic size of an image payload in centimeters at 96 dpi, used
/// when the source carried no declared size. `None` when the payload
/// cannot be decoded.
pub fn natural_size_cm(bytes: &[u8]) -> Option<(f64, f64)> {
    let (w, h) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    Some((
        w as f64 / PX_PER_INCH * CM_PER_INCH,
        h as f64 / PX_PER_INCH * CM_PER_INCH,
    ))
}
