//! Conversion between linear ("natural") power and decibels

use crate::types::{BackscatterRaster, BackscatterUnit, SarError, SarReal, SarResult};
use ndarray::Zip;

/// 10^(dB / 10)
#[inline]
pub fn db_to_linear(db: SarReal) -> SarReal {
    10.0f32.powf(db / 10.0)
}

/// 10 * log10(power); `None` for zero, negative or non-finite power
#[inline]
pub fn linear_to_db(power: SarReal) -> Option<SarReal> {
    if power.is_finite() && power > 0.0 {
        Some(10.0 * power.log10())
    } else {
        None
    }
}

/// Convert a dB raster to linear power. Masked pixels stay masked.
pub fn to_natural(image: &BackscatterRaster) -> SarResult<BackscatterRaster> {
    expect_unit(image, BackscatterUnit::Decibel, "to_natural")?;

    let mut valid = image.valid().clone();
    let data = Zip::from(image.data())
        .and(&mut valid)
        .map_collect(|&db, ok| {
            if !*ok {
                return SarReal::NAN;
            }
            let power = db_to_linear(db);
            // Overflow for absurd dB values
            *ok = power.is_finite();
            power
        });

    Ok(BackscatterRaster::from_parts(data, valid, *image.geometry(), BackscatterUnit::Linear))
}

/// Convert a linear-power raster to dB. Non-positive power becomes masked.
pub fn to_db(image: &BackscatterRaster) -> SarResult<BackscatterRaster> {
    expect_unit(image, BackscatterUnit::Linear, "to_db")?;

    let mut valid = image.valid().clone();
    let data = Zip::from(image.data())
        .and(&mut valid)
        .map_collect(|&power, ok| match (*ok, linear_to_db(power)) {
            (true, Some(db)) => db,
            _ => {
                *ok = false;
                SarReal::NAN
            }
        });

    let masked = image.valid_count() - valid.iter().filter(|&&ok| ok).count();
    if masked > 0 {
        log::debug!("to_db masked {} non-positive pixels", masked);
    }

    Ok(BackscatterRaster::from_parts(data, valid, *image.geometry(), BackscatterUnit::Decibel))
}

fn expect_unit(image: &BackscatterRaster, unit: BackscatterUnit, operation: &str) -> SarResult<()> {
    if image.unit() != unit {
        return Err(SarError::InvalidParameter(format!(
            "{} expects a {} raster, got {}",
            operation,
            unit,
            image.unit()
        )));
    }
    Ok(())
}
