//! Lenient field deserializers.
//!
//! Integer settings are read through `f64` and saturated into their field's
//! type, so `compression_quality: 300` or a negative crop edge becomes a
//! value `sanitize` can clamp instead of failing the whole file.

use serde::{Deserialize, Deserializer};

use super::OutputFormat;

fn saturate(value: f64, max: f64) -> f64 {
    let saturated = if value.is_nan() {
        0.0
    } else {
        value.round().clamp(0.0, max)
    };
    if saturated != value {
        tracing::warn!("Config value {value} does not fit its field, using {saturated}");
    }
    saturated
}

macro_rules! saturating {
    ($name:ident, $ty:ty) => {
        pub fn $name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<$ty, D::Error> {
            let value = f64::deserialize(deserializer)?;
            Ok(saturate(value, <$ty>::MAX as f64) as $ty)
        }
    };
}

saturating!(saturating_u8, u8);
saturating!(saturating_u32, u32);
saturating!(saturating_u64, u64);
saturating!(saturating_usize, usize);

/// A fixed-size array of `u32` settings, each saturated independently.
pub fn u32_array<'de, D, const N: usize>(deserializer: D) -> Result<[u32; N], D::Error>
where
    D: Deserializer<'de>,
    [f64; N]: Deserialize<'de>,
{
    let values = <[f64; N]>::deserialize(deserializer)?;
    Ok(values.map(|v| saturate(v, u32::MAX as f64) as u32))
}

/// An optional output format; an unsupported name keeps the source format.
pub fn output_format<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<OutputFormat>, D::Error> {
    let Some(name) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if name.trim().is_empty() {
        return Ok(None);
    }
    let format = OutputFormat::parse(&name);
    if format.is_none() {
        tracing::warn!("Unsupported format_conversion '{name}', keeping the source format");
    }
    Ok(format)
}
