//! Configuration validation with range clamping.
//!
//! Out-of-range values never reject a config: each one is clamped into range
//! and reported, and the caller logs the adjustments.

use super::Config;

fn clamp_f32(
    value: &mut f32,
    min: f32,
    max: f32,
    default: f32,
    key: &str,
    notes: &mut Vec<String>,
) {
    let before = *value;
    let after = if before.is_finite() {
        before.clamp(min, max)
    } else {
        default
    };
    if after != before {
        notes.push(format!("{key} = {before} out of range [{min}, {max}], using {after}"));
        *value = after;
    }
}

fn clamp_ord<T>(value: &mut T, min: T, max: T, key: &str, notes: &mut Vec<String>)
where
    T: Ord + Copy + std::fmt::Display,
{
    let before = *value;
    let after = before.clamp(min, max);
    if after != before {
        notes.push(format!("{key} = {before} out of range [{min}, {max}], using {after}"));
        *value = after;
    }
}

fn at_least<T>(value: &mut T, min: T, key: &str, notes: &mut Vec<String>)
where
    T: Ord + Copy + std::fmt::Display,
{
    if *value < min {
        notes.push(format!("{key} = {} must be >= {min}, using {min}", *value));
        *value = min;
    }
}

impl Config {
    /// Clamp every ranged value into range.
    ///
    /// Returns one human-readable note per adjusted key; an empty vector
    /// means the config was already valid.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();

        clamp_ord(&mut self.compression_quality, 1, 100, "compression_quality", &mut notes);
        clamp_f32(&mut self.upscale_factor, 0.01, 16.0, 1.0, "upscale_factor", &mut notes);
        clamp_f32(&mut self.contrast_factor, 0.0, 10.0, 1.0, "contrast_factor", &mut notes);
        clamp_f32(&mut self.color_factor, 0.0, 10.0, 1.0, "color_factor", &mut notes);
        clamp_ord(&mut self.watermark_font_size, 8, 512, "watermark_font_size", &mut notes);

        if !self.rotation_angle.is_finite() {
            notes.push(format!(
                "rotation_angle = {} is not a number, using 0",
                self.rotation_angle
            ));
            self.rotation_angle = 0.0;
        } else if self.rotation_angle.abs() >= 360.0 {
            let normalized = self.rotation_angle % 360.0;
            notes.push(format!(
                "rotation_angle = {} normalized to {normalized}",
                self.rotation_angle
            ));
            self.rotation_angle = normalized;
        }

        clamp_ord(&mut self.batch.workers, 1, 64, "batch.workers", &mut notes);
        at_least(&mut self.batch.chunk_size, 1, "batch.chunk_size", &mut notes);
        clamp_ord(&mut self.output.thumbnail_size, 16, 4096, "output.thumbnail_size", &mut notes);

        at_least(&mut self.limits.max_file_size_mb, 1, "limits.max_file_size_mb", &mut notes);
        at_least(&mut self.limits.max_image_dimension, 1, "limits.max_image_dimension", &mut notes);
        at_least(&mut self.limits.decode_timeout_ms, 1, "limits.decode_timeout_ms", &mut notes);

        at_least(&mut self.inference.max_concurrent, 1, "inference.max_concurrent", &mut notes);
        at_least(&mut self.inference.timeout_ms, 1, "inference.timeout_ms", &mut notes);

        notes
    }
}
