//! Distance fade and stereo pan calculation
//!
//! Pure functions; the engine decides which levels a backend receives.

use radio_core::{FadeParams, Position, MINIMUM_FADE_GAP};
use std::f64::consts::FRAC_PI_4;

/// Top of the integer level range used by the command backend
pub const MAX_LEVEL: u32 = 1000;

/// Levels computed for one fade update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeLevels {
    /// Emitter-listener distance
    pub distance: f64,

    /// `clamp(factor * gain, 0, 1)`
    pub scalar: f64,

    /// `scalar` scaled to `0..=MAX_LEVEL`
    pub volume: u32,

    /// Left channel level (equals `volume` when not panned)
    pub left: u32,

    /// Right channel level (equals `volume` when not panned)
    pub right: u32,

    /// Pan position in `-1..=1`, 0 when not panned
    pub pan: f64,
}

/// Distance attenuation factor
///
/// 1.0 at or inside `min_distance`, 0.0 at or beyond `max_distance`, and
/// `(1 - t)^2` in between, where `t` is the linear position between the two.
pub fn attenuation(distance: f64, min_distance: f32, max_distance: f32) -> f64 {
    let min = f64::from(min_distance);
    let max = f64::from(max_distance);

    if distance <= min {
        1.0
    } else if distance >= max {
        0.0
    } else {
        let t = (distance - min) / (max - min);
        (1.0 - t) * (1.0 - t)
    }
}

/// Compute output levels for an emitter/listener pair
///
/// # Arguments
/// * `emitter` - Where the radio is
/// * `listener` - Where the player is
/// * `params` - Effective fade radii and pan width
/// * `gain` - Device volume gain, clamped to `[0, 2]`
/// * `spatial_pan` - Whether stereo pan is enabled
pub fn compute(
    emitter: &Position,
    listener: &Position,
    params: &FadeParams,
    gain: f32,
    spatial_pan: bool,
) -> FadeLevels {
    let distance = emitter.distance_to(listener);
    let factor = attenuation(distance, params.min_distance, params.max_distance);
    let gain = f64::from(gain).clamp(0.0, 2.0);
    let scalar = (factor * gain).clamp(0.0, 1.0);
    let volume = (scalar * f64::from(MAX_LEVEL)).round() as u32;

    let mut levels = FadeLevels {
        distance,
        scalar,
        volume,
        left: volume,
        right: volume,
        pan: 0.0,
    };

    if spatial_pan && params.pan_distance > MINIMUM_FADE_GAP {
        let dx = f64::from(emitter.x) - f64::from(listener.x);
        let pan = (dx / f64::from(params.pan_distance)).clamp(-1.0, 1.0);

        // Equal-power curve
        let angle = (pan + 1.0) * FRAC_PI_4;
        levels.pan = pan;
        levels.left = (f64::from(volume) * angle.cos()).round() as u32;
        levels.right = (f64::from(volume) * angle.sin()).round() as u32;
    }

    levels
}

/// Filter-graph attenuation in hundredths of a decibel
///
/// `2000 * log10(scalar)` clamped to `-10000..=0`; silence below 0.0001.
pub fn attenuation_centibels(scalar: f64) -> i32 {
    if scalar <= 0.0001 {
        return -10_000;
    }
    ((2000.0 * scalar.log10()).round() as i32).clamp(-10_000, 0)
}
