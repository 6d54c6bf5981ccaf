//! Per-device volume gain
//!
//! Callers speak in percent (0-200%, default 100%). Internally the device
//! keeps a linear gain in `[0, 2]` that multiplies the distance fade.

/// Default volume in percent (unity gain)
pub const DEFAULT_VOLUME_PERCENT: f32 = 100.0;

/// Maximum volume in percent
pub const MAX_VOLUME_PERCENT: f32 = 200.0;

/// Step used by volume up/down when the caller passes a non-positive step
pub const DEFAULT_VOLUME_STEP_PERCENT: f32 = 5.0;

/// Maximum linear gain
pub const MAX_GAIN: f32 = MAX_VOLUME_PERCENT / DEFAULT_VOLUME_PERCENT;

/// Volume controller with linear gain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceVolume {
    /// Linear gain multiplier (0.0 - 2.0)
    gain: f32,
}

impl DeviceVolume {
    /// Create a volume controller from a percentage
    ///
    /// # Arguments
    /// * `percent` - Initial volume (clamped to 0-200)
    pub fn from_percent(percent: f32) -> Self {
        let mut volume = Self::default();
        volume.set_percent(percent);
        volume
    }

    /// Set volume in percent (clamped to 0-200); returns the clamped value
    pub fn set_percent(&mut self, percent: f32) -> f32 {
        let clamped = if percent.is_nan() {
            DEFAULT_VOLUME_PERCENT
        } else {
            percent.clamp(0.0, MAX_VOLUME_PERCENT)
        };
        self.gain = clamped / DEFAULT_VOLUME_PERCENT;
        clamped
    }

    /// Current volume in percent
    pub fn percent(&self) -> f32 {
        (self.gain * DEFAULT_VOLUME_PERCENT).clamp(0.0, MAX_VOLUME_PERCENT)
    }

    /// Raise by `step` percent (5% when `step <= 0`)
    pub fn step_up(&mut self, step: f32) {
        self.gain = (self.gain + Self::step_gain(step)).clamp(0.0, MAX_GAIN);
    }

    /// Lower by `step` percent (5% when `step <= 0`)
    pub fn step_down(&mut self, step: f32) {
        self.gain = (self.gain - Self::step_gain(step)).clamp(0.0, MAX_GAIN);
    }

    /// Linear gain multiplier
    pub fn gain(&self) -> f32 {
        self.gain
    }

    fn step_gain(step: f32) -> f32 {
        let percent = if step > 0.0 {
            step
        } else {
            DEFAULT_VOLUME_STEP_PERCENT
        };
        percent / DEFAULT_VOLUME_PERCENT
    }
}

impl Default for DeviceVolume {
    fn default() -> Self {
        Self { gain: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unity() {
        let volume = DeviceVolume::default();
        assert_eq!(volume.gain(), 1.0);
        assert_eq!(volume.percent(), 100.0);
    }

    #[test]
    fn set_percent_clamps() {
        let mut volume = DeviceVolume::default();
        assert_eq!(volume.set_percent(150.0), 150.0);
        assert_eq!(volume.gain(), 1.5);

        assert_eq!(volume.set_percent(500.0), 200.0);
        assert_eq!(volume.gain(), 2.0);

        assert_eq!(volume.set_percent(-10.0), 0.0);
        assert_eq!(volume.gain(), 0.0);
    }

    #[test]
    fn steps_use_default_when_non_positive() {
        let mut volume = DeviceVolume::default();
        volume.step_down(0.0);
        assert!((volume.percent() - 95.0).abs() < 1e-4);

        volume.step_up(-3.0);
        assert!((volume.percent() - 100.0).abs() < 1e-4);

        volume.step_up(20.0);
        assert!((volume.percent() - 120.0).abs() < 1e-4);
    }

    #[test]
    fn steps_are_clamped() {
        let mut volume = DeviceVolume::from_percent(195.0);
        volume.step_up(50.0);
        assert_eq!(volume.gain(), MAX_GAIN);

        let mut volume = DeviceVolume::from_percent(2.0);
        volume.step_down(50.0);
        assert_eq!(volume.gain(), 0.0);
    }
}
