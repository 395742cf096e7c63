//! Conversion options

/// How tracks are assigned to the root and child roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TrackDetection {
    /// Roles come from `key: value` tags in track names
    Manual,
    /// Roles are inferred from track contents
    #[default]
    Auto,
}

/// Options consumed by the converter
#[derive(Debug, Clone)]
pub struct Options {
    pub ignore_banks: bool,
    pub ignore_programs: bool,
    pub ignore_pitch_bends: bool,
    /// Carried for the command line; expression is never converted
    pub ignore_expressions: bool,
    pub ignore_volumes: bool,
    pub ignore_pans: bool,
    /// Emit a track-init instruction at the start of each child track
    pub add_track_init: bool,
    /// Carried for the command line; no pitch-range setup is emitted
    pub skip_pitch_range: bool,
    pub track_detection: TrackDetection,
    /// Carried for the command line; velocities are written unscaled
    pub velocity_scale: f64,
    /// Ramp duration in ticks for volume, pan and pitch writes
    pub perf_duration: u16,
}

impl Options {
    pub fn new() -> Self {
        Self {
            ignore_banks: false,
            ignore_programs: false,
            ignore_pitch_bends: false,
            ignore_expressions: false,
            ignore_volumes: false,
            ignore_pans: false,
            add_track_init: false,
            skip_pitch_range: false,
            track_detection: TrackDetection::Auto,
            velocity_scale: 1.0,
            perf_duration: 0,
        }
    }

    /// Note-on velocity as written to the stream. The configured scale is
    /// not applied.
    pub fn scale_velocity(&self, velocity: u8) -> u8 {
        velocity
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.track_detection, TrackDetection::Auto);
        assert_eq!(options.perf_duration, 0);
        assert_eq!(options.scale_velocity(100), 100);
    }

    #[test]
    fn test_velocity_scale_is_inert() {
        for scale in [0.5, 2.0, 0.0, f64::NAN] {
            let options = Options {
                velocity_scale: scale,
                ..Options::default()
            };
            assert_eq!(options.scale_velocity(100), 100);
            assert_eq!(options.scale_velocity(1), 1);
        }
    }
}
