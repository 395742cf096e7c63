use clap::Parser;
use miditobms::converter::TrackDetection;
use miditobms::{Converter, Options};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "miditobms")]
#[command(version = "0.3.0")]
#[command(about = "MIDI to BMS sequence converter", long_about = None)]
struct Args {
    /// Input MIDI file
    input: PathBuf,

    /// Output BMS file (defaults to the input path with .bms appended)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// How tracks are assigned to the root and child roles
    #[arg(long, value_enum, default_value_t = TrackDetection::Auto)]
    track_detection: TrackDetection,

    /// Ramp duration in ticks for volume, pan and pitch changes
    #[arg(long, default_value_t = 0)]
    perf_duration: u16,

    /// Multiplier applied to note velocities
    #[arg(long, default_value_t = 1.0)]
    velocity_scale: f64,

    /// Do not convert bank select controllers
    #[arg(long)]
    ignore_banks: bool,

    /// Do not convert program changes
    #[arg(long)]
    ignore_programs: bool,

    /// Do not convert pitch bends
    #[arg(long)]
    ignore_pitch_bends: bool,

    /// Do not convert expression controllers
    #[arg(long)]
    ignore_expressions: bool,

    /// Do not convert volume controllers
    #[arg(long)]
    ignore_volumes: bool,

    /// Do not convert pan controllers
    #[arg(long)]
    ignore_pans: bool,

    /// Start each child track with a track-init instruction
    #[arg(long)]
    add_track_init: bool,

    /// Do not emit pitch range setup
    #[arg(long)]
    skip_pitch_range: bool,
}

impl Args {
    fn options(&self) -> Options {
        Options {
            ignore_banks: self.ignore_banks,
            ignore_programs: self.ignore_programs,
            ignore_pitch_bends: self.ignore_pitch_bends,
            ignore_expressions: self.ignore_expressions,
            ignore_volumes: self.ignore_volumes,
            ignore_pans: self.ignore_pans,
            add_track_init: self.add_track_init,
            skip_pitch_range: self.skip_pitch_range,
            track_detection: self.track_detection,
            velocity_scale: self.velocity_scale,
            perf_duration: self.perf_duration,
        }
    }
}

/// `song.mid` converts to `song.mid.bms`
fn default_output(input: &Path) -> PathBuf {
    let mut path = OsString::from(input.as_os_str());
    path.push(".bms");
    PathBuf::from(path)
}

fn main() -> Result<(), miditobms::Error> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input));

    let options = args.options();
    info!("Options: {:?}", options);

    Converter::new(options).convert_file(&args.input, &output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_appends_extension() {
        assert_eq!(
            default_output(Path::new("music/song.mid")),
            PathBuf::from("music/song.mid.bms")
        );
        assert_eq!(default_output(Path::new("song")), PathBuf::from("song.bms"));
    }
}
