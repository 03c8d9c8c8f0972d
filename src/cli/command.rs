use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use dat::process::parse::ParserConfig;
use dat::process::segment::SegmenterConfig;
use dat::structs::subcode::DEFAULT_HOUR_OFFSET;

#[derive(Debug, ClapParser)]
#[command(
    name       = env!("CARGO_PKG_NAME"),
    version    = env!("CARGO_PKG_VERSION"),
    author     = env!("CARGO_PKG_AUTHORS"),
    about      = "Tools for extracting audio from raw DAT tape captures",
    long_about = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Split a capture into WAV tracks with details files.
    Extract(ExtractArgs),

    /// Merge three captures of the same tape into one corrected capture.
    Merge(MergeArgs),

    /// Print capture information
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Raw DAT capture (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Non-audio frames tolerated before the tape is considered finished.
    #[arg(short = 'a', long, value_name = "FRAMES", default_value_t = 10)]
    pub max_nonaudio_tape: u32,

    /// Non-audio frames tolerated inside a track before it is closed.
    #[arg(short = 'A', long, value_name = "FRAMES", default_value_t = 0)]
    pub max_nonaudio_track: u32,

    /// Do not start a new track when the recording date jumps.
    #[arg(short = 'd', long)]
    pub ignore_date_time: bool,

    /// Tracks shorter than this are deleted.
    #[arg(short = 'm', long, value_name = "SECONDS", default_value_t = 1.0)]
    pub minimum_track_length: f64,

    /// Tracks are split when they reach this length.
    #[arg(short = 'M', long, value_name = "SECONDS", default_value_t = 360000.0)]
    pub maximum_track_length: f64,

    /// Do not start a new track when the program number changes.
    #[arg(short = 'n', long)]
    pub ignore_program_number: bool,

    /// Prefix for output file names; may include a directory.
    #[arg(short = 'p', long, value_name = "PREFIX", default_value = "")]
    pub prefix: String,

    /// Do not warn about data anomalies.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Stop after this much audio has been read.
    #[arg(short = 'r', long, value_name = "SECONDS", default_value_t = 360000.0)]
    pub read_n_seconds: f64,

    /// Frames dropped after each track change.
    #[arg(short = 's', long, value_name = "FRAMES", default_value_t = 0)]
    pub skip_n_frames: u32,

    /// Frames to skip at the start of the input.
    #[arg(short = 'S', long, value_name = "FRAMES", default_value_t = 0)]
    pub seek_n_frames: u64,

    /// Hours added to subcode dates.
    #[arg(long, value_name = "HOURS", default_value_t = DEFAULT_HOUR_OFFSET, allow_negative_numbers = true)]
    pub hour_offset: i8,
}

impl ExtractArgs {
    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            hour_offset: self.hour_offset,
        }
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            min_track_seconds: self.minimum_track_length,
            max_track_seconds: self.maximum_track_length,
            max_audio_seconds_read: self.read_n_seconds,
            max_nonaudio_frames_track: self.max_nonaudio_track,
            max_nonaudio_frames_tape: self.max_nonaudio_tape,
            skip_frames_on_segment_change: self.skip_n_frames,
            segment_on_date_time: !self.ignore_date_time,
            segment_on_program_number: !self.ignore_program_number,
            print_warnings: !self.quiet,
        }
    }
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Three captures of the same tape (one may be "-" for stdin).
    #[arg(value_name = "INPUT", num_args = 3, required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output capture; standard output when omitted or "-".
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Raw DAT capture (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Frames to skip at the start of the input.
    #[arg(short = 'S', long, value_name = "FRAMES", default_value_t = 0)]
    pub seek_n_frames: u64,

    /// Hours added to subcode dates.
    #[arg(long, value_name = "HOURS", default_value_t = DEFAULT_HOUR_OFFSET, allow_negative_numbers = true)]
    pub hour_offset: i8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_args(argv: &[&str]) -> ExtractArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Extract(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn extract_defaults() {
        let args = extract_args(&["readdat", "extract", "tape.dat"]);
        let config = args.segmenter_config();

        assert_eq!(config.min_track_seconds, 1.0);
        assert_eq!(config.max_nonaudio_frames_tape, 10);
        assert_eq!(config.max_nonaudio_frames_track, 0);
        assert!(config.segment_on_date_time);
        assert!(config.print_warnings);
        assert_eq!(args.parser_config().hour_offset, -1);
        assert_eq!(args.seek_n_frames, 0);
    }

    #[test]
    fn extract_short_flags() {
        let args = extract_args(&[
            "readdat", "extract", "-d", "-n", "-q", "-m", "0", "-A", "25", "-S", "100", "-p",
            "out/a-", "--hour-offset", "-2", "-",
        ]);
        let config = args.segmenter_config();

        assert!(!config.segment_on_date_time);
        assert!(!config.segment_on_program_number);
        assert!(!config.print_warnings);
        assert_eq!(config.min_track_seconds, 0.0);
        assert_eq!(config.max_nonaudio_frames_track, 25);
        assert_eq!(args.seek_n_frames, 100);
        assert_eq!(args.prefix, "out/a-");
        assert_eq!(args.parser_config().hour_offset, -2);
        assert_eq!(args.input, PathBuf::from("-"));
    }

    #[test]
    fn merge_needs_three_inputs() {
        assert!(Cli::try_parse_from(["readdat", "merge", "a", "b"]).is_err());

        let cli = Cli::try_parse_from(["readdat", "merge", "a", "b", "c", "-o", "out.dat"]).unwrap();
        let Commands::Merge(args) = cli.command else {
            panic!("expected merge");
        };
        assert_eq!(args.inputs.len(), 3);
        assert_eq!(args.output, Some(PathBuf::from("out.dat")));
    }
}
