#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("Partial frame read: got {read} of {expected} bytes")]
    PartialFrame { read: usize, expected: usize },

    #[error("Input ended before the first frame")]
    NoFrames,
}

#[derive(thiserror::Error, Debug)]
pub enum TrackError {
    #[error("Previous track {0} was not closed before opening a new one")]
    PreviousTrackOpen(usize),

    #[error("Track has no usable sampling frequency: {0}")]
    InvalidSamplingFrequency(u32),
}

#[derive(thiserror::Error, Debug)]
pub enum MergeError {
    #[error(
        "Stopping because {uncorrectable} uncorrected errors in {frames} frames; tape images may be unaligned or badly damaged"
    )]
    Divergence { uncorrectable: u64, frames: u64 },

    #[error("Partial frame read from input {input}: got {read} of {expected} bytes")]
    PartialFrame {
        input: usize,
        read: usize,
        expected: usize,
    },
}

/// Recoverable anomalies found while decoding subcode packs.
///
/// These never stop decoding; the consumer decides whether to report them.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubcodeWarning {
    #[error("can not convert time")]
    InvalidDate,

    #[error("Day of week apparently set incorrectly on recording - using correct day of week")]
    WeekdayMismatch,
}
