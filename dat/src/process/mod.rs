/// Whole-frame reading from byte sources.
///
/// Provides the [`FrameReader`](stream::FrameReader), which separates a clean
/// end of input from a truncated capture.
pub mod stream;

/// Frame parsing into structured metadata.
///
/// Provides the [`Parser`](parse::Parser) for converting raw frames into
/// [`FrameInfo`](crate::structs::frame_info::FrameInfo) values.
pub mod parse;

/// Track segmentation.
///
/// Provides the [`Segmenter`](segment::Segmenter) state machine and the
/// [`TrackSink`](segment::TrackSink) trait through which tracks are written.
pub mod segment;

/// Sample extraction for linear and non-linear frames.
pub mod emit;

/// Frame-by-frame driver tying a reader, the parser and a segmenter together.
pub mod extract;

/// Majority-vote merge of three captures.
pub mod merge;

#[cfg(test)]
pub(crate) mod test_frames;
