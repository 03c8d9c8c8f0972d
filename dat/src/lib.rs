//! Decoder for raw DAT (Digital Audio Tape) frame captures.
//!
//! ## Technical Overview
//!
//! A tape drive in audio mode delivers fixed 5822-byte frames. Each frame
//! holds interleaved 16-bit samples (or packed 12-bit samples in long-play
//! mode), seven parity-protected subcode packs and two id words describing
//! the sampling rate, channel layout, program number and recording date.
//!
//! ### Track Segmentation
//!
//! Consecutive frames are grouped into tracks. A track ends on a date jump,
//! a change in format or program number, a run of non-audio frames, or a
//! tape marker. Every frame is judged together with the one after it, so a
//! single damaged frame does not split a recording.
//!
//! ### Capture Merging
//!
//! Three captures of the same tape can be merged byte by byte with a
//! majority vote that also uses the interpolation flags set by the drive.
//!
//! ## Quick Start
//!
//! 1. Read frames using [`process::stream::FrameReader`]
//! 2. Parse them into metadata using [`process::parse::Parser`]
//! 3. Split them into tracks using [`process::segment::Segmenter`], or let
//!    [`process::extract::Extractor`] drive all three steps
//!
//! ```rust,no_run
//! use dat::process::{parse::Parser, stream::FrameReader};
//!
//! let parser = Parser::default();
//! let reader = FrameReader::new(std::fs::File::open("tape.dat")?);
//!
//! for (frame_number, frame) in reader.enumerate() {
//!     let info = parser.parse(&frame?, frame_number as u64)?;
//!     if info.is_end_of_tape() {
//!         break;
//!     }
//!     println!("{info}");
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Processing of frame captures.
///
/// 1. **Reading** ([`process::stream`]): whole frames from any byte source.
///
/// 2. **Parsing** ([`process::parse`]): id words and subcode packs to
///    [`FrameInfo`](structs::frame_info::FrameInfo).
///
/// 3. **Segmentation** ([`process::segment`]): frames to tracks, with audio
///    produced by [`process::emit`].
///
/// 4. **Merging** ([`process::merge`]): three captures to one.
pub mod process;

/// Data structures representing the tape frame format.
///
/// - **Frame layout** ([`structs::frame`]): Offsets and sizes
/// - **Id words** ([`structs::ids`]): Main-id and sub-id fields
/// - **Subcode** ([`structs::subcode`]): Time and date packs
/// - **Frame metadata** ([`structs::frame_info`]): Parsed per-frame values
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Id-word field reader
/// - **Error Handling** ([`utils::errors`]): Error types
/// - **Tables** ([`utils::tables`]): Long-play sample expansion
pub mod utils;
