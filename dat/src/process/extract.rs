use std::io::Read;

use anyhow::{Result, bail};
use log::{error, info};

use crate::process::parse::Parser;
use crate::process::segment::{Flow, Segmenter, TrackSink};
use crate::process::stream::FrameReader;
use crate::structs::frame::{FRAME_SIZE, FrameBuf};
use crate::structs::frame_info::FrameInfo;
use crate::utils::errors::StreamError;

/// Drives a frame source through the parser and segmenter.
///
/// # Example
///
/// ```rust,no_run
/// use dat::process::extract::Extractor;
/// use dat::process::parse::Parser;
/// use dat::process::segment::{Segmenter, SegmenterConfig, Track, TrackSink};
/// use dat::process::stream::FrameReader;
///
/// struct Discard;
///
/// impl TrackSink for Discard {
///     fn open(&mut self, _: &Track) -> anyhow::Result<()> { Ok(()) }
///     fn write(&mut self, _: &[u8]) -> anyhow::Result<()> { Ok(()) }
///     fn finish(&mut self, track: &Track) -> anyhow::Result<()> {
///         println!("track {} has {} samples", track.number, track.samples);
///         Ok(())
///     }
///     fn discard(&mut self, _: &Track) -> anyhow::Result<()> { Ok(()) }
/// }
///
/// let reader = &mut FrameReader::new(std::fs::File::open("tape.dat")?);
/// let segmenter = Segmenter::new(SegmenterConfig::default(), Discard);
/// let mut extractor = Extractor::new(Parser::default(), segmenter);
/// extractor.run(reader, 0, |_| {})?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct Extractor<S: TrackSink> {
    parser: Parser,
    segmenter: Segmenter<S>,
}

impl<S: TrackSink> Extractor<S> {
    pub fn new(parser: Parser, segmenter: Segmenter<S>) -> Self {
        Self { parser, segmenter }
    }

    pub fn segmenter(&self) -> &Segmenter<S> {
        &self.segmenter
    }

    pub fn into_segmenter(self) -> Segmenter<S> {
        self.segmenter
    }

    /// Processes frames until the input ends or the segmenter stops.
    ///
    /// `first_frame_number` numbers the first frame read. `on_frame` sees
    /// every parsed frame in order. Any open track is closed before an
    /// error is returned. Returns the number of frames processed.
    pub fn run<R: Read, F: FnMut(&FrameInfo)>(
        &mut self,
        reader: &mut FrameReader<R>,
        first_frame_number: u64,
        on_frame: F,
    ) -> Result<u64> {
        let result = self.process_frames(reader, first_frame_number, on_frame);

        if result.is_err() {
            if let Err(e) = self.segmenter.close_track() {
                error!("Closing track after failure: {e:#}");
            }
        }

        result
    }

    fn process_frames<R: Read, F: FnMut(&FrameInfo)>(
        &mut self,
        reader: &mut FrameReader<R>,
        first_frame_number: u64,
        mut on_frame: F,
    ) -> Result<u64> {
        let mut frame: FrameBuf = [0; FRAME_SIZE];
        let mut next_frame: FrameBuf = [0; FRAME_SIZE];
        let mut frame_number = first_frame_number;

        if !reader.read_frame(&mut frame)? {
            bail!(StreamError::NoFrames);
        }
        let mut info = self.parser.parse(&frame, frame_number)?;
        on_frame(&info);

        loop {
            frame_number += 1;

            if !reader.read_frame(&mut next_frame)? {
                // the last frame is its own lookahead
                let last = info.clone();
                self.segmenter.process(&frame, &mut info, &last)?;
                self.segmenter.close_track()?;
                break;
            }

            let next_info = self.parser.parse(&next_frame, frame_number)?;
            on_frame(&next_info);

            if self.segmenter.process(&frame, &mut info, &next_info)? == Flow::Stop {
                break;
            }

            std::mem::swap(&mut frame, &mut next_frame);
            info = next_info;
        }

        let processed = frame_number - first_frame_number;
        info!(
            "Processed {processed} frames, {} tracks written, {:.2} seconds of audio, {} warnings",
            self.segmenter.track_number(),
            self.segmenter.audio_seconds_read(),
            self.segmenter.warnings_logged()
        );

        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::segment::{SegmenterConfig, Track};
    use crate::process::test_frames::FrameBuilder;
    use std::io::Cursor;

    #[derive(Default)]
    struct Recorder {
        open: bool,
        kept: Vec<Track>,
        discarded: Vec<Track>,
    }

    impl TrackSink for Recorder {
        fn open(&mut self, _: &Track) -> Result<()> {
            self.open = true;
            Ok(())
        }

        fn write(&mut self, _: &[u8]) -> Result<()> {
            Ok(())
        }

        fn finish(&mut self, track: &Track) -> Result<()> {
            self.open = false;
            self.kept.push(track.clone());
            Ok(())
        }

        fn discard(&mut self, track: &Track) -> Result<()> {
            self.open = false;
            self.discarded.push(track.clone());
            Ok(())
        }
    }

    fn extractor(min_track_seconds: f64) -> Extractor<Recorder> {
        let config = SegmenterConfig {
            min_track_seconds,
            ..Default::default()
        };
        Extractor::new(Parser::default(), Segmenter::new(config, Recorder::default()))
    }

    fn capture(frames: &[FrameBuf]) -> Vec<u8> {
        frames.iter().flatten().copied().collect()
    }

    #[test]
    fn last_frame_is_written_and_track_closed() -> Result<()> {
        let data = capture(&vec![FrameBuilder::audio().build(); 3]);
        let mut extractor = extractor(0.0);
        let mut seen = Vec::new();

        let processed = extractor.run(&mut FrameReader::new(Cursor::new(data)), 40, |info| {
            seen.push(info.frame_number)
        })?;

        assert_eq!(processed, 3);
        assert_eq!(seen, vec![40, 41, 42]);
        let sink = extractor.into_segmenter().into_sink();
        assert_eq!(sink.kept.len(), 1);
        assert_eq!(sink.kept[0].samples, 3 * 1440);
        assert_eq!(sink.kept[0].first_frame, 40);
        assert_eq!(sink.kept[0].last_frame, 42);
        Ok(())
    }

    #[test]
    fn truncated_capture_closes_track_before_failing() {
        let mut data = capture(&vec![FrameBuilder::audio().build(); 2]);
        data.extend_from_slice(&[0; 10]);
        let mut extractor = extractor(0.0);

        let result = extractor.run(&mut FrameReader::new(Cursor::new(data)), 0, |_| {});

        assert!(result.is_err());
        let sink = extractor.into_segmenter().into_sink();
        assert!(!sink.open);
        assert_eq!(sink.kept.len(), 1);
        assert_eq!(sink.kept[0].samples, 1440);
    }

    #[test]
    fn empty_input_is_an_error() {
        let mut extractor = extractor(1.0);
        let result = extractor.run(&mut FrameReader::new(Cursor::new(Vec::new())), 0, |_| {});
        assert!(result.is_err());
    }

    #[test]
    fn end_of_tape_stops_reading() -> Result<()> {
        let data = capture(&[
            FrameBuilder::audio().build(),
            FrameBuilder::audio().program(0x0EE).build(),
            FrameBuilder::audio().build(),
            FrameBuilder::audio().build(),
        ]);
        let mut extractor = extractor(0.0);
        let processed = extractor.run(&mut FrameReader::new(Cursor::new(data)), 0, |_| {})?;

        assert_eq!(processed, 2);
        assert_eq!(extractor.segmenter().track_number(), 1);
        Ok(())
    }
}
