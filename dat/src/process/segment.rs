use std::fmt::{Display, Formatter};

use anyhow::{Result, bail};
use chrono::NaiveDateTime;
use log::{debug, info, warn};

use crate::process::emit::{AudioEmitter, samples_in};
use crate::structs::frame::FrameBuf;
use crate::structs::frame_info::{Encoding, FrameInfo, Validity};
use crate::utils::errors::TrackError;

/// Destination for the audio and metadata of segmented tracks.
///
/// `open` is always followed by zero or more `write` calls and then exactly
/// one of `finish` or `discard`.
pub trait TrackSink {
    fn open(&mut self, track: &Track) -> Result<()>;
    fn write(&mut self, samples: &[u8]) -> Result<()>;
    /// Called for tracks that met the minimum duration, with final attributes.
    fn finish(&mut self, track: &Track) -> Result<()>;
    /// Called for tracks shorter than the minimum duration.
    fn discard(&mut self, track: &Track) -> Result<()>;
}

/// Attributes of the track being written.
///
/// Format fields are resolved from the first frame and never change.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Count of tracks kept before this one.
    pub number: usize,
    pub channels: u16,
    pub sampling_frequency: u32,
    pub encoding: Encoding,
    pub emphasis: bool,
    pub program_number: Option<u16>,
    pub samples: u64,
    pub first_frame: u64,
    pub last_frame: u64,
    pub first_date: Option<NaiveDateTime>,
    pub last_date: Option<NaiveDateTime>,
}

impl Track {
    fn open(number: usize, info: &FrameInfo) -> Self {
        Self {
            number,
            channels: info.channels,
            sampling_frequency: info.sampling_frequency,
            encoding: info.encoding,
            emphasis: info.emphasis,
            program_number: info.program_number,
            samples: 0,
            first_frame: info.frame_number,
            last_frame: info.frame_number,
            first_date: info.date_time,
            last_date: info.date_time,
        }
    }

    fn record(&mut self, info: &FrameInfo) {
        self.last_frame = info.frame_number;
        if let Some(date_time) = info.date_time {
            self.last_date = Some(date_time);
            self.first_date.get_or_insert(date_time);
        }
        if self.program_number.is_none() {
            self.program_number = info.program_number;
        }
    }

    pub fn duration(&self) -> f64 {
        self.samples as f64 / self.sampling_frequency as f64
    }
}

/// First attribute found to differ between a track and a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discontinuity {
    DateTime,
    Channels,
    SamplingFrequency,
    ProgramNumber,
    Encoding,
    Emphasis,
}

impl Display for Discontinuity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Discontinuity::DateTime => "jump in subcode date/time",
            Discontinuity::Channels => "change in number of channels",
            Discontinuity::SamplingFrequency => "change in sampling frequency",
            Discontinuity::ProgramNumber => "change in program number",
            Discontinuity::Encoding => "change in encoding",
            Discontinuity::Emphasis => "change in emphasis",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Shorter tracks are discarded; a track of exactly this length is kept.
    pub min_track_seconds: f64,
    pub max_track_seconds: f64,
    /// Total audio budget for the run; reaching it stops the stream.
    pub max_audio_seconds_read: f64,
    pub max_nonaudio_frames_track: u32,
    pub max_nonaudio_frames_tape: u32,
    pub skip_frames_on_segment_change: u32,
    pub segment_on_date_time: bool,
    pub segment_on_program_number: bool,
    pub print_warnings: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_track_seconds: 1.0,
            max_track_seconds: 360000.0,
            max_audio_seconds_read: 360000.0,
            max_nonaudio_frames_track: 0,
            max_nonaudio_frames_tape: 10,
            skip_frames_on_segment_change: 0,
            segment_on_date_time: true,
            segment_on_program_number: true,
            print_warnings: true,
        }
    }
}

/// Splits a stream of frames into tracks.
///
/// Each frame is judged together with the frame after it, so single-frame
/// glitches in the subcode do not break a recording in two.
pub struct Segmenter<S: TrackSink> {
    config: SegmenterConfig,
    sink: S,
    emitter: AudioEmitter,
    track: Option<Track>,
    track_number: usize,
    consecutive_nonaudio_frames: u32,
    skip_frames: u32,
    audio_seconds_read: f64,
    last_warning: Option<(usize, String)>,
    warnings_logged: u64,
}

impl<S: TrackSink> Segmenter<S> {
    pub fn new(mut config: SegmenterConfig, sink: S) -> Self {
        config.max_nonaudio_frames_tape = config
            .max_nonaudio_frames_tape
            .max(config.max_nonaudio_frames_track);

        Self {
            config,
            sink,
            emitter: AudioEmitter::default(),
            track: None,
            track_number: 0,
            consecutive_nonaudio_frames: 0,
            skip_frames: 0,
            audio_seconds_read: 0.0,
            last_warning: None,
            warnings_logged: 0,
        }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Number of tracks kept so far.
    pub fn track_number(&self) -> usize {
        self.track_number
    }

    pub fn audio_seconds_read(&self) -> f64 {
        self.audio_seconds_read
    }

    /// Data-anomaly warnings logged after deduplication.
    pub fn warnings_logged(&self) -> u64 {
        self.warnings_logged
    }

    /// Processes `frame` with its parsed `info`, using `next` as lookahead.
    ///
    /// When the frame disagrees with the open track but `next` agrees, the
    /// disagreeing attributes of `info` are replaced by those of `next`.
    pub fn process(
        &mut self,
        frame: &FrameBuf,
        info: &mut FrameInfo,
        next: &FrameInfo,
    ) -> Result<Flow> {
        let frame_number = info.frame_number;

        for warning in &info.warnings {
            self.warn(warning.to_string());
        }

        if info.is_end_of_tape() {
            info!("Frame {frame_number} end of tape reached (0x0EE pno found)");
            self.close_track()?;
            return Ok(Flow::Stop);
        }

        if info.is_blank() {
            if self.track.is_some() {
                debug!("Frame {frame_number} closing track 0x0BB pno seen");
                self.close_track()?;
            }
            return Ok(Flow::Continue);
        }

        if info.is_interpolated() {
            self.warn(format!(
                "interpolate flags set ({:#04X})",
                info.interpolate_flags
            ));
        }

        match info.validity {
            Validity::Valid | Validity::FieldInvalid => self.consecutive_nonaudio_frames = 0,
            Validity::NonAudio => return self.process_non_audio(info, next),
        }

        let verdict = self.track.as_ref().and_then(|track| {
            self.discontinuity(track, info)
                .map(|reason| (reason, self.discontinuity(track, next).is_none()))
        });
        if let Some((reason, next_consistent)) = verdict {
            if next_consistent {
                info!("Frame {frame_number} ignoring {reason} because previous & next frame consistent");
                info.adopt_attributes(next);
            } else {
                debug!("Closing track {} because {reason}", self.track_number);
                self.close_track()?;
                self.skip_frames = self.config.skip_frames_on_segment_change;
            }
        }

        if self.skip_frames > 0 {
            debug!("Frame {frame_number} skipped after segment change");
            self.skip_frames -= 1;
            return Ok(Flow::Continue);
        }

        if self.track.is_none() {
            self.open_track(info)?;
        }
        self.write_audio(frame, info)?;

        if self.audio_seconds_read >= self.config.max_audio_seconds_read {
            info!(
                "Closing track {} and exiting, limit of {:.2} seconds reached",
                self.track_number, self.config.max_audio_seconds_read
            );
            self.close_track()?;
            return Ok(Flow::Stop);
        }

        if self
            .track
            .as_ref()
            .is_some_and(|track| track.duration() >= self.config.max_track_seconds)
        {
            info!(
                "Closing track {}, limit of {:.2} seconds reached",
                self.track_number, self.config.max_track_seconds
            );
            self.close_track()?;
        }

        Ok(Flow::Continue)
    }

    fn process_non_audio(&mut self, info: &FrameInfo, next: &FrameInfo) -> Result<Flow> {
        let frame_number = info.frame_number;
        let run = self.consecutive_nonaudio_frames;
        self.consecutive_nonaudio_frames += 1;

        if run >= self.config.max_nonaudio_frames_tape {
            self.close_track()?;
            info!(
                "Exiting because {} consecutive frames of non-audio data encountered",
                self.consecutive_nonaudio_frames
            );
            return Ok(Flow::Stop);
        }

        let Some(track) = &self.track else {
            debug!("Skipping frame {frame_number} because of non-audio dataid and not in track");
            return Ok(Flow::Continue);
        };

        if next.is_audio() && self.discontinuity(track, next).is_none() {
            info!(
                "Frame {frame_number} ignoring non-audio dataid because next frame is audio and consistent with the track"
            );
        } else if self.consecutive_nonaudio_frames >= self.config.max_nonaudio_frames_track {
            debug!("Skipping frame {frame_number} because of non-audio dataid");
            info!(
                "Closing track {} because {} frames of non-audio data encountered",
                self.track_number, self.consecutive_nonaudio_frames
            );
            self.close_track()?;
        } else {
            info!("Ignoring non-audio dataid on frame {frame_number}");
        }

        Ok(Flow::Continue)
    }

    /// Compares a frame against the open track, in a fixed order.
    ///
    /// Dates within one second of the track's last date are continuous.
    /// Absent dates and program numbers never cause a discontinuity.
    pub fn discontinuity(&self, track: &Track, info: &FrameInfo) -> Option<Discontinuity> {
        let date_jump = match (track.last_date, info.date_time) {
            (Some(last), Some(date_time)) => (last - date_time).num_seconds().abs() > 1,
            _ => false,
        };
        let program_change = matches!(
            (track.program_number, info.program_number),
            (Some(track_pno), Some(pno)) if track_pno != pno
        );

        if self.config.segment_on_date_time && date_jump {
            Some(Discontinuity::DateTime)
        } else if track.channels != info.channels {
            Some(Discontinuity::Channels)
        } else if track.sampling_frequency != info.sampling_frequency {
            Some(Discontinuity::SamplingFrequency)
        } else if self.config.segment_on_program_number && program_change {
            Some(Discontinuity::ProgramNumber)
        } else if track.encoding != info.encoding {
            Some(Discontinuity::Encoding)
        } else if track.emphasis != info.emphasis {
            Some(Discontinuity::Emphasis)
        } else {
            None
        }
    }

    fn open_track(&mut self, info: &FrameInfo) -> Result<()> {
        if self.track.is_some() {
            bail!(TrackError::PreviousTrackOpen(self.track_number));
        }

        let track = Track::open(self.track_number, info);
        debug!(
            "Opening track {} at frame {}: {}ch {}Hz {}",
            track.number, track.first_frame, track.channels, track.sampling_frequency, track.encoding
        );
        self.sink.open(&track)?;
        self.track = Some(track);

        Ok(())
    }

    fn write_audio(&mut self, frame: &FrameBuf, info: &FrameInfo) -> Result<()> {
        let Some(track) = self.track.as_mut() else {
            return Ok(());
        };
        track.record(info);

        let bytes = self
            .emitter
            .emit(frame, track.encoding, track.sampling_frequency)?;
        self.sink.write(bytes)?;

        let samples = samples_in(bytes.len(), track.channels);
        track.samples += samples;
        self.audio_seconds_read += samples as f64 / track.sampling_frequency as f64;

        Ok(())
    }

    /// Finalizes or discards the open track, if any.
    ///
    /// Safe to call on every exit path; does nothing without an open track.
    pub fn close_track(&mut self) -> Result<()> {
        let Some(track) = self.track.take() else {
            return Ok(());
        };

        let length = track.duration();
        if length < self.config.min_track_seconds {
            if track.samples == 0 {
                info!("Deleting track {} - no data", track.number);
            } else {
                info!(
                    "Deleting track {} because {length:.2}s long - minimum track length {:.2}s",
                    track.number, self.config.min_track_seconds
                );
            }
            self.sink.discard(&track)?;
        } else {
            debug!(
                "Finishing track {}: {} channels of {} samples at {}hz",
                track.number, track.channels, track.samples, track.sampling_frequency
            );
            self.sink.finish(&track)?;
            self.track_number += 1;
        }

        Ok(())
    }

    /// Logs `message` unless it repeats the previous warning for the same track.
    ///
    /// Returns whether the warning was logged.
    fn warn(&mut self, message: String) -> bool {
        if !self.config.print_warnings {
            return false;
        }

        let repeated = self
            .last_warning
            .as_ref()
            .is_some_and(|(track_number, last)| *track_number == self.track_number && *last == message);
        if repeated {
            return false;
        }

        warn!("track {}: {message}", self.track_number);
        self.last_warning = Some((self.track_number, message));
        self.warnings_logged += 1;
        true
    }
}
