//! Byte-level majority vote across three captures of the same tape.

use std::fmt::{Display, Formatter};
use std::io::{Read, Write};

use anyhow::{Context, Result, bail};
use log::{debug, info, trace};

use crate::process::stream::FrameReader;
use crate::structs::frame::{FRAME_SIZE, FrameBuf};
use crate::structs::ids::SubId;
use crate::utils::errors::MergeError;

pub const SOURCES: usize = 3;

/// Outcome of reconciling one byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Unanimous(u8),
    /// Only one value among the sources without interpolation flags.
    Hinted(u8),
    /// Two sources agreed; `faulty` was charged an error.
    Majority { value: u8, faulty: usize },
    /// No two sources agreed; the least charged source was trusted.
    Uncorrectable { value: u8, chosen: usize },
}

impl Vote {
    pub fn value(&self) -> u8 {
        match *self {
            Vote::Unanimous(value) | Vote::Hinted(value) => value,
            Vote::Majority { value, .. } | Vote::Uncorrectable { value, .. } => value,
        }
    }
}

/// Per-source error tallies and the uncorrectable count for one merge run.
///
/// Tallies only grow and bias later full-disagreement decisions toward the
/// source with the fewest errors so far.
#[derive(Debug, Default, Clone)]
pub struct Reconciler {
    errors: [u64; SOURCES],
    uncorrectable: u64,
}

impl Reconciler {
    pub fn errors(&self) -> [u64; SOURCES] {
        self.errors
    }

    pub fn uncorrectable(&self) -> u64 {
        self.uncorrectable
    }

    pub fn reconcile_byte(&mut self, values: [u8; SOURCES], hints: [bool; SOURCES]) -> Vote {
        let [a, b, c] = values;
        if a == b && b == c {
            return Vote::Unanimous(a);
        }

        let mut trusted = values
            .iter()
            .zip(hints)
            .filter(|&(_, hinted)| !hinted)
            .map(|(&value, _)| value);
        if let Some(value) = trusted.next() {
            if trusted.all(|other| other == value) {
                for (errors, &original) in self.errors.iter_mut().zip(&values) {
                    if original != value {
                        *errors += 1;
                    }
                }
                return Vote::Hinted(value);
            }
        }

        if a == b {
            self.errors[2] += 1;
            Vote::Majority { value: a, faulty: 2 }
        } else if a == c {
            self.errors[1] += 1;
            Vote::Majority { value: a, faulty: 1 }
        } else if b == c {
            self.errors[0] += 1;
            Vote::Majority { value: b, faulty: 0 }
        } else {
            self.uncorrectable += 1;
            let chosen = (0..SOURCES)
                .min_by_key(|&source| self.errors[source])
                .unwrap_or(0);
            Vote::Uncorrectable {
                value: values[chosen],
                chosen,
            }
        }
    }

    /// Reconciles every byte of a frame group into `frames[0]`.
    pub fn reconcile(
        &mut self,
        frames: &mut [FrameBuf; SOURCES],
        hints: [bool; SOURCES],
        frame_index: u64,
    ) {
        for n in 0..FRAME_SIZE {
            let values = [frames[0][n], frames[1][n], frames[2][n]];
            let vote = self.reconcile_byte(values, hints);

            match vote {
                Vote::Unanimous(_) => continue,
                Vote::Hinted(_) => debug!(
                    "Frame {frame_index} byte {n} fixing error based on interpolate flags {values:02X?} {hints:?}"
                ),
                Vote::Majority { faulty, .. } => debug!(
                    "Error in input {faulty} at frame {frame_index} byte {n} {values:02X?} {hints:?}"
                ),
                Vote::Uncorrectable { chosen, .. } => info!(
                    "All inputs differ frame {frame_index} byte {n} {values:02X?} using input {chosen} {hints:?}"
                ),
            }

            frames[0][n] = vote.value();
        }
    }

    /// Fails once uncorrectable bytes exceed both one frame's worth and one
    /// sixteenth of all bytes up to the zero-based `frame_index`.
    pub fn check_divergence(&self, frame_index: u64) -> Result<()> {
        let frame_size = FRAME_SIZE as u64;
        if self.uncorrectable > frame_size && self.uncorrectable > frame_index * frame_size / 16 {
            bail!(MergeError::Divergence {
                uncorrectable: self.uncorrectable,
                frames: frame_index,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub frames: u64,
    pub uncorrectable: u64,
    pub errors: [u64; SOURCES],
}

impl Display for MergeSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} uncorrectable errors",
            self.frames, self.uncorrectable
        )?;
        for (input, errors) in self.errors.iter().enumerate() {
            write!(f, ", {errors} corrected errors in input {input}")?;
        }
        Ok(())
    }
}

/// Merges three synchronized captures into one corrected stream.
pub struct Merger<R> {
    inputs: [FrameReader<R>; SOURCES],
    reconciler: Reconciler,
    frames: u64,
}

impl<R: Read> Merger<R> {
    pub fn new(inputs: [R; SOURCES]) -> Self {
        Self {
            inputs: inputs.map(FrameReader::new),
            reconciler: Reconciler::default(),
            frames: 0,
        }
    }

    pub fn summary(&self) -> MergeSummary {
        MergeSummary {
            frames: self.frames,
            uncorrectable: self.reconciler.uncorrectable(),
            errors: self.reconciler.errors(),
        }
    }

    /// Writes one reconciled frame per frame group until any input ends.
    ///
    /// The output of a group is written before the divergence check, so a
    /// failed run still contains the frame that tripped it.
    pub fn run<W: Write>(&mut self, output: &mut W) -> Result<MergeSummary> {
        let mut frames = [[0; FRAME_SIZE]; SOURCES];
        let mut hints = [false; SOURCES];

        while self.read_group(&mut frames, &mut hints)? {
            self.reconciler.reconcile(&mut frames, hints, self.frames);
            output.write_all(&frames[0]).context("Write failed")?;
            self.reconciler.check_divergence(self.frames)?;
            self.frames += 1;
        }

        output.flush().context("Write failed")?;
        Ok(self.summary())
    }

    /// Reads one frame from each input; `false` once any input is exhausted.
    ///
    /// On the first group, leading blank-marker frames are skipped per input.
    fn read_group(
        &mut self,
        frames: &mut [FrameBuf; SOURCES],
        hints: &mut [bool; SOURCES],
    ) -> Result<bool> {
        for (input, reader) in self.inputs.iter_mut().enumerate() {
            loop {
                let read = reader
                    .fill(&mut frames[input])
                    .with_context(|| format!("Read of input {input} failed"))?;
                if read == 0 {
                    return Ok(false);
                }
                if read < FRAME_SIZE {
                    bail!(MergeError::PartialFrame {
                        input,
                        read,
                        expected: FRAME_SIZE,
                    });
                }

                let sub_id = SubId::read(&frames[input])?;
                hints[input] = sub_id.is_interpolated();
                trace!(
                    "Input {input}: frame {} pno = {:03x}",
                    self.frames,
                    sub_id.hex_pno()
                );

                if self.frames != 0 || !sub_id.is_blank() {
                    break;
                }
                debug!("Input {input}: skipping frame because pno == 0x0bb");
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::test_frames::FrameBuilder;
    use std::io::Cursor;

    const NO_HINTS: [bool; 3] = [false; 3];

    #[test]
    fn two_way_agreement_charges_the_odd_source() {
        let mut reconciler = Reconciler::default();

        let vote = reconciler.reconcile_byte([0x41, 0x41, 0x42], NO_HINTS);
        assert_eq!(vote, Vote::Majority { value: 0x41, faulty: 2 });
        assert_eq!(reconciler.errors(), [0, 0, 1]);

        assert_eq!(reconciler.reconcile_byte([0x41, 0x42, 0x41], NO_HINTS).value(), 0x41);
        assert_eq!(reconciler.reconcile_byte([0x40, 0x42, 0x42], NO_HINTS).value(), 0x42);
        assert_eq!(reconciler.errors(), [1, 1, 1]);
        assert_eq!(reconciler.uncorrectable(), 0);
    }

    #[test]
    fn full_disagreement_trusts_least_charged_source() {
        let mut reconciler = Reconciler::default();

        let vote = reconciler.reconcile_byte([0x41, 0x42, 0x43], NO_HINTS);
        assert_eq!(vote, Vote::Uncorrectable { value: 0x41, chosen: 0 });
        assert_eq!(reconciler.uncorrectable(), 1);

        // charge source 0 twice and source 1 once
        reconciler.reconcile_byte([0x00, 0x01, 0x01], NO_HINTS);
        reconciler.reconcile_byte([0x00, 0x01, 0x01], NO_HINTS);
        reconciler.reconcile_byte([0x01, 0x00, 0x01], NO_HINTS);
        let vote = reconciler.reconcile_byte([0x41, 0x42, 0x43], NO_HINTS);
        assert_eq!(vote, Vote::Uncorrectable { value: 0x43, chosen: 2 });

        // sources 1 and 2 tie at one error each; the lower index wins
        reconciler.reconcile_byte([0x01, 0x01, 0x00], NO_HINTS);
        let vote = reconciler.reconcile_byte([0x41, 0x42, 0x43], NO_HINTS);
        assert_eq!(vote, Vote::Uncorrectable { value: 0x42, chosen: 1 });
        assert_eq!(reconciler.uncorrectable(), 3);
    }

    #[test]
    fn single_trusted_source_wins() {
        let mut reconciler = Reconciler::default();

        let vote = reconciler.reconcile_byte([0x41, 0x42, 0x43], [false, true, true]);
        assert_eq!(vote, Vote::Hinted(0x41));
        assert_eq!(reconciler.errors(), [0, 1, 1]);
        assert_eq!(reconciler.uncorrectable(), 0);

        // trusted sources agree against an interpolated majority
        let vote = reconciler.reconcile_byte([0x10, 0x10, 0x20], [true, true, false]);
        assert_eq!(vote, Vote::Hinted(0x20));
        assert_eq!(reconciler.errors(), [1, 2, 1]);
    }

    #[test]
    fn hints_without_single_trusted_value_fall_back_to_vote() {
        let mut reconciler = Reconciler::default();

        let vote = reconciler.reconcile_byte([0x41, 0x42, 0x42], [false, false, true]);
        assert_eq!(vote, Vote::Majority { value: 0x42, faulty: 0 });

        let vote = reconciler.reconcile_byte([0x41, 0x42, 0x43], [true, true, true]);
        assert!(matches!(vote, Vote::Uncorrectable { .. }));
    }

    #[test]
    fn divergence_boundary() -> Result<()> {
        let frame_size = FRAME_SIZE as u64;
        let mut reconciler = Reconciler {
            uncorrectable: frame_size,
            ..Default::default()
        };
        reconciler.check_divergence(0)?;

        reconciler.uncorrectable = frame_size + 1;
        assert!(reconciler.check_divergence(0).is_err());

        // 17 * 5822 / 16 = 6185
        reconciler.uncorrectable = 6185;
        reconciler.check_divergence(17)?;
        reconciler.uncorrectable = 6186;
        let err = reconciler.check_divergence(17).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MergeError>(),
            Some(MergeError::Divergence {
                uncorrectable: 6186,
                frames: 17
            })
        ));
        Ok(())
    }

    fn capture(frames: &[FrameBuf]) -> Cursor<Vec<u8>> {
        Cursor::new(frames.iter().flatten().copied().collect())
    }

    #[test]
    fn merges_frames_and_reports_counts() -> Result<()> {
        let good = FrameBuilder::audio().fill(0x11).build();
        let mut damaged = good;
        damaged[10] = 0xFF;
        damaged[20] = 0xFE;

        let mut merger = Merger::new([
            capture(&[good, good]),
            capture(&[damaged, good]),
            capture(&[good, damaged]),
        ]);
        let mut output = Vec::<u8>::new();
        let summary = merger.run(&mut output)?;

        assert_eq!(output.len(), 2 * FRAME_SIZE);
        assert_eq!(&output[..FRAME_SIZE], &good[..]);
        assert_eq!(&output[FRAME_SIZE..], &good[..]);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.errors, [0, 2, 2]);
        assert_eq!(summary.uncorrectable, 0);
        Ok(())
    }

    #[test]
    fn leading_blank_frames_are_skipped_per_input() -> Result<()> {
        let blank = FrameBuilder::audio().program(0x0BB).build();
        let first = FrameBuilder::audio().fill(0x01).build();
        let second = FrameBuilder::audio().fill(0x02).build();

        let mut merger = Merger::new([
            capture(&[blank, blank, first, second]),
            capture(&[first, second]),
            capture(&[blank, first, second, blank]),
        ]);
        let mut output = Vec::<u8>::new();
        let summary = merger.run(&mut output)?;

        // the trailing blank frame of input 2 has no partner and is dropped
        assert_eq!(summary.frames, 2);
        assert_eq!(&output[..FRAME_SIZE], &first[..]);
        assert_eq!(&output[FRAME_SIZE..], &second[..]);
        assert_eq!(summary.errors, [0, 0, 0]);
        Ok(())
    }

    #[test]
    fn interpolated_sources_defer_to_clean_one() -> Result<()> {
        let clean = FrameBuilder::audio().fill(0x41).build();
        let mut merger = Merger::new([
            capture(&[clean]),
            capture(&[FrameBuilder::audio().fill(0x42).interpolate(0x20).build()]),
            capture(&[FrameBuilder::audio().fill(0x43).interpolate(0x40).build()]),
        ]);
        let mut output = Vec::<u8>::new();
        let summary = merger.run(&mut output)?;

        assert_eq!(output, clean.to_vec());
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.uncorrectable, 0);
        assert_eq!(summary.errors[0], 0);
        assert_eq!(summary.errors[1], summary.errors[2]);
        assert!(summary.errors[1] > 0);
        Ok(())
    }

    #[test]
    fn unrelated_captures_abort() {
        let frames = |fill: u8| capture(&[FrameBuilder::audio().fill(fill).build(); 4]);
        let mut merger = Merger::new([frames(1), frames(2), frames(3)]);
        let mut output = Vec::<u8>::new();

        let err = merger.run(&mut output).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MergeError>(),
            Some(MergeError::Divergence { frames: 1, .. })
        ));
        assert_eq!(output.len(), 2 * FRAME_SIZE);
        assert_eq!(merger.summary().frames, 1);
    }

    #[test]
    fn truncated_input_is_reported() {
        let good = FrameBuilder::audio().build();
        let mut short = capture(&[good]).into_inner();
        short.extend_from_slice(&[0; 100]);

        let mut merger = Merger::new([capture(&[good, good]), Cursor::new(short), capture(&[good, good])]);
        let err = merger.run(&mut Vec::<u8>::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MergeError>(),
            Some(MergeError::PartialFrame { input: 1, read: 100, .. })
        ));
        assert_eq!(merger.summary().frames, 1);
    }
}
