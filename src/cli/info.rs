use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use chrono::NaiveDateTime;
use indicatif::{MultiProgress, ProgressBar};

use super::command::InfoArgs;
use super::progress::{FRAMES_PER_TICK, create_progress_bar};
use crate::input::InputReader;
use crate::timestamp::time_str;
use dat::process::parse::{Parser, ParserConfig};
use dat::structs::frame_info::{FrameInfo, Validity};
use dat::structs::subcode::PackTime;

/// Every sampling rate packs 30 ms of audio into a frame.
const FRAME_SECONDS: f64 = 0.03;

pub fn cmd_info(args: &InfoArgs, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing DAT capture: {}", args.input.display());

    let input = InputReader::new(&args.input)?;
    let total_frames = input
        .frame_count()
        .map(|frames| frames.saturating_sub(args.seek_n_frames));
    let reader = input.into_frames(args.seek_n_frames)?;

    let pb = multi
        .map(|multi| create_progress_bar(multi, total_frames))
        .transpose()?;
    if let Some(ref pb) = pb {
        pb.set_message("analyzing frames");
    }

    let parser = Parser::new(ParserConfig {
        hour_offset: args.hour_offset,
    });
    let mut summary = CaptureSummary::default();

    for (frame_number, frame) in (args.seek_n_frames..).zip(reader) {
        let info = parser.parse(&frame?, frame_number)?;
        summary.record(&info);

        if summary.frames % FRAMES_PER_TICK == 0 {
            tick(&pb);
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if summary.frames == 0 {
        println!("No frames found in the input.");
    } else {
        summary.display();
    }

    Ok(())
}

fn tick(pb: &Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.inc(FRAMES_PER_TICK);
    }
}

#[derive(Debug, Default)]
struct CaptureSummary {
    frames: u64,
    validity: BTreeMap<&'static str, u64>,
    encodings: BTreeMap<String, u64>,
    sampling_frequencies: BTreeMap<u32, u64>,
    channels: BTreeMap<u16, u64>,
    program_numbers: BTreeSet<u16>,
    interpolated: u64,
    bad_packs: u64,
    first_date: Option<NaiveDateTime>,
    last_date: Option<NaiveDateTime>,
    first_absolute_time: Option<PackTime>,
    last_absolute_time: Option<PackTime>,
    end_of_tape: Option<u64>,
}

impl CaptureSummary {
    fn record(&mut self, info: &FrameInfo) {
        self.frames += 1;
        *self.validity.entry(validity_label(info.validity)).or_default() += 1;
        self.bad_packs += info.bad_packs as u64;
        if info.is_interpolated() {
            self.interpolated += 1;
        }

        if info.validity == Validity::Valid {
            *self.encodings.entry(info.encoding.to_string()).or_default() += 1;
            *self
                .sampling_frequencies
                .entry(info.sampling_frequency)
                .or_default() += 1;
            *self.channels.entry(info.channels).or_default() += 1;
        }

        if let Some(program_number) = info.program_number {
            self.program_numbers.insert(program_number);
        }
        if let Some(date) = info.date_time {
            self.first_date.get_or_insert(date);
            self.last_date = Some(date);
        }
        if let Some(time) = info.absolute_time {
            self.first_absolute_time.get_or_insert(time);
            self.last_absolute_time = Some(time);
        }
        if info.is_end_of_tape() && self.end_of_tape.is_none() {
            self.end_of_tape = Some(info.frame_number);
        }
    }

    fn display(&self) {
        println!();
        println!("DAT Capture Information");
        println!("=======================");
        println!();

        println!("Frames");
        println!("  Frames read               {}", self.frames);
        for (label, count) in &self.validity {
            println!("  {label:26}{count}");
        }
        println!("  Interpolated              {}", self.interpolated);
        println!("  Subcode parity errors     {}", self.bad_packs);
        println!();

        println!("Audio Format");
        for (label, count) in &self.encodings {
            println!("  {label:26}{count} frames");
        }
        for (rate, count) in &self.sampling_frequencies {
            println!("  {:26}{count} frames", format!("{rate} Hz"));
        }
        for (channels, count) in &self.channels {
            println!("  {:26}{count} frames", format!("{channels} channels"));
        }
        let duration = self.valid_audio_seconds();
        println!("  Audio duration            {}", time_str(duration));
        println!();

        println!("Subcode");
        let program_numbers = if self.program_numbers.is_empty() {
            "--".to_string()
        } else {
            self.program_numbers
                .iter()
                .map(|pno| pno.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("  Program numbers           {program_numbers}");
        println!("  First date                {}", optional(self.first_date));
        println!("  Last date                 {}", optional(self.last_date));
        println!(
            "  First absolute time       {}",
            optional(self.first_absolute_time)
        );
        println!(
            "  Last absolute time        {}",
            optional(self.last_absolute_time)
        );
        println!("  End of tape at frame      {}", optional(self.end_of_tape));
        println!();
    }

    /// Seconds of audio in valid frames.
    fn valid_audio_seconds(&self) -> f64 {
        self.sampling_frequencies.values().sum::<u64>() as f64 * FRAME_SECONDS
    }
}

fn validity_label(validity: Validity) -> &'static str {
    match validity {
        Validity::Valid => "Valid audio",
        Validity::FieldInvalid => "Reserved field codes",
        Validity::NonAudio => "Non-audio",
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "--".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn audio(frame_number: u64) -> FrameInfo {
        FrameInfo::new(frame_number)
    }

    #[test]
    fn counts_classes_and_ranges() {
        let mut summary = CaptureSummary::default();
        let date = NaiveDate::from_ymd_opt(1994, 6, 1).and_then(|d| d.and_hms_opt(12, 0, 0));

        summary.record(&FrameInfo {
            program_number: Some(7),
            date_time: date,
            ..audio(0)
        });
        summary.record(&FrameInfo {
            validity: Validity::NonAudio,
            ..audio(1)
        });
        summary.record(&FrameInfo {
            sampling_frequency: 44100,
            hex_pno: 0x0EE,
            ..audio(2)
        });
        summary.record(&FrameInfo {
            hex_pno: 0x0EE,
            ..audio(3)
        });

        assert_eq!(summary.frames, 4);
        assert_eq!(summary.validity["Valid audio"], 3);
        assert_eq!(summary.validity["Non-audio"], 1);
        assert_eq!(summary.sampling_frequencies[&48000], 2);
        assert_eq!(summary.sampling_frequencies[&44100], 1);
        assert_eq!(summary.program_numbers.len(), 1);
        assert_eq!(summary.first_date, date);
        assert_eq!(summary.end_of_tape, Some(2));
    }

    #[test]
    fn audio_duration_counts_valid_frames() {
        let mut summary = CaptureSummary::default();
        for n in 0..100 {
            summary.record(&audio(n));
        }
        summary.record(&FrameInfo {
            validity: Validity::FieldInvalid,
            ..audio(100)
        });

        assert_eq!(summary.encodings["16-bit linear"], 100);
        assert!((summary.valid_audio_seconds() - 3.0).abs() < 1e-9);
    }
}
