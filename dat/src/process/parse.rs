use anyhow::Result;
use log::{debug, info, trace};

use crate::structs::frame::{FrameBuf, N_PACKS};
use crate::structs::frame_info::{Encoding, FrameInfo, Validity};
use crate::structs::ids::{MainId, SubId};
use crate::structs::subcode::{DEFAULT_HOUR_OFFSET, DatePack, PackKind, PackTime, SubcodePack};
use crate::utils::errors::SubcodeWarning;

#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    /// Hours added to the hour stored in date packs.
    pub hour_offset: i8,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            hour_offset: DEFAULT_HOUR_OFFSET,
        }
    }
}

/// Decodes raw frames into [`FrameInfo`].
///
/// Unrecognized bit patterns are recorded in the returned validity class;
/// damaged input is expected and never raises an error.
#[derive(Debug, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parses the id words and subcode packs of one frame.
    ///
    /// Only a truncated id word can fail, which a full frame buffer rules out.
    pub fn parse(&self, frame: &FrameBuf, frame_number: u64) -> Result<FrameInfo> {
        let sub_id = SubId::read(frame)?;
        let mut info = FrameInfo::new(frame_number);
        info.hex_pno = sub_id.hex_pno();
        info.control_id = sub_id.control_id;
        info.interpolate_flags = sub_id.interpolate_flags;

        if sub_id.data_id != 0 {
            trace!("Frame {frame_number} non audio dataid({})", sub_id.data_id);
            info.validity = Validity::NonAudio;
            return Ok(info);
        }

        let main_id = MainId::read(frame)?;
        if sub_id.control_id != 0 {
            trace!("Frame {frame_number} {sub_id} {main_id:?}");
        }

        info.program_number = sub_id.program_number();

        for index in 0..N_PACKS {
            self.parse_subcode_pack(&SubcodePack::read(frame, index), &mut info);
        }

        match main_id.channels {
            0 => info.channels = 2,
            1 => info.channels = 4,
            channels => {
                info!("Frame {frame_number} invalid value for channels({channels})");
                info.validity = Validity::FieldInvalid;
            }
        }

        match main_id.samplerate {
            0 => info.sampling_frequency = 48000,
            1 => info.sampling_frequency = 44100,
            2 => info.sampling_frequency = 32000,
            samplerate => {
                info!("Frame {frame_number} invalid value for sampling_frequency ({samplerate})");
                info.validity = Validity::FieldInvalid;
            }
        }

        match main_id.encoding {
            0 => info.encoding = Encoding::Linear16,
            1 => info.encoding = Encoding::NonLinear12,
            encoding => {
                info!("Frame {frame_number} invalid value for encoding ({encoding})");
                info.validity = Validity::FieldInvalid;
            }
        }

        info.emphasis = main_id.emphasis != 0;

        Ok(info)
    }

    fn parse_subcode_pack(&self, pack: &SubcodePack, info: &mut FrameInfo) {
        let frame_number = info.frame_number;

        if pack.kind == PackKind::Unused {
            return;
        }

        if !pack.parity_ok() {
            debug!(
                "Frame {frame_number} Subcode[{}] {}: Incorrect parity {:x} != {:x}",
                pack.index,
                pack.kind,
                pack.parity(),
                pack.data[7]
            );
            info.bad_packs += 1;
            return;
        }

        match pack.kind {
            PackKind::ProgramTime | PackKind::AbsoluteTime | PackKind::RunningTime => {
                let time = PackTime::read(pack.data);
                trace!(
                    "Frame {frame_number} Subcode[{}] {}: {time}",
                    pack.index, pack.kind
                );
                match pack.kind {
                    PackKind::ProgramTime => info.program_time = Some(time),
                    PackKind::AbsoluteTime => info.absolute_time = Some(time),
                    _ => info.running_time = Some(time),
                }
            }
            PackKind::Date => {
                let Some(date) = DatePack::read(pack.data) else {
                    trace!(
                        "Frame {frame_number} Subcode[{}] {}: invalid date",
                        pack.index, pack.kind
                    );
                    return;
                };

                match date.to_date_time(self.config.hour_offset) {
                    Ok(date_time) => {
                        trace!(
                            "Frame {frame_number} Subcode[{}] {}: {date_time}",
                            pack.index, pack.kind
                        );
                        info.date_time = Some(date_time);
                        if !date.weekday_matches(&date_time) {
                            info.warnings.push(SubcodeWarning::WeekdayMismatch);
                        }
                    }
                    Err(warning) => info.warnings.push(warning),
                }
            }
            kind => trace!("Frame {frame_number} Subcode[{}] {kind}", pack.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::test_frames::FrameBuilder;
    use crate::structs::frame::PACKS_OFFSET;
    use chrono::{NaiveDate, Timelike};

    const DATE_PACK: [u8; 7] = [0x54, 0x01, 0x02, 0x14, 0x11, 0x30, 0x45];

    #[test]
    fn valid_codes_decode_to_rates_and_channels() -> Result<()> {
        let parser = Parser::default();
        for (code, rate) in [(0, 48000), (1, 44100), (2, 32000)] {
            for (ch_code, channels) in [(0, 2), (1, 4)] {
                let frame = FrameBuilder::audio().samplerate(code).channels(ch_code).build();
                let info = parser.parse(&frame, 0)?;
                assert_eq!(info.validity, Validity::Valid);
                assert_eq!(info.sampling_frequency, rate);
                assert_eq!(info.channels, channels);
            }
        }
        Ok(())
    }

    #[test]
    fn reserved_codes_mark_field_invalid() -> Result<()> {
        let parser = Parser::default();

        let frame = FrameBuilder::audio().samplerate(3).build();
        assert_eq!(parser.parse(&frame, 0)?.validity, Validity::FieldInvalid);

        let frame = FrameBuilder::audio().channels(3).build();
        assert_eq!(parser.parse(&frame, 0)?.validity, Validity::FieldInvalid);

        let frame = FrameBuilder::audio().channels(2).samplerate(3).build();
        let info = parser.parse(&frame, 0)?;
        assert_eq!(info.validity, Validity::FieldInvalid);
        assert_eq!(info.channels, 2);
        assert_eq!(info.sampling_frequency, 48000);
        Ok(())
    }

    #[test]
    fn non_audio_short_circuits() -> Result<()> {
        let frame = FrameBuilder::audio()
            .data_id(1)
            .channels(3)
            .program(0x0EE)
            .date_pack(0, DATE_PACK)
            .build();
        let info = Parser::default().parse(&frame, 5)?;

        assert_eq!(info.validity, Validity::NonAudio);
        assert_eq!(info.channels, 2);
        assert_eq!(info.sampling_frequency, 48000);
        assert_eq!(info.date_time, None);
        assert!(info.is_end_of_tape());
        Ok(())
    }

    #[test]
    fn start_frame_carries_program_number() -> Result<()> {
        let frame = FrameBuilder::audio().start().program(0x123).build();
        let info = Parser::default().parse(&frame, 0)?;
        assert_eq!(info.program_number, Some(123));

        let frame = FrameBuilder::audio().program(0x123).build();
        assert_eq!(Parser::default().parse(&frame, 0)?.program_number, None);
        Ok(())
    }

    #[test]
    fn date_pack_sets_timestamp() -> Result<()> {
        let frame = FrameBuilder::audio().date_pack(3, DATE_PACK).build();
        let info = Parser::default().parse(&frame, 0)?;

        let date_time = info.date_time.unwrap();
        assert_eq!(date_time.date(), NaiveDate::from_ymd_opt(2001, 2, 14).unwrap());
        assert_eq!(date_time.hour(), 10);
        assert!(info.warnings.is_empty());

        let info = Parser::new(ParserConfig { hour_offset: 0 }).parse(&frame, 0)?;
        assert_eq!(info.date_time.unwrap().hour(), 11);
        Ok(())
    }

    #[test]
    fn corrupted_parity_drops_pack_only() -> Result<()> {
        let parser = Parser::default();
        let clean = parser.parse(&FrameBuilder::audio().samplerate(1).build(), 0)?;

        for bit in 0..64 {
            let mut frame = FrameBuilder::audio()
                .samplerate(1)
                .date_pack(0, DATE_PACK)
                .build();
            frame[PACKS_OFFSET + bit / 8] ^= 1 << (bit % 8);

            let info = parser.parse(&frame, 0)?;
            assert_eq!(info.date_time, None, "bit {bit}");
            assert_eq!(info.bad_packs, 1, "bit {bit}");
            assert_eq!(info.sampling_frequency, clean.sampling_frequency);
            assert_eq!(info.channels, clean.channels);
            assert_eq!(info.validity, clean.validity);
            assert_eq!(info.program_number, clean.program_number);
        }
        Ok(())
    }

    #[test]
    fn weekday_mismatch_keeps_date() -> Result<()> {
        let mut pack = DATE_PACK;
        pack[0] = 0x52;
        let frame = FrameBuilder::audio().date_pack(0, pack).build();
        let info = Parser::default().parse(&frame, 0)?;

        assert!(info.date_time.is_some());
        assert_eq!(info.warnings, vec![SubcodeWarning::WeekdayMismatch]);
        Ok(())
    }

    #[test]
    fn impossible_date_is_discarded() -> Result<()> {
        let mut pack = DATE_PACK;
        pack[3] = 0x31;
        let frame = FrameBuilder::audio().date_pack(0, pack).build();
        let info = Parser::default().parse(&frame, 0)?;

        assert_eq!(info.date_time, None);
        assert_eq!(info.warnings, vec![SubcodeWarning::InvalidDate]);
        Ok(())
    }

    #[test]
    fn time_packs_are_kept_for_diagnostics() -> Result<()> {
        let frame = FrameBuilder::audio()
            .pack(1, [0x20, 0x00, 0x01, 0x00, 0x12, 0x34, 0x05])
            .build();
        let info = Parser::default().parse(&frame, 0)?;
        let time = info.absolute_time.unwrap();
        assert_eq!((time.minutes, time.seconds, time.frame), (12, 34, 5));
        assert!(info.program_time.is_none());
        Ok(())
    }
}
